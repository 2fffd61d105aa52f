pub mod auth;
pub mod devices;
pub mod practice;
pub mod sessions;
