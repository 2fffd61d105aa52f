//! Sign-in flow: exchange credentials for a token and persist it.

use anyhow::Result;
use console::style;
use greenroom_core::Settings;

use crate::app;

pub async fn login(settings: &Settings, username: &str, password: Option<&str>) -> Result<()> {
    let api = app::public_api(settings);
    let session = match password {
        Some(password) => api.login(username, password).await?,
        // No password: the backend's dev-login flow issues a token for a
        // stable demo user.
        None => api.dev_login(username).await?,
    };

    let mut updated = settings.clone();
    updated.token = Some(session.token);
    updated.save()?;

    println!(
        "Signed in as {}.",
        style(&session.user.username).green().bold()
    );
    if let Some(path) = Settings::config_path() {
        println!("Credential stored in {}", path.display());
    }
    Ok(())
}
