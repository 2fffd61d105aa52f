//! greenroom - practice interview answers from the terminal.

mod app;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "greenroom",
    version,
    about = "Record a practice interview answer, upload it, and get feedback"
)]
struct Cli {
    /// Print diagnostics from the recording/upload pipeline
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the credential for later commands
    Login {
        #[arg(long, default_value = "demo")]
        username: String,
        /// Password login; without it the dev-login flow is used
        #[arg(long)]
        password: Option<String>,
    },
    /// Create a new interview with generated questions
    New {
        #[arg(long)]
        job_url: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        company: Option<String>,
    },
    /// Record an answer, upload it and wait for feedback
    Practice {
        interview_id: String,
        /// Input device name (default: system default microphone)
        #[arg(long)]
        device: Option<String>,
    },
    /// List your interviews
    List,
    /// Show one interview: questions, status, feedback
    Show { interview_id: String },
    /// Aggregate practice statistics
    Stats,
    /// List audio input devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    greenroom_core::set_diagnostics(cli.verbose);

    let settings = greenroom_core::Settings::load();
    match cli.command {
        Command::Login { username, password } => {
            commands::auth::login(&settings, &username, password.as_deref()).await
        }
        Command::New {
            job_url,
            title,
            company,
        } => commands::sessions::create(&settings, job_url, title, company).await,
        Command::Practice {
            interview_id,
            device,
        } => commands::practice::run(&settings, &interview_id, device).await,
        Command::List => commands::sessions::list(&settings).await,
        Command::Show { interview_id } => commands::sessions::show(&settings, &interview_id).await,
        Command::Stats => commands::sessions::stats(&settings).await,
        Command::Devices => commands::devices::list(),
    }
}
