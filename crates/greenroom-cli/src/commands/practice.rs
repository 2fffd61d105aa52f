//! The full practice flow: record an answer over the microphone, validate
//! it, upload it, and wait for the backend's feedback.

use std::sync::Arc;

use anyhow::Result;
use console::style;
use greenroom_core::api::InterviewService;
use greenroom_core::{CpalBackend, InterviewSession, SessionOutcome, Settings, SymphoniaProbe};

use crate::app;
use crate::commands::sessions::{print_feedback, print_questions};

pub async fn run(settings: &Settings, interview_id: &str, device: Option<String>) -> Result<()> {
    let api = app::require_authed_api(settings)?;

    // Show the questions before the camera-shy part starts.
    let record = api.fetch_interview(interview_id).await?;
    print_questions(&record);

    let mut config = settings.session_config();
    if let Some(device) = device {
        config.constraints.device_name = Some(device);
    }
    let max_duration = config.recorder.max_duration;

    // Warm the connection pool so the first upload call is not paying
    // TLS setup on top of the transfer.
    let _ = greenroom_core::warmup_http_client();

    let service: Arc<dyn InterviewService> = Arc::new(api.clone());
    let mut session = InterviewSession::new(
        interview_id,
        Arc::new(CpalBackend::new()),
        Arc::new(SymphoniaProbe),
        service,
        config,
    );

    let outcome = drive(&mut session, max_duration).await;
    session.teardown();
    outcome
}

async fn drive(session: &mut InterviewSession, max_duration: std::time::Duration) -> Result<()> {
    session
        .enable_capture()
        .await
        .map_err(app::session_failure)?;
    println!(
        "\nMicrophone ready. Recording up to {}s.",
        max_duration.as_secs()
    );
    println!("Press Enter to start...");
    wait_for_enter().await;

    session.start_recording().map_err(app::session_failure)?;
    println!(
        "{} Press Enter to stop.",
        style("Recording.").red().bold()
    );

    // Manual stop and the hard-stop timer race; the recorder makes the
    // loser a no-op, so the select here needs no special casing.
    tokio::select! {
        _ = wait_for_enter() => {}
        _ = tokio::time::sleep(max_duration) => {
            println!("Time is up.");
        }
    }
    session.stop_recording().await;

    if let Some(clip) = session.clip() {
        println!(
            "Recorded {} KB ({}).",
            clip.size_bytes() / 1024,
            clip.mime_type()
        );
    }

    println!("Uploading...");
    session.submit().await.map_err(app::session_failure)?;
    println!("Queued. Waiting for feedback...");

    match session.await_result().await {
        Some(SessionOutcome::Complete(record)) => {
            println!("{}", style("Processing complete.").green().bold());
            print_feedback(&record);
            Ok(())
        }
        Some(SessionOutcome::ProcessingFailed(record)) => {
            eprintln!("{}", style("Processing failed on the backend.").red());
            if let Some(detail) = record.ai_feedback {
                eprintln!("{detail:#}");
            }
            std::process::exit(1);
        }
        Some(SessionOutcome::TimedOut) => {
            eprintln!("Gave up waiting for processing; check back later with:");
            eprintln!("  greenroom show {}", session.interview_id());
            std::process::exit(1);
        }
        None => {
            eprintln!("Nothing was queued.");
            std::process::exit(1);
        }
    }
}

/// Wait for the user to press Enter without blocking the runtime.
async fn wait_for_enter() {
    let _ = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
    })
    .await;
}
