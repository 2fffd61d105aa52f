//! Interview management: create, list, show, statistics.

use anyhow::Result;
use console::style;
use greenroom_core::api::{CreateInterview, InterviewRecord, InterviewService, InterviewStatus};
use greenroom_core::Settings;

use crate::app;

pub async fn create(
    settings: &Settings,
    job_url: Option<String>,
    title: Option<String>,
    company: Option<String>,
) -> Result<()> {
    let api = app::require_authed_api(settings)?;
    let record = api
        .create_interview(&CreateInterview {
            job_url,
            title,
            company,
        })
        .await?;

    println!("Created interview {}", style(&record.id).bold());
    print_questions(&record);
    println!("\nRecord your answer with:");
    println!("  greenroom practice {}", record.id);
    Ok(())
}

pub async fn list(settings: &Settings) -> Result<()> {
    let api = app::require_authed_api(settings)?;
    let records = api.list_interviews().await?;
    if records.is_empty() {
        println!("No interviews yet. Create one with: greenroom new");
        return Ok(());
    }
    for record in records {
        println!(
            "{}  {}  {}",
            style(&record.id).bold(),
            style(status_label(&record.status)).cyan(),
            record.created_at.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub async fn show(settings: &Settings, interview_id: &str) -> Result<()> {
    let api = app::require_authed_api(settings)?;
    let record = api.fetch_interview(interview_id).await?;

    println!(
        "Interview {} ({})",
        style(&record.id).bold(),
        style(status_label(&record.status)).cyan()
    );
    print_questions(&record);
    print_feedback(&record);
    Ok(())
}

pub async fn stats(settings: &Settings) -> Result<()> {
    let api = app::require_authed_api(settings)?;
    let stats = api.statistics().await?;
    println!("Interviews recorded: {}", stats.total_interviews);
    println!("Questions answered:  {}", stats.total_questions_answered);
    println!(
        "Average answer:      {:.0}s",
        stats.average_duration_seconds
    );
    if let Some(competency) = stats.most_practiced_competency {
        println!("Most practiced:      {competency}");
    }
    Ok(())
}

pub fn status_label(status: &InterviewStatus) -> &str {
    match status {
        InterviewStatus::Created => "created",
        InterviewStatus::QuestionsReady => "questions ready",
        InterviewStatus::Uploaded => "uploaded",
        InterviewStatus::Processing => "processing",
        InterviewStatus::Complete => "complete",
        InterviewStatus::Failed => "failed",
        InterviewStatus::Other(other) => other,
    }
}

pub fn print_questions(record: &InterviewRecord) {
    if record.questions.is_empty() {
        return;
    }
    println!("\nQuestions:");
    let mut questions = record.questions.clone();
    questions.sort_by_key(|q| q.order);
    for question in questions {
        if question.competency.is_empty() {
            println!("  {}. {}", question.order + 1, question.prompt);
        } else {
            println!(
                "  {}. {} {}",
                question.order + 1,
                question.prompt,
                style(format!("[{}]", question.competency)).dim()
            );
        }
    }
}

pub fn print_feedback(record: &InterviewRecord) {
    let Some(feedback) = record.ai_feedback.as_ref() else {
        return;
    };
    println!("\n{}", style("Feedback").bold());
    if let Some(summary) = feedback.get("summary").and_then(|v| v.as_str()) {
        println!("  {summary}");
    }
    for (key, heading) in [("strengths", "Strengths"), ("weaknesses", "Improvements")] {
        if let Some(items) = feedback.get(key).and_then(|v| v.as_array()) {
            println!("  {}:", style(heading).bold());
            for item in items.iter().filter_map(|v| v.as_str()) {
                println!("    - {item}");
            }
        }
    }
    if let Some(transcript) = record.transcript_text.as_deref() {
        if !transcript.is_empty() {
            println!("\n{}", style("Transcript").bold());
            println!("  {transcript}");
        }
    }
}
