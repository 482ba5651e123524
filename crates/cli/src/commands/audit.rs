//! Audit journal command

use anyhow::{Context, Result};
use loyalty_persistence::{JournalFilter, JournalReader};
use std::path::Path;

use crate::EventTypeArg;

pub fn show_journal(
    journal_dir: &Path,
    subject: Option<String>,
    actor: Option<String>,
    date: Option<String>,
    types: Option<Vec<EventTypeArg>>,
) -> Result<()> {
    let reader = JournalReader::new(journal_dir);
    let events = match date.as_deref() {
        Some("today") => reader.read_date(&chrono::Utc::now().format("%Y-%m-%d").to_string()),
        Some(date) => reader.read_date(date),
        None => reader.read_all(),
    }
    .context("Failed to read journal")?;

    let mut filter = JournalFilter::new();
    if let Some(subject) = subject.as_deref() {
        filter = filter.subject(subject);
    }
    if let Some(actor) = actor.as_deref() {
        filter = filter.actor(actor);
    }
    if let Some(types) = types {
        filter = filter.event_types(types.iter().map(|t| t.to_core_type()).collect());
    }

    let events = filter.apply(events);
    println!("📋 Journal ({} events)", events.len());
    for event in &events {
        println!("   {}", event);
        if let Some(description) = &event.description {
            println!("      {}", description);
        }
    }
    Ok(())
}
