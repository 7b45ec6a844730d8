//! `parley calendar` — Direct access to the configured calendar backend.

use parley_config::AppConfig;
use parley_core::calendar::{CalendarBackend, CalendarEvent};
use std::sync::Arc;

fn backend() -> Result<Arc<dyn CalendarBackend>, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(parley_calendar::build_from_config(&config.calendar)?)
}

pub async fn list(max: u32) -> Result<(), Box<dyn std::error::Error>> {
    let calendar = backend()?;
    let events = calendar.list_upcoming(max).await?;
    print_events(&events, "No upcoming events.");
    Ok(())
}

pub async fn search(
    query: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let calendar = backend()?;
    let events = calendar.search(query, from, to).await?;
    print_events(&events, &format!("No events match \"{query}\"."));
    Ok(())
}

pub async fn delete(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let calendar = backend()?;
    calendar.delete(id).await?;
    println!("  Deleted event {id}");
    Ok(())
}

fn print_events(events: &[CalendarEvent], empty: &str) {
    if events.is_empty() {
        println!("  {empty}");
        return;
    }
    for line in events.iter().map(format_event) {
        println!("{line}");
    }
}

fn format_event(event: &CalendarEvent) -> String {
    let mut line = format!("  {:<26} {}  [{}]", event.start, event.summary, event.id);
    if let Some(link) = &event.html_link {
        line.push_str(&format!("\n  {:<26} {link}", ""));
    }
    line
}
