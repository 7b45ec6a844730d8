//! Calendar backends for Parley.
//!
//! All backends implement `parley_core::CalendarBackend`:
//! - `google` — Google Calendar v3 over REST
//! - `in_memory` — process-local, for tests and offline use

pub mod google;
pub mod in_memory;

pub use google::GoogleCalendar;
pub use in_memory::InMemoryCalendar;

use parley_config::CalendarConfig;
use parley_core::calendar::CalendarBackend;
use parley_core::error::CalendarError;
use std::sync::Arc;

/// Create the calendar backend selected by configuration.
pub fn build_from_config(config: &CalendarConfig) -> Result<Arc<dyn CalendarBackend>, CalendarError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryCalendar::new())),
        "google" => {
            let token = config.access_token.clone().ok_or_else(|| {
                CalendarError::NotConfigured(
                    "no access token; set calendar.access_token or PARLEY_CALENDAR_TOKEN".into(),
                )
            })?;
            let mut calendar = GoogleCalendar::new(token).with_calendar_id(&config.calendar_id);
            if let Some(url) = &config.api_url {
                calendar = calendar.with_base_url(url);
            }
            Ok(Arc::new(calendar))
        }
        other => Err(CalendarError::NotConfigured(format!(
            "unknown calendar backend '{other}'"
        ))),
    }
}
