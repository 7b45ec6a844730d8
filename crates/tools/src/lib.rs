//! Built-in tool implementations for Parley.
//!
//! Tools give the agent the ability to act: do arithmetic, read the
//! user's calendar, and book new events from natural-language requests.

pub mod add_calendar_event;
pub mod calendar_events;
pub mod multiply;
pub mod time_expr;

pub use add_calendar_event::{AddCalendarEventTool, Clock};
pub use calendar_events::GetCalendarEventsTool;
pub use multiply::MultiplyTool;
pub use time_expr::{FuzzyTimeParser, TimeExpressionParser, TimeParseError};

use parley_core::calendar::CalendarBackend;
use parley_core::error::RegistryError;
use parley_core::tool::ToolRegistry;
use std::sync::Arc;

/// Create the default tool registry: `multiply`, `get_calendar_events`
/// and `add_calendar_event`, the latter booking in `time_zone`.
pub fn default_registry(
    calendar: Arc<dyn CalendarBackend>,
    time_zone: &str,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(MultiplyTool))?;
    registry.register(Box::new(GetCalendarEventsTool::new(calendar.clone())))?;
    registry.register(Box::new(
        AddCalendarEventTool::new(calendar).with_time_zone(time_zone),
    ))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_calendar::InMemoryCalendar;

    #[test]
    fn default_registry_has_all_tools() {
        let registry =
            default_registry(Arc::new(InMemoryCalendar::new()), "America/Los_Angeles").unwrap();
        assert_eq!(
            registry.names(),
            vec!["add_calendar_event", "get_calendar_events", "multiply"]
        );
        assert_eq!(registry.definitions().len(), 3);
    }
}
