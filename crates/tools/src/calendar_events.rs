//! Calendar read tool — lists the user's upcoming events.

use async_trait::async_trait;
use parley_core::calendar::CalendarBackend;
use parley_core::error::ToolError;
use parley_core::tool::{ParamKind, ParamSpec, ParameterSchema, Tool};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::debug;

/// Largest page the calendar API serves.
pub const MAX_RESULTS_LIMIT: i64 = 2500;

pub struct GetCalendarEventsTool {
    calendar: Arc<dyn CalendarBackend>,
}

impl GetCalendarEventsTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for GetCalendarEventsTool {
    fn name(&self) -> &str {
        "get_calendar_events"
    }

    fn description(&self) -> &str {
        "Get the user's upcoming calendar events, soonest first."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![ParamSpec::required(
            "maxResult",
            ParamKind::Integer,
            "How many upcoming events to return (1-2500)",
        )])
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let max = arguments
            .get("maxResult")
            .and_then(Value::as_i64)
            .ok_or_else(|| ToolError::invalid_arguments(self.name(), "'maxResult' must be an integer"))?;

        if !(1..=MAX_RESULTS_LIMIT).contains(&max) {
            return Err(ToolError::invalid_arguments(
                self.name(),
                format!("'maxResult' must be between 1 and {MAX_RESULTS_LIMIT}, got {max}"),
            ));
        }

        let events = self
            .calendar
            .list_upcoming(max as u32)
            .await
            .map_err(|e| ToolError::execution(self.name(), e.to_string()))?;

        debug!(backend = self.calendar.name(), count = events.len(), "Fetched upcoming events");

        Ok(Value::Array(
            events
                .into_iter()
                .map(|e| json!({ "start_time": e.start, "event": e.summary }))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_calendar::InMemoryCalendar;
    use parley_core::calendar::CalendarEvent;
    use parley_core::error::CalendarError;

    fn event(id: &str, summary: &str, start: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            summary: summary.into(),
            description: None,
            start: start.into(),
            end: None,
            html_link: None,
        }
    }

    fn args(max: i64) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("maxResult".into(), json!(max));
        map
    }

    #[tokio::test]
    async fn lists_events_in_start_order() {
        let calendar = Arc::new(InMemoryCalendar::with_events(vec![
            event("b", "Lunch", "2026-10-17T12:00:00-07:00"),
            event("a", "Standup", "2026-10-16T09:00:00-07:00"),
            event("c", "Holiday", "2026-10-18"),
        ]));
        let tool = GetCalendarEventsTool::new(calendar);

        let output = tool.execute(args(10)).await.unwrap();
        assert_eq!(
            output,
            json!([
                {"start_time": "2026-10-16T09:00:00-07:00", "event": "Standup"},
                {"start_time": "2026-10-17T12:00:00-07:00", "event": "Lunch"},
                {"start_time": "2026-10-18", "event": "Holiday"},
            ])
        );
    }

    #[tokio::test]
    async fn empty_calendar_is_empty_list() {
        let tool = GetCalendarEventsTool::new(Arc::new(InMemoryCalendar::new()));
        assert_eq!(tool.execute(args(5)).await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn out_of_range_max_is_rejected() {
        let tool = GetCalendarEventsTool::new(Arc::new(InMemoryCalendar::new()));
        for bad in [0, -3, 2501] {
            let err = tool.execute(args(bad)).await.unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments { .. }), "{bad}");
        }
    }

    #[tokio::test]
    async fn backend_failure_is_execution_error() {
        let calendar = Arc::new(InMemoryCalendar::new());
        calendar
            .fail_with(Some(CalendarError::AuthenticationFailed("expired".into())))
            .await;
        let tool = GetCalendarEventsTool::new(calendar);

        let err = tool.execute(args(10)).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("expired"));
    }
}
