//! Calendar write tool — books an event from a natural-language request.

use crate::time_expr::{FuzzyTimeParser, TimeExpressionParser};
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use parley_core::calendar::{CalendarBackend, NewEvent};
use parley_core::error::ToolError;
use parley_core::tool::{ParamKind, ParamSpec, ParameterSchema, Tool};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};

/// Wall-clock format the calendar receives, without offset.
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub const DEFAULT_TIME_ZONE: &str = "America/Los_Angeles";

/// Where "now" comes from when resolving relative expressions.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    /// The host's local time.
    Local,
    /// A pinned instant, for tests and replays.
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Self::Local => chrono::Local::now().naive_local(),
            Self::Fixed(at) => *at,
        }
    }
}

pub struct AddCalendarEventTool {
    calendar: Arc<dyn CalendarBackend>,
    parser: Arc<dyn TimeExpressionParser>,
    clock: Clock,
    time_zone: String,
    duration: Duration,
}

impl AddCalendarEventTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        Self {
            calendar,
            parser: Arc::new(FuzzyTimeParser::new()),
            clock: Clock::Local,
            time_zone: DEFAULT_TIME_ZONE.into(),
            duration: Duration::hours(1),
        }
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn TimeExpressionParser>) -> Self {
        self.parser = parser;
        self
    }

    fn string_arg<'a>(&self, arguments: &'a Map<String, Value>, name: &str) -> Result<&'a str, ToolError> {
        arguments
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_arguments(self.name(), format!("'{name}' must be a string")))
    }
}

#[async_trait]
impl Tool for AddCalendarEventTool {
    fn name(&self) -> &str {
        "add_calendar_event"
    }

    fn description(&self) -> &str {
        "Add an event to the user's calendar. The start time is read from the user's \
         own words (e.g. \"tomorrow at 3pm\"); events last one hour."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            ParamSpec::required("summary", ParamKind::String, "Short title of the event"),
            ParamSpec::required("description", ParamKind::String, "Longer description of the event"),
            ParamSpec::required(
                "user_query",
                ParamKind::String,
                "The user's original request, including when the event happens",
            ),
        ])
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let summary = self.string_arg(&arguments, "summary")?;
        let description = self.string_arg(&arguments, "description")?;
        let user_query = self.string_arg(&arguments, "user_query")?;

        let start = self
            .parser
            .parse(user_query, self.clock.now())
            .map_err(|e| {
                ToolError::execution(
                    self.name(),
                    format!("Unable to parse date and time from the query ({e})"),
                )
            })?;
        let end = start + self.duration;

        let event = NewEvent {
            summary: summary.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            start: start.format(EVENT_TIME_FORMAT).to_string(),
            end: end.format(EVENT_TIME_FORMAT).to_string(),
            time_zone: self.time_zone.clone(),
        };
        debug!(start = %event.start, end = %event.end, tz = %event.time_zone, "Resolved event time");

        let created = self
            .calendar
            .insert(event)
            .await
            .map_err(|e| ToolError::execution(self.name(), e.to_string()))?;

        info!(event_id = %created.id, "Calendar event created");
        Ok(json!({ "id": created.id, "html_link": created.html_link }))
    }
}
