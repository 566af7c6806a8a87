//! Calendar integration contract.
//!
//! The engine treats the calendar as an opaque, potentially-failing remote
//! collaborator. It never stores credentials itself — the agent's stored
//! integration config is passed through on every call.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalendarError;

/// Stored configuration of an agent's calendar integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub enabled: bool,

    pub calendar_id: String,

    /// Opaque credential blob owned by the integration layer.
    #[serde(default)]
    pub credentials: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// One busy/free slot on a day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub busy: bool,
}

/// A calendar event to create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub start: DateTime<Utc>,

    pub end: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendee_email: Option<String>,
}

/// A created calendar event, as reported back by the integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,

    pub start: DateTime<Utc>,

    pub end: DateTime<Utc>,
}

/// The calendar collaborator consumed by the scheduling tools.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Busy/free slot info for one date.
    async fn list_available_slots(
        &self,
        config: &CalendarConfig,
        date: NaiveDate,
    ) -> std::result::Result<Vec<TimeSlot>, CalendarError>;

    /// Create an event and report it back.
    async fn create_event(
        &self,
        config: &CalendarConfig,
        draft: EventDraft,
    ) -> std::result::Result<CreatedEvent, CalendarError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_disabled() {
        let config: CalendarConfig =
            serde_json::from_str(r#"{"calendar_id":"primary"}"#).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.calendar_id, "primary");
    }

    #[test]
    fn event_draft_optional_fields() {
        let json = r#"{
            "summary": "Demo",
            "start": "2026-08-10T15:00:00Z",
            "end": "2026-08-10T15:30:00Z"
        }"#;
        let draft: EventDraft = serde_json::from_str(json).unwrap();
        assert!(draft.description.is_none());
        assert!(draft.attendee_email.is_none());
        assert_eq!(draft.summary, "Demo");
    }
}
