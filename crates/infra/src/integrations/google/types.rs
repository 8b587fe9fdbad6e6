//! Google Calendar and OAuth wire types

use std::collections::HashMap;

use calsync_domain::{EventPayload, ItemKey, ItemKind, RemoteEvent};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Private extended-property keys written on every engine-created event.
pub(crate) const PROP_APP_SOURCE: &str = "appSource";
pub(crate) const PROP_TYPE: &str = "type";
pub(crate) const PROP_ID: &str = "id";

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEventBody<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: GoogleDateTime,
    end: GoogleDateTime,
    color_id: &'a str,
    extended_properties: GoogleExtendedProperties,
}

/// Either `dateTime` for timed events or `date` for all-day ones.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    time_zone: String,
}

#[derive(Debug, Serialize)]
struct GoogleExtendedProperties {
    private: HashMap<&'static str, String>,
}

impl<'a> From<&'a EventPayload> for GoogleEventBody<'a> {
    fn from(event: &'a EventPayload) -> Self {
        let private = HashMap::from([
            (PROP_APP_SOURCE, event.app_source().to_string()),
            (PROP_TYPE, event.source.kind.as_str().to_string()),
            (PROP_ID, event.source.local_id.to_string()),
        ]);

        let (start, end) = if event.all_day {
            // Google treats the end date as exclusive.
            let last_day = event.end.max(event.start) + chrono::Duration::days(1);
            (date(event.start, &event.time_zone), date(last_day, &event.time_zone))
        } else {
            (date_time(event.start, &event.time_zone), date_time(event.end, &event.time_zone))
        };

        Self {
            summary: &event.summary,
            description: event.description.as_deref(),
            start,
            end,
            color_id: &event.color_id,
            extended_properties: GoogleExtendedProperties { private },
        }
    }
}

fn date_time(at: DateTime<Utc>, time_zone: &str) -> GoogleDateTime {
    GoogleDateTime {
        date_time: Some(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        date: None,
        time_zone: time_zone.to_string(),
    }
}

fn date(at: DateTime<Utc>, time_zone: &str) -> GoogleDateTime {
    GoogleDateTime {
        date_time: None,
        date: Some(at.date_naive().format("%Y-%m-%d").to_string()),
        time_zone: time_zone.to_string(),
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleCreatedEvent {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEventsResponse {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEvent {
    id: String,
    summary: Option<String>,
    start: Option<GoogleEventTime>,
    end: Option<GoogleEventTime>,
    extended_properties: Option<GoogleExtendedPropertiesIn>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleExtendedPropertiesIn {
    #[serde(default)]
    private: HashMap<String, String>,
}

impl From<GoogleEvent> for RemoteEvent {
    fn from(event: GoogleEvent) -> Self {
        let private = event.extended_properties.map(|props| props.private).unwrap_or_default();

        let local_ref = match (private.get(PROP_TYPE), private.get(PROP_ID)) {
            (Some(kind), Some(id)) => match (kind.parse::<ItemKind>(), id.parse::<i64>()) {
                (Ok(kind), Ok(local_id)) => Some(ItemKey::new(local_id, kind)),
                _ => None,
            },
            _ => None,
        };

        Self {
            id: event.id,
            summary: event.summary,
            start: event.start.and_then(|t| t.date_time.or(t.date)),
            end: event.end.and_then(|t| t.date_time.or(t.date)),
            app_source: private.get(PROP_APP_SOURCE).cloned(),
            local_ref,
        }
    }
}

/// `{"error": {"code", "message", "errors": [{"reason"}]}}`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct GoogleErrorEnvelope {
    #[serde(default)]
    pub error: GoogleErrorBody,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GoogleErrorBody {
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<GoogleErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GoogleErrorDetail {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct GoogleTokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

/// RFC 6749 error response of the token and revoke endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OAuthErrorResponse {
    #[serde(default)]
    pub error: String,
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use calsync_domain::SyncableItem;
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn event_body_carries_markers_and_zone() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();
        let item = SyncableItem::new(42, ItemKind::Task, "Write report", start, end, 7)
            .with_description("Task: Write report");
        let payload = EventPayload::for_item(&item, "Europe/Berlin");

        let body = serde_json::to_value(GoogleEventBody::from(&payload)).unwrap();

        assert_eq!(body["summary"], "Write report");
        assert_eq!(body["colorId"], "8");
        assert_eq!(
            body["start"],
            json!({"dateTime": "2024-01-01T10:00:00Z", "timeZone": "Europe/Berlin"})
        );
        assert_eq!(body["end"]["dateTime"], "2024-01-01T11:00:00Z");
        assert_eq!(
            body["extendedProperties"]["private"],
            json!({"appSource": "calsync", "type": "task", "id": "42"})
        );
    }

    #[test]
    fn all_day_body_uses_dates_with_exclusive_end() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap();
        let item = SyncableItem::new(5, ItemKind::Assignment, "Essay", start, end, 7).as_all_day();
        let payload = EventPayload::for_item(&item, "UTC");

        let body = serde_json::to_value(GoogleEventBody::from(&payload)).unwrap();

        assert_eq!(body["start"], json!({"date": "2024-02-01", "timeZone": "UTC"}));
        assert_eq!(body["end"], json!({"date": "2024-02-04", "timeZone": "UTC"}));
    }

    #[test]
    fn listed_event_recovers_local_reference() {
        let event: GoogleEvent = serde_json::from_value(json!({
            "id": "evt-1",
            "summary": "Essay",
            "start": {"date": "2024-03-01"},
            "end": {"dateTime": "2024-03-01T17:00:00Z"},
            "extendedProperties": {"private": {"appSource": "calsync", "type": "assignment", "id": "3"}}
        }))
        .unwrap();

        let remote = RemoteEvent::from(event);
        assert_eq!(remote.start.as_deref(), Some("2024-03-01"));
        assert_eq!(remote.app_source.as_deref(), Some("calsync"));
        assert_eq!(remote.local_ref, Some(ItemKey::new(3, ItemKind::Assignment)));
    }

    #[test]
    fn foreign_event_has_no_reference() {
        let event: GoogleEvent = serde_json::from_value(json!({"id": "evt-2"})).unwrap();
        let remote = RemoteEvent::from(event);
        assert!(remote.app_source.is_none());
        assert!(remote.local_ref.is_none());
    }
}
