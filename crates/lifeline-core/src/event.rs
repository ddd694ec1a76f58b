use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Note,
    Todo,
    Schedule,
}

impl EventType {
    pub const ALL: [EventType; 3] = [EventType::Note, EventType::Todo, EventType::Schedule];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Note => "note",
            EventType::Todo => "todo",
            EventType::Schedule => "schedule",
        }
    }

    /// Display name shown in tables and the timeline.
    pub fn label(self) -> &'static str {
        match self {
            EventType::Note => "Note",
            EventType::Todo => "To-Do",
            EventType::Schedule => "Schedule",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "note" => Ok(EventType::Note),
            "todo" | "to-do" => Ok(EventType::Todo),
            "schedule" => Ok(EventType::Schedule),
            other => Err(anyhow!(
                "unknown event type: {other} (expected one of: {})",
                EventType::ALL.map(EventType::as_str).join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,

    pub timestamp: DateTime<Utc>,

    pub event_type: EventType,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

/// Caller-supplied fields for a new event. Id and timestamp are assigned by
/// the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub event_type: EventType,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub attachment: Option<Attachment>,
}

impl EventDraft {
    pub fn new(event_type: EventType, title: impl Into<String>) -> Self {
        Self {
            event_type,
            title: title.into(),
            description: None,
            image_url: None,
            attachment: None,
        }
    }
}

/// Replacement values for the mutable fields of an event. `None` leaves a
/// field alone; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub event_type: Option<EventType>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
    pub attachment: Option<Option<Attachment>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.event_type.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.attachment.is_none()
    }
}

impl Event {
    pub fn from_draft(draft: EventDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            event_type: draft.event_type,
            title: draft.title,
            description: draft.description,
            image_url: draft.image_url,
            attachment: draft.attachment,
        }
    }

    pub fn apply_patch(&mut self, patch: EventPatch) {
        if let Some(event_type) = patch.event_type {
            self.event_type = event_type;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(image_url) = patch.image_url {
            self.image_url = image_url;
        }
        if let Some(attachment) = patch.attachment {
            self.attachment = attachment;
        }
    }

    pub fn has_image(&self) -> bool {
        self.image_url.is_some()
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn serializes_with_camel_case_and_omits_absent_fields() {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
            .single()
            .expect("valid now");
        let event = Event::from_draft(EventDraft::new(EventType::Todo, "A"), now);

        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["eventType"], "todo");
        assert_eq!(value["timestamp"], "2024-01-01T10:00:00Z");
        assert!(value.get("description").is_none());
        assert!(value.get("imageUrl").is_none());
        assert!(value.get("attachment").is_none());
    }

    #[test]
    fn patch_keeps_id_and_timestamp() {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
            .single()
            .expect("valid now");
        let mut event = Event::from_draft(EventDraft::new(EventType::Note, "first"), now);
        let id = event.id.clone();

        event.apply_patch(EventPatch {
            event_type: Some(EventType::Schedule),
            title: Some("second".to_string()),
            description: Some(Some("details".to_string())),
            ..EventPatch::default()
        });

        assert_eq!(event.id, id);
        assert_eq!(event.timestamp, now);
        assert_eq!(event.event_type, EventType::Schedule);
        assert_eq!(event.title, "second");
        assert_eq!(event.description.as_deref(), Some("details"));
    }

    #[test]
    fn parses_event_type_case_insensitively() {
        assert_eq!("TODO".parse::<EventType>().expect("parse"), EventType::Todo);
        let err = "meeting".parse::<EventType>().expect_err("unknown type");
        assert!(err.to_string().contains("note, todo, schedule"));
    }
}
