use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::event::{Event, EventDraft, EventPatch};

/// Owned event collection, kept in ascending timestamp order. All mutation
/// goes through [`Timeline::add`], [`Timeline::edit`] and
/// [`Timeline::delete`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    events: Vec<Event>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(mut events: Vec<Event>) -> Self {
        sort_events(&mut events);
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    #[tracing::instrument(skip(self, draft, now), fields(event_type = %draft.event_type))]
    pub fn add(&mut self, draft: EventDraft, now: DateTime<Utc>) -> String {
        let mut event = Event::from_draft(draft, now);
        while self.get(&event.id).is_some() {
            event.id = Uuid::new_v4().to_string();
        }
        let id = event.id.clone();
        self.events.push(event);
        sort_events(&mut self.events);
        info!(id = %id, count = self.events.len(), "event added");
        id
    }

    #[tracing::instrument(skip(self, patch))]
    pub fn edit(&mut self, id: &str, patch: EventPatch) -> Option<&Event> {
        let Some(event) = self.events.iter_mut().find(|event| event.id == id) else {
            debug!("edit target not found");
            return None;
        };
        event.apply_patch(patch);
        sort_events(&mut self.events);
        info!("event edited");
        self.get(id)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> Option<Event> {
        let Some(idx) = self.events.iter().position(|event| event.id == id) else {
            debug!("delete target not found; leaving timeline unchanged");
            return None;
        };
        let removed = self.events.remove(idx);
        info!(count = self.events.len(), "event deleted");
        Some(removed)
    }

    /// Adds events whose ids are not present yet, keeping their timestamps.
    /// Returns how many were added.
    #[tracing::instrument(skip_all, fields(incoming = incoming.len()))]
    pub fn merge(&mut self, incoming: Vec<Event>) -> usize {
        let mut added = 0;
        for event in incoming {
            if self.get(&event.id).is_none() {
                self.events.push(event);
                added += 1;
            }
        }
        if added > 0 {
            sort_events(&mut self.events);
        }
        info!(added, count = self.events.len(), "merged events");
        added
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve_id(&self, needle: &str) -> anyhow::Result<&Event> {
        let needle = needle.trim();
        if needle.is_empty() {
            return Err(anyhow!("event id cannot be empty"));
        }
        if let Some(exact) = self.get(needle) {
            return Ok(exact);
        }

        let mut matches = self.events.iter().filter(|event| event.id.starts_with(needle));
        let first = matches
            .next()
            .ok_or_else(|| anyhow!("no event matches id {needle}"))?;
        if matches.next().is_some() {
            return Err(anyhow!("id prefix {needle} is ambiguous; use more characters"));
        }
        Ok(first)
    }
}

// Stable, so events sharing a timestamp keep their insertion order.
fn sort_events(events: &mut [Event]) {
    events.sort_by_key(|event| event.timestamp);
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::event::{Attachment, EventType};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0)
            .single()
            .expect("valid now")
    }

    fn is_sorted(timeline: &Timeline) -> bool {
        timeline
            .events()
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }

    #[test]
    fn add_with_title_only_leaves_optional_fields_empty() {
        let mut timeline = Timeline::new();
        let id = timeline.add(EventDraft::new(EventType::Note, "A"), now());

        let event = timeline.get(&id).expect("stored");
        assert_eq!(event.title, "A");
        assert_eq!(event.timestamp, now());
        assert!(event.description.is_none());
        assert!(event.image_url.is_none());
        assert!(event.attachment.is_none());
    }

    #[test]
    fn add_then_delete_restores_collection() {
        let mut timeline = Timeline::new();
        timeline.add(EventDraft::new(EventType::Note, "keep"), now());
        let before = timeline.clone();

        let mut draft = EventDraft::new(EventType::Todo, "temp");
        draft.description = Some("scratch".to_string());
        draft.attachment = Some(Attachment {
            name: "notes.pdf".to_string(),
        });
        let id = timeline.add(draft, now() + Duration::minutes(1));
        assert_eq!(timeline.len(), 2);

        let removed = timeline.delete(&id).expect("removed");
        assert_eq!(removed.title, "temp");
        assert_eq!(timeline, before);
    }

    #[test]
    fn merge_skips_known_ids_and_keeps_order() {
        let mut local = Timeline::new();
        let kept = local.add(EventDraft::new(EventType::Note, "local"), now());

        let mut remote = Timeline::new();
        remote.add(EventDraft::new(EventType::Todo, "remote"), now() - Duration::hours(1));
        let mut incoming = remote.into_events();
        incoming.push(local.get(&kept).cloned().expect("local event"));

        assert_eq!(local.merge(incoming), 1);
        assert_eq!(local.len(), 2);
        assert_eq!(local.events()[0].title, "remote");
        assert!(is_sorted(&local));
    }

    #[test]
    fn delete_of_missing_id_is_a_no_op() {
        let mut timeline = Timeline::new();
        timeline.add(EventDraft::new(EventType::Note, "only"), now());
        let before = timeline.clone();

        assert!(timeline.delete("missing").is_none());
        assert_eq!(timeline, before);
    }

    #[test]
    fn stays_sorted_across_mixed_operations() {
        let base = now();
        let mut timeline = Timeline::from_events(vec![]);
        let late = timeline.add(EventDraft::new(EventType::Note, "late"), base + Duration::hours(3));
        let early = timeline.add(EventDraft::new(EventType::Todo, "early"), base);
        let mid = timeline.add(
            EventDraft::new(EventType::Schedule, "mid"),
            base + Duration::hours(1),
        );
        assert!(is_sorted(&timeline));
        assert_eq!(timeline.events()[0].id, early);
        assert_eq!(timeline.events()[2].id, late);

        timeline.edit(
            &mid,
            EventPatch {
                title: Some("middle".to_string()),
                ..EventPatch::default()
            },
        );
        assert!(is_sorted(&timeline));
        timeline.delete(&early);
        assert!(is_sorted(&timeline));
        assert_eq!(timeline.events()[0].title, "middle");
    }

    #[test]
    fn edit_does_not_move_timestamp() {
        let mut timeline = Timeline::new();
        let id = timeline.add(EventDraft::new(EventType::Note, "draft"), now());

        let edited = timeline
            .edit(
                &id,
                EventPatch {
                    event_type: Some(EventType::Todo),
                    image_url: Some(Some("https://example.com/a.png".to_string())),
                    ..EventPatch::default()
                },
            )
            .expect("edited")
            .clone();
        assert_eq!(edited.timestamp, now());
        assert_eq!(edited.event_type, EventType::Todo);
        assert!(edited.has_image());

        assert!(timeline.edit("missing", EventPatch::default()).is_none());
    }

    #[test]
    fn resolves_unique_prefix() {
        let mut timeline = Timeline::new();
        let id = timeline.add(EventDraft::new(EventType::Note, "one"), now());

        let found = timeline.resolve_id(&id[..6]).expect("prefix resolves");
        assert_eq!(found.id, id);
        assert!(timeline.resolve_id("zzzz").is_err());
    }
}
