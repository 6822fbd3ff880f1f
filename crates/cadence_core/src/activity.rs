use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::recurrence::{self, RecurrenceMetadata, RecurrenceType};

pub type ActivityId = String;
pub type ClientId = String;
pub type UserId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    Pending,
    Doing,
    Completed,
}

impl ActivityStatus {
    /// Status reached by one click on the status badge.
    pub fn next(self) -> Self {
        match self {
            ActivityStatus::Pending => ActivityStatus::Doing,
            ActivityStatus::Doing => ActivityStatus::Completed,
            ActivityStatus::Completed => ActivityStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Pending => "pending",
            ActivityStatus::Doing => "doing",
            ActivityStatus::Completed => "completed",
        }
    }
}

/// Persisted scheduling template. May describe a single event or a recurring series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Activity {
    pub id: ActivityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub client_id: ClientId,
    pub assignee_id: UserId,
    #[serde(default)]
    pub viewer_ids: Vec<UserId>,
    pub date: NaiveDate,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
    #[serde(default)]
    pub actual_minutes: Option<u32>,
    #[serde(default)]
    pub status: ActivityStatus,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_type: Option<RecurrenceType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Activity {
    pub fn recurrence(&self) -> Option<RecurrenceMetadata> {
        recurrence::decode(&self.description)
    }

    pub fn display_description(&self) -> String {
        recurrence::strip_tag(&self.description)
    }

    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.assignee_id == user_id || self.viewer_ids.iter().any(|viewer| viewer == user_id)
    }

    pub fn is_completed(&self) -> bool {
        self.status == ActivityStatus::Completed
    }

    /// Applies a patch in place, stamping `updated_at` and the status timestamps.
    pub fn apply(&mut self, patch: &ActivityPatch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(client_id) = &patch.client_id {
            self.client_id = client_id.clone();
        }
        if let Some(assignee_id) = &patch.assignee_id {
            self.assignee_id = assignee_id.clone();
        }
        if let Some(viewer_ids) = &patch.viewer_ids {
            self.viewer_ids = dedup_ids(viewer_ids);
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(estimated) = patch.estimated_minutes {
            self.estimated_minutes = estimated;
        }
        if let Some(actual) = patch.actual_minutes {
            self.actual_minutes = actual;
        }
        if let Some(is_recurring) = patch.is_recurring {
            self.is_recurring = is_recurring;
        }
        if let Some(recurrence_type) = patch.recurrence_type {
            self.recurrence_type = recurrence_type;
        }
        if let Some(status) = patch.status {
            self.set_status(status, now);
        }
        self.updated_at = now;
    }

    pub fn set_status(&mut self, status: ActivityStatus, now: DateTime<Utc>) {
        if self.status == status {
            return;
        }
        match status {
            ActivityStatus::Doing if self.started_at.is_none() => self.started_at = Some(now),
            ActivityStatus::Completed => self.completed_at = Some(now),
            ActivityStatus::Pending => self.completed_at = None,
            _ => {}
        }
        self.status = status;
        self.updated_at = now;
    }
}

/// Fields supplied when creating a template. New templates always start `pending`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewActivity {
    pub title: String,
    pub description: String,
    pub client_id: ClientId,
    pub assignee_id: UserId,
    pub viewer_ids: Vec<UserId>,
    pub date: NaiveDate,
    pub estimated_minutes: Option<u32>,
    pub recurrence: Option<RecurrenceMetadata>,
}

impl NewActivity {
    pub fn new(
        title: impl Into<String>,
        client_id: impl Into<ClientId>,
        assignee_id: impl Into<UserId>,
        date: NaiveDate,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            client_id: client_id.into(),
            assignee_id: assignee_id.into(),
            viewer_ids: Vec::new(),
            date,
            estimated_minutes: None,
            recurrence: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_viewers(mut self, viewers: impl IntoIterator<Item = UserId>) -> Self {
        self.viewer_ids = viewers.into_iter().collect();
        self
    }

    pub fn with_recurrence(mut self, recurrence: RecurrenceMetadata) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    /// Builds the stored record, embedding the recurrence block into the description.
    pub fn into_activity(self, id: ActivityId, now: DateTime<Utc>) -> Activity {
        let description = recurrence::embed(&self.description, self.recurrence.as_ref());
        Activity {
            id,
            title: self.title,
            description,
            client_id: self.client_id,
            assignee_id: self.assignee_id,
            viewer_ids: dedup_ids(&self.viewer_ids),
            date: self.date,
            estimated_minutes: self.estimated_minutes,
            actual_minutes: None,
            status: ActivityStatus::Pending,
            is_recurring: self.recurrence.is_some(),
            recurrence_type: self.recurrence.as_ref().map(|meta| meta.kind),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Partial update. Doubly optional fields let a patch clear the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub client_id: Option<ClientId>,
    pub assignee_id: Option<UserId>,
    pub viewer_ids: Option<Vec<UserId>>,
    pub date: Option<NaiveDate>,
    pub estimated_minutes: Option<Option<u32>>,
    pub actual_minutes: Option<Option<u32>>,
    pub status: Option<ActivityStatus>,
    pub is_recurring: Option<bool>,
    pub recurrence_type: Option<Option<RecurrenceType>>,
}

impl ActivityPatch {
    pub fn date(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    /// Replaces the description and refreshes the denormalised recurrence flags from it.
    pub fn with_description(mut self, description: String) -> Self {
        let kind = recurrence::decode(&description).map(|meta| meta.kind);
        self.is_recurring = Some(kind.is_some());
        self.recurrence_type = Some(kind);
        self.description = Some(description);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    #[serde(default)]
    pub color_index: u8,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

/// Derived, never persisted: one template on one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Occurrence {
    pub activity_id: ActivityId,
    pub date: NaiveDate,
    pub completed: bool,
    pub recurring: bool,
}

fn default_active() -> bool {
    true
}

fn dedup_ids(ids: &[UserId]) -> Vec<UserId> {
    let mut out: Vec<UserId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn status_cycles_through_all_states() {
        let status = ActivityStatus::Pending;
        assert_eq!(status.next(), ActivityStatus::Doing);
        assert_eq!(status.next().next(), ActivityStatus::Completed);
        assert_eq!(status.next().next().next(), ActivityStatus::Pending);
    }

    #[test]
    fn new_activity_embeds_recurrence_and_caches_flags() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let meta = RecurrenceMetadata::weekly(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(), [1, 3]);
        let activity = NewActivity::new("Standup", "c1", "u1", date)
            .with_description("Daily sync")
            .with_viewers(["u2".to_string(), "u2".to_string()])
            .with_recurrence(meta.clone())
            .into_activity("a1".into(), now());

        assert!(activity.is_recurring);
        assert_eq!(activity.recurrence_type, Some(RecurrenceType::Weekly));
        assert_eq!(activity.recurrence(), Some(meta));
        assert_eq!(activity.display_description(), "Daily sync");
        assert_eq!(activity.viewer_ids, vec!["u2".to_string()]);
        assert_eq!(activity.status, ActivityStatus::Pending);
    }

    #[test]
    fn patch_with_description_tracks_recurrence_flags() {
        let patch = ActivityPatch::default().with_description("plain".to_string());
        assert_eq!(patch.is_recurring, Some(false));
        assert_eq!(patch.recurrence_type, Some(None));

        let tagged = recurrence::embed(
            "notes",
            Some(&RecurrenceMetadata::daily(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())),
        );
        let patch = ActivityPatch::default().with_description(tagged);
        assert_eq!(patch.is_recurring, Some(true));
        assert_eq!(patch.recurrence_type, Some(Some(RecurrenceType::Daily)));
    }

    #[test]
    fn apply_stamps_status_timestamps() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut activity = NewActivity::new("Audit", "c1", "u1", date).into_activity("a1".into(), now());
        let later = now() + chrono::Duration::hours(2);
        activity.apply(
            &ActivityPatch {
                status: Some(ActivityStatus::Completed),
                ..ActivityPatch::default()
            },
            later,
        );
        assert!(activity.is_completed());
        assert_eq!(activity.completed_at, Some(later));
        assert_eq!(activity.updated_at, later);
    }

    #[test]
    fn patch_can_clear_minute_fields() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut activity = NewActivity::new("Audit", "c1", "u1", date).into_activity("a1".into(), now());
        activity.estimated_minutes = Some(90);
        activity.actual_minutes = Some(45);

        activity.apply(&ActivityPatch::date(date), now());
        assert_eq!(activity.estimated_minutes, Some(90), "absent fields are left alone");

        activity.apply(
            &ActivityPatch {
                estimated_minutes: Some(None),
                actual_minutes: Some(Some(50)),
                ..ActivityPatch::default()
            },
            now(),
        );
        assert_eq!(activity.estimated_minutes, None);
        assert_eq!(activity.actual_minutes, Some(50));
    }

    #[test]
    fn visibility_covers_assignee_and_viewers() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let activity = NewActivity::new("Review", "c1", "u1", date)
            .with_viewers(["u2".to_string()])
            .into_activity("a1".into(), now());
        assert!(activity.is_visible_to("u1"));
        assert!(activity.is_visible_to("u2"));
        assert!(!activity.is_visible_to("u3"));
    }
}
