use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{
    recurrence, Activity, ActivityStatus, Client, ClientId, MemoryStore, NewActivity,
    RecurrenceMetadata, User, UserId,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info};

/// Startup data for the in-memory store.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub activities: Vec<SeedActivity>,
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub users: Vec<User>,
}

/// One template as written in a seed file. The recurrence may be given either as a
/// `recurrence` object or already embedded in the description.
#[derive(Debug, Deserialize)]
pub struct SeedActivity {
    #[serde(default)]
    pub id: Option<String>,
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
    pub recurrence: Option<RecurrenceMetadata>,
}

impl SeedActivity {
    fn into_activity(self, fallback_id: String, now: DateTime<Utc>) -> Activity {
        let recurrence = self
            .recurrence
            .or_else(|| recurrence::decode(&self.description));
        let mut new_activity =
            NewActivity::new(self.title, self.client_id, self.assignee_id, self.date)
                .with_description(self.description)
                .with_viewers(self.viewer_ids);
        new_activity.estimated_minutes = self.estimated_minutes;
        if let Some(meta) = recurrence {
            new_activity = new_activity.with_recurrence(meta);
        }

        let mut activity = new_activity.into_activity(self.id.unwrap_or(fallback_id), now);
        activity.actual_minutes = self.actual_minutes;
        activity.set_status(self.status, now);
        activity
    }
}

impl Seed {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        let seed: Seed = serde_json::from_str(&text)
            .with_context(|| format!("parsing seed file {}", path.display()))?;
        info!(
            path = %path.display(),
            activities = seed.activities.len(),
            clients = seed.clients.len(),
            users = seed.users.len(),
            "seed loaded"
        );
        Ok(seed)
    }

    /// Small built-in data set around `anchor`, used when no seed file is configured.
    pub fn demo(anchor: NaiveDate) -> Self {
        let activity = |id: &str, title: &str, client: &str, assignee: &str| SeedActivity {
            id: Some(id.to_string()),
            title: title.to_string(),
            description: String::new(),
            client_id: client.to_string(),
            assignee_id: assignee.to_string(),
            viewer_ids: Vec::new(),
            date: anchor,
            estimated_minutes: None,
            actual_minutes: None,
            status: ActivityStatus::Pending,
            recurrence: None,
        };

        let mut standup = activity("demo-standup", "Standup", "acme", "ana");
        standup.viewer_ids = vec!["ben".to_string()];
        standup.estimated_minutes = Some(15);
        standup.recurrence = Some(RecurrenceMetadata::weekly(days_after(anchor, 60), [1, 3, 5]));

        let mut inventory = activity("demo-inventory", "Inventory check", "globex", "ben");
        inventory.description = "Count the shelves".to_string();
        inventory.recurrence = Some(
            RecurrenceMetadata::daily(days_after(anchor, 14)).with_include_weekends(false),
        );

        let mut audit = activity("demo-audit", "Quarterly audit", "acme", "ben");
        audit.date = days_after(anchor, 2);
        audit.estimated_minutes = Some(120);

        let mut invoice = activity("demo-invoice", "Send invoices", "globex", "ana");
        invoice.status = ActivityStatus::Completed;

        Self {
            activities: vec![standup, inventory, audit, invoice],
            clients: vec![
                Client {
                    id: "acme".into(),
                    name: "Acme".into(),
                    color_index: 1,
                    active: true,
                },
                Client {
                    id: "globex".into(),
                    name: "Globex".into(),
                    color_index: 4,
                    active: true,
                },
            ],
            users: vec![
                User {
                    id: "ana".into(),
                    name: "Ana".into(),
                },
                User {
                    id: "ben".into(),
                    name: "Ben".into(),
                },
            ],
        }
    }

    pub fn into_store(self, now: DateTime<Utc>) -> MemoryStore {
        let activities: Vec<Activity> = self
            .activities
            .into_iter()
            .enumerate()
            .map(|(index, seed)| seed.into_activity(format!("seed-{}", index + 1), now))
            .collect();
        debug!(count = activities.len(), "seeding memory store");
        MemoryStore::with_seed(activities, self.clients, self.users)
    }
}

fn days_after(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days))
        .unwrap_or(NaiveDate::MAX)
}
