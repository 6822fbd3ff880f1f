use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;

use crate::activity::{
    Activity, ActivityId, ActivityPatch, ActivityStatus, Client, NewActivity, User,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("activity `{0}` not found")]
    NotFound(ActivityId),
    #[error("store rejected the request: {0}")]
    Rejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Remote table holding activity templates.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<Activity>>;
    async fn create(&self, fields: NewActivity) -> StoreResult<Activity>;
    async fn update(&self, id: &str, patch: ActivityPatch) -> StoreResult<()>;
    async fn set_status(&self, id: &str, status: ActivityStatus) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn list_clients(&self) -> StoreResult<Vec<Client>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self) -> StoreResult<Vec<User>>;
}

/// Process-local store used by the demo binary and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    activities: RwLock<BTreeMap<ActivityId, Activity>>,
    clients: RwLock<Vec<Client>>,
    users: RwLock<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(activities: Vec<Activity>, clients: Vec<Client>, users: Vec<User>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.activities.write();
            for activity in activities {
                guard.insert(activity.id.clone(), activity);
            }
        }
        *store.clients.write() = clients;
        *store.users.write() = users;
        store
    }

    pub fn get(&self, id: &str) -> Option<Activity> {
        self.activities.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.activities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.read().is_empty()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Activity>> {
        Ok(self.activities.read().values().cloned().collect())
    }

    async fn create(&self, fields: NewActivity) -> StoreResult<Activity> {
        if fields.title.trim().is_empty() {
            return Err(StoreError::Rejected("title must not be empty".into()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        let activity = fields.into_activity(id.clone(), Utc::now());
        self.activities.write().insert(id, activity.clone());
        Ok(activity)
    }

    async fn update(&self, id: &str, patch: ActivityPatch) -> StoreResult<()> {
        let mut guard = self.activities.write();
        let activity = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        activity.apply(&patch, Utc::now());
        Ok(())
    }

    async fn set_status(&self, id: &str, status: ActivityStatus) -> StoreResult<()> {
        let mut guard = self.activities.write();
        let activity = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        activity.set_status(status, Utc::now());
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.activities
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl ClientDirectory for MemoryStore {
    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        Ok(self.clients.read().clone())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.read().clone())
    }
}
