use std::sync::Arc;

use cadence_core::{
    occurrence, recurrence, Activity, ActivityPatch, ActivityStatus, ActivityStore, Client,
    ClientDirectory, NewActivity, StoreError, User, UserDirectory,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    celebration::{CelebrationSink, LogCelebration},
    edit::{self, EditForm, EditWarning},
    error::{CalendarError, Result},
    view::{build_grid, CalendarWindow, DayCell, GridFilter, ViewMode},
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SaveOutcome {
    pub activity: Activity,
    pub warnings: Vec<EditWarning>,
    pub celebrated: bool,
}

/// Result of clicking an occurrence's status badge.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum StatusChange {
    Template {
        status: ActivityStatus,
        celebrated: bool,
    },
    Occurrence {
        date: NaiveDate,
        completed: bool,
    },
}

/// Owns the visible window and the last-known activity list, and routes user actions to
/// the store. Local state changes only after the store call succeeds.
pub struct CalendarController {
    store: Arc<dyn ActivityStore>,
    client_directory: Option<Arc<dyn ClientDirectory>>,
    user_directory: Option<Arc<dyn UserDirectory>>,
    celebration: Box<dyn CelebrationSink>,
    window: CalendarWindow,
    filter: GridFilter,
    activities: Vec<Activity>,
    clients: Vec<Client>,
    users: Vec<User>,
}

pub struct CalendarControllerBuilder {
    store: Arc<dyn ActivityStore>,
    client_directory: Option<Arc<dyn ClientDirectory>>,
    user_directory: Option<Arc<dyn UserDirectory>>,
    celebration: Option<Box<dyn CelebrationSink>>,
    window: Option<CalendarWindow>,
    filter: GridFilter,
}

impl CalendarControllerBuilder {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self {
            store,
            client_directory: None,
            user_directory: None,
            celebration: None,
            window: None,
            filter: GridFilter::default(),
        }
    }

    pub fn with_client_directory(mut self, directory: Arc<dyn ClientDirectory>) -> Self {
        self.client_directory = Some(directory);
        self
    }

    pub fn with_user_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.user_directory = Some(directory);
        self
    }

    pub fn with_celebration_sink(mut self, sink: Box<dyn CelebrationSink>) -> Self {
        self.celebration = Some(sink);
        self
    }

    pub fn with_window(mut self, window: CalendarWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_filter(mut self, filter: GridFilter) -> Self {
        self.filter = filter;
        self
    }

    pub async fn build(self) -> Result<CalendarController> {
        let window = self
            .window
            .unwrap_or_else(|| CalendarWindow::new(ViewMode::Week, Utc::now().date_naive()));
        let mut controller = CalendarController {
            store: self.store,
            client_directory: self.client_directory,
            user_directory: self.user_directory,
            celebration: self
                .celebration
                .unwrap_or_else(|| Box::new(LogCelebration)),
            window,
            filter: self.filter,
            activities: Vec::new(),
            clients: Vec::new(),
            users: Vec::new(),
        };
        controller.refresh().await?;
        Ok(controller)
    }
}

impl CalendarController {
    pub fn builder(store: Arc<dyn ActivityStore>) -> CalendarControllerBuilder {
        CalendarControllerBuilder::new(store)
    }

    /// Replaces the cached activities, clients and users with a fresh fetch.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<()> {
        let activities = self
            .store
            .list()
            .await
            .map_err(|err| log_failure("list", "*", err))?;
        let clients = match &self.client_directory {
            Some(directory) => Some(
                directory
                    .list_clients()
                    .await
                    .map_err(|err| log_failure("list_clients", "*", err))?,
            ),
            None => None,
        };
        let users = match &self.user_directory {
            Some(directory) => Some(
                directory
                    .list_users()
                    .await
                    .map_err(|err| log_failure("list_users", "*", err))?,
            ),
            None => None,
        };

        // Nothing is replaced until every fetch has succeeded.
        self.activities = activities;
        if let Some(clients) = clients {
            self.clients = clients;
        }
        if let Some(users) = users {
            self.users = users;
        }
        info!(
            activities = self.activities.len(),
            clients = self.clients.len(),
            users = self.users.len(),
            "calendar refreshed"
        );
        Ok(())
    }

    pub fn window(&self) -> CalendarWindow {
        self.window
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.window.set_mode(mode);
    }

    pub fn next(&mut self) {
        self.window.next();
    }

    pub fn prev(&mut self) {
        self.window.prev();
    }

    pub fn go_to(&mut self, date: NaiveDate) {
        self.window.go_to(date);
    }

    pub fn filter(&self) -> &GridFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: GridFilter) {
        self.filter = filter;
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|activity| activity.id == id)
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn client(&self, id: &str) -> Option<&Client> {
        self.clients.iter().find(|client| client.id == id)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    pub fn grid(&self, today: NaiveDate) -> Vec<DayCell> {
        build_grid(
            &self.window,
            &self.activities,
            &self.clients,
            &self.filter,
            today,
        )
    }

    pub fn open_edit(&self, activity_id: &str) -> Result<EditForm> {
        Ok(EditForm::from_activity(self.cached(activity_id)?))
    }

    #[instrument(skip(self, form), fields(activity_id = %form.activity_id))]
    pub async fn save_edit(&mut self, form: EditForm, today: NaiveDate) -> Result<SaveOutcome> {
        let original = self.cached(&form.activity_id)?.clone();
        let resolved = edit::resolve(&form, &original, today);
        for warning in &resolved.warnings {
            if let EditWarning::StatusChangeRefused { requested, kept } = warning {
                warn!(
                    requested = requested.as_str(),
                    kept = kept.as_str(),
                    %today,
                    "status change refused: not a scheduled weekday"
                );
            }
        }

        self.store
            .update(&original.id, resolved.patch.clone())
            .await
            .map_err(|err| log_failure("update", &original.id, err))?;
        let updated = self.apply_local(&original.id, &resolved.patch)?;

        let celebrated = !original.is_completed() && resolved.status == ActivityStatus::Completed;
        if celebrated {
            self.celebration.celebrate(&updated);
        }
        info!(status = updated.status.as_str(), celebrated, "activity saved");
        Ok(SaveOutcome {
            activity: updated,
            warnings: resolved.warnings,
            celebrated,
        })
    }

    /// Moves a single event to `date`. Recurring templates never move; returns whether
    /// anything changed.
    #[instrument(skip(self))]
    pub async fn drop_on_day(&mut self, activity_id: &str, date: NaiveDate) -> Result<bool> {
        let activity = self.cached(activity_id)?;
        if activity.is_recurring {
            debug!("ignoring drop of recurring template");
            return Ok(false);
        }
        if activity.date == date {
            return Ok(false);
        }

        let patch = ActivityPatch::date(date);
        self.store
            .update(activity_id, patch.clone())
            .await
            .map_err(|err| log_failure("update", activity_id, err))?;
        self.apply_local(activity_id, &patch)?;
        info!(%date, "activity rescheduled");
        Ok(true)
    }

    /// Advances status for single events, or toggles the occurrence on `date` for
    /// recurring ones. `None` when the template has no occurrence on that day.
    #[instrument(skip(self))]
    pub async fn cycle_status(
        &mut self,
        activity_id: &str,
        date: NaiveDate,
    ) -> Result<Option<StatusChange>> {
        let activity = self.cached(activity_id)?.clone();
        if !occurrence::occurs_on(&activity, date) {
            return Ok(None);
        }

        let series = if activity.is_recurring {
            activity.recurrence()
        } else {
            None
        };

        if let Some(mut meta) = series {
            let completed = meta.toggle_completed(date);
            let patch = ActivityPatch::default()
                .with_description(recurrence::embed(&activity.description, Some(&meta)));
            self.store
                .update(activity_id, patch.clone())
                .await
                .map_err(|err| log_failure("update", activity_id, err))?;
            self.apply_local(activity_id, &patch)?;
            info!(%date, completed, "occurrence toggled");
            return Ok(Some(StatusChange::Occurrence { date, completed }));
        }

        let status = activity.status.next();
        self.store
            .set_status(activity_id, status)
            .await
            .map_err(|err| log_failure("set_status", activity_id, err))?;
        let updated = self.apply_local(
            activity_id,
            &ActivityPatch {
                status: Some(status),
                ..ActivityPatch::default()
            },
        )?;
        let celebrated = status == ActivityStatus::Completed;
        if celebrated {
            self.celebration.celebrate(&updated);
        }
        info!(status = status.as_str(), "status cycled");
        Ok(Some(StatusChange::Template { status, celebrated }))
    }

    #[instrument(skip(self, new_activity), fields(title = %new_activity.title))]
    pub async fn create(&mut self, new_activity: NewActivity) -> Result<Activity> {
        let created = self
            .store
            .create(new_activity)
            .await
            .map_err(|err| log_failure("create", "new", err))?;
        info!(activity_id = %created.id, recurring = created.is_recurring, "activity created");
        self.activities.push(created.clone());
        Ok(created)
    }

    fn cached(&self, activity_id: &str) -> Result<&Activity> {
        self.activity(activity_id)
            .ok_or_else(|| CalendarError::UnknownActivity(activity_id.to_string()))
    }

    fn apply_local(&mut self, activity_id: &str, patch: &ActivityPatch) -> Result<Activity> {
        let activity = self
            .activities
            .iter_mut()
            .find(|activity| activity.id == activity_id)
            .ok_or_else(|| CalendarError::UnknownActivity(activity_id.to_string()))?;
        activity.apply(patch, Utc::now());
        Ok(activity.clone())
    }
}

fn log_failure(operation: &'static str, activity_id: &str, err: StoreError) -> CalendarError {
    error!(operation, activity_id, %err, "activity store request failed");
    CalendarError::Store(err)
}
