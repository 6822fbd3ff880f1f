use cadence_core::{
    recurrence::{self, weekday_index},
    Activity, ActivityPatch, ActivityStatus, ClientId, RecurrenceMetadata, RecurrenceType, UserId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Editable copy of a template as shown in the edit dialog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditForm {
    pub activity_id: String,
    pub title: String,
    /// Description without the recurrence tag.
    pub description: String,
    pub client_id: ClientId,
    pub assignee_id: UserId,
    pub viewer_ids: Vec<UserId>,
    pub date: NaiveDate,
    pub estimated_minutes: Option<u32>,
    pub actual_minutes: Option<u32>,
    pub status: ActivityStatus,
    pub recurrence: Option<RecurrenceMetadata>,
}

impl EditForm {
    pub fn from_activity(activity: &Activity) -> Self {
        let recurrence = if activity.is_recurring {
            activity.recurrence()
        } else {
            None
        };
        Self {
            activity_id: activity.id.clone(),
            title: activity.title.clone(),
            description: activity.display_description(),
            client_id: activity.client_id.clone(),
            assignee_id: activity.assignee_id.clone(),
            viewer_ids: activity.viewer_ids.clone(),
            date: activity.date,
            estimated_minutes: activity.estimated_minutes,
            actual_minutes: activity.actual_minutes,
            status: activity.status,
            recurrence,
        }
    }

    /// Non-blocking problems to surface next to the form.
    pub fn warnings(&self) -> Vec<EditWarning> {
        let mut warnings = Vec::new();
        if self.viewer_ids.is_empty() {
            warnings.push(EditWarning::NoViewersSelected);
        }
        warnings
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EditWarning {
    NoViewersSelected,
    /// A weekly series can only change status on one of its scheduled weekdays.
    StatusChangeRefused {
        requested: ActivityStatus,
        kept: ActivityStatus,
    },
    CompletionMarksPruned(usize),
}

/// Whether a template-level status change is allowed `today`. Only weekly series are
/// restricted: `today` must fall on one of their weekdays.
pub fn status_change_allowed(
    recurrence: Option<&RecurrenceMetadata>,
    anchor: NaiveDate,
    today: NaiveDate,
) -> bool {
    match recurrence {
        Some(meta) if meta.kind == RecurrenceType::Weekly => meta
            .effective_week_days(anchor)
            .contains(&weekday_index(today)),
        _ => true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedEdit {
    pub patch: ActivityPatch,
    pub status: ActivityStatus,
    pub warnings: Vec<EditWarning>,
}

/// Turns a submitted form into the patch to persist, applying the save-time rules.
pub(crate) fn resolve(form: &EditForm, original: &Activity, today: NaiveDate) -> ResolvedEdit {
    let mut warnings = form.warnings();

    let mut recurrence = form.recurrence.clone();
    if let Some(meta) = recurrence.as_mut() {
        let pruned = meta.prune_completed(form.date);
        if pruned > 0 {
            warnings.push(EditWarning::CompletionMarksPruned(pruned));
        }
    }

    let mut status = form.status;
    if status != original.status
        && !status_change_allowed(recurrence.as_ref(), form.date, today)
    {
        warnings.push(EditWarning::StatusChangeRefused {
            requested: status,
            kept: original.status,
        });
        status = original.status;
    }

    let description = recurrence::embed(&form.description, recurrence.as_ref());
    let patch = ActivityPatch {
        title: Some(form.title.trim().to_string()),
        client_id: Some(form.client_id.clone()),
        assignee_id: Some(form.assignee_id.clone()),
        viewer_ids: Some(form.viewer_ids.clone()),
        date: Some(form.date),
        estimated_minutes: Some(form.estimated_minutes),
        actual_minutes: Some(form.actual_minutes),
        status: Some(status),
        ..ActivityPatch::default()
    }
    .with_description(description);

    ResolvedEdit {
        patch,
        status,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::NewActivity;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekly_wednesday() -> Activity {
        NewActivity::new("Payroll", "c1", "u1", date(2024, 1, 3))
            .with_description("Run payroll")
            .with_viewers(["u2".to_string()])
            .with_recurrence(RecurrenceMetadata::weekly(date(2024, 2, 28), [3]))
            .into_activity("a1".into(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn form_is_seeded_from_template() {
        let activity = weekly_wednesday();
        let form = EditForm::from_activity(&activity);
        assert_eq!(form.description, "Run payroll");
        assert_eq!(form.recurrence, activity.recurrence());
        assert!(form.warnings().is_empty());
    }

    #[test]
    fn weekly_status_change_refused_off_schedule() {
        let activity = weekly_wednesday();
        let mut form = EditForm::from_activity(&activity);
        form.status = ActivityStatus::Completed;

        // 2024-01-09 is a Tuesday.
        let resolved = resolve(&form, &activity, date(2024, 1, 9));
        assert_eq!(resolved.status, ActivityStatus::Pending);
        assert_eq!(resolved.patch.status, Some(ActivityStatus::Pending));
        assert!(resolved.warnings.contains(&EditWarning::StatusChangeRefused {
            requested: ActivityStatus::Completed,
            kept: ActivityStatus::Pending,
        }));

        let resolved = resolve(&form, &activity, date(2024, 1, 10));
        assert_eq!(resolved.status, ActivityStatus::Completed);
    }

    #[test]
    fn daily_and_single_templates_are_unrestricted() {
        assert!(status_change_allowed(None, date(2024, 1, 3), date(2024, 1, 9)));
        let daily = RecurrenceMetadata::daily(date(2024, 1, 31)).with_include_weekends(false);
        assert!(status_change_allowed(Some(&daily), date(2024, 1, 3), date(2024, 1, 6)));
    }

    #[test]
    fn empty_viewer_set_warns_but_still_saves() {
        let activity = weekly_wednesday();
        let mut form = EditForm::from_activity(&activity);
        form.viewer_ids.clear();
        form.title = "Payroll run ".into();

        let resolved = resolve(&form, &activity, date(2024, 1, 10));
        assert!(resolved.warnings.contains(&EditWarning::NoViewersSelected));
        assert_eq!(resolved.patch.title.as_deref(), Some("Payroll run"));
        assert_eq!(resolved.patch.viewer_ids, Some(Vec::new()));
    }

    #[test]
    fn shortening_the_series_prunes_completion_marks() {
        let mut activity = weekly_wednesday();
        let mut meta = activity.recurrence().unwrap();
        meta.toggle_completed(date(2024, 1, 10));
        meta.toggle_completed(date(2024, 2, 7));
        activity.description = recurrence::embed(&activity.description, Some(&meta));

        let mut form = EditForm::from_activity(&activity);
        if let Some(meta) = form.recurrence.as_mut() {
            meta.end_date = Some(date(2024, 1, 31));
        }
        let resolved = resolve(&form, &activity, date(2024, 1, 10));
        assert!(resolved
            .warnings
            .contains(&EditWarning::CompletionMarksPruned(1)));

        let saved = recurrence::decode(resolved.patch.description.as_deref().unwrap()).unwrap();
        assert_eq!(saved.completed_dates.len(), 1);
        assert!(saved.is_completed_on(date(2024, 1, 10)));
    }

    #[test]
    fn dropping_recurrence_clears_the_cache_flags() {
        let activity = weekly_wednesday();
        let mut form = EditForm::from_activity(&activity);
        form.recurrence = None;
        let resolved = resolve(&form, &activity, date(2024, 1, 10));
        assert_eq!(resolved.patch.description.as_deref(), Some("Run payroll"));
        assert_eq!(resolved.patch.is_recurring, Some(false));
        assert_eq!(resolved.patch.recurrence_type, Some(None));
    }
}
