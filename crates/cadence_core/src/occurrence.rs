use chrono::{Duration, NaiveDate};

use crate::activity::{Activity, Occurrence};
use crate::recurrence::{is_weekend, weekday_index, RecurrenceMetadata, RecurrenceType};

/// Whether `activity` produces an occurrence on `date`.
pub fn occurs_on(activity: &Activity, date: NaiveDate) -> bool {
    match recurring_shape(activity) {
        Some(meta) => occurs_in_series(activity.date, &meta, date),
        None => activity.date == date,
    }
}

/// Completion of the occurrence on `date`. Recurring templates track each day separately;
/// single events use the template's own status.
pub fn is_occurrence_completed(activity: &Activity, date: NaiveDate) -> bool {
    match recurring_shape(activity) {
        Some(meta) => meta.is_completed_on(date),
        None => activity.is_completed(),
    }
}

pub fn occurrence_for(activity: &Activity, date: NaiveDate) -> Option<Occurrence> {
    let shape = recurring_shape(activity);
    let (occurs, completed) = match &shape {
        Some(meta) => (
            occurs_in_series(activity.date, meta, date),
            meta.is_completed_on(date),
        ),
        None => (activity.date == date, activity.is_completed()),
    };
    occurs.then(|| Occurrence {
        activity_id: activity.id.clone(),
        date,
        completed,
        recurring: shape.is_some(),
    })
}

/// All occurrences in the inclusive range `[start, end]`, clipped to the template's window.
pub fn occurrences_between(activity: &Activity, start: NaiveDate, end: NaiveDate) -> Vec<Occurrence> {
    let Some(meta) = recurring_shape(activity) else {
        return occurrence_for(activity, activity.date)
            .filter(|occurrence| occurrence.date >= start && occurrence.date <= end)
            .into_iter()
            .collect();
    };

    let first = start.max(activity.date);
    let last = end.min(meta.effective_end(activity.date));
    let mut out = Vec::new();
    let mut day = first;
    while day <= last {
        if occurs_in_series(activity.date, &meta, day) {
            out.push(Occurrence {
                activity_id: activity.id.clone(),
                date: day,
                completed: meta.is_completed_on(day),
                recurring: true,
            });
        }
        let Some(next) = day.checked_add_signed(Duration::days(1)) else {
            break;
        };
        day = next;
    }
    out
}

/// Metadata for templates flagged recurring whose block decodes. A flagged template with a
/// missing or broken block behaves like a single event.
fn recurring_shape(activity: &Activity) -> Option<RecurrenceMetadata> {
    if !activity.is_recurring {
        return None;
    }
    activity.recurrence()
}

fn occurs_in_series(anchor: NaiveDate, meta: &RecurrenceMetadata, date: NaiveDate) -> bool {
    if date < anchor || date > meta.effective_end(anchor) {
        return false;
    }
    match meta.kind {
        RecurrenceType::Daily => meta.includes_weekends() || !is_weekend(date),
        RecurrenceType::Weekly => meta
            .effective_week_days(anchor)
            .contains(&weekday_index(date)),
    }
}
