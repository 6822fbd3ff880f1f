//! Recurrence metadata and its text encoding.
//!
//! The activity store has no column for recurrence, so the block is kept inside the
//! description as `<recurrence>{json}</recurrence>`. Everything outside this module works
//! with [`RecurrenceMetadata`] and never touches the raw tag.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const OPEN_TAG: &str = "<recurrence>";
const CLOSE_TAG: &str = "</recurrence>";

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<recurrence>(.*?)</recurrence>").expect("recurrence tag pattern compiles")
});

static STRIP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\n?<recurrence>.*?</recurrence>").expect("recurrence strip pattern compiles")
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    Daily,
    Weekly,
}

impl RecurrenceType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(RecurrenceType::Daily),
            "weekly" => Some(RecurrenceType::Weekly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::Daily => "daily",
            RecurrenceType::Weekly => "weekly",
        }
    }
}

/// Shape of a recurring series. Weekday indexes run 0 = Sunday through 6 = Saturday.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceMetadata {
    #[serde(rename = "type")]
    pub kind: RecurrenceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub week_days: BTreeSet<u8>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub completed_dates: BTreeSet<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_weekends: Option<bool>,
}

impl RecurrenceMetadata {
    pub fn daily(end_date: NaiveDate) -> Self {
        Self {
            kind: RecurrenceType::Daily,
            end_date: Some(end_date),
            week_days: BTreeSet::new(),
            completed_dates: BTreeSet::new(),
            include_weekends: None,
        }
    }

    pub fn weekly(end_date: NaiveDate, week_days: impl IntoIterator<Item = u8>) -> Self {
        Self {
            kind: RecurrenceType::Weekly,
            end_date: Some(end_date),
            week_days: week_days.into_iter().filter(|day| *day <= 6).collect(),
            completed_dates: BTreeSet::new(),
            include_weekends: None,
        }
    }

    pub fn with_include_weekends(mut self, include: bool) -> Self {
        self.include_weekends = Some(include);
        self
    }

    /// Last day of the series. Without an end date the series collapses onto its anchor.
    pub fn effective_end(&self, anchor: NaiveDate) -> NaiveDate {
        self.end_date.unwrap_or(anchor)
    }

    pub fn effective_week_days(&self, anchor: NaiveDate) -> BTreeSet<u8> {
        if self.week_days.is_empty() {
            BTreeSet::from([weekday_index(anchor)])
        } else {
            self.week_days.clone()
        }
    }

    pub fn includes_weekends(&self) -> bool {
        self.include_weekends.unwrap_or(true)
    }

    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.completed_dates.contains(&date)
    }

    /// Flips completion for one occurrence and returns the new state.
    pub fn toggle_completed(&mut self, date: NaiveDate) -> bool {
        if self.completed_dates.remove(&date) {
            false
        } else {
            self.completed_dates.insert(date);
            true
        }
    }

    /// Drops completion marks that fall outside `[anchor, effective_end]`.
    pub fn prune_completed(&mut self, anchor: NaiveDate) -> usize {
        let end = self.effective_end(anchor);
        let before = self.completed_dates.len();
        self.completed_dates
            .retain(|date| *date >= anchor && *date <= end);
        before - self.completed_dates.len()
    }
}

pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(weekday_index(date), 0 | 6)
}

/// Serialises metadata into the delimited tag. Unset fields are omitted, never null.
pub fn encode(metadata: &RecurrenceMetadata) -> String {
    match serde_json::to_string(metadata) {
        Ok(json) => format!("{OPEN_TAG}{json}{CLOSE_TAG}"),
        Err(err) => {
            tracing::warn!(%err, "failed to serialise recurrence metadata");
            String::new()
        }
    }
}

/// Reads the first recurrence tag in `description`. Anything malformed reads as "not recurring".
pub fn decode(description: &str) -> Option<RecurrenceMetadata> {
    let captures = TAG_PATTERN.captures(description)?;
    let payload = captures.get(1)?.as_str();
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(%err, "ignoring malformed recurrence block");
            return None;
        }
    };
    let object = value.as_object()?;

    let Some(kind) = object
        .get("type")
        .and_then(Value::as_str)
        .and_then(RecurrenceType::parse)
    else {
        tracing::debug!(kind = ?object.get("type"), "ignoring recurrence block with unknown type");
        return None;
    };

    let end_date = object
        .get("endDate")
        .and_then(Value::as_str)
        .and_then(parse_date);

    let week_days = object
        .get("weekDays")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_u64)
                .filter(|day| *day <= 6)
                .map(|day| day as u8)
                .collect()
        })
        .unwrap_or_default();

    let completed_dates = object
        .get("completedDates")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .filter_map(parse_date)
                .collect()
        })
        .unwrap_or_default();

    let include_weekends = object.get("includeWeekends").and_then(Value::as_bool);

    Some(RecurrenceMetadata {
        kind,
        end_date,
        week_days,
        completed_dates,
        include_weekends,
    })
}

/// Description text with every recurrence tag (and the newline before it) removed.
pub fn strip_tag(description: &str) -> String {
    STRIP_PATTERN.replace_all(description, "").into_owned()
}

/// Rewrites `description` so it carries exactly `metadata`, or no tag at all.
pub fn embed(description: &str, metadata: Option<&RecurrenceMetadata>) -> String {
    let clean = strip_tag(description);
    match metadata {
        None => clean,
        Some(metadata) if clean.is_empty() => encode(metadata),
        Some(metadata) => format!("{clean}\n{}", encode(metadata)),
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    // Accept full timestamps too; only the calendar day matters.
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
