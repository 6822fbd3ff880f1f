use std::collections::BTreeMap;

use cadence_core::{
    occurrence, Activity, ActivityStatus, Client, ClientId, Occurrence, UserId,
};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Month cells show this many entries before collapsing the rest into "+N more".
pub const MONTH_CELL_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Week,
    Month,
}

impl ViewMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "week" => Some(ViewMode::Week),
            "month" => Some(ViewMode::Month),
            _ => None,
        }
    }
}

/// The visible slice of the calendar: a mode plus the date it is centred on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarWindow {
    pub mode: ViewMode,
    pub anchor: NaiveDate,
}

impl CalendarWindow {
    pub fn new(mode: ViewMode, anchor: NaiveDate) -> Self {
        Self { mode, anchor }
    }

    /// Inclusive first and last day of the grid. Weeks start on Sunday.
    pub fn visible_range(&self) -> (NaiveDate, NaiveDate) {
        match self.mode {
            ViewMode::Week => {
                let start = start_of_week(self.anchor);
                (start, add_days(start, 6))
            }
            ViewMode::Month => {
                let first = self.anchor.with_day(1).unwrap_or(self.anchor);
                let last = last_day_of_month(first);
                let trailing = 6 - i64::from(last.weekday().num_days_from_sunday());
                (start_of_week(first), add_days(last, trailing))
            }
        }
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        let (start, end) = self.visible_range();
        let mut days = Vec::new();
        let mut day = start;
        while day <= end {
            days.push(day);
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        days
    }

    pub fn next(&mut self) {
        self.anchor = self.shifted(true);
    }

    pub fn prev(&mut self) {
        self.anchor = self.shifted(false);
    }

    pub fn go_to(&mut self, date: NaiveDate) {
        self.anchor = date;
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let (start, end) = self.visible_range();
        date >= start && date <= end
    }

    fn shifted(&self, forward: bool) -> NaiveDate {
        let shifted = match (self.mode, forward) {
            (ViewMode::Week, true) => self.anchor.checked_add_signed(Duration::weeks(1)),
            (ViewMode::Week, false) => self.anchor.checked_sub_signed(Duration::weeks(1)),
            (ViewMode::Month, true) => self.anchor.checked_add_months(Months::new(1)),
            (ViewMode::Month, false) => self.anchor.checked_sub_months(Months::new(1)),
        };
        shifted.unwrap_or(self.anchor)
    }
}

/// Access and client filters applied while building the grid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridFilter {
    pub viewer: Option<UserId>,
    pub client: Option<ClientId>,
}

impl GridFilter {
    pub fn for_viewer(viewer: impl Into<UserId>) -> Self {
        Self {
            viewer: Some(viewer.into()),
            client: None,
        }
    }

    pub fn admits(&self, activity: &Activity) -> bool {
        if let Some(viewer) = &self.viewer {
            if !activity.is_visible_to(viewer) {
                return false;
            }
        }
        if let Some(client) = &self.client {
            if &activity.client_id != client {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CalendarEntry {
    pub occurrence: Occurrence,
    pub title: String,
    pub status: ActivityStatus,
    pub client_name: Option<String>,
    pub color_index: u8,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_anchor_month: bool,
    pub is_today: bool,
    pub entries: Vec<CalendarEntry>,
    pub hidden_count: usize,
}

impl DayCell {
    pub fn overflow_label(&self) -> Option<String> {
        (self.hidden_count > 0).then(|| format!("+{} more", self.hidden_count))
    }
}

/// Materialises every visible occurrence in `window`, one cell per day.
pub fn build_grid(
    window: &CalendarWindow,
    activities: &[Activity],
    clients: &[Client],
    filter: &GridFilter,
    today: NaiveDate,
) -> Vec<DayCell> {
    let (start, end) = window.visible_range();
    let mut by_day: BTreeMap<NaiveDate, Vec<CalendarEntry>> = BTreeMap::new();

    for activity in activities.iter().filter(|activity| filter.admits(activity)) {
        let client = clients.iter().find(|client| client.id == activity.client_id);
        for occurrence in occurrence::occurrences_between(activity, start, end) {
            by_day
                .entry(occurrence.date)
                .or_default()
                .push(CalendarEntry {
                    occurrence,
                    title: activity.title.clone(),
                    status: activity.status,
                    client_name: client.map(|client| client.name.clone()),
                    color_index: client.map(|client| client.color_index).unwrap_or(0),
                });
        }
    }

    window
        .days()
        .into_iter()
        .map(|date| {
            let mut entries = by_day.remove(&date).unwrap_or_default();
            entries.sort_by(|a, b| {
                a.occurrence
                    .completed
                    .cmp(&b.occurrence.completed)
                    .then_with(|| a.title.cmp(&b.title))
                    .then_with(|| a.occurrence.activity_id.cmp(&b.occurrence.activity_id))
            });
            let mut hidden_count = 0;
            if window.mode == ViewMode::Month && entries.len() > MONTH_CELL_LIMIT {
                hidden_count = entries.len() - MONTH_CELL_LIMIT;
                entries.truncate(MONTH_CELL_LIMIT);
            }
            DayCell {
                date,
                in_anchor_month: date.month() == window.anchor.month()
                    && date.year() == window.anchor.year(),
                is_today: date == today,
                entries,
                hidden_count,
            }
        })
        .collect()
}

/// Sunday on or before `date`, clamped to the first representable day.
fn start_of_week(date: NaiveDate) -> NaiveDate {
    let back = Duration::days(i64::from(date.weekday().num_days_from_sunday()));
    date.checked_sub_signed(back).unwrap_or(NaiveDate::MIN)
}

fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days))
        .unwrap_or(NaiveDate::MAX)
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{NewActivity, RecurrenceMetadata};
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn activity(title: &str, anchor: NaiveDate) -> NewActivity {
        NewActivity::new(title, "c1", "u1", anchor)
    }

    fn stored(id: &str, new: NewActivity) -> Activity {
        new.into_activity(id.into(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn week_range_starts_on_sunday() {
        let window = CalendarWindow::new(ViewMode::Week, date(2024, 1, 3));
        assert_eq!(window.visible_range(), (date(2023, 12, 31), date(2024, 1, 6)));
        assert_eq!(window.days().len(), 7);
    }

    #[test]
    fn month_grid_covers_whole_weeks() {
        let window = CalendarWindow::new(ViewMode::Month, date(2024, 2, 14));
        // February 2024 starts on Thursday and ends on Thursday the 29th.
        assert_eq!(window.visible_range(), (date(2024, 1, 28), date(2024, 3, 2)));
        assert_eq!(window.days().len() % 7, 0);
    }

    #[test]
    fn navigation_keeps_mode_and_clamps_month_end() {
        let mut window = CalendarWindow::new(ViewMode::Month, date(2024, 1, 31));
        window.next();
        assert_eq!(window.anchor, date(2024, 2, 29));
        assert_eq!(window.mode, ViewMode::Month);
        window.prev();
        assert_eq!(window.anchor, date(2024, 1, 29));

        let mut week = CalendarWindow::new(ViewMode::Week, date(2024, 1, 3));
        week.next();
        assert_eq!(week.anchor, date(2024, 1, 10));
        week.prev();
        week.prev();
        assert_eq!(week.anchor, date(2023, 12, 27));
        assert_eq!(week.mode, ViewMode::Week);
    }

    #[test]
    fn ranges_clamp_at_the_ends_of_the_calendar() {
        for mode in [ViewMode::Week, ViewMode::Month] {
            let late = CalendarWindow::new(mode, NaiveDate::MAX);
            let (start, end) = late.visible_range();
            assert!(start <= NaiveDate::MAX);
            assert_eq!(end, NaiveDate::MAX);
            assert!(!late.days().is_empty());

            let early = CalendarWindow::new(mode, NaiveDate::MIN);
            let (start, end) = early.visible_range();
            assert_eq!(start, NaiveDate::MIN);
            assert!(end >= NaiveDate::MIN);
            assert!(early.contains(NaiveDate::MIN));
        }

        let activities = vec![stored("a1", activity("Far future", NaiveDate::MAX))];
        let window = CalendarWindow::new(ViewMode::Week, NaiveDate::MAX);
        let grid = build_grid(&window, &activities, &[], &GridFilter::default(), NaiveDate::MAX);
        assert!(!grid.is_empty());
    }

    #[test]
    fn month_cells_collapse_after_three_entries() {
        let anchor = date(2024, 1, 10);
        let activities: Vec<Activity> = (0..5)
            .map(|i| stored(&format!("a{i}"), activity(&format!("Task {i}"), anchor)))
            .collect();
        let window = CalendarWindow::new(ViewMode::Month, anchor);
        let grid = build_grid(&window, &activities, &[], &GridFilter::default(), anchor);
        let cell = grid.iter().find(|cell| cell.date == anchor).unwrap();
        assert_eq!(cell.entries.len(), MONTH_CELL_LIMIT);
        assert_eq!(cell.hidden_count, 2);
        assert_eq!(cell.overflow_label().as_deref(), Some("+2 more"));
        assert!(cell.is_today);

        let week = CalendarWindow::new(ViewMode::Week, anchor);
        let grid = build_grid(&week, &activities, &[], &GridFilter::default(), anchor);
        let cell = grid.iter().find(|cell| cell.date == anchor).unwrap();
        assert_eq!(cell.entries.len(), 5);
        assert_eq!(cell.hidden_count, 0);
    }

    #[test]
    fn grid_respects_viewer_and_client_filters() {
        let anchor = date(2024, 1, 10);
        let shared = stored(
            "a1",
            activity("Shared", anchor).with_viewers(["u2".to_string()]),
        );
        let mut other_client = stored("a2", activity("Other client", anchor));
        other_client.client_id = "c2".into();
        let activities = vec![shared, other_client];
        let window = CalendarWindow::new(ViewMode::Week, anchor);

        let grid = build_grid(&window, &activities, &[], &GridFilter::for_viewer("u2"), anchor);
        let titles: Vec<&str> = grid
            .iter()
            .flat_map(|cell| cell.entries.iter().map(|entry| entry.title.as_str()))
            .collect();
        assert_eq!(titles, vec!["Shared"]);

        let filter = GridFilter {
            viewer: None,
            client: Some("c2".into()),
        };
        let grid = build_grid(&window, &activities, &[], &filter, anchor);
        let titles: Vec<&str> = grid
            .iter()
            .flat_map(|cell| cell.entries.iter().map(|entry| entry.title.as_str()))
            .collect();
        assert_eq!(titles, vec!["Other client"]);
    }

    #[test]
    fn recurring_series_fill_the_grid_with_client_colors() {
        let anchor = date(2024, 1, 1);
        let series = stored(
            "a1",
            activity("Standup", anchor)
                .with_recurrence(RecurrenceMetadata::weekly(date(2024, 1, 31), [1, 3, 5])),
        );
        let clients = vec![Client {
            id: "c1".into(),
            name: "Acme".into(),
            color_index: 4,
            active: true,
        }];
        let window = CalendarWindow::new(ViewMode::Week, date(2024, 1, 3));
        let grid = build_grid(&window, &[series], &clients, &GridFilter::default(), anchor);
        let days: Vec<NaiveDate> = grid
            .iter()
            .filter(|cell| !cell.entries.is_empty())
            .map(|cell| cell.date)
            .collect();
        assert_eq!(days, vec![date(2024, 1, 1), date(2024, 1, 3), date(2024, 1, 5)]);
        let entry = &grid[1].entries[0];
        assert_eq!(entry.client_name.as_deref(), Some("Acme"));
        assert_eq!(entry.color_index, 4);
    }
}
