use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cadence_calendar::{CalendarController, CalendarWindow, GridFilter, ViewMode};
use cadence_timer::{format_elapsed, TimerEngine};
use chrono::{Local, NaiveDate, Utc};
use tracing::{info, warn};

use crate::render::render_grid;
use crate::seed::Seed;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) seed_path: Option<PathBuf>,
    pub(crate) view: ViewMode,
    pub(crate) anchor: Option<NaiveDate>,
    pub(crate) viewer: Option<String>,
    pub(crate) timer_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("CADENCE_SEED") {
            if !path.trim().is_empty() {
                config.seed_path = Some(PathBuf::from(path.trim()));
            }
        }
        if let Some(view) = lookup("CADENCE_VIEW") {
            match ViewMode::parse(&view) {
                Some(mode) => config.view = mode,
                None => warn!(value = %view, "ignoring unknown CADENCE_VIEW"),
            }
        }
        if let Some(anchor) = lookup("CADENCE_ANCHOR") {
            match NaiveDate::parse_from_str(anchor.trim(), "%Y-%m-%d") {
                Ok(date) => config.anchor = Some(date),
                Err(err) => warn!(value = %anchor, %err, "ignoring invalid CADENCE_ANCHOR"),
            }
        }
        if let Some(viewer) = lookup("CADENCE_VIEWER") {
            if !viewer.trim().is_empty() {
                config.viewer = Some(viewer.trim().to_string());
            }
        }
        if let Some(seconds) = lookup("CADENCE_TIMER_SECONDS") {
            match seconds.trim().parse::<u64>() {
                Ok(value) => config.timer_seconds = value,
                Err(err) => warn!(value = %seconds, %err, "ignoring invalid CADENCE_TIMER_SECONDS"),
            }
        }
        config
    }

    pub fn anchor_or(&self, today: NaiveDate) -> NaiveDate {
        self.anchor.unwrap_or(today)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            seed_path: None,
            view: ViewMode::Week,
            anchor: None,
            viewer: None,
            timer_seconds: 3,
        }
    }
}

pub async fn run(config: AppConfig) -> Result<()> {
    let today = Local::now().date_naive();
    let report = session(&config, today).await?;
    print!("{report}");
    Ok(())
}

/// Loads the store, renders the configured window and, if enabled, times the first
/// visible activity. Returns the text to show.
pub(crate) async fn session(config: &AppConfig, today: NaiveDate) -> Result<String> {
    let anchor = config.anchor_or(today);
    let seed = match &config.seed_path {
        Some(path) => Seed::load(path)?,
        None => {
            info!(%anchor, "no seed configured, using demo data");
            Seed::demo(anchor)
        }
    };
    let store = Arc::new(seed.into_store(Utc::now()));

    let filter = GridFilter {
        viewer: config.viewer.clone(),
        client: None,
    };
    let controller = CalendarController::builder(store.clone())
        .with_client_directory(store.clone())
        .with_user_directory(store)
        .with_window(CalendarWindow::new(config.view, anchor))
        .with_filter(filter)
        .build()
        .await
        .context("loading calendar")?;

    let cells = controller.grid(today);
    let mut out = render_grid(&controller.window(), &cells);

    if config.timer_seconds == 0 {
        return Ok(out);
    }
    let Some(entry) = cells
        .iter()
        .filter(|cell| cell.date >= anchor)
        .flat_map(|cell| cell.entries.iter())
        .find(|entry| !entry.occurrence.completed)
    else {
        return Ok(out);
    };

    let engine = TimerEngine::current().context("starting timer engine")?;
    let activity_id = entry.occurrence.activity_id.clone();
    engine.start(&activity_id);
    info!(%activity_id, seconds = config.timer_seconds, "timing activity");
    tokio::time::sleep(Duration::from_secs(config.timer_seconds) + Duration::from_millis(100))
        .await;
    engine.pause(&activity_id);
    for snapshot in engine.snapshot() {
        let _ = writeln!(
            out,
            "timer {} ({}): {}",
            entry.title,
            snapshot.activity_id,
            format_elapsed(snapshot.seconds)
        );
    }
    engine.shutdown();
    Ok(out)
}
