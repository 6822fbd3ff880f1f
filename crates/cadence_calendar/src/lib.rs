pub mod celebration;
pub mod controller;
pub mod edit;
pub mod error;
pub mod view;

pub use crate::celebration::{CelebrationSink, LogCelebration};
pub use crate::controller::{
    CalendarController, CalendarControllerBuilder, SaveOutcome, StatusChange,
};
pub use crate::edit::{EditForm, EditWarning};
pub use crate::error::CalendarError;
pub use crate::view::{CalendarEntry, CalendarWindow, DayCell, GridFilter, ViewMode};
