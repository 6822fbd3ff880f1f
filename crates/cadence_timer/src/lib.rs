//! Stopwatch timers keyed by activity id.
//!
//! One [`TimerEngine`] owns every timer in the process. Display surfaces (inline card,
//! floating widget, picture-in-picture canvas) poll it instead of keeping their own copies.

pub mod engine;
pub mod format;

pub use crate::engine::{TimerEngine, TimerError, TimerSnapshot};
pub use crate::format::format_elapsed;
