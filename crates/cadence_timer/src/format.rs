//! Elapsed-time formatting for timer displays.

/// Formats whole seconds as `H:MM:SS` once an hour has passed, otherwise `M:SS`.
///
/// ```
/// use cadence_timer::format_elapsed;
///
/// assert_eq!(format_elapsed(65), "1:05");
/// assert_eq!(format_elapsed(3725), "1:02:05");
/// ```
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
