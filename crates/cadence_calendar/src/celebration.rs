use cadence_core::Activity;

/// Fire-and-forget effect played when a template first reaches `completed`.
pub trait CelebrationSink: Send + Sync {
    fn celebrate(&self, activity: &Activity);
}

/// Default sink: records the event in the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCelebration;

impl CelebrationSink for LogCelebration {
    fn celebrate(&self, activity: &Activity) {
        tracing::info!(activity_id = %activity.id, title = %activity.title, "activity completed");
    }
}
