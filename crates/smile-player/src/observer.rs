//! Notifications from the player to the front-end.

/// UI collaborator notified by the engine and the controller.
///
/// Called from the engine worker thread as well as the foreground thread, so
/// implementations must not block for long.
pub trait PlayerObserver: Send + Sync {
    /// A playlist track started streaming.
    fn track_changed(&self, name: &str);
    /// Normal playback was resumed (`true`) or paused (`false`).
    fn play_state_changed(&self, running: bool);
}

/// Observer that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl PlayerObserver for NoopObserver {
    fn track_changed(&self, _name: &str) {}
    fn play_state_changed(&self, _running: bool) {}
}
