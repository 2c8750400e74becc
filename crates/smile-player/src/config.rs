use std::time::Duration;

/// Engine tuning parameters.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Number of buffers in the round-robin pool.
    pub buffer_count: usize,
    /// Capacity of each pool buffer in bytes (one chunk).
    pub buffer_capacity: usize,
    /// Sleep between control-state re-checks while paused or idle.
    pub poll_interval: Duration,
}

impl Default for PlayerConfig {
    /// Defaults: 3 x 1 KiB buffers, 10 ms polling.
    fn default() -> Self {
        Self {
            buffer_count: 3,
            buffer_capacity: 1024,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Output stage tuning shared by the sample queue, resampler and cpal callback.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    /// Target queue duration between the engine and the device callback.
    ///
    /// Kept short: queued audio is what still plays after a pause request.
    pub buffer_seconds: f32,
    /// Max frames pulled per output callback refill.
    pub refill_max_frames: usize,
    /// Resampler input chunk size in frames.
    pub chunk_frames: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            buffer_seconds: 0.25,
            refill_max_frames: 1024,
            chunk_frames: 1024,
        }
    }
}
