use std::sync::{Arc, Mutex};

use smile_types::{PlaybackEndReason, PlaybackMode, PlayerStatus};

use crate::control::ControlState;
use crate::wav::WavFormat;

/// Shared playback status updated by the engine worker.
#[derive(Debug, Default)]
pub struct PlayerStatusState {
    /// File name of the file being streamed.
    pub now_playing: Option<String>,
    /// Mode of the current (or last) session.
    pub mode: PlaybackMode,
    /// Catalog index of the streamed track; `None` for the priority sound.
    pub track_index: Option<usize>,
    /// Format of the open stream.
    pub format: Option<WavFormat>,
    /// Bytes handed to the sink so far in this session.
    pub emitted_bytes: Option<u64>,
    /// Data bytes left in the open stream.
    pub remaining_bytes: Option<u64>,
    /// Terminal reason of the last finished session.
    pub end_reason: Option<PlaybackEndReason>,
}

impl PlayerStatusState {
    /// Create a shared, mutex-protected status store.
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Record a freshly opened stream.
    pub fn begin_session(
        &mut self,
        name: &str,
        mode: PlaybackMode,
        track_index: Option<usize>,
        format: WavFormat,
        data_len: u64,
    ) {
        self.now_playing = Some(name.to_string());
        self.mode = mode;
        self.track_index = track_index;
        self.format = Some(format);
        self.emitted_bytes = Some(0);
        self.remaining_bytes = Some(data_len);
    }

    pub fn record_chunk(&mut self, len: usize, remaining: u64) {
        let emitted = self.emitted_bytes.unwrap_or(0);
        self.emitted_bytes = Some(emitted + len as u64);
        self.remaining_bytes = Some(remaining);
    }

    /// Clear stream-specific fields and keep `reason` for the snapshot.
    pub fn finish(&mut self, reason: PlaybackEndReason) {
        self.now_playing = None;
        self.format = None;
        self.emitted_bytes = None;
        self.remaining_bytes = None;
        self.end_reason = Some(reason);
    }

    /// Combine the engine's view with the shared control state.
    pub fn snapshot(&self, control: &ControlState, track_count: usize) -> PlayerStatus {
        PlayerStatus {
            now_playing: self.now_playing.clone(),
            mode: self.mode,
            paused: !control.running(),
            track_index: self.track_index,
            track_count,
            format: self.format.map(Into::into),
            emitted_bytes: self.emitted_bytes,
            remaining_bytes: self.remaining_bytes,
            volume: control.volume(),
            end_reason: self.end_reason,
        }
    }
}
