use serde::{Deserialize, Serialize};

/// Which kind of file the engine is (or was last) streaming.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Regular playlist playback from the track catalog.
    #[default]
    Normal,
    /// The fixed priority sound preempts the playlist.
    Priority,
}

/// Reason why a streaming session ended.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEndReason {
    /// All audio data of the file was emitted (or the media ended early).
    Eof,
    /// A next/previous request abandoned the file.
    Skipped,
    /// Priority mode was entered while a playlist track was streaming.
    Preempted,
    /// Priority mode was left while the priority sound was streaming.
    Cancelled,
    /// The engine was asked to shut down.
    Stopped,
    /// The file could not be opened/validated or the output failed.
    Error,
}

/// PCM format of the stream currently being emitted.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// Snapshot of the player exposed to the front-end.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerStatus {
    /// File name of the file being streamed, if any.
    pub now_playing: Option<String>,
    /// Mode of the current (or last) session.
    pub mode: PlaybackMode,
    /// `true` when normal playback is paused or idle.
    pub paused: bool,
    /// Catalog index of the selected track.
    pub track_index: Option<usize>,
    /// Number of tracks in the catalog.
    pub track_count: usize,
    /// Format of the current stream.
    pub format: Option<StreamFormat>,
    /// Bytes of audio data emitted for the current stream.
    pub emitted_bytes: Option<u64>,
    /// Audio data bytes not yet emitted for the current stream.
    pub remaining_bytes: Option<u64>,
    /// Output volume (0..=255).
    pub volume: u8,
    /// End reason of the last finished session.
    pub end_reason: Option<PlaybackEndReason>,
}
