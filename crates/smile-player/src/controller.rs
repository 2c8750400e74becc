//! Foreground operations on the player.
//!
//! Every operation is a synchronous update of the shared control state (plus
//! playlist bookkeeping). The engine picks the change up at its next chunk
//! boundary.

use std::path::Path;

use anyhow::{Context, Result};
use smile_types::{PlaybackEndReason, PlayerStatus};

use crate::buffers::BufferPool;
use crate::engine::{Gate, PlayerContext, StreamEnd, pump};
use crate::sink::AudioSink;
use crate::wav::WavStream;

/// Volume change applied per hold step of a volume button.
pub const VOLUME_STEP: i16 = 5;

#[derive(Clone)]
pub struct PlaybackController {
    ctx: PlayerContext,
}

impl PlaybackController {
    pub fn new(ctx: PlayerContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PlayerContext {
        &self.ctx
    }

    pub fn is_running(&self) -> bool {
        self.ctx.control.running()
    }

    /// Resume (`true`) or pause (`false`) normal playback.
    ///
    /// Resuming with an empty catalog is ignored.
    pub fn toggle_running(&self, running: bool) {
        if running && self.ctx.playlist.is_empty() {
            tracing::info!("no tracks, ignoring play request");
            return;
        }
        self.ctx.control.set_running(running);
        tracing::info!(running, "play state changed");
        self.ctx.observer.play_state_changed(running);
    }

    pub fn enter_priority_mode(&self) {
        self.ctx.control.set_priority_active(true);
        tracing::info!("priority mode on");
    }

    pub fn exit_priority_mode(&self) {
        self.ctx.control.set_priority_active(false);
        tracing::info!("priority mode off");
    }

    /// Select the next track and stop the current one. Returns whether it was accepted.
    pub fn request_next(&self) -> bool {
        self.request_step(1)
    }

    /// Select the previous track and stop the current one. Returns whether it was accepted.
    pub fn request_previous(&self) -> bool {
        self.request_step(-1)
    }

    fn request_step(&self, delta: isize) -> bool {
        if !self.ctx.control.running() {
            tracing::debug!(delta, "not playing, ignoring track change");
            return false;
        }
        // Index and skip flag change together under the playlist position, so
        // the engine's end-of-track advance sees both or neither.
        let control = &self.ctx.control;
        let Some(index) = self.ctx.playlist.step_then(delta, |_| control.request_skip()) else {
            tracing::debug!(delta, "no tracks, ignoring track change");
            return false;
        };
        tracing::info!(index, delta, "track change requested");
        true
    }

    pub fn set_volume(&self, volume: u8) {
        self.ctx.control.set_volume(volume);
        self.ctx.playlist.settings().set_volume(volume);
        tracing::debug!(volume, "volume set");
    }

    /// Change the volume by `delta`, saturating at 0 and 255. Returns the new value.
    pub fn adjust_volume(&self, delta: i16) -> u8 {
        let current = self.ctx.control.volume() as i16;
        let volume = (current + delta).clamp(0, u8::MAX as i16) as u8;
        self.set_volume(volume);
        volume
    }

    pub fn volume(&self) -> u8 {
        self.ctx.control.volume()
    }

    /// Play the priority sound to completion on the calling thread.
    ///
    /// Bypasses the engine; meant for startup, before the engine runs.
    pub fn play_priority_sound(&self, sink: &mut dyn AudioSink) -> Result<PlaybackEndReason> {
        let path = self.ctx.priority_sound.clone();
        self.play_file_now(&path, sink)
    }

    /// Play `path` to completion on the calling thread. Only shutdown interrupts it.
    pub fn play_file_now(&self, path: &Path, sink: &mut dyn AudioSink) -> Result<PlaybackEndReason> {
        let mut stream = WavStream::open(path).with_context(|| format!("open {:?}", path))?;
        let config = &self.ctx.config;
        let mut pool = BufferPool::new(config.buffer_count, config.buffer_capacity);
        let control = self.ctx.control.clone();

        tracing::info!(file = %path.display(), "playing sound");
        let end = pump(
            &mut stream,
            sink,
            &mut pool,
            config.poll_interval,
            || {
                if control.shutdown_requested() {
                    Gate::Stop(PlaybackEndReason::Stopped)
                } else {
                    Gate::Go
                }
            },
            |_, _| {},
        );
        stream.close();

        match end {
            StreamEnd::Finished => {
                sink.drain();
                Ok(PlaybackEndReason::Eof)
            }
            StreamEnd::Stopped(reason) => {
                sink.flush();
                Ok(reason)
            }
            StreamEnd::ReadFault(e) => Err(e).with_context(|| format!("read {:?}", path)),
            StreamEnd::SinkFault(e) => Err(e.context("audio output")),
        }
    }

    pub fn status(&self) -> PlayerStatus {
        let track_count = self.ctx.playlist.catalog().len();
        self.ctx
            .status
            .lock()
            .unwrap()
            .snapshot(&self.ctx.control, track_count)
    }

    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        self.ctx.control.request_shutdown();
    }
}
