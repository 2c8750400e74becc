//! Shared desired-state between the controller (foreground) and the engine worker.
//!
//! There is no command queue: every field holds the *current* desired state, so
//! repeated requests coalesce. Each field is an independent atomic; the engine
//! re-reads all of them at every chunk boundary and tolerates observing them in
//! any relative order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use smile_types::PlaybackMode;

pub const DEFAULT_VOLUME: u8 = 255;

#[derive(Debug)]
pub struct ControlState {
    /// Written by the controller, read by the engine.
    running: AtomicBool,
    /// Written by the controller, read by the engine.
    priority_active: AtomicBool,
    /// Set by the controller, cleared by the engine once observed.
    skip_requested: AtomicBool,
    /// Written by the controller, read by the output sink.
    volume: Arc<AtomicU8>,
    /// Set once at process exit, read by the engine.
    shutdown: AtomicBool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME)
    }
}

impl ControlState {
    pub fn new(volume: u8) -> Self {
        Self {
            running: AtomicBool::new(false),
            priority_active: AtomicBool::new(false),
            skip_requested: AtomicBool::new(false),
            volume: Arc::new(AtomicU8::new(volume)),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn shared(volume: u8) -> Arc<Self> {
        Arc::new(Self::new(volume))
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn priority_active(&self) -> bool {
        self.priority_active.load(Ordering::Acquire)
    }

    pub fn set_priority_active(&self, active: bool) {
        self.priority_active.store(active, Ordering::Release);
    }

    pub fn mode(&self) -> PlaybackMode {
        if self.priority_active() {
            PlaybackMode::Priority
        } else {
            PlaybackMode::Normal
        }
    }

    pub fn request_skip(&self) {
        self.skip_requested.store(true, Ordering::Release);
    }

    pub fn skip_pending(&self) -> bool {
        self.skip_requested.load(Ordering::Acquire)
    }

    /// Consume a pending skip request; returns whether one was set.
    pub fn take_skip(&self) -> bool {
        self.skip_requested.swap(false, Ordering::AcqRel)
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    pub fn set_volume(&self, volume: u8) {
        self.volume.store(volume, Ordering::Relaxed);
    }

    /// Handle for the output callback, which applies the gain per sample.
    pub fn volume_handle(&self) -> Arc<AtomicU8> {
        self.volume.clone()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
