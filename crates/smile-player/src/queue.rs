//! Bounded queue of interleaved `f32` samples between output stages.
//!
//! Used as:
//! - engine thread (via the sink) → queue
//! - resampler thread → queue
//! - cpal callback drains the last queue without blocking
//!
//! `close()` ends a stream; `clear()` throws away queued audio when a session
//! is abandoned.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Thread-safe bounded queue for interleaved `f32` samples.
///
/// Bounded by `max_samples`; producers block when it is full, which is the
/// back-pressure that paces the engine at the device rate. The `closed` flag
/// lives under the same mutex as the samples.
pub struct SampleQueue {
    channels: usize,
    max_samples: usize,
    inner: Mutex<QueueInner>,
    cv: Condvar,
}

struct QueueInner {
    samples: VecDeque<f32>,
    closed: bool,
}

/// How [`SampleQueue::pop`] waits for data.
pub enum PopStrategy {
    /// Wait for exactly `frames`; `None` if closed before that many arrive.
    BlockingExact { frames: usize },
    /// Wait for at least one frame, take up to `max_frames`.
    BlockingUpTo { max_frames: usize },
    /// Take up to `max_frames` of what is there; `None` when empty.
    NonBlocking { max_frames: usize },
}

/// Queue capacity in samples for `seconds` of audio at `rate_hz`.
///
/// Non-finite or non-positive durations fall back to a quarter second.
pub fn calc_max_buffered_samples(rate_hz: u32, channels: usize, seconds: f32) -> usize {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.25
    };
    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.max(1).saturating_mul(channels.max(1))
}

impl SampleQueue {
    pub fn new(channels: usize, max_samples: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            max_samples: max_samples.max(channels),
            inner: Mutex::new(QueueInner {
                samples: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn max_frames(&self) -> usize {
        self.max_samples / self.channels
    }

    /// Queued frames right now.
    pub fn len_frames(&self) -> usize {
        self.inner.lock().unwrap().samples.len() / self.channels
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Mark the end of the stream and wake all waiters. Idempotent.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.cv.notify_all();
    }

    /// Drop everything queued; returns the number of frames discarded.
    pub fn clear(&self) -> usize {
        let dropped = {
            let mut g = self.inner.lock().unwrap();
            let n = g.samples.len();
            g.samples.clear();
            n
        };
        self.cv.notify_all();
        dropped / self.channels
    }

    /// Append samples, blocking while the queue is full.
    ///
    /// Returns early (dropping the rest) if the queue is closed meanwhile.
    pub fn push_blocking(&self, samples: &[f32]) {
        let mut offset = 0;
        while offset < samples.len() {
            let mut g = self.inner.lock().unwrap();
            while g.samples.len() >= self.max_samples && !g.closed {
                g = self.cv.wait(g).unwrap();
            }
            if g.closed {
                return;
            }
            let room = self.max_samples - g.samples.len();
            let take = room.min(samples.len() - offset);
            g.samples.extend(&samples[offset..offset + take]);
            offset += take;
            drop(g);
            self.cv.notify_all();
        }
    }

    /// Pop whole interleaved frames according to `strategy`.
    pub fn pop(&self, strategy: PopStrategy) -> Option<Vec<f32>> {
        let mut g = self.inner.lock().unwrap();
        let take_frames = match strategy {
            PopStrategy::BlockingExact { frames } => {
                let want = frames * self.channels;
                while g.samples.len() < want && !g.closed {
                    g = self.cv.wait(g).unwrap();
                }
                if g.samples.len() < want {
                    return None;
                }
                frames
            }
            PopStrategy::BlockingUpTo { max_frames } => {
                while g.samples.len() < self.channels && !g.closed {
                    g = self.cv.wait(g).unwrap();
                }
                (g.samples.len() / self.channels).min(max_frames)
            }
            PopStrategy::NonBlocking { max_frames } => {
                (g.samples.len() / self.channels).min(max_frames)
            }
        };
        if take_frames == 0 {
            return None;
        }
        let out: Vec<f32> = g.samples.drain(..take_frames * self.channels).collect();
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    /// Wait until the queue is closed and empty; `false` on timeout.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut g = self.inner.lock().unwrap();
        loop {
            if g.closed && g.samples.is_empty() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (ng, _) = self.cv.wait_timeout(g, deadline - now).unwrap();
            g = ng;
        }
    }
}
