//! Image list for the smile screen.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct Slideshow {
    images: Vec<PathBuf>,
    index: usize,
    auto_advance: bool,
    interval: Duration,
    last_change: Instant,
}

impl Slideshow {
    /// Collect images from `dir` once; a missing directory gives an empty show.
    pub fn scan(dir: &Path, interval: Duration) -> Self {
        let mut images: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_image(p))
                .collect(),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "no slideshow images: {e}");
                Vec::new()
            }
        };
        images.sort();
        tracing::info!(images = images.len(), "slideshow loaded");
        Self::new(images, interval)
    }

    pub fn new(images: Vec<PathBuf>, interval: Duration) -> Self {
        Self {
            images,
            index: 0,
            auto_advance: true,
            interval,
            last_change: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn current(&self) -> Option<&Path> {
        self.images.get(self.index).map(PathBuf::as_path)
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    pub fn toggle_auto_advance(&mut self, now: Instant) -> bool {
        self.auto_advance = !self.auto_advance;
        self.last_change = now;
        self.auto_advance
    }

    /// Restart the auto-advance timer (screen opened).
    pub fn restart(&mut self, now: Instant) {
        self.last_change = now;
    }

    pub fn next(&mut self, now: Instant) -> Option<&Path> {
        self.step(1, now)
    }

    pub fn previous(&mut self, now: Instant) -> Option<&Path> {
        self.step(-1, now)
    }

    /// Advance if auto-advance is on and the interval elapsed.
    pub fn tick(&mut self, now: Instant) -> Option<&Path> {
        if !self.auto_advance || now.duration_since(self.last_change) < self.interval {
            return None;
        }
        self.step(1, now)
    }

    fn step(&mut self, delta: isize, now: Instant) -> Option<&Path> {
        let len = self.images.len();
        if len == 0 {
            return None;
        }
        self.index = (self.index as isize + delta).rem_euclid(len as isize) as usize;
        self.last_change = now;
        self.current()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|i| ext.eq_ignore_ascii_case(i)))
        .unwrap_or(false)
}
