//! Track catalog scanning and the persisted playlist position.
//!
//! The catalog is built once from a directory scan and never mutated; the
//! current index lives next to it in [`Playlist`] and wraps on next/previous.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::settings::PersistedSettings;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    /// File name shown to the user.
    pub name: String,
    pub path: PathBuf,
}

/// Ordered, immutable list of playable tracks.
#[derive(Clone, Debug, Default)]
pub struct TrackCatalog {
    tracks: Vec<Track>,
}

impl TrackCatalog {
    /// Scan `dir` (non-recursive) for `.wav` files, matched case-insensitively.
    ///
    /// Entries are ordered by file name so a persisted index keeps pointing at
    /// the same file between runs.
    pub fn scan(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(anyhow::anyhow!("music dir is not a directory: {:?}", dir));
        }

        let mut tracks = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("read dir {:?}", dir))? {
            let entry = entry.with_context(|| format!("read entry in {:?}", dir))?;
            let path = entry.path();
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if !is_wav(&path) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            tracing::debug!(track = %name, "found music file");
            tracks.push(Track { name, path });
        }
        tracks.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::info!(dir = %dir.display(), tracks = tracks.len(), "music scan complete");
        Ok(Self { tracks })
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Step `index` by `delta` positions, wrapping modulo `len` (`len > 0`).
pub fn wrap_index(index: usize, delta: isize, len: usize) -> usize {
    let len_i = len as isize;
    let base = (index % len) as isize;
    (base + delta % len_i + len_i) as usize % len
}

/// The catalog plus the shared, persisted current index.
///
/// The index is moved by both the controller (next/previous) and the engine
/// (auto-advance). It sits behind a mutex that is also held while the new
/// value is saved, so the stored record follows the in-memory order of steps.
pub struct Playlist {
    catalog: TrackCatalog,
    index: Mutex<usize>,
    settings: Arc<PersistedSettings>,
}

impl Playlist {
    /// Restore the index from `settings`; out-of-range values reset to 0.
    pub fn new(catalog: TrackCatalog, settings: Arc<PersistedSettings>) -> Self {
        let stored = settings.get().play_index as usize;
        let index = if stored < catalog.len() {
            stored
        } else {
            if settings.restored() && !catalog.is_empty() {
                tracing::warn!(
                    stored,
                    tracks = catalog.len(),
                    "stored track index out of range, starting at 0"
                );
            }
            0
        };
        Self {
            catalog,
            index: Mutex::new(index),
            settings,
        }
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn index(&self) -> usize {
        *self.index.lock().unwrap()
    }

    /// The selected track, `None` for an empty catalog.
    pub fn current(&self) -> Option<(usize, &Track)> {
        self.with_position(|idx| self.catalog.get(idx).map(|t| (idx, t)))
    }

    /// Run `f` with the current index while no step can happen.
    pub fn with_position<T>(&self, f: impl FnOnce(usize) -> T) -> T {
        let index = self.index.lock().unwrap();
        f(*index)
    }

    /// Move the index by `delta` (wrapping) and persist it. `None` on an empty catalog.
    pub fn step(&self, delta: isize) -> Option<usize> {
        self.step_then(delta, |_| {})
    }

    /// Like [`Playlist::step`], then run `then` with the new index before the
    /// position is released.
    pub fn step_then(&self, delta: isize, then: impl FnOnce(usize)) -> Option<usize> {
        let mut index = self.index.lock().unwrap();
        let next = self.move_locked(&mut index, delta)?;
        then(next);
        Some(next)
    }

    /// Advance past `played` once it has finished.
    ///
    /// `changed_elsewhere` runs first, under the position lock; when it reports
    /// a track change already made, or the index no longer points at `played`,
    /// nothing moves. Returns the new index when it moved.
    pub fn advance_from(
        &self,
        played: usize,
        changed_elsewhere: impl FnOnce() -> bool,
    ) -> Option<usize> {
        let mut index = self.index.lock().unwrap();
        let changed = changed_elsewhere();
        if changed || *index != played {
            return None;
        }
        self.move_locked(&mut index, 1)
    }

    fn move_locked(&self, index: &mut usize, delta: isize) -> Option<usize> {
        let len = self.catalog.len();
        if len == 0 {
            return None;
        }
        *index = wrap_index(*index, delta, len);
        self.settings.set_play_index(*index);
        Some(*index)
    }

    pub fn settings(&self) -> &Arc<PersistedSettings> {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MemorySettingsStore, Settings, SettingsStore};
    use crate::testutil::{ThrottledStore, temp_dir, write_file};
    use std::thread;
    use std::time::Duration;

    fn catalog_of(n: usize) -> TrackCatalog {
        TrackCatalog::from_tracks(
            (0..n)
                .map(|i| Track {
                    name: format!("t{i}.wav"),
                    path: PathBuf::from(format!("/music/t{i}.wav")),
                })
                .collect(),
        )
    }

    fn settings_with(index: u16) -> (Arc<MemorySettingsStore>, Arc<PersistedSettings>) {
        let store = Arc::new(MemorySettingsStore::with_record(
            Settings {
                volume: 255,
                play_index: index,
            }
            .encode()
            .to_vec(),
        ));
        let settings = Arc::new(PersistedSettings::load(store.clone()));
        (store, settings)
    }

    #[test]
    fn wrap_index_handles_both_directions() {
        assert_eq!(wrap_index(2, 1, 3), 0);
        assert_eq!(wrap_index(0, -1, 3), 2);
        assert_eq!(wrap_index(1, 2, 3), 0);
        assert_eq!(wrap_index(0, -7, 3), 2);
        assert_eq!(wrap_index(0, 1, 1), 0);
    }

    #[test]
    fn next_then_previous_returns_to_start() {
        for len in 1..6 {
            for start in 0..len {
                let (_store, settings) = settings_with(start as u16);
                let playlist = Playlist::new(catalog_of(len), settings);
                assert_eq!(playlist.index(), start);
                playlist.step(1);
                playlist.step(-1);
                assert_eq!(playlist.index(), start, "len={len} start={start}");
            }
        }
    }

    #[test]
    fn step_wraps_and_persists() {
        let (store, settings) = settings_with(2);
        let playlist = Playlist::new(catalog_of(3), settings);
        assert_eq!(playlist.step(1), Some(0));
        assert_eq!(store.stored().unwrap().play_index, 0);
        assert_eq!(playlist.step(-1), Some(2));
        assert_eq!(store.stored().unwrap().play_index, 2);
    }

    #[test]
    fn concurrent_steps_are_saved_in_order() {
        let store = Arc::new(ThrottledStore::default());
        store.slow_writes_from("slow-step", Duration::from_millis(100));
        let settings = Arc::new(PersistedSettings::load(store.clone()));
        let playlist = Arc::new(Playlist::new(catalog_of(5), settings));

        let slow = {
            let playlist = playlist.clone();
            thread::Builder::new()
                .name("slow-step".to_string())
                .spawn(move || playlist.step(1))
                .unwrap()
        };
        store.wait_for_write(0);
        assert_eq!(playlist.step(1), Some(2));
        assert_eq!(slow.join().unwrap(), Some(1));

        assert_eq!(playlist.index(), 2);
        assert_eq!(store.stored().unwrap().play_index, 2);
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn advance_from_respects_moves_made_elsewhere() {
        let (_store, settings) = settings_with(0);
        let playlist = Playlist::new(catalog_of(3), settings);
        assert_eq!(playlist.advance_from(0, || true), None);
        assert_eq!(playlist.index(), 0);
        playlist.step(1);
        assert_eq!(playlist.advance_from(0, || false), None);
        assert_eq!(playlist.index(), 1);
        assert_eq!(playlist.advance_from(1, || false), Some(2));
    }

    #[test]
    fn empty_catalog_has_no_current_and_never_persists() {
        let (store, settings) = settings_with(0);
        let playlist = Playlist::new(TrackCatalog::default(), settings);
        assert!(playlist.current().is_none());
        assert_eq!(playlist.step(1), None);
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn out_of_range_stored_index_resets() {
        let (_store, settings) = settings_with(40);
        let playlist = Playlist::new(catalog_of(3), settings);
        assert_eq!(playlist.index(), 0);
    }

    #[test]
    fn scan_finds_wav_files_case_insensitively() {
        let dir = temp_dir("catalog");
        write_file(&dir, "b.WAV", b"x");
        write_file(&dir, "a.wav", b"x");
        write_file(&dir, "notes.txt", b"x");
        write_file(&dir, "c.Wav", b"x");
        std::fs::create_dir_all(dir.join("sub.wav")).unwrap();

        let catalog = TrackCatalog::scan(&dir).unwrap();
        let names: Vec<&str> = catalog.tracks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a.wav", "b.WAV", "c.Wav"]);
        assert_eq!(catalog.get(0).unwrap().path, dir.join("a.wav"));
    }

    #[test]
    fn scan_rejects_missing_dir() {
        let dir = temp_dir("catalog-missing").join("absent");
        assert!(TrackCatalog::scan(&dir).is_err());
    }

    #[test]
    fn memory_store_is_usable_as_trait_object() {
        let store: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::default());
        assert!(store.read().unwrap().is_none());
    }
}
