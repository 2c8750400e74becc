//! Persisted settings record (volume + last played track).
//!
//! Fixed 8-byte little-endian layout:
//!
//! | offset | size | field        |
//! |--------|------|--------------|
//! | 0      | 4    | magic        |
//! | 4      | 1    | volume       |
//! | 5      | 1    | padding      |
//! | 6      | 2    | play_index   |
//!
//! A record whose magic does not match is treated as absent (fresh start).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::control::DEFAULT_VOLUME;

pub const SETTINGS_MAGIC: u32 = 0xAA55_A55A;
pub const SETTINGS_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub volume: u8,
    pub play_index: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            play_index: 0,
        }
    }
}

impl Settings {
    pub fn encode(&self) -> [u8; SETTINGS_LEN] {
        let mut out = [0u8; SETTINGS_LEN];
        out[0..4].copy_from_slice(&SETTINGS_MAGIC.to_le_bytes());
        out[4] = self.volume;
        out[6..8].copy_from_slice(&self.play_index.to_le_bytes());
        out
    }

    /// Decode a stored record; `None` when it is too short or the magic is wrong.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() < SETTINGS_LEN {
            return None;
        }
        let magic = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        if magic != SETTINGS_MAGIC {
            return None;
        }
        Some(Self {
            volume: raw[4],
            play_index: u16::from_le_bytes([raw[6], raw[7]]),
        })
    }
}

/// Backing storage for the settings record.
pub trait SettingsStore: Send + Sync {
    /// Read the raw record, `Ok(None)` if nothing was ever written.
    fn read(&self) -> Result<Option<Vec<u8>>>;
    fn write(&self, record: &[u8; SETTINGS_LEN]) -> Result<()>;
}

/// Settings record kept in a small binary file.
#[derive(Clone, Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read settings {:?}", self.path)),
        }
    }

    fn write(&self, record: &[u8; SETTINGS_LEN]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create settings dir {:?}", parent))?;
        }
        std::fs::write(&self.path, record)
            .with_context(|| format!("write settings {:?}", self.path))
    }
}

/// In-memory store; counts writes so callers can observe persistence.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    record: Mutex<Option<Vec<u8>>>,
    writes: Mutex<usize>,
}

impl MemorySettingsStore {
    pub fn with_record(raw: Vec<u8>) -> Self {
        Self {
            record: Mutex::new(Some(raw)),
            writes: Mutex::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn stored(&self) -> Option<Settings> {
        self.record
            .lock()
            .unwrap()
            .as_deref()
            .and_then(Settings::decode)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.record.lock().unwrap().clone())
    }

    fn write(&self, record: &[u8; SETTINGS_LEN]) -> Result<()> {
        *self.record.lock().unwrap() = Some(record.to_vec());
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }
}

/// Current settings plus write-through persistence.
pub struct PersistedSettings {
    store: Arc<dyn SettingsStore>,
    current: Mutex<Settings>,
    restored: bool,
}

impl PersistedSettings {
    /// Read the record once; unreadable or invalid records fall back to defaults.
    pub fn load(store: Arc<dyn SettingsStore>) -> Self {
        let stored = match store.read() {
            Ok(raw) => raw.as_deref().and_then(Settings::decode),
            Err(e) => {
                tracing::warn!("settings read failed, using defaults: {e:#}");
                None
            }
        };
        if stored.is_none() {
            tracing::info!("no valid settings record, starting fresh");
        }
        Self {
            store,
            current: Mutex::new(stored.unwrap_or_default()),
            restored: stored.is_some(),
        }
    }

    /// Whether a valid record was found at load time.
    pub fn restored(&self) -> bool {
        self.restored
    }

    pub fn get(&self) -> Settings {
        *self.current.lock().unwrap()
    }

    pub fn set_volume(&self, volume: u8) {
        self.update(|s| s.volume = volume);
    }

    pub fn set_play_index(&self, index: usize) {
        let index = u16::try_from(index).unwrap_or(u16::MAX);
        self.update(|s| s.play_index = index);
    }

    /// Apply `f` and write the record; the lock is held across the write so
    /// the last record stored is always the latest one.
    fn update(&self, f: impl FnOnce(&mut Settings)) {
        let mut current = self.current.lock().unwrap();
        f(&mut current);
        if let Err(e) = self.store.write(&current.encode()) {
            tracing::warn!("settings save failed: {e:#}");
        }
    }
}
