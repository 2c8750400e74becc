//! Fixtures shared by unit tests: WAV builders, throwaway directories,
//! recording sinks and a ready-made player context.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::catalog::{Playlist, TrackCatalog};
use crate::config::PlayerConfig;
use crate::control::{ControlState, DEFAULT_VOLUME};
use crate::engine::PlayerContext;
use crate::observer::PlayerObserver;
use crate::settings::{
    MemorySettingsStore, PersistedSettings, SETTINGS_LEN, Settings, SettingsStore,
};
use crate::sink::{AudioSink, PcmChunk};
use crate::wav::WavFormat;

/// Build RIFF/WAVE byte images, including deliberately malformed ones.
pub(crate) struct WavBuilder {
    audio_format: u16,
    channels: u16,
    sample_rate: u32,
    bits: u16,
    fmt_extra: Vec<u8>,
    chunks: Vec<([u8; 4], Vec<u8>)>,
    data: Vec<u8>,
    declared_data_len: Option<u32>,
    with_data: bool,
}

impl WavBuilder {
    pub(crate) fn new(channels: u16, sample_rate: u32, bits: u16) -> Self {
        Self {
            audio_format: 1,
            channels,
            sample_rate,
            bits,
            fmt_extra: Vec::new(),
            chunks: Vec::new(),
            data: Vec::new(),
            declared_data_len: None,
            with_data: true,
        }
    }

    pub(crate) fn audio_format(mut self, code: u16) -> Self {
        self.audio_format = code;
        self
    }

    pub(crate) fn fmt_extra(mut self, extra: Vec<u8>) -> Self {
        self.fmt_extra = extra;
        self
    }

    /// Add a non-data chunk between `fmt ` and `data`.
    pub(crate) fn chunk(mut self, tag: [u8; 4], body: Vec<u8>) -> Self {
        self.chunks.push((tag, body));
        self
    }

    pub(crate) fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Claim a data size different from the bytes actually written.
    pub(crate) fn declared_data_len(mut self, len: u32) -> Self {
        self.declared_data_len = Some(len);
        self
    }

    pub(crate) fn without_data(mut self) -> Self {
        self.with_data = false;
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let block_align = self.channels * (self.bits / 8);
        let byte_rate = self.sample_rate * block_align as u32;

        let mut body = Vec::new();
        body.extend_from_slice(b"WAVEfmt ");
        body.extend_from_slice(&(16 + self.fmt_extra.len() as u32).to_le_bytes());
        body.extend_from_slice(&self.audio_format.to_le_bytes());
        body.extend_from_slice(&self.channels.to_le_bytes());
        body.extend_from_slice(&self.sample_rate.to_le_bytes());
        body.extend_from_slice(&byte_rate.to_le_bytes());
        body.extend_from_slice(&block_align.to_le_bytes());
        body.extend_from_slice(&self.bits.to_le_bytes());
        body.extend_from_slice(&self.fmt_extra);

        for (tag, chunk) in &self.chunks {
            body.extend_from_slice(tag);
            body.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
            body.extend_from_slice(chunk);
            if chunk.len() % 2 == 1 {
                body.push(0);
            }
        }

        if self.with_data {
            let len = self.declared_data_len.unwrap_or(self.data.len() as u32);
            body.extend_from_slice(b"data");
            body.extend_from_slice(&len.to_le_bytes());
            body.extend_from_slice(&self.data);
        }

        let mut out = Vec::with_capacity(body.len() + 8);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }
}

/// 8-bit mono WAV whose data bytes are all `fill`.
pub(crate) fn mono8(fill: u8, len: usize) -> Vec<u8> {
    WavBuilder::new(1, 8_000, 8).data(vec![fill; len]).build()
}

/// 16-bit stereo WAV holding `frames` as (left, right) pairs.
pub(crate) fn stereo16(frames: &[(i16, i16)]) -> Vec<u8> {
    let data: Vec<u8> = frames
        .iter()
        .flat_map(|(l, r)| l.to_le_bytes().into_iter().chain(r.to_le_bytes()))
        .collect();
    WavBuilder::new(2, 44_100, 16).data(data).build()
}

/// A fresh, uniquely named directory under the system temp dir.
pub(crate) fn temp_dir(prefix: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "smile-player-{prefix}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&root).unwrap();
    root
}

pub(crate) fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// One `emit` call seen by a [`ScriptedSink`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct Emitted {
    /// First byte of the chunk; fixtures fill each file with one distinct byte.
    pub(crate) fill: u8,
    pub(crate) len: usize,
    pub(crate) sixteen_bit: bool,
    pub(crate) at: Instant,
}

/// Read side of a [`ScriptedSink`] that stays with the test.
#[derive(Clone, Default)]
pub(crate) struct SinkTap {
    log: Arc<Mutex<Vec<Emitted>>>,
    samples: Arc<Mutex<Vec<f32>>>,
    flushes: Arc<AtomicUsize>,
    drains: Arc<AtomicUsize>,
}

impl SinkTap {
    pub(crate) fn emitted(&self) -> Vec<Emitted> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn fills(&self) -> Vec<u8> {
        self.emitted().iter().map(|e| e.fill).collect()
    }

    /// Total bytes emitted for chunks filled with `fill`.
    pub(crate) fn bytes_of(&self, fill: u8) -> usize {
        self.emitted()
            .iter()
            .filter(|e| e.fill == fill)
            .map(|e| e.len)
            .sum()
    }

    /// Every emitted sample, converted to `f32`, in order.
    pub(crate) fn samples(&self) -> Vec<f32> {
        self.samples.lock().unwrap().clone()
    }

    pub(crate) fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub(crate) fn drains(&self) -> usize {
        self.drains.load(Ordering::SeqCst)
    }
}

type Script = Box<dyn FnMut(usize, u8) -> anyhow::Result<()> + Send>;

/// Sink that records every chunk and runs a hook after each `emit`.
///
/// The hook gets the 1-based emit count and the chunk's fill byte, which lets a
/// test change control state at an exact chunk boundary.
pub(crate) struct ScriptedSink {
    tap: SinkTap,
    script: Script,
}

impl ScriptedSink {
    pub(crate) fn recording() -> (Self, SinkTap) {
        Self::scripted(|_, _| Ok(()))
    }

    pub(crate) fn scripted(
        script: impl FnMut(usize, u8) -> anyhow::Result<()> + Send + 'static,
    ) -> (Self, SinkTap) {
        let tap = SinkTap::default();
        (
            Self {
                tap: tap.clone(),
                script: Box::new(script),
            },
            tap,
        )
    }
}

impl AudioSink for ScriptedSink {
    fn emit(&mut self, chunk: PcmChunk<'_>, _format: &WavFormat) -> anyhow::Result<()> {
        let fill = chunk.bytes().first().copied().unwrap_or(0);
        chunk.extend_f32(&mut self.tap.samples.lock().unwrap());
        let count = {
            let mut log = self.tap.log.lock().unwrap();
            log.push(Emitted {
                fill,
                len: chunk.len(),
                sixteen_bit: matches!(chunk, PcmChunk::S16Le(_)),
                at: Instant::now(),
            });
            log.len()
        };
        (self.script)(count, fill)
    }

    fn flush(&mut self) {
        self.tap.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn drain(&mut self) {
        self.tap.drains.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    tracks: Mutex<Vec<String>>,
    states: Mutex<Vec<bool>>,
}

impl RecordingObserver {
    pub(crate) fn tracks(&self) -> Vec<String> {
        self.tracks.lock().unwrap().clone()
    }

    pub(crate) fn states(&self) -> Vec<bool> {
        self.states.lock().unwrap().clone()
    }
}

impl PlayerObserver for RecordingObserver {
    fn track_changed(&self, name: &str) {
        self.tracks.lock().unwrap().push(name.to_string());
    }

    fn play_state_changed(&self, running: bool) {
        self.states.lock().unwrap().push(running);
    }
}

/// In-memory settings store whose writes can be slowed down for one named thread.
#[derive(Default)]
pub(crate) struct ThrottledStore {
    inner: MemorySettingsStore,
    slow: Mutex<Option<(String, Duration)>>,
    started: AtomicUsize,
}

impl ThrottledStore {
    /// Delay every write made from the thread called `thread` by `delay`.
    pub(crate) fn slow_writes_from(&self, thread: &str, delay: Duration) {
        *self.slow.lock().unwrap() = Some((thread.to_string(), delay));
    }

    /// Writes begun so far, including ones still sleeping.
    pub(crate) fn writes_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Spin until more than `seen` writes have begun.
    pub(crate) fn wait_for_write(&self, seen: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.writes_started() <= seen {
            assert!(Instant::now() < deadline, "no settings write started");
            thread::yield_now();
        }
    }

    pub(crate) fn writes(&self) -> usize {
        self.inner.writes()
    }

    pub(crate) fn stored(&self) -> Option<Settings> {
        self.inner.stored()
    }
}

impl SettingsStore for ThrottledStore {
    fn read(&self) -> anyhow::Result<Option<Vec<u8>>> {
        self.inner.read()
    }

    fn write(&self, record: &[u8; SETTINGS_LEN]) -> anyhow::Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let delay = self.slow.lock().unwrap().as_ref().and_then(|(name, delay)| {
            (thread::current().name() == Some(name.as_str())).then_some(*delay)
        });
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        self.inner.write(record)
    }
}

/// Fill byte used for the priority sound in [`fixture`].
pub(crate) const PRIORITY_FILL: u8 = 0x77;

/// A complete player setup on disk.
pub(crate) struct Fixture {
    pub(crate) ctx: PlayerContext,
    pub(crate) store: Arc<ThrottledStore>,
    pub(crate) observer: Arc<RecordingObserver>,
}

/// Build `music/t{i}.wav` files (8-bit mono, all bytes `fill`) plus an optional
/// `smile.wav` priority sound of `priority_len` bytes next to the music dir.
pub(crate) fn fixture(tracks: &[(u8, usize)], priority_len: Option<usize>) -> Fixture {
    fixture_with_files(
        tracks.iter().map(|(fill, len)| mono8(*fill, *len)).collect(),
        priority_len.map(|len| mono8(PRIORITY_FILL, len)),
    )
}

/// Like [`fixture`], with the WAV images given directly.
pub(crate) fn fixture_with_files(tracks: Vec<Vec<u8>>, priority: Option<Vec<u8>>) -> Fixture {
    let root = temp_dir("fixture");
    let music = root.join("music");
    std::fs::create_dir_all(&music).unwrap();
    for (i, image) in tracks.iter().enumerate() {
        write_file(&music, &format!("t{i}.wav"), image);
    }
    let priority_path = root.join("smile.wav");
    if let Some(image) = priority {
        std::fs::write(&priority_path, image).unwrap();
    }

    let store = Arc::new(ThrottledStore::default());
    let settings = Arc::new(PersistedSettings::load(store.clone()));
    let catalog = TrackCatalog::scan(&music).unwrap();
    let playlist = Arc::new(Playlist::new(catalog, settings));
    let observer = Arc::new(RecordingObserver::default());
    let ctx = PlayerContext::new(ControlState::shared(DEFAULT_VOLUME), playlist, priority_path)
        .with_observer(observer.clone())
        .with_config(PlayerConfig {
            poll_interval: Duration::from_millis(1),
            ..PlayerConfig::default()
        });

    Fixture {
        ctx,
        store,
        observer,
    }
}
