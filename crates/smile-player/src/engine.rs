//! Background playback engine.
//!
//! One worker thread streams one file at a time (a *session*) from the track
//! catalog or the fixed priority sound into an [`AudioSink`]:
//! - control state is re-read before every chunk; nothing interrupts a chunk in flight
//! - chunks rotate through a small [`BufferPool`]
//! - file errors end the session, never the worker
//!
//! [`PlaybackEngine::tick`] runs exactly one scheduling step so the state
//! machine can be driven synchronously; [`PlaybackEngine::spawn`] loops it on
//! a named thread until shutdown.

use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use smile_types::{PlaybackEndReason, PlaybackMode};

use crate::buffers::BufferPool;
use crate::catalog::Playlist;
use crate::config::PlayerConfig;
use crate::control::ControlState;
use crate::error::WavError;
use crate::observer::{NoopObserver, PlayerObserver};
use crate::sink::{AudioSink, PcmChunk};
use crate::status::PlayerStatusState;
use crate::wav::WavStream;

/// Everything the engine and the controller share.
#[derive(Clone)]
pub struct PlayerContext {
    pub control: Arc<ControlState>,
    pub playlist: Arc<Playlist>,
    pub status: Arc<Mutex<PlayerStatusState>>,
    pub observer: Arc<dyn PlayerObserver>,
    /// File streamed while priority mode is active.
    pub priority_sound: PathBuf,
    pub config: PlayerConfig,
}

impl PlayerContext {
    pub fn new(
        control: Arc<ControlState>,
        playlist: Arc<Playlist>,
        priority_sound: impl Into<PathBuf>,
    ) -> Self {
        Self {
            control,
            playlist,
            status: PlayerStatusState::shared(),
            observer: Arc::new(NoopObserver),
            priority_sound: priority_sound.into(),
            config: PlayerConfig::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PlayerObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }
}

/// Result of one [`PlaybackEngine::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Nothing was eligible; slept one poll interval.
    Idle,
    /// A session ran and ended for the given reason.
    Played(PlaybackEndReason),
    /// Shutdown was requested; the worker should exit.
    Shutdown,
}

/// Per-chunk decision taken from control state.
pub(crate) enum Gate {
    Go,
    Wait,
    Stop(PlaybackEndReason),
}

/// How [`pump`] left the stream.
pub(crate) enum StreamEnd {
    /// All data was emitted (or the media ended early).
    Finished,
    Stopped(PlaybackEndReason),
    ReadFault(WavError),
    SinkFault(anyhow::Error),
}

/// Stream `stream` into `sink`, consulting `gate` before every chunk.
///
/// Chunks are cut at a multiple of the frame size; pool slots are at least one
/// frame long.
///
/// `on_chunk` receives the emitted length and the bytes still left in the file.
pub(crate) fn pump<R, S>(
    stream: &mut WavStream<R>,
    sink: &mut S,
    pool: &mut BufferPool,
    poll_interval: Duration,
    mut gate: impl FnMut() -> Gate,
    mut on_chunk: impl FnMut(usize, u64),
) -> StreamEnd
where
    R: Read + Seek,
    S: AudioSink + ?Sized,
{
    let format = stream.format();
    let block_align = format.block_align().max(1);
    loop {
        match gate() {
            Gate::Go => {}
            Gate::Wait => {
                thread::sleep(poll_interval);
                continue;
            }
            Gate::Stop(reason) => return StreamEnd::Stopped(reason),
        }

        // Whole frames only, so a 16-bit sample never straddles two chunks.
        let slot = pool.next_slot();
        let usable = slot.len() - slot.len() % block_align;
        let buf = &mut slot[..usable];
        let read = match stream.next_chunk(buf) {
            Ok(read) => read,
            Err(e) => return StreamEnd::ReadFault(e),
        };
        if read.len > 0 {
            let chunk = PcmChunk::new(&buf[..read.len], &format);
            if let Err(e) = sink.emit(chunk, &format) {
                return StreamEnd::SinkFault(e);
            }
            on_chunk(read.len, stream.remaining_bytes());
        }
        if read.done {
            return StreamEnd::Finished;
        }
    }
}

/// Control-state checks applied before each chunk, in priority order.
fn session_gate(control: &ControlState, mode: PlaybackMode) -> Gate {
    if control.take_skip() {
        return Gate::Stop(PlaybackEndReason::Skipped);
    }
    match mode {
        PlaybackMode::Normal if control.priority_active() => {
            return Gate::Stop(PlaybackEndReason::Preempted);
        }
        PlaybackMode::Priority if !control.priority_active() => {
            return Gate::Stop(PlaybackEndReason::Cancelled);
        }
        _ => {}
    }
    if control.shutdown_requested() {
        return Gate::Stop(PlaybackEndReason::Stopped);
    }
    if mode == PlaybackMode::Normal && !control.running() {
        return Gate::Wait;
    }
    Gate::Go
}

struct Session {
    mode: PlaybackMode,
    path: PathBuf,
    name: String,
    track_index: Option<usize>,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub struct PlaybackEngine<S> {
    ctx: PlayerContext,
    sink: S,
    pool: BufferPool,
    /// Last path that failed to open; repeats are logged at debug.
    last_failure: Option<PathBuf>,
}

impl<S: AudioSink> PlaybackEngine<S> {
    pub fn new(ctx: PlayerContext, sink: S) -> Self {
        let pool = BufferPool::new(ctx.config.buffer_count, ctx.config.buffer_capacity);
        Self {
            ctx,
            sink,
            pool,
            last_failure: None,
        }
    }

    /// Run one scheduling step: a whole session, or one idle wait.
    pub fn tick(&mut self) -> Tick {
        if self.ctx.control.shutdown_requested() {
            return Tick::Shutdown;
        }
        match self.next_session() {
            Some(session) => Tick::Played(self.play(session)),
            None => {
                thread::sleep(self.ctx.config.poll_interval);
                Tick::Idle
            }
        }
    }

    /// Tick until shutdown is requested.
    pub fn run(mut self) {
        tracing::info!("playback engine started");
        while self.tick() != Tick::Shutdown {}
        tracing::info!("playback engine stopped");
    }

    fn next_session(&self) -> Option<Session> {
        let control = &self.ctx.control;
        let playlist = &self.ctx.playlist;
        if control.priority_active() {
            playlist.with_position(|_| drop_stale_skip(control));
            let path = self.ctx.priority_sound.clone();
            return Some(Session {
                mode: PlaybackMode::Priority,
                name: display_name(&path),
                path,
                track_index: None,
            });
        }
        if !control.running() {
            return None;
        }
        // A skip raised before the index was read is already reflected in it.
        let (index, track) = playlist.with_position(|idx| {
            let track = playlist.catalog().get(idx)?;
            drop_stale_skip(control);
            Some((idx, track))
        })?;
        self.ctx.observer.track_changed(&track.name);
        Some(Session {
            mode: PlaybackMode::Normal,
            path: track.path.clone(),
            name: track.name.clone(),
            track_index: Some(index),
        })
    }

    fn play(&mut self, session: Session) -> PlaybackEndReason {
        let Self {
            ctx,
            sink,
            pool,
            last_failure,
        } = self;

        let mut stream = match WavStream::open(&session.path) {
            Ok(stream) => {
                *last_failure = None;
                stream
            }
            Err(e) => {
                if last_failure.as_deref() == Some(session.path.as_path()) {
                    tracing::debug!(file = %session.name, "open failed again: {e}");
                } else {
                    tracing::warn!(file = %session.name, "cannot play file: {e}");
                    *last_failure = Some(session.path.clone());
                }
                settle(ctx, &session, true);
                ctx.status.lock().unwrap().finish(PlaybackEndReason::Error);
                thread::sleep(ctx.config.poll_interval);
                return PlaybackEndReason::Error;
            }
        };

        let format = stream.format();
        tracing::info!(
            file = %session.name,
            index = ?session.track_index,
            mode = ?session.mode,
            rate = format.sample_rate,
            channels = format.channels,
            bits = format.bits_per_sample,
            "now playing"
        );
        ctx.status.lock().unwrap().begin_session(
            &session.name,
            session.mode,
            session.track_index,
            format,
            stream.data_len(),
        );

        pool.reset();
        let control = ctx.control.clone();
        let status = ctx.status.clone();
        let end = pump(
            &mut stream,
            sink,
            pool,
            ctx.config.poll_interval,
            || session_gate(&control, session.mode),
            |len, remaining| status.lock().unwrap().record_chunk(len, remaining),
        );
        stream.close();

        let reason = match end {
            StreamEnd::Finished => {
                settle(ctx, &session, true);
                PlaybackEndReason::Eof
            }
            StreamEnd::Stopped(reason) => {
                sink.flush();
                settle(ctx, &session, false);
                reason
            }
            StreamEnd::ReadFault(e) => {
                tracing::warn!(file = %session.name, "read failed: {e}");
                settle(ctx, &session, true);
                PlaybackEndReason::Error
            }
            StreamEnd::SinkFault(e) => {
                tracing::error!(file = %session.name, "audio output failed: {e:#}");
                sink.flush();
                settle(ctx, &session, false);
                thread::sleep(ctx.config.poll_interval);
                PlaybackEndReason::Error
            }
        };

        tracing::debug!(file = %session.name, reason = ?reason, "session ended");
        ctx.status.lock().unwrap().finish(reason);
        reason
    }
}

fn drop_stale_skip(control: &ControlState) {
    if control.take_skip() {
        tracing::debug!("dropping skip request made before this session");
    }
}

/// Close out a session's effect on the playlist.
///
/// With `advance`, a normal track moves on to the next one unless a skip
/// already moved the index. Any pending skip is consumed either way so it never
/// reaches the next file.
fn settle(ctx: &PlayerContext, session: &Session, advance: bool) {
    let control = &ctx.control;
    let playlist = &ctx.playlist;
    match session.track_index {
        Some(played) if advance => {
            match playlist.advance_from(played, || control.take_skip()) {
                Some(next) => tracing::debug!(index = next, "advanced to next track"),
                None => tracing::debug!("track already changed, not advancing"),
            }
        }
        _ => playlist.with_position(|_| drop_stale_skip(control)),
    }
}

/// Running engine worker.
pub struct EngineHandle {
    control: Arc<ControlState>,
    thread: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    /// Request shutdown and wait for the worker to exit.
    pub fn shutdown(mut self) {
        self.control.request_shutdown();
        self.join_worker();
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("playback engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.control.request_shutdown();
        self.join_worker();
    }
}

impl<S: AudioSink + 'static> PlaybackEngine<S> {
    /// Start the engine on the `playback-engine` thread.
    ///
    /// The sink is built on that thread by `make_sink` (output streams are not
    /// always `Send`); this call returns once it exists or failed.
    pub fn spawn<F>(ctx: PlayerContext, make_sink: F) -> Result<EngineHandle>
    where
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let control = ctx.control.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);

        let thread = thread::Builder::new()
            .name("playback-engine".to_string())
            .spawn(move || {
                let sink = match make_sink() {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                PlaybackEngine::new(ctx, sink).run();
            })
            .context("spawn playback engine thread")?;

        let mut handle = EngineHandle {
            control,
            thread: Some(thread),
        };
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                handle.join_worker();
                Err(e.context("create audio output"))
            }
            Err(_) => {
                handle.join_worker();
                Err(anyhow!("playback engine exited during startup"))
            }
        }
    }
}
