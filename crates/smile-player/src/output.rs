//! cpal-backed [`AudioSink`].
//!
//! PCM chunks are converted to `f32` and pushed into a bounded
//! [`SampleQueue`]; a cpal output callback drains it. When the device cannot
//! run at the WAV rate a rubato stage sits in between:
//!
//! ```text
//! emit() -> srcq -> [resampler thread] -> dstq -> cpal callback
//! ```
//!
//! The stream is rebuilt whenever the WAV format changes. The callback:
//! - refills a small local buffer from the queue without blocking
//! - maps channels (mono↔stereo, best-effort otherwise)
//! - applies the shared volume as linear gain

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::config::OutputConfig;
use crate::device::{pick_buffer_size, pick_device, pick_output_config};
use crate::queue::{PopStrategy, SampleQueue, calc_max_buffered_samples};
use crate::resample::{ResampleConfig, start_resampler};
use crate::sink::{AudioSink, PcmChunk};
use crate::wav::WavFormat;

pub struct CpalSink {
    device: cpal::Device,
    config: OutputConfig,
    volume: Arc<AtomicU8>,
    active: Option<ActiveOutput>,
    scratch: Vec<f32>,
}

/// One running cpal stream for a given WAV format.
struct ActiveOutput {
    format: WavFormat,
    srcq: Arc<SampleQueue>,
    dstq: Arc<SampleQueue>,
    resampler: Option<thread::JoinHandle<()>>,
    failed: Arc<AtomicBool>,
    _stream: cpal::Stream,
}

impl ActiveOutput {
    /// Let queued audio play out, then stop.
    fn finish(mut self, timeout: Duration) {
        self.srcq.close();
        if self.resampler.is_none() {
            self.dstq.close();
        }
        if !self.dstq.wait_drained(timeout) {
            tracing::warn!("output did not drain in time, dropping queued audio");
        }
        self.abort();
    }

    /// Stop immediately, discarding queued audio.
    fn abort(&mut self) {
        self.srcq.close();
        self.dstq.close();
        self.srcq.clear();
        self.dstq.clear();
        if let Some(handle) = self.resampler.take() {
            if handle.join().is_err() {
                tracing::error!("resampler thread panicked");
            }
        }
    }
}

impl Drop for ActiveOutput {
    fn drop(&mut self) {
        self.abort();
    }
}

impl CpalSink {
    /// Open the default output device, or the first whose name contains `device`.
    pub fn open(device: Option<&str>, config: OutputConfig, volume: Arc<AtomicU8>) -> Result<Self> {
        let host = cpal::default_host();
        let device = pick_device(&host, device)?;
        if let Ok(desc) = device.description() {
            tracing::info!(device = %desc.name(), "output device selected");
        }
        Ok(Self {
            device,
            config,
            volume,
            active: None,
            scratch: Vec::new(),
        })
    }

    fn drain_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.config.buffer_seconds.max(0.0) * 2.0) + Duration::from_secs(1)
    }

    fn ensure_output(&mut self, format: &WavFormat) -> Result<()> {
        if self.active.as_ref().is_some_and(|a| a.format == *format) {
            return Ok(());
        }
        if let Some(old) = self.active.take() {
            tracing::debug!(from = ?old.format, to = ?format, "stream format changed, rebuilding output");
            old.finish(self.drain_timeout());
        }
        self.active = Some(self.build(format)?);
        Ok(())
    }

    fn build(&self, format: &WavFormat) -> Result<ActiveOutput> {
        let supported = pick_output_config(&self.device, format.sample_rate)?;
        let mut stream_config: cpal::StreamConfig = supported.config();
        if let Some(size) = pick_buffer_size(&supported) {
            stream_config.buffer_size = size;
        }

        let channels = format.channels as usize;
        let srcq = Arc::new(SampleQueue::new(
            channels,
            calc_max_buffered_samples(format.sample_rate, channels, self.config.buffer_seconds),
        ));

        let dst_rate = stream_config.sample_rate;
        let (dstq, resampler) = if dst_rate == format.sample_rate {
            (srcq.clone(), None)
        } else {
            let (q, handle) = start_resampler(
                srcq.clone(),
                format.sample_rate,
                dst_rate,
                ResampleConfig {
                    chunk_frames: self.config.chunk_frames,
                    buffer_seconds: self.config.buffer_seconds,
                },
            )?;
            (q, Some(handle))
        };

        let failed = Arc::new(AtomicBool::new(false));
        let stream = build_output_stream(
            &self.device,
            &stream_config,
            supported.sample_format(),
            &dstq,
            CallbackConfig {
                refill_max_frames: self.config.refill_max_frames,
                volume: self.volume.clone(),
                failed: failed.clone(),
                queues: vec![srcq.clone(), dstq.clone()],
            },
        )?;
        stream.play()?;

        tracing::info!(
            src_rate = format.sample_rate,
            dst_rate,
            channels = format.channels,
            device_channels = stream_config.channels,
            sample_format = ?supported.sample_format(),
            resampling = resampler.is_some(),
            "output stream started"
        );

        Ok(ActiveOutput {
            format: *format,
            srcq,
            dstq,
            resampler,
            failed,
            _stream: stream,
        })
    }
}

impl AudioSink for CpalSink {
    fn emit(&mut self, chunk: PcmChunk<'_>, format: &WavFormat) -> Result<()> {
        self.ensure_output(format)?;
        let mut samples = std::mem::take(&mut self.scratch);
        samples.clear();
        chunk.extend_f32(&mut samples);

        let result = match &self.active {
            Some(active) => {
                active.srcq.push_blocking(&samples);
                if active.failed.load(Ordering::Relaxed) {
                    Err(anyhow!("output stream failed"))
                } else {
                    Ok(())
                }
            }
            None => Err(anyhow!("no output stream")),
        };
        self.scratch = samples;

        if result.is_err() {
            self.active = None;
        }
        result
    }

    fn flush(&mut self) {
        if let Some(active) = &self.active {
            let dropped = active.srcq.clear() + active.dstq.clear();
            tracing::debug!(frames = dropped, "flushed queued audio");
        }
    }

    fn drain(&mut self) {
        if let Some(active) = self.active.take() {
            active.finish(self.drain_timeout());
        }
    }
}

struct CallbackConfig {
    refill_max_frames: usize,
    volume: Arc<AtomicU8>,
    failed: Arc<AtomicBool>,
    /// Closed when the stream reports an error so producers stop blocking.
    queues: Vec<Arc<SampleQueue>>,
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    dstq: &Arc<SampleQueue>,
    cfg: CallbackConfig,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, dstq, cfg),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, dstq, cfg),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, dstq, cfg),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, dstq, cfg),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    dstq: &Arc<SampleQueue>,
    cfg: CallbackConfig,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let state = Mutex::new(CallbackState {
        pos: 0,
        src_channels: dstq.channels(),
        src: Vec::new(),
    });
    let refill_max_frames = cfg.refill_max_frames.max(1);
    let queue = dstq.clone();
    let volume = cfg.volume;
    let failed = cfg.failed;
    let queues = cfg.queues;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let gain = volume.load(Ordering::Relaxed) as f32 / 255.0;
            let mut st = state.lock().unwrap();
            let frames = data.len() / channels_out;

            for frame in 0..frames {
                if st.pos >= st.src.len() {
                    st.pos = 0;
                    st.src.clear();
                    match queue.pop(PopStrategy::NonBlocking {
                        max_frames: refill_max_frames,
                    }) {
                        Some(v) => st.src = v,
                        None => {
                            // Underrun: silence for the rest of this buffer.
                            let silence = <T as cpal::Sample>::from_sample::<f32>(0.0);
                            data[frame * channels_out..].fill(silence);
                            return;
                        }
                    }
                }
                for ch in 0..channels_out {
                    let sample = next_sample_mapped(&mut st, channels_out, ch) * gain;
                    data[frame * channels_out + ch] =
                        <T as cpal::Sample>::from_sample::<f32>(sample);
                }
            }
        },
        move |err| {
            tracing::error!("output stream error: {err}");
            failed.store(true, Ordering::Relaxed);
            for q in &queues {
                q.close();
            }
        },
        None,
    )?;

    Ok(stream)
}

/// Interleaved samples fetched from the queue, consumed frame by frame.
struct CallbackState {
    pos: usize,
    src_channels: usize,
    src: Vec<f32>,
}

/// Read one output sample for `dst_ch`; `st.pos` moves on after the last channel.
///
/// mono→stereo duplicates, stereo→mono averages, anything else clamps to
/// the available source channels.
fn next_sample_mapped(st: &mut CallbackState, dst_channels: usize, dst_ch: usize) -> f32 {
    if st.pos >= st.src.len() {
        return 0.0;
    }
    let frame_start = st.pos;
    let get = |ch: usize, st: &CallbackState| -> f32 {
        st.src.get(frame_start + ch).copied().unwrap_or(0.0)
    };

    let out = match (st.src_channels, dst_channels) {
        (2, 1) => 0.5 * (get(0, st) + get(1, st)),
        (src, _) => get(dst_ch.min(src.saturating_sub(1)), st),
    };

    if dst_ch + 1 == dst_channels {
        st.pos += st.src_channels;
    }
    out
}
