//! Streaming resample stage.
//!
//! Uses Rubato to convert interleaved `f32` audio from the WAV rate to the
//! output device rate. Runs in a background thread between two
//! [`SampleQueue`]s; the output queue closes once the input queue is closed
//! and drained.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::queue::{PopStrategy, SampleQueue, calc_max_buffered_samples};

#[derive(Clone, Copy, Debug)]
pub struct ResampleConfig {
    /// Input frames per resampler call.
    pub chunk_frames: usize,
    /// Output queue size in seconds.
    pub buffer_seconds: f32,
}

fn sinc_params() -> SincInterpolationParameters {
    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    }
}

/// Spawn a resampler thread reading `srcq` at `src_rate` and writing a new
/// queue at `dst_rate`.
pub fn start_resampler(
    srcq: Arc<SampleQueue>,
    src_rate: u32,
    dst_rate: u32,
    cfg: ResampleConfig,
) -> Result<(Arc<SampleQueue>, thread::JoinHandle<()>)> {
    let channels = srcq.channels();
    let dstq = Arc::new(SampleQueue::new(
        channels,
        calc_max_buffered_samples(dst_rate, channels, cfg.buffer_seconds),
    ));
    let ratio = dst_rate as f64 / src_rate.max(1) as f64;
    let chunk_frames = cfg.chunk_frames.max(1);

    let out = dstq.clone();
    let handle = thread::Builder::new()
        .name("resampler".to_string())
        .spawn(move || {
            let resampler = Async::<f32>::new_sinc(
                ratio,
                1.1,
                &sinc_params(),
                chunk_frames,
                channels,
                FixedAsync::Input,
            );
            match resampler {
                Ok(mut r) => {
                    if let Err(e) = run(&mut r, &srcq, &out, channels, chunk_frames) {
                        tracing::error!("resampler stopped: {e:#}");
                    }
                }
                Err(e) => tracing::error!("resampler init error: {e:#}"),
            }
            out.close();
        })
        .context("spawn resampler thread")?;

    tracing::debug!(src_rate, dst_rate, channels, "resampler started");
    Ok((dstq, handle))
}

fn run(
    resampler: &mut Async<f32>,
    srcq: &SampleQueue,
    dstq: &SampleQueue,
    channels: usize,
    chunk_frames: usize,
) -> Result<()> {
    let mut out = vec![0.0f32; channels * chunk_frames * 3];

    while let Some(input) = srcq.pop(PopStrategy::BlockingExact {
        frames: chunk_frames,
    }) {
        let produced = process(resampler, &input, &mut out, channels, None)?;
        dstq.push_blocking(&out[..produced]);
    }

    // Input closed with less than a full chunk left.
    while let Some(tail) = srcq.pop(PopStrategy::BlockingUpTo {
        max_frames: chunk_frames,
    }) {
        let frames = tail.len() / channels;
        let produced = process(resampler, &tail, &mut out, channels, Some(frames))?;
        if produced > 0 {
            dstq.push_blocking(&out[..produced]);
        }
    }
    Ok(())
}

/// Resample one interleaved block into `out`; returns the samples produced.
fn process(
    resampler: &mut Async<f32>,
    input: &[f32],
    out: &mut [f32],
    channels: usize,
    partial_len: Option<usize>,
) -> Result<usize> {
    let in_frames = input.len() / channels;
    let out_frames = out.len() / channels;
    let input_adapter = InterleavedSlice::new(input, channels, in_frames)
        .map_err(|e| anyhow!("input adapter: {e}"))?;
    let mut output_adapter = InterleavedSlice::new_mut(out, channels, out_frames)
        .map_err(|e| anyhow!("output adapter: {e}"))?;
    let indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len,
    };
    let (_consumed, produced) = resampler
        .process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))
        .map_err(|e| anyhow!("resample: {e}"))?;
    Ok(produced * channels)
}
