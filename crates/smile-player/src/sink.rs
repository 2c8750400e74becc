//! Audio output abstraction used by the engine.
//!
//! The engine hands each chunk to an [`AudioSink`] together with the stream
//! format. `emit` may block for back-pressure, but the chunk slice is only
//! borrowed for the duration of the call.

use anyhow::Result;

use crate::wav::WavFormat;

/// Raw PCM bytes tagged with their sample encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcmChunk<'a> {
    /// 8-bit unsigned samples (silence at 128).
    U8(&'a [u8]),
    /// 16-bit signed little-endian samples.
    S16Le(&'a [u8]),
}

impl<'a> PcmChunk<'a> {
    /// Tag `bytes` according to `format.bits_per_sample`.
    pub fn new(bytes: &'a [u8], format: &WavFormat) -> Self {
        if format.is_16bit() {
            PcmChunk::S16Le(bytes)
        } else {
            PcmChunk::U8(bytes)
        }
    }

    pub fn bytes(&self) -> &'a [u8] {
        match self {
            PcmChunk::U8(b) | PcmChunk::S16Le(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// Number of whole samples in the chunk (an odd trailing 16-bit byte is ignored).
    pub fn sample_count(&self) -> usize {
        match self {
            PcmChunk::U8(b) => b.len(),
            PcmChunk::S16Le(b) => b.len() / 2,
        }
    }

    /// Append the samples to `out` as `f32` in `[-1.0, 1.0)`.
    pub fn extend_f32(&self, out: &mut Vec<f32>) {
        out.reserve(self.sample_count());
        match self {
            PcmChunk::U8(b) => out.extend(b.iter().map(|&s| (s as f32 - 128.0) / 128.0)),
            PcmChunk::S16Le(b) => out.extend(
                b.chunks_exact(2)
                    .map(|p| i16::from_le_bytes([p[0], p[1]]) as f32 / 32768.0),
            ),
        }
    }
}

/// Destination for PCM chunks.
///
/// Not required to be `Send`: the engine builds its sink on the worker thread.
pub trait AudioSink {
    /// Queue one chunk for playback; blocking is allowed for back-pressure.
    fn emit(&mut self, chunk: PcmChunk<'_>, format: &WavFormat) -> Result<()>;

    /// Discard audio that was queued but not yet played.
    fn flush(&mut self) {}

    /// Block until everything queued so far has been played.
    fn drain(&mut self) {}
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn emit(&mut self, chunk: PcmChunk<'_>, format: &WavFormat) -> Result<()> {
        (**self).emit(chunk, format)
    }

    fn flush(&mut self) {
        (**self).flush()
    }

    fn drain(&mut self) {
        (**self).drain()
    }
}

/// Sink that accepts and discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn emit(&mut self, _chunk: PcmChunk<'_>, _format: &WavFormat) -> Result<()> {
        Ok(())
    }
}
