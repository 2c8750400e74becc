//! Streaming WAV decoder.
//!
//! Opens a RIFF/WAVE file, validates the leading header, walks the sub-chunks
//! after `fmt ` until the `data` chunk is found and then hands out the raw PCM
//! bytes in caller-sized chunks:
//! - only uncompressed PCM, 8-bit unsigned or 16-bit signed little-endian
//! - mono or stereo
//! - a short read is treated as end-of-media, never as an error

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{WavError, WavResult};

/// Size of the fixed leading header (`RIFF` descriptor + `fmt ` body).
pub const HEADER_LEN: usize = 36;

/// Offset of the `fmt ` body; the fmt chunk size is counted from here.
const FMT_BODY_OFFSET: u64 = 20;

const PCM_FORMAT_CODE: u16 = 1;

/// PCM layout of a validated stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WavFormat {
    pub fn is_16bit(&self) -> bool {
        self.bits_per_sample == 16
    }

    /// Bytes per interleaved frame.
    pub fn block_align(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Nominal data rate, used to estimate how long one chunk plays.
    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.block_align() as u64
    }
}

impl From<WavFormat> for smile_types::StreamFormat {
    fn from(f: WavFormat) -> Self {
        smile_types::StreamFormat {
            sample_rate: f.sample_rate,
            channels: f.channels,
            bits_per_sample: f.bits_per_sample,
        }
    }
}

/// Result of one [`WavStream::next_chunk`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRead {
    /// Bytes written into the caller's buffer.
    pub len: usize,
    /// `true` once no audio data is left.
    pub done: bool,
}

/// An open stream positioned inside the `data` chunk.
pub struct WavStream<R = File> {
    reader: Option<R>,
    format: WavFormat,
    data_len: u64,
    remaining: u64,
}

impl WavStream<File> {
    /// Open and validate `path`.
    pub fn open(path: &Path) -> WavResult<Self> {
        let file = File::open(path).map_err(|e| WavError::from_open(path.to_path_buf(), e))?;
        Self::from_reader(file)
    }
}

impl<R: Read + Seek> WavStream<R> {
    /// Validate the header read from `reader` and seek to the start of the audio data.
    ///
    /// On failure the reader is dropped; no stream exists.
    pub fn from_reader(mut reader: R) -> WavResult<Self> {
        let mut header = [0u8; HEADER_LEN];
        if read_full(&mut reader, &mut header)? < HEADER_LEN {
            return Err(WavError::InvalidFormat("truncated header"));
        }
        let format = parse_header(&header)?;

        let fmt_len = le_u32(&header[16..20]) as u64;
        reader.seek(SeekFrom::Start(FMT_BODY_OFFSET + fmt_len))?;
        let data_len = find_data_chunk(&mut reader)?;

        Ok(Self {
            reader: Some(reader),
            format,
            data_len,
            remaining: data_len,
        })
    }

    pub fn format(&self) -> WavFormat {
        self.format
    }

    /// Declared size of the data chunk.
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.remaining
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Read the next chunk of PCM bytes into `buf`.
    ///
    /// Reads `min(remaining, buf.len())` bytes. A short read ends the stream:
    /// `done` is reported and the remaining count drops to zero so callers never
    /// spin on a zero-length read.
    pub fn next_chunk(&mut self, buf: &mut [u8]) -> WavResult<ChunkRead> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(ChunkRead { len: 0, done: true });
        };
        if self.remaining == 0 {
            return Ok(ChunkRead { len: 0, done: true });
        }

        let want = self.remaining.min(buf.len() as u64) as usize;
        let got = read_full(reader, &mut buf[..want])?;
        self.remaining -= got as u64;

        if got == 0 || got < want {
            tracing::debug!(
                wanted = want,
                got,
                left = self.remaining,
                "short read, treating as end of media"
            );
            self.remaining = 0;
        }

        Ok(ChunkRead {
            len: got,
            done: self.remaining == 0,
        })
    }

    /// Release the underlying reader. Safe to call more than once.
    pub fn close(&mut self) {
        self.reader = None;
    }
}

fn parse_header(h: &[u8; HEADER_LEN]) -> WavResult<WavFormat> {
    if &h[0..4] != b"RIFF" {
        return Err(WavError::InvalidFormat("missing RIFF tag"));
    }
    if &h[8..16] != b"WAVEfmt " {
        return Err(WavError::InvalidFormat("missing WAVEfmt tag"));
    }
    if le_u16(&h[20..22]) != PCM_FORMAT_CODE {
        return Err(WavError::InvalidFormat("not uncompressed PCM"));
    }

    let channels = le_u16(&h[22..24]);
    let sample_rate = le_u32(&h[24..28]);
    let bits_per_sample = le_u16(&h[34..36]);

    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(WavError::InvalidFormat("unsupported bits per sample"));
    }
    if channels != 1 && channels != 2 {
        return Err(WavError::InvalidFormat("unsupported channel count"));
    }

    Ok(WavFormat {
        sample_rate,
        channels,
        bits_per_sample,
    })
}

/// Walk sub-chunks until `data`; returns its declared size with the reader at its first byte.
fn find_data_chunk<R: Read + Seek>(reader: &mut R) -> WavResult<u64> {
    loop {
        let mut chunk = [0u8; 8];
        if read_full(reader, &mut chunk)? < chunk.len() {
            return Err(WavError::InvalidFormat("no data chunk"));
        }
        let size = le_u32(&chunk[4..8]);
        if &chunk[0..4] == b"data" {
            return Ok(size as u64);
        }
        // RIFF chunks are word aligned: odd sizes carry one pad byte.
        let skip = size as i64 + (size & 1) as i64;
        reader.seek(SeekFrom::Current(skip))?;
    }
}

/// Fill as much of `buf` as the reader allows; returns the byte count (short at EOF).
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}
