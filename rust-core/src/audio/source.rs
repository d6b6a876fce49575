//! Sample sources feeding the monitor
//!
//! A source fills a buffer with interleaved samples scaled to [-1, 1].
//! Transient conditions (nothing available yet) are reported as
//! [`ReadOutcome::Empty`] and never as errors.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

/// Result of one read from a [`SampleSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` samples were written to the front of the buffer
    Samples(usize),
    /// Nothing available right now, retry later
    Empty,
    /// The source is exhausted
    Closed,
}

pub trait SampleSource {
    /// Number of interleaved channels in the stream
    fn channels(&self) -> usize;

    fn read(&mut self, out: &mut [f64]) -> io::Result<ReadOutcome>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn channels(&self) -> usize {
        (**self).channels()
    }

    fn read(&mut self, out: &mut [f64]) -> io::Result<ReadOutcome> {
        (**self).read(out)
    }
}

/// Raw PCM sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Signed 16-bit little-endian
    S16Le,
    /// Unsigned 8-bit, offset 128
    U8,
}

impl SampleFormat {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(SampleFormat::S16Le),
            8 => Some(SampleFormat::U8),
            _ => None,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::U8 => 1,
        }
    }

    #[inline]
    fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            SampleFormat::S16Le => i16::from_le_bytes([bytes[0], bytes[1]]) as f64 / 32768.0,
            SampleFormat::U8 => (bytes[0] as f64 - 128.0) / 128.0,
        }
    }
}

/// Raw PCM reader over a file, character device, pipe or stdin
pub struct PcmSource<R> {
    reader: R,
    format: SampleFormat,
    channels: usize,
    /// Treat end of input as transient (capture device, growing file)
    follow: bool,
    bytes: Vec<u8>,
    /// Bytes of an incomplete sample carried to the next read
    pending: usize,
}

impl<R: Read> PcmSource<R> {
    pub fn new(reader: R, format: SampleFormat, channels: usize, follow: bool) -> Self {
        Self {
            reader,
            format,
            channels: channels.max(1),
            follow,
            bytes: Vec::new(),
            pending: 0,
        }
    }
}

impl PcmSource<Box<dyn Read + Send>> {
    /// Open `path` for reading; `-` reads standard input
    pub fn open(path: &Path, format: SampleFormat, channels: usize, follow: bool) -> io::Result<Self> {
        let reader: Box<dyn Read + Send> = if path == Path::new("-") {
            Box::new(io::stdin())
        } else {
            Box::new(File::open(path)?)
        };
        Ok(Self::new(reader, format, channels, follow))
    }
}

impl<R: Read> SampleSource for PcmSource<R> {
    fn channels(&self) -> usize {
        self.channels
    }

    fn read(&mut self, out: &mut [f64]) -> io::Result<ReadOutcome> {
        let width = self.format.bytes_per_sample();
        let wanted = out.len() * width;
        if wanted == 0 {
            return Ok(ReadOutcome::Samples(0));
        }
        if self.bytes.len() < wanted {
            self.bytes.resize(wanted, 0);
        }

        let n = match self.reader.read(&mut self.bytes[self.pending..wanted]) {
            Ok(n) => n,
            Err(err) if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                return Ok(ReadOutcome::Empty);
            }
            Err(err) => return Err(err),
        };

        if n == 0 {
            return Ok(if self.follow {
                ReadOutcome::Empty
            } else {
                ReadOutcome::Closed
            });
        }

        let available = self.pending + n;
        let samples = available / width;
        for (slot, chunk) in out.iter_mut().zip(self.bytes[..samples * width].chunks_exact(width)) {
            *slot = self.format.decode(chunk);
        }

        self.bytes.copy_within(samples * width..available, 0);
        self.pending = available - samples * width;

        Ok(ReadOutcome::Samples(samples))
    }
}
