//! Periodic averaged-spectrum snapshot
//!
//! Every `interval` sealed frames the accumulated spectra are averaged and
//! written to a fixed scratch file, overwriting the previous snapshot.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use super::format::Sci;
use super::records::OutputError;
use crate::spectrum::SpectrumAccumulator;

const COLUMN_NAMES: [&str; 2] = ["PowerL", "PowerR"];

/// Cadence counter and writer for the spectrum scratch file
#[derive(Debug)]
pub struct SnapshotWriter {
    path: Option<PathBuf>,
    interval: usize,
    count: usize,
}

impl SnapshotWriter {
    /// `path` of `None` disables the file but keeps the cadence
    pub fn new(path: Option<PathBuf>, interval: usize) -> Self {
        Self {
            path,
            interval: interval.max(1),
            count: 0,
        }
    }

    /// Count one sealed frame; true when an averaging epoch is complete
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count < self.interval {
            return false;
        }
        self.count = 0;
        true
    }

    /// Write the averaged spectra, one column per channel
    pub fn write(&self, df: f64, channels: &[&SpectrumAccumulator]) -> Result<(), OutputError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let wrap = |source: std::io::Error| OutputError::Write {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(|source| OutputError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut out = BufWriter::new(file);

        write!(out, "Frequency").map_err(wrap)?;
        for name in COLUMN_NAMES.iter().take(channels.len()) {
            write!(out, " {}", name).map_err(wrap)?;
        }
        writeln!(out).map_err(wrap)?;

        let bins = channels.iter().map(|c| c.bins()).min().unwrap_or(0);
        for bin in 0..bins {
            let center = (bin as f64 + 0.5) * df;
            write!(out, "{}", Sci::new(center, 5)).map_err(wrap)?;
            for channel in channels {
                write!(out, " {}", Sci::new(channel.average(bin), 5)).map_err(wrap)?;
            }
            writeln!(out).map_err(wrap)?;
        }

        out.flush().map_err(wrap)
    }
}
