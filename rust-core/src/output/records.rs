//! Daily band-power record files
//!
//! One line per sealed frame:
//! `<unix_time> <peak> <rms> <band_1> ... <band_n>`
//! Files are keyed by UTC day, `<datadir>/YYMMDD.dat`, or
//! `<datadir>/YYMMDD.<channel>.dat` when two channels are monitored.

use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::format::Sci;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("cannot open [{path}]: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write [{path}]: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Values of one output record
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub time: DateTime<Utc>,
    pub peak: f64,
    pub rms: f64,
    pub energies: &'a [f64],
}

impl Record<'_> {
    /// Write the record as one line, newline included
    pub fn write_line<W: Write>(&self, out: &mut W) -> io::Result<()> {
        // Rounded to the nearest millisecond
        let millis = (self.time.timestamp_micros() + 500).div_euclid(1000);
        write!(
            out,
            "{}.{:03} {:.3} {:.3}",
            millis.div_euclid(1000),
            millis.rem_euclid(1000),
            self.peak,
            self.rms
        )?;
        for &energy in self.energies {
            write!(out, " {}", Sci::new(energy, 2))?;
        }
        writeln!(out)
    }
}

struct OpenFile {
    path: PathBuf,
    writer: LineWriter<File>,
}

/// Record file writer for one channel, rolling over at UTC midnight
pub struct RecordWriter {
    datadir: PathBuf,
    /// Channel name inserted in the file name, stereo only
    channel: Option<String>,
    current: Option<OpenFile>,
}

impl RecordWriter {
    pub fn new(datadir: impl Into<PathBuf>, channel: Option<&str>) -> Self {
        Self {
            datadir: datadir.into(),
            channel: channel.map(str::to_string),
            current: None,
        }
    }

    /// File that records emitted at `time` belong to
    pub fn path_for(&self, time: DateTime<Utc>) -> PathBuf {
        let day = time.format("%y%m%d");
        let name = match &self.channel {
            Some(channel) => format!("{}.{}.dat", day, channel),
            None => format!("{}.dat", day),
        };
        self.datadir.join(name)
    }

    /// Path of the file currently open, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|f| f.path.as_path())
    }

    /// Append one record, switching files when the day changes
    pub fn write(&mut self, record: &Record<'_>) -> Result<(), OutputError> {
        let path = self.path_for(record.time);

        let file = match self.current.take() {
            Some(open) if open.path == path => open,
            previous => {
                // Dropping the previous handle flushes and closes it
                drop(previous);
                log::info!("using output file [{}]", path.display());
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|source| OutputError::Open {
                        path: path.clone(),
                        source,
                    })?;
                OpenFile {
                    path,
                    writer: LineWriter::new(file),
                }
            }
        };

        let open = self.current.insert(file);
        record
            .write_line(&mut open.writer)
            .map_err(|source| OutputError::Write {
                path: open.path.clone(),
                source,
            })
    }
}
