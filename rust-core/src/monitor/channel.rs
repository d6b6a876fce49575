//! Per-channel analysis state
//!
//! Everything one channel needs between samples lives here: the frame being
//! filled, the running peak and sum of squares, FFT resources, the latest
//! power spectrum, the averaging accumulator, the loss-of-signal detector and
//! the record file. Channels share nothing but the monitor's frame cursor.

use chrono::{DateTime, Utc};
use std::fmt;

use super::detector::{LossOfSignalDetector, Transition};
use crate::output::{OutputError, Record, RecordWriter};
use crate::spectrum::{BandTable, FftEngine, HalfSineWindow, SpectrumAccumulator, SpectrumError};

/// Which input channel a state belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId {
    /// The only channel of a mono run
    Single,
    Left,
    Right,
}

impl ChannelId {
    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Single => "single",
            ChannelId::Left => "left",
            ChannelId::Right => "right",
        }
    }

    /// Name shown in file names and alerts; mono runs show none
    pub fn label(self) -> Option<&'static str> {
        match self {
            ChannelId::Single => None,
            other => Some(other.name()),
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct ChannelState {
    id: ChannelId,

    /// Windowed samples of the frame in progress; also the FFT input
    frame: Vec<f64>,

    /// Largest |sample| of the frame, tracked with the signed rule
    peak: f64,

    sum_sq: f64,

    fft: FftEngine,

    /// Power spectrum of the last sealed frame, bin 0 always zero
    power: Vec<f64>,

    /// Band energies of the last sealed frame, in band-table order
    energies: Vec<f64>,

    accumulator: SpectrumAccumulator,
    detector: LossOfSignalDetector,
    records: RecordWriter,
}

impl ChannelState {
    /// Build a channel for `bins`-bin spectra. FFT plans are created here,
    /// once, before any sample is seen.
    pub fn new(id: ChannelId, bins: usize, detector: LossOfSignalDetector, records: RecordWriter) -> Self {
        let frame_len = 2 * bins;
        Self {
            id,
            frame: vec![0.0; frame_len],
            peak: 0.0,
            sum_sq: 0.0,
            fft: FftEngine::new(frame_len),
            power: vec![0.0; bins],
            energies: Vec::new(),
            accumulator: SpectrumAccumulator::new(bins),
            detector,
            records,
        }
    }

    /// Add one normalized sample at frame position `pos`
    #[inline]
    pub fn insert_sample(&mut self, pos: usize, value: f64, window: &HalfSineWindow) {
        self.sum_sq += value * value;
        if value > self.peak {
            self.peak = value;
        }
        if value < -self.peak {
            self.peak = -value;
        }

        self.frame[pos] = window.apply(pos, value);
    }

    /// Analyse the sealed frame: power spectrum, accumulation, and one
    /// detector step with this frame's peak
    pub fn analyze(&mut self, now: DateTime<Utc>) -> Result<Option<Transition>, SpectrumError> {
        self.fft.power_spectrum(&mut self.frame, &mut self.power)?;
        self.accumulator.add(&self.power);
        Ok(self.detector.update(self.peak, now))
    }

    /// Write the frame's record, then clear peak and sum of squares
    pub fn emit_record(&mut self, now: DateTime<Utc>, bands: &BandTable) -> Result<(), OutputError> {
        self.energies.clear();
        self.energies.extend(bands.energies(&self.power));

        let record = Record {
            time: now,
            peak: self.peak,
            rms: self.rms(),
            energies: &self.energies,
        };
        self.records.write(&record)?;

        self.peak = 0.0;
        self.sum_sq = 0.0;
        Ok(())
    }

    /// RMS of the raw (untapered) samples of the current frame
    pub fn rms(&self) -> f64 {
        (self.sum_sq / self.frame.len() as f64).sqrt()
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    pub fn sum_sq(&self) -> f64 {
        self.sum_sq
    }

    #[cfg(test)]
    fn frame(&self) -> &[f64] {
        &self.frame
    }

    pub fn power(&self) -> &[f64] {
        &self.power
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn accumulator(&self) -> &SpectrumAccumulator {
        &self.accumulator
    }

    pub fn accumulator_mut(&mut self) -> &mut SpectrumAccumulator {
        &mut self.accumulator
    }

    pub fn detector(&self) -> &LossOfSignalDetector {
        &self.detector
    }

    pub fn records(&self) -> &RecordWriter {
        &self.records
    }
}
