//! Frame-seal pipeline
//!
//! The monitor owns the frame cursor shared by all channels. Every call to
//! [`Monitor::push`] feeds one sample per channel; when the cursor reaches the
//! frame length the frame seals and runs, in order:
//!
//! 1. spectral analysis of every channel (accumulation and detector step),
//! 2. one record per channel (peak and sum of squares reset afterwards),
//! 3. the spectrum snapshot, on every Nth sealed frame.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

use super::channel::{ChannelId, ChannelState};
use super::clock::Clock;
use super::detector::LossOfSignalDetector;
use crate::audio::{ReadOutcome, SampleSource};
use crate::config::{Config, Mode};
use crate::output::{Alerter, OutputError, RecordWriter, SnapshotWriter};
use crate::spectrum::{BandError, BandTable, HalfSineWindow, SpectrumAccumulator, SpectrumError};

/// Samples per channel requested from the source on each read
const READ_FRAMES: usize = 1024;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    #[error("input read error: {0}")]
    Input(#[source] std::io::Error),

    #[error("input stream carries {stream} channels, monitor needs {needed}")]
    ChannelMismatch { stream: usize, needed: usize },

    #[error("interrupted")]
    Interrupted,

    #[error("expected {expected} samples per push, got {actual}")]
    SampleCount { expected: usize, actual: usize },
}

/// Everything the monitor needs, resolved from the configuration
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub mode: Mode,
    pub sample_rate: u32,
    pub bins: usize,
    pub bands: BandTable,
    pub los_threshold: f64,
    pub los_debounce: Duration,
    pub datadir: PathBuf,
    pub spectrum_file: Option<PathBuf>,
    pub spectrum_interval: usize,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Result<Self, BandError> {
        Ok(Self {
            mode: config.analysis.mode,
            sample_rate: config.analysis.sample_rate,
            bins: config.analysis.bins,
            bands: config.band_table()?,
            los_threshold: config.los.threshold,
            los_debounce: config.debounce(),
            datadir: config.output.datadir.clone(),
            spectrum_file: config.spectrum_path().map(PathBuf::from),
            spectrum_interval: config.output.spectrum_interval,
        })
    }

    pub fn frame_len(&self) -> usize {
        2 * self.bins
    }

    pub fn df(&self) -> f64 {
        self.sample_rate as f64 / self.frame_len() as f64
    }
}

pub struct Monitor {
    /// Position of the next sample in the current frame, shared by channels
    cursor: usize,
    window: HalfSineWindow,
    channels: Vec<ChannelState>,
    bands: BandTable,
    snapshot: SnapshotWriter,
    df: f64,
    frames_sealed: u64,
    clock: Box<dyn Clock>,
    alerter: Box<dyn Alerter>,
}

impl Monitor {
    pub fn new(settings: MonitorSettings, clock: Box<dyn Clock>, alerter: Box<dyn Alerter>) -> Self {
        let ids: &[ChannelId] = match settings.mode {
            Mode::Mono => &[ChannelId::Single],
            Mode::Stereo => &[ChannelId::Left, ChannelId::Right],
        };

        let channels = ids
            .iter()
            .map(|&id| {
                ChannelState::new(
                    id,
                    settings.bins,
                    LossOfSignalDetector::new(settings.los_threshold, settings.los_debounce),
                    RecordWriter::new(&settings.datadir, id.label()),
                )
            })
            .collect();

        Self {
            cursor: 0,
            window: HalfSineWindow::new(settings.frame_len()),
            channels,
            df: settings.df(),
            bands: settings.bands,
            snapshot: SnapshotWriter::new(settings.spectrum_file, settings.spectrum_interval),
            frames_sealed: 0,
            clock,
            alerter,
        }
    }

    /// Feed one sample per channel (left before right). Returns true when
    /// this sample sealed a frame.
    pub fn push(&mut self, samples: &[f64]) -> Result<bool, MonitorError> {
        if samples.len() != self.channels.len() {
            return Err(MonitorError::SampleCount {
                expected: self.channels.len(),
                actual: samples.len(),
            });
        }

        for (channel, &value) in self.channels.iter_mut().zip(samples) {
            channel.insert_sample(self.cursor, value, &self.window);
        }

        self.cursor += 1;
        if self.cursor < self.window.len() {
            return Ok(false);
        }
        self.cursor = 0;

        self.seal()?;
        Ok(true)
    }

    fn seal(&mut self) -> Result<(), MonitorError> {
        let now = self.clock.now();

        for channel in self.channels.iter_mut() {
            if let Some(transition) = channel.analyze(now)? {
                let message = transition.message(channel.id().label());
                self.alerter.alert(&message);
            }
        }

        for channel in self.channels.iter_mut() {
            channel.emit_record(now, &self.bands)?;
        }

        self.frames_sealed += 1;
        log::trace!("frame {} sealed", self.frames_sealed);

        self.maybe_emit_spectrum_snapshot();
        Ok(())
    }

    /// Write and restart the averaged spectrum once per snapshot interval
    fn maybe_emit_spectrum_snapshot(&mut self) {
        if !self.snapshot.tick() {
            return;
        }

        let accumulators: Vec<&SpectrumAccumulator> =
            self.channels.iter().map(|c| c.accumulator()).collect();
        if let Err(err) = self.snapshot.write(self.df, &accumulators) {
            log::warn!("skipping spectrum snapshot: {}", err);
        }

        for channel in self.channels.iter_mut() {
            channel.accumulator_mut().reset();
        }
    }

    /// Drive the pipeline from `source` until it closes
    ///
    /// `running` is only checked between reads, never inside a frame seal;
    /// finding it cleared ends the run with [`MonitorError::Interrupted`].
    /// Empty reads are retried after `retry_pause`.
    pub fn run<S>(&mut self, source: &mut S, running: &AtomicBool, retry_pause: Duration) -> Result<(), MonitorError>
    where
        S: SampleSource + ?Sized,
    {
        let width = source.channels();
        let needed = self.channels.len();
        if width < needed {
            return Err(MonitorError::ChannelMismatch { stream: width, needed });
        }

        let mut buffer = vec![0.0; READ_FRAMES * width];
        let mut filled = 0;

        loop {
            if !running.load(Ordering::SeqCst) {
                log::info!("interrupted after {} frames", self.frames_sealed);
                return Err(MonitorError::Interrupted);
            }

            match source.read(&mut buffer[filled..]).map_err(MonitorError::Input)? {
                ReadOutcome::Samples(0) | ReadOutcome::Empty => {
                    std::thread::yield_now();
                    std::thread::sleep(retry_pause);
                }
                ReadOutcome::Samples(n) => {
                    filled += n;
                    let whole = filled - filled % width;

                    // Mono on a stereo stream keeps the left sample only
                    for group in buffer[..whole].chunks_exact(width) {
                        self.push(&group[..needed])?;
                    }

                    buffer.copy_within(whole..filled, 0);
                    filled -= whole;
                }
                ReadOutcome::Closed => {
                    log::info!("input closed after {} frames", self.frames_sealed);
                    return Ok(());
                }
            }
        }
    }

    pub fn channels(&self) -> &[ChannelState] {
        &self.channels
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn frames_sealed(&self) -> u64 {
        self.frames_sealed
    }

    pub fn df(&self) -> f64 {
        self.df
    }

    pub fn bands(&self) -> &BandTable {
        &self.bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::RingBuffer;
    use crate::monitor::clock::ManualClock;
    use crate::monitor::detector::SignalState;
    use crate::output::alert::AlertLog;
    use crate::spectrum::BandSpec;
    use chrono::{TimeZone, Utc};
    use std::path::Path;

    fn settings(mode: Mode, bins: usize, sample_rate: u32, datadir: &Path) -> MonitorSettings {
        MonitorSettings {
            mode,
            sample_rate,
            bins,
            bands: BandTable::default(),
            los_threshold: 0.0,
            los_debounce: Duration::ZERO,
            datadir: datadir.to_path_buf(),
            spectrum_file: None,
            spectrum_interval: 100,
        }
    }

    fn start() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap())
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_end_to_end_single_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = settings(Mode::Mono, 4, 8, dir.path());
        cfg.bands = BandTable::resolve(
            &[BandSpec { name: "b0".into(), start: 0.0, end: 2.0 }],
            cfg.df(),
            cfg.bins,
        )
        .unwrap();
        assert_eq!(cfg.df(), 1.0);

        let clock = start();
        let mut monitor = Monitor::new(cfg, Box::new(clock.clone()), Box::new(AlertLog::default()));

        for i in 0..8 {
            let sealed = monitor.push(&[1.0]).unwrap();
            assert_eq!(sealed, i == 7);
        }
        assert_eq!(monitor.cursor(), 0);
        assert_eq!(monitor.frames_sealed(), 1);

        let channel = &monitor.channels()[0];
        let power = channel.power();
        assert_eq!(power.len(), 4);
        assert_eq!(power[0], 0.0);

        // Half-sine tapered ones: x[n] = sin(nπ/8). Reference DFT, bins 1 and 2.
        let x: Vec<f64> = (0..8).map(|n| (n as f64 * std::f64::consts::PI / 8.0).sin()).collect();
        let dft_power = |k: usize| {
            let (mut re, mut im) = (0.0, 0.0);
            for (n, &v) in x.iter().enumerate() {
                let angle = -2.0 * std::f64::consts::PI * (k * n) as f64 / 8.0;
                re += v * angle.cos();
                im += v * angle.sin();
            }
            re * re + im * im
        };
        assert!((power[1] - dft_power(1)).abs() < 1e-9);
        assert!((power[2] - dft_power(2)).abs() < 1e-9);

        let expected_b0 = (0.0 + power[1] + power[2]) / 3.0;
        assert!((channel.energies()[0] - expected_b0).abs() < 1e-12);

        let lines = read_lines(&dir.path().join("240520.dat"));
        assert_eq!(lines.len(), 1);
        let fields: Vec<&str> = lines[0].split(' ').collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0], "1716199200.000");
        assert_eq!(fields[1], "1.000");
        assert_eq!(fields[2], "1.000");
        assert_eq!(fields[3], crate::output::format::Sci::new(expected_b0, 2).to_string());
    }

    #[test]
    fn test_stereo_seals_in_lockstep() {
        let dir = tempfile::tempdir().unwrap();
        let clock = start();
        let mut monitor = Monitor::new(
            settings(Mode::Stereo, 4, 8, dir.path()),
            Box::new(clock.clone()),
            Box::new(AlertLog::default()),
        );

        for _ in 0..7 {
            assert!(!monitor.push(&[0.5, -0.25]).unwrap());
        }
        assert!(monitor.push(&[0.5, -0.25]).unwrap());

        let left = read_lines(&dir.path().join("240520.left.dat"));
        let right = read_lines(&dir.path().join("240520.right.dat"));
        assert_eq!(left, ["1716199200.000 0.500 0.500"]);
        assert_eq!(right, ["1716199200.000 0.250 0.250"]);

        assert!(matches!(
            monitor.push(&[0.5]),
            Err(MonitorError::SampleCount { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_records_split_at_midnight() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 28, 23, 59, 59).unwrap());
        let mut monitor = Monitor::new(
            settings(Mode::Mono, 4, 8, dir.path()),
            Box::new(clock.clone()),
            Box::new(AlertLog::default()),
        );

        for _ in 0..8 {
            monitor.push(&[0.1]).unwrap();
        }
        clock.advance(chrono::Duration::seconds(2));
        for _ in 0..8 {
            monitor.push(&[0.1]).unwrap();
        }

        assert_eq!(read_lines(&dir.path().join("240228.dat")).len(), 1);
        assert_eq!(read_lines(&dir.path().join("240229.dat")).len(), 1);
    }

    #[test]
    fn test_loss_of_signal_alerts_once_per_transition() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = settings(Mode::Stereo, 4, 8, dir.path());
        cfg.los_threshold = 0.1;
        cfg.los_debounce = Duration::from_secs(5);

        let clock = start();
        let alerts = AlertLog::default();
        let mut monitor = Monitor::new(cfg, Box::new(clock.clone()), Box::new(alerts.clone()));

        // One frame per second: left silent, right healthy
        for _ in 0..10 {
            for _ in 0..8 {
                monitor.push(&[0.01, 0.5]).unwrap();
            }
            clock.advance(chrono::Duration::seconds(1));
        }
        assert_eq!(alerts.messages(), ["loss of signal on left"]);
        assert_eq!(monitor.channels()[0].detector().state(), SignalState::Lost);
        assert_eq!(monitor.channels()[1].detector().state(), SignalState::Present);

        for _ in 0..6 {
            for _ in 0..8 {
                monitor.push(&[0.5, 0.5]).unwrap();
            }
            clock.advance(chrono::Duration::seconds(1));
        }
        assert_eq!(alerts.messages(), ["loss of signal on left", "signal restored on left"]);
    }

    #[test]
    fn test_mono_alert_has_no_channel_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = settings(Mode::Mono, 4, 8, dir.path());
        cfg.los_threshold = 0.5;

        let alerts = AlertLog::default();
        let mut monitor = Monitor::new(cfg, Box::new(start()), Box::new(alerts.clone()));
        for _ in 0..8 {
            monitor.push(&[0.1]).unwrap();
        }
        assert_eq!(alerts.messages(), ["loss of signal"]);
    }

    #[test]
    fn test_snapshot_average_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let spec_path = dir.path().join("sidspec");
        let mut cfg = settings(Mode::Mono, 4, 8, dir.path());
        cfg.spectrum_file = Some(spec_path.clone());
        cfg.spectrum_interval = 3;

        let mut monitor = Monitor::new(cfg, Box::new(start()), Box::new(AlertLog::default()));

        // Identical frames give identical spectra P
        for frame in 0..3 {
            for n in 0..8 {
                monitor.push(&[if n % 2 == 0 { 0.5 } else { -0.5 }]).unwrap();
            }
            if frame < 2 {
                assert!(!spec_path.exists());
                assert_eq!(monitor.channels()[0].accumulator().frames(), frame + 1);
            }
        }

        let power = monitor.channels()[0].power().to_vec();
        let acc = monitor.channels()[0].accumulator();
        assert_eq!(acc.frames(), 0);
        assert!(acc.sums().iter().all(|&s| s == 0.0));

        let lines = read_lines(&spec_path);
        assert_eq!(lines[0], "Frequency PowerL");
        assert_eq!(lines.len(), 5);
        for (bin, line) in lines[1..].iter().enumerate() {
            let cols: Vec<f64> = line.split(' ').map(|c| c.parse().unwrap()).collect();
            assert!((cols[0] - (bin as f64 + 0.5)).abs() < 1e-9);
            let tolerance = power[bin].abs() * 1e-5 + 1e-12;
            assert!((cols[1] - power[bin]).abs() <= tolerance, "bin {}", bin);
        }
    }

    #[test]
    fn test_unwritable_snapshot_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = settings(Mode::Mono, 4, 8, dir.path());
        cfg.spectrum_file = Some(PathBuf::from("/nonexistent/dir/sidspec"));
        cfg.spectrum_interval = 1;

        let mut monitor = Monitor::new(cfg, Box::new(start()), Box::new(AlertLog::default()));
        for _ in 0..16 {
            monitor.push(&[0.2]).unwrap();
        }
        assert_eq!(monitor.frames_sealed(), 2);
        assert_eq!(monitor.channels()[0].accumulator().frames(), 0);
    }

    #[test]
    fn test_unwritable_record_file_is_fatal() {
        let cfg = settings(Mode::Mono, 4, 8, Path::new("/nonexistent/sidmon"));
        let mut monitor = Monitor::new(cfg, Box::new(start()), Box::new(AlertLog::default()));

        for _ in 0..7 {
            monitor.push(&[0.2]).unwrap();
        }
        assert!(matches!(
            monitor.push(&[0.2]),
            Err(MonitorError::Output(OutputError::Open { .. }))
        ));
    }

    #[test]
    fn test_run_mono_from_stereo_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut monitor = Monitor::new(
            settings(Mode::Mono, 4, 8, dir.path()),
            Box::new(start()),
            Box::new(AlertLog::default()),
        );

        let (mut producer, source) = RingBuffer::new(64).split(2);
        // Left at 0.5, right at 0.9: only the left channel may reach the record
        let frames: Vec<f64> = (0..16).flat_map(|_| [0.5, 0.9]).collect();
        assert_eq!(producer.push(&frames[..5]), 5);

        let mut stepped = RefillOnce {
            inner: source,
            producer: Some(producer),
            rest: frames[5..].to_vec(),
        };
        let running = AtomicBool::new(true);
        monitor.run(&mut stepped, &running, Duration::ZERO).unwrap();

        assert_eq!(monitor.frames_sealed(), 2);
        let lines = read_lines(&dir.path().join("240520.dat"));
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.split(' ').nth(1) == Some("0.500")));
    }

    #[test]
    fn test_run_rejects_narrow_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut monitor = Monitor::new(
            settings(Mode::Stereo, 4, 8, dir.path()),
            Box::new(start()),
            Box::new(AlertLog::default()),
        );
        let (_producer, mut source) = RingBuffer::new(8).split(1);
        let running = AtomicBool::new(true);

        assert!(matches!(
            monitor.run(&mut source, &running, Duration::ZERO),
            Err(MonitorError::ChannelMismatch { stream: 1, needed: 2 })
        ));
    }

    #[test]
    fn test_cleared_running_flag_interrupts() {
        let dir = tempfile::tempdir().unwrap();
        let mut monitor = Monitor::new(
            settings(Mode::Mono, 4, 8, dir.path()),
            Box::new(start()),
            Box::new(AlertLog::default()),
        );
        let (mut producer, mut source) = RingBuffer::new(16).split(1);
        producer.push(&[0.5; 8]);

        let running = AtomicBool::new(false);
        assert!(matches!(
            monitor.run(&mut source, &running, Duration::ZERO),
            Err(MonitorError::Interrupted)
        ));
        assert_eq!(monitor.frames_sealed(), 0);
    }

    #[test]
    fn test_interrupt_lands_on_read_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let mut monitor = Monitor::new(
            settings(Mode::Mono, 4, 8, dir.path()),
            Box::new(start()),
            Box::new(AlertLog::default()),
        );

        let running = AtomicBool::new(true);
        let mut source = InterruptAfterRead { running: &running };
        let err = monitor.run(&mut source, &running, Duration::ZERO).unwrap_err();

        // The samples of the interrupted read still seal their frame
        assert!(matches!(err, MonitorError::Interrupted));
        assert_eq!(monitor.frames_sealed(), 1);
        assert_eq!(read_lines(&dir.path().join("240520.dat")).len(), 1);

        let alerts = AlertLog::default();
        let termination = crate::output::Termination::new();
        assert!(termination.terminate(&mut alerts.clone(), &format!("{:#}", anyhow::Error::from(err))));
        assert_eq!(alerts.messages(), ["terminating: interrupted"]);
    }

    /// Hands out one full frame and clears the running flag while doing so
    struct InterruptAfterRead<'a> {
        running: &'a AtomicBool,
    }

    impl SampleSource for InterruptAfterRead<'_> {
        fn channels(&self) -> usize {
            1
        }

        fn read(&mut self, out: &mut [f64]) -> std::io::Result<ReadOutcome> {
            self.running.store(false, Ordering::SeqCst);
            out[..8].fill(0.25);
            Ok(ReadOutcome::Samples(8))
        }
    }

    /// Refills the ring once after the first empty read, then closes it
    struct RefillOnce {
        inner: crate::audio::RingSource,
        producer: Option<crate::audio::RingProducer>,
        rest: Vec<f64>,
    }

    impl SampleSource for RefillOnce {
        fn channels(&self) -> usize {
            self.inner.channels()
        }

        fn read(&mut self, out: &mut [f64]) -> std::io::Result<ReadOutcome> {
            let outcome = self.inner.read(out)?;
            if outcome == ReadOutcome::Empty {
                if self.rest.is_empty() {
                    self.producer = None;
                } else if let Some(producer) = self.producer.as_mut() {
                    let rest = std::mem::take(&mut self.rest);
                    assert_eq!(producer.push(&rest), rest.len());
                }
            }
            Ok(outcome)
        }
    }
}
