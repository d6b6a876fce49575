//! Run configuration loaded from a TOML file
//!
//! Every field has a default, so an empty file (or a file with only a band
//! table) is a valid configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::spectrum::{BandError, BandSpec, BandTable, MAX_BANDS};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "sidmon.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("can only do 8 or 16 bits, got {0}")]
    Bits(u32),

    #[error("input stream must carry 1 or 2 channels, got {0}")]
    InputChannels(u16),

    #[error("stereo mode needs a 2-channel input stream")]
    StereoNeedsTwoChannels,

    #[error("invalid {field}: {value}")]
    Invalid { field: &'static str, value: String },

    #[error("no data directory, {0}")]
    DataDir(PathBuf),

    #[error(transparent)]
    Band(#[from] BandError),
}

/// Channel layout of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Mono,
    Stereo,
}

impl Mode {
    /// Number of channels the monitor analyses
    pub fn channels(self) -> usize {
        match self {
            Mode::Mono => 1,
            Mode::Stereo => 2,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional log file, appended to alongside stderr
    #[serde(default)]
    pub logfile: Option<PathBuf>,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub los: LosConfig,
    #[serde(default, rename = "band")]
    pub bands: Vec<BandSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// Raw PCM source, `-` for stdin
    #[serde(default = "default_device")]
    pub device: PathBuf,
    #[serde(default = "default_bits")]
    pub bits: u32,
    /// Channels interleaved in the input stream
    #[serde(default = "default_input_channels")]
    pub channels: u16,
    /// Treat end of input as a transient empty read
    #[serde(default = "default_follow")]
    pub follow: bool,
    /// Pause before retrying an empty read
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Number of power-spectrum bins; frames hold 2 × bins samples
    #[serde(default = "default_bins")]
    pub bins: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_datadir")]
    pub datadir: PathBuf,
    /// Scratch file for the averaged spectrum, empty to disable
    #[serde(default = "default_spectrum_file")]
    pub spectrum_file: PathBuf,
    /// Sealed frames per spectrum snapshot
    #[serde(default = "default_spectrum_interval")]
    pub spectrum_interval: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LosConfig {
    /// Peak amplitude threshold, 0..1. Zero disables the detector.
    #[serde(default)]
    pub threshold: f64,
    /// Seconds a crossing must persist before the state flips
    #[serde(default)]
    pub timeout: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            bits: default_bits(),
            channels: default_input_channels(),
            follow: default_follow(),
            retry_ms: default_retry_ms(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            sample_rate: default_sample_rate(),
            bins: default_bins(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            datadir: default_datadir(),
            spectrum_file: default_spectrum_file(),
            spectrum_interval: default_spectrum_interval(),
        }
    }
}

fn default_device() -> PathBuf {
    PathBuf::from("/dev/dsp")
}

fn default_bits() -> u32 {
    16
}

fn default_input_channels() -> u16 {
    1
}

fn default_follow() -> bool {
    true
}

fn default_retry_ms() -> u64 {
    50
}

fn default_mode() -> Mode {
    Mode::Mono
}

fn default_sample_rate() -> u32 {
    100_000
}

fn default_bins() -> usize {
    2048
}

fn default_datadir() -> PathBuf {
    PathBuf::from(".")
}

fn default_spectrum_file() -> PathBuf {
    PathBuf::from("/tmp/sidspec")
}

fn default_spectrum_interval() -> usize {
    100
}

impl Config {
    /// Read and parse a configuration file. Validation is separate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse configuration text; `origin` is only used in error messages
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Check every value the monitor relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.bits != 8 && self.input.bits != 16 {
            return Err(ConfigError::Bits(self.input.bits));
        }
        if !(1..=2).contains(&self.input.channels) {
            return Err(ConfigError::InputChannels(self.input.channels));
        }
        if self.analysis.mode == Mode::Stereo && self.input.channels != 2 {
            return Err(ConfigError::StereoNeedsTwoChannels);
        }
        if self.analysis.sample_rate == 0 {
            return Err(invalid("sample_rate", self.analysis.sample_rate));
        }
        if self.analysis.bins == 0 {
            return Err(invalid("bins", self.analysis.bins));
        }
        if self.output.spectrum_interval == 0 {
            return Err(invalid("spectrum_interval", self.output.spectrum_interval));
        }
        if !(0.0..=1.0).contains(&self.los.threshold) {
            return Err(invalid("los threshold", self.los.threshold));
        }
        if self.bands.len() > MAX_BANDS {
            return Err(BandError::TooMany(self.bands.len()).into());
        }
        self.band_table()?;

        if !self.output.datadir.is_dir() {
            return Err(ConfigError::DataDir(self.output.datadir.clone()));
        }

        Ok(())
    }

    /// Samples per analysis frame
    pub fn frame_len(&self) -> usize {
        2 * self.analysis.bins
    }

    /// Frequency resolution of one bin in Hz
    pub fn df(&self) -> f64 {
        self.analysis.sample_rate as f64 / self.frame_len() as f64
    }

    /// Band table resolved against this run's resolution
    pub fn band_table(&self) -> Result<BandTable, BandError> {
        BandTable::resolve(&self.bands, self.df(), self.analysis.bins)
    }

    /// Scratch path for the spectrum snapshot, if enabled
    pub fn spectrum_path(&self) -> Option<&Path> {
        if self.output.spectrum_file.as_os_str().is_empty() {
            None
        } else {
            Some(&self.output.spectrum_file)
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.los.timeout)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.input.retry_ms)
    }
}

fn invalid(field: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        field,
        value: value.to_string(),
    }
}
