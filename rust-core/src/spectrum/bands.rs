//! Band table and band energy aggregation
//!
//! A band is a named frequency range resolved once, at startup, to a closed
//! range of power-spectrum bins: [floor(start/DF), floor(end/DF)].

use serde::Deserialize;
use thiserror::Error;

/// Maximum number of bands in one run
pub const MAX_BANDS: usize = 20;

#[derive(Error, Debug, PartialEq)]
pub enum BandError {
    #[error("too many bands: {0} configured, at most {MAX_BANDS} allowed")]
    TooMany(usize),

    #[error("band {name}: start {start_hz} Hz is above end {end_hz} Hz")]
    Inverted { name: String, start_hz: f64, end_hz: f64 },

    #[error("band {name}: frequency {hz} is not a finite number")]
    NotFinite { name: String, hz: f64 },

    #[error("band {name}: negative frequency {hz} Hz")]
    Negative { name: String, hz: f64 },

    #[error("band {name}: end bin {bin} is outside the {bins}-bin spectrum")]
    OutOfRange { name: String, bin: usize, bins: usize },
}

/// Band as written in the configuration file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BandSpec {
    pub name: String,
    pub start: f64,
    pub end: f64,
}

/// Band resolved to spectrum bin indices
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: String,
    pub start_hz: f64,
    pub end_hz: f64,
    /// First bin, inclusive
    pub first_bin: usize,
    /// Last bin, inclusive
    pub last_bin: usize,
}

impl Band {
    /// Resolve a configured band against the frequency resolution `df`
    pub fn resolve(spec: &BandSpec, df: f64, bins: usize) -> Result<Self, BandError> {
        for hz in [spec.start, spec.end] {
            if !hz.is_finite() {
                return Err(BandError::NotFinite {
                    name: spec.name.clone(),
                    hz,
                });
            }
            if hz < 0.0 {
                return Err(BandError::Negative {
                    name: spec.name.clone(),
                    hz,
                });
            }
        }
        if spec.start > spec.end {
            return Err(BandError::Inverted {
                name: spec.name.clone(),
                start_hz: spec.start,
                end_hz: spec.end,
            });
        }

        let first_bin = (spec.start / df).floor() as usize;
        let last_bin = (spec.end / df).floor() as usize;
        if last_bin >= bins {
            return Err(BandError::OutOfRange {
                name: spec.name.clone(),
                bin: last_bin,
                bins,
            });
        }

        Ok(Self {
            name: spec.name.clone(),
            start_hz: spec.start,
            end_hz: spec.end,
            first_bin,
            last_bin,
        })
    }

    /// Number of bins covered by the band
    pub fn width(&self) -> usize {
        self.last_bin - self.first_bin + 1
    }

    /// Mean power over the band's bins
    ///
    /// A band whose bounds fall in the same bin yields that bin's value.
    pub fn energy(&self, power: &[f64]) -> f64 {
        let sum: f64 = power[self.first_bin..=self.last_bin].iter().sum();
        sum / self.width() as f64
    }
}

/// Ordered, immutable set of bands evaluated for every record
#[derive(Debug, Clone, Default)]
pub struct BandTable {
    bands: Vec<Band>,
}

impl BandTable {
    /// Resolve all configured bands, keeping declaration order
    pub fn resolve(specs: &[BandSpec], df: f64, bins: usize) -> Result<Self, BandError> {
        if specs.len() > MAX_BANDS {
            return Err(BandError::TooMany(specs.len()));
        }

        let bands = specs
            .iter()
            .map(|spec| Band::resolve(spec, df, bins))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { bands })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Band> {
        self.bands.iter()
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Energy of every band in table order
    pub fn energies<'a>(&'a self, power: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
        self.bands.iter().map(move |band| band.energy(power))
    }
}
