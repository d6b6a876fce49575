//! Spectral analysis: taper, FFT, band aggregation, averaging

pub mod accumulator;
pub mod bands;
pub mod fft;
pub mod windowing;

pub use accumulator::SpectrumAccumulator;
pub use bands::{Band, BandError, BandSpec, BandTable, MAX_BANDS};
pub use fft::{FftEngine, SpectrumError};
pub use windowing::HalfSineWindow;
