//! FFT engine using realfft for real-valued frames
//!
//! The plan, scratch space and complex output buffer are allocated once per
//! engine and reused for every frame.

use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpectrumError {
    #[error("frame holds {actual} samples, FFT expects {expected}")]
    FrameLength { expected: usize, actual: usize },

    #[error("power buffer holds {actual} bins, FFT produces {expected}")]
    PowerLength { expected: usize, actual: usize },

    #[error("FFT processing failed: {0}")]
    Process(String),
}

/// Real-to-complex FFT engine producing DC-suppressed power spectra
pub struct FftEngine {
    /// FFT size (number of samples, 2 × bins)
    fft_size: usize,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Reusable output buffer (fft_size/2 + 1 complex bins)
    output_buffer: Vec<Complex<f64>>,

    /// Reusable scratch space
    scratch: Vec<Complex<f64>>,
}

impl FftEngine {
    /// Create new FFT engine for frames of `fft_size` samples
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);

        let output_buffer = r2c.make_output_vec();
        let scratch = r2c.make_scratch_vec();

        Self {
            fft_size,
            r2c,
            output_buffer,
            scratch,
        }
    }

    /// Compute the power spectrum of `frame` into `power`
    ///
    /// `frame` must hold exactly `fft_size` samples and is used as working
    /// space, so its contents are unspecified afterwards. `power` receives
    /// `fft_size / 2` values: `power[0]` is forced to zero (DC discarded) and
    /// `power[i] = re² + im²` for the remaining bins. The Nyquist bin is not
    /// reported.
    pub fn power_spectrum(&mut self, frame: &mut [f64], power: &mut [f64]) -> Result<(), SpectrumError> {
        if frame.len() != self.fft_size {
            return Err(SpectrumError::FrameLength {
                expected: self.fft_size,
                actual: frame.len(),
            });
        }
        if power.len() != self.num_bins() {
            return Err(SpectrumError::PowerLength {
                expected: self.num_bins(),
                actual: power.len(),
            });
        }

        self.r2c
            .process_with_scratch(frame, &mut self.output_buffer, &mut self.scratch)
            .map_err(|e| SpectrumError::Process(e.to_string()))?;

        power[0] = 0.0;
        for (p, c) in power.iter_mut().zip(self.output_buffer.iter()).skip(1) {
            *p = c.re * c.re + c.im * c.im;
        }

        Ok(())
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of reported power bins (BINS = fft_size / 2, Nyquist excluded)
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2
    }
}
