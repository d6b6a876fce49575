//! Half-sine analysis taper
//!
//! Each frame is weighted by w[n] = sin(n/L * π) over the full frame length L.
//! This is a single-lobe amplitude taper, not a Hann window: the weight is 0 at
//! n = 0, 1 at n = L/2 and approaches 0 again at n = L - 1.

use std::f64::consts::PI;

/// Precomputed half-sine taper for one frame length
#[derive(Debug, Clone)]
pub struct HalfSineWindow {
    weights: Vec<f64>,
}

impl HalfSineWindow {
    /// Build the taper table for frames of `frame_len` samples
    pub fn new(frame_len: usize) -> Self {
        let weights = (0..frame_len)
            .map(|n| (n as f64 / frame_len as f64 * PI).sin())
            .collect();

        Self { weights }
    }

    /// Weight applied at frame position `pos`
    #[inline]
    pub fn weight(&self, pos: usize) -> f64 {
        self.weights[pos]
    }

    /// Windowed value of a sample at frame position `pos`
    #[inline]
    pub fn apply(&self, pos: usize, value: f64) -> f64 {
        value * self.weights[pos]
    }

    /// Frame length this taper was built for
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Mean of w² over the frame, i.e. the power gain of the taper
    pub fn mean_square(&self) -> f64 {
        if self.weights.is_empty() {
            return 0.0;
        }
        self.weights.iter().map(|w| w * w).sum::<f64>() / self.weights.len() as f64
    }
}
