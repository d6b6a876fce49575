//! Running sum of power spectra for the periodic snapshot

/// Per-channel accumulator of power spectra over one averaging epoch
#[derive(Debug, Clone)]
pub struct SpectrumAccumulator {
    sum: Vec<f64>,
    frames: usize,
}

impl SpectrumAccumulator {
    pub fn new(bins: usize) -> Self {
        Self {
            sum: vec![0.0; bins],
            frames: 0,
        }
    }

    /// Add one frame's power spectrum
    pub fn add(&mut self, power: &[f64]) {
        for (acc, &p) in self.sum.iter_mut().zip(power.iter()) {
            *acc += p;
        }
        self.frames += 1;
    }

    /// Average power in `bin` over the frames added so far
    pub fn average(&self, bin: usize) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        self.sum[bin] / self.frames as f64
    }

    /// Frames accumulated in the current epoch
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn bins(&self) -> usize {
        self.sum.len()
    }

    /// Raw accumulated sums
    pub fn sums(&self) -> &[f64] {
        &self.sum
    }

    /// Start a new epoch
    pub fn reset(&mut self) {
        self.sum.fill(0.0);
        self.frames = 0;
    }
}
