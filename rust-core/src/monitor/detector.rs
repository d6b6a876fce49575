//! Loss-of-signal detector with debounce
//!
//! Two states, `Present` and `Lost`. A crossing of the threshold starts a
//! pending timer; the state only flips once the crossing has held for the
//! whole debounce period. Any frame back on the original side of the
//! threshold cancels the timer.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Signal condition of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Present,
    Lost,
}

/// State change reported by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    SignalLost,
    SignalRestored,
}

impl Transition {
    /// Alert text, suffixed with the channel name when one is given
    pub fn message(self, channel: Option<&str>) -> String {
        let base = match self {
            Transition::SignalLost => "loss of signal",
            Transition::SignalRestored => "signal restored",
        };
        match channel {
            Some(name) => format!("{} on {}", base, name),
            None => base.to_string(),
        }
    }
}

/// Per-channel hysteresis state machine driven by frame peak amplitude
#[derive(Debug, Clone)]
pub struct LossOfSignalDetector {
    /// Peak amplitude below which the signal counts as lost
    threshold: f64,

    /// Time a crossing must persist before the state flips
    debounce: Duration,

    state: SignalState,

    /// Start of the current uninterrupted crossing, if any
    pending_since: Option<DateTime<Utc>>,
}

impl LossOfSignalDetector {
    pub fn new(threshold: f64, debounce: Duration) -> Self {
        Self {
            threshold,
            debounce,
            state: SignalState::Present,
            pending_since: None,
        }
    }

    /// Evaluate one sealed frame's peak amplitude at time `now`
    pub fn update(&mut self, peak: f64, now: DateTime<Utc>) -> Option<Transition> {
        let crossing = match self.state {
            SignalState::Present => peak < self.threshold,
            SignalState::Lost => peak >= self.threshold,
        };

        if !crossing {
            self.pending_since = None;
            return None;
        }

        let since = *self.pending_since.get_or_insert(now);

        // A clock step backwards counts as no time elapsed
        let elapsed = now.signed_duration_since(since).to_std().unwrap_or(Duration::ZERO);
        if elapsed < self.debounce {
            return None;
        }

        self.pending_since = None;
        let transition = match self.state {
            SignalState::Present => {
                self.state = SignalState::Lost;
                Transition::SignalLost
            }
            SignalState::Lost => {
                self.state = SignalState::Present;
                Transition::SignalRestored
            }
        };
        Some(transition)
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    /// Whether a crossing is currently being timed
    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
