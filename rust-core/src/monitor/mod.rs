//! Per-channel state, loss-of-signal detection and the frame-seal pipeline

pub mod channel;
pub mod clock;
pub mod detector;
pub mod pipeline;

pub use channel::{ChannelId, ChannelState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use detector::{LossOfSignalDetector, SignalState, Transition};
pub use pipeline::{Monitor, MonitorError, MonitorSettings};
