//! Sample sources: raw PCM, ring buffer and (feature `device`) cpal capture

pub mod ring;
pub mod source;

#[cfg(feature = "device")]
pub mod input;

pub use ring::{RingBuffer, RingProducer, RingSource};
pub use source::{PcmSource, ReadOutcome, SampleFormat, SampleSource};

#[cfg(feature = "device")]
pub use input::{AudioError, DeviceInput};
