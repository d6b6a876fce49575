//! Capture from an audio device with cpal
//!
//! The device callback converts to f64 and pushes into a [`RingProducer`];
//! the monitor reads the matching [`RingSource`](super::RingSource).

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use thiserror::Error;

use super::ring::RingProducer;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio input device found")]
    NoDevice,

    #[error("failed to get device name: {0}")]
    DeviceName(String),

    #[error("failed to get default config: {0}")]
    DefaultConfig(String),

    #[error("failed to build stream: {0}")]
    BuildStream(String),

    #[error("failed to play stream: {0}")]
    PlayStream(String),

    #[error("device runs at {found} Hz, configuration needs {wanted} Hz")]
    UnsupportedSampleRate { found: u32, wanted: u32 },

    #[error("device has {found} channels, configuration needs {wanted}")]
    UnsupportedChannels { found: u16, wanted: u16 },
}

#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Running capture stream; capture stops when this is dropped
pub struct DeviceInput {
    stream: Stream,
    device_info: AudioDeviceInfo,
}

impl DeviceInput {
    pub fn from_default_device(producer: RingProducer, sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(AudioError::NoDevice)?;

        Self::from_device(device, producer, sample_rate, channels)
    }

    pub fn from_device(
        device: Device,
        mut producer: RingProducer,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, AudioError> {
        let name = device.name().map_err(|e| AudioError::DeviceName(e.to_string()))?;

        let config = device
            .default_input_config()
            .map_err(|e| AudioError::DefaultConfig(e.to_string()))?;

        // The analysis resolution depends on the rate, so it is never resampled
        let found = config.sample_rate().0;
        if found != sample_rate {
            return Err(AudioError::UnsupportedSampleRate { found, wanted: sample_rate });
        }
        if config.channels() < channels {
            return Err(AudioError::UnsupportedChannels {
                found: config.channels(),
                wanted: channels,
            });
        }

        let stream_config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let device_info = AudioDeviceInfo {
            name,
            sample_rate,
            channels,
        };

        let mut scratch: Vec<f64> = Vec::new();
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    scratch.extend(data.iter().map(|&s| s as f64));
                    let written = producer.push(&scratch);
                    if written < scratch.len() {
                        log::warn!("capture overrun, dropped {} samples", scratch.len() - written);
                    }
                },
                move |err| {
                    log::error!("audio input error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::BuildStream(e.to_string()))?;

        Ok(Self { stream, device_info })
    }

    pub fn start(&self) -> Result<(), AudioError> {
        self.stream.play().map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    pub fn device_info(&self) -> &AudioDeviceInfo {
        &self.device_info
    }
}
