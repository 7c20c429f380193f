//! CPAL-based realtime audio output.
//!
//! The device callback drains the ring buffer one mono sample per output
//! frame and duplicates it across the frame's channels. An empty ring is an
//! ordinary condition (underrun) and is answered with silence. The callback
//! never blocks, allocates, or logs.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};
use tracing::{debug, error, info};

use crate::{
    ring::RingConsumer, visual::VisualizationSampler, AudioConfig, MirrorPoint, Result,
    ShadedError,
};

/// Body of the real-time callback, independent of any device.
#[derive(Debug)]
pub struct PlaybackCallback {
    ring: RingConsumer,
    mirror: Option<Arc<VisualizationSampler>>,
    channels: usize,
}

impl PlaybackCallback {
    /// `mirror` is only set when samples are mirrored at playback time.
    pub fn new(
        ring: RingConsumer,
        mirror: Option<Arc<VisualizationSampler>>,
        channels: usize,
    ) -> Self {
        Self {
            ring,
            mirror,
            channels: channels.max(1),
        }
    }

    /// Fills an interleaved output buffer. Returns the number of frames that
    /// had to be filled with silence.
    pub fn fill(&mut self, data: &mut [f32]) -> usize {
        let mut underruns = 0;
        for frame in data.chunks_mut(self.channels) {
            match self.ring.pop() {
                Some(sample) => {
                    frame.fill(sample);
                    if let Some(mirror) = &self.mirror {
                        mirror.mirror(sample);
                    }
                }
                None => {
                    frame.fill(0.0);
                    underruns += 1;
                }
            }
        }
        underruns
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Stopped,
    Running,
}

/// Owns the hardware output stream. `Stopped → Running → Stopped`, once.
pub struct OutputDriver {
    config: StreamConfig,
    callback: Option<PlaybackCallback>,
    stream: Option<Stream>,
}

impl OutputDriver {
    /// Prepares a driver for the fixed output format in `config`. The
    /// device is not touched until [`start`](Self::start).
    pub fn new(
        config: &AudioConfig,
        ring: RingConsumer,
        mirror: Arc<VisualizationSampler>,
    ) -> Self {
        let mirror = (config.mirror_point == MirrorPoint::Playback).then_some(mirror);
        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: config
                .device_buffer_frames
                .map(BufferSize::Fixed)
                .unwrap_or(BufferSize::Default),
        };

        Self {
            callback: Some(PlaybackCallback::new(
                ring,
                mirror,
                stream_config.channels as usize,
            )),
            config: stream_config,
            stream: None,
        }
    }

    pub fn state(&self) -> DriverState {
        if self.stream.is_some() {
            DriverState::Running
        } else {
            DriverState::Stopped
        }
    }

    /// Opens the default output device and starts the stream.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let mut callback = self
            .callback
            .take()
            .ok_or_else(|| ShadedError::Device("output stream cannot be restarted".into()))?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| ShadedError::Device("no audio output device found".into()))?;

        info!(
            device = device
                .name()
                .unwrap_or_else(|_| "unknown".to_string())
                .as_str(),
            channels = self.config.channels,
            sample_rate = self.config.sample_rate.0,
            "using audio output device"
        );

        let stream = device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback.fill(data);
                },
                move |err| {
                    error!(error = %err, "audio output stream error");
                },
                None,
            )
            .map_err(|err| ShadedError::Device(format!("failed to build output stream: {err}")))?;

        stream
            .play()
            .map_err(|err| ShadedError::Device(format!("failed to start output stream: {err}")))?;

        debug!("audio output running");
        self.stream = Some(stream);
        Ok(())
    }

    /// Stops the stream. Once this returns the callback no longer runs.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                debug!(error = %err, "device refused to pause, dropping stream");
            }
            drop(stream);
            debug!("audio output stopped");
        }
    }
}

impl Drop for OutputDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for OutputDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputDriver")
            .field("channels", &self.config.channels)
            .field("sample_rate", &self.config.sample_rate.0)
            .field("state", &self.state())
            .finish()
    }
}
