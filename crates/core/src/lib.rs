//! Core library for the shaded audio-reactive shader viewer.
//!
//! The crate owns the real-time audio path: a tone generator or compressed
//! audio decoder feeds a lock-free ring buffer that the hardware output
//! callback drains, while a fixed-length visualization mirror is handed to
//! the renderer once per frame. Windowing and GPU work stay outside the crate
//! behind [`UniformSink`].

pub mod clock;
pub mod config;
pub mod decode;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod ring;
pub mod source;
pub mod tone;
pub mod visual;

pub use clock::{FrameClock, UniformBridge};
pub use config::{AppConfig, AudioConfig, MirrorPoint, ToneConfig, VisualConfig};
pub use decode::{BlockRead, BlockSource, FormatInfo, StreamDecoder};
pub use error::{DecodeError, Result, ShadedError};
pub use output::{DriverState, OutputDriver, PlaybackCallback};
pub use pipeline::AudioPipeline;
pub use render::{FrameUniforms, HeadlessRenderer, ShaderSource, UniformSink};
pub use ring::{RingBuffer, RingConsumer, RingProducer, Sample};
pub use source::{AudioSourceSelector, PlaybackMode};
pub use tone::ToneSource;
pub use visual::VisualizationSampler;
