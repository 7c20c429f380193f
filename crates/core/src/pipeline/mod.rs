//! Pipeline context object tying every audio component together.
//!
//! ```text
//!  render thread                                    audio callback thread
//!  ┌──────────────────────┐   push    ┌──────────┐   pop   ┌──────────────┐
//!  │ AudioSourceSelector  │──────────►│RingBuffer│────────►│ OutputDriver │──► device
//!  │ (tone | decoder)     │           └──────────┘         └──────┬───────┘
//!  └─────────┬────────────┘                                       │
//!            │ mirror (production)          mirror (playback)     │
//!            ▼                                                    │
//!  ┌──────────────────────┐◄──────────────────────────────────────┘
//!  │ VisualizationSampler │──► snapshot once per frame ──► UniformBridge
//!  └──────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    decode::{BlockSource, StreamDecoder},
    output::{DriverState, OutputDriver},
    ring::{RingBuffer, RingProducer, Sample},
    source::{AudioSourceSelector, PlaybackMode},
    tone::ToneSource,
    visual::VisualizationSampler,
    AppConfig, MirrorPoint, Result,
};

/// Owns the ring, the visualization mirror, the source selector (and through
/// it the decoder session), and the output driver.
pub struct AudioPipeline {
    producer: RingProducer,
    mirror: Arc<VisualizationSampler>,
    selector: AudioSourceSelector,
    output: OutputDriver,
    mirror_point: MirrorPoint,
    produce_block: usize,
}

impl AudioPipeline {
    /// Builds a pipeline around an already chosen source. The output stream
    /// is not opened until [`start`](Self::start).
    pub fn new(config: &AppConfig, selector: AudioSourceSelector) -> Self {
        let (producer, consumer) = RingBuffer::new(config.audio.ring_capacity);
        let mirror = Arc::new(VisualizationSampler::new(config.visual.snapshot_len));
        let output = OutputDriver::new(&config.audio, consumer, Arc::clone(&mirror));

        Self {
            producer,
            mirror,
            selector,
            output,
            mirror_point: config.audio.mirror_point,
            produce_block: config.audio.produce_block,
        }
    }

    /// Pipeline driven by the sine tone.
    pub fn synthetic(config: &AppConfig) -> Self {
        let tone = ToneSource::from_config(&config.tone, config.audio.sample_rate);
        Self::new(config, AudioSourceSelector::synthetic(tone))
    }

    /// Pipeline driven by a decoded audio file. Failing to open the file is
    /// returned to the caller, which treats it as a startup failure.
    pub fn open_file(config: &AppConfig, path: &Path) -> Result<Self> {
        // Pipes and devices cannot seek; they loop by reopening instead.
        let regular = std::fs::metadata(path).map_or(true, |meta| meta.is_file());
        let decoder = if regular {
            StreamDecoder::open(path)?
        } else {
            StreamDecoder::open_sequential(path)?
        };
        let format = decoder.format();
        if format.sample_rate != config.audio.sample_rate {
            warn!(
                file_rate = format.sample_rate,
                output_rate = config.audio.sample_rate,
                "audio file sample rate differs from output rate, playback speed will be off"
            );
        }
        info!(path = %path.display(), ?format, "decoding audio file");
        Ok(Self::from_source(config, Box::new(decoder)))
    }

    /// Pipeline driven by any block source.
    pub fn from_source(config: &AppConfig, source: Box<dyn BlockSource>) -> Self {
        let selector = AudioSourceSelector::file_decoded(source, config.low_water_mark());
        Self::new(config, selector)
    }

    /// Starts the hardware output.
    pub fn start(&mut self) -> Result<()> {
        self.output.start()
    }

    pub fn mode(&self) -> PlaybackMode {
        self.selector.mode()
    }

    pub fn output_state(&self) -> DriverState {
        self.output.state()
    }

    pub fn selector(&self) -> &AudioSourceSelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut AudioSourceSelector {
        &mut self.selector
    }

    pub fn sampler(&self) -> &Arc<VisualizationSampler> {
        &self.mirror
    }

    /// Samples currently queued for the output callback.
    pub fn buffered(&self) -> usize {
        self.producer.used()
    }

    /// One production step on the render thread: decode a block if the ring
    /// is below its low-water mark, then push up to one production block of
    /// samples. Returns the number of samples pushed.
    pub fn produce_step(&mut self) -> usize {
        self.selector.top_up(self.producer.available_space());
        let mirror = match self.mirror_point {
            MirrorPoint::Production => Some(self.mirror.as_ref()),
            MirrorPoint::Playback => None,
        };
        self.selector
            .pump(&mut self.producer, mirror, self.produce_block)
    }

    /// Copies the current visualization snapshot into `out`.
    pub fn snapshot_into(&self, out: &mut Vec<Sample>) {
        self.mirror.snapshot_into(out);
    }

    /// Stops the output stream, then tears down the decoder session. The
    /// order keeps the callback from running against a half-destroyed
    /// pipeline. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.output.stop();
        self.selector.close_session();
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AudioPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioPipeline")
            .field("selector", &self.selector)
            .field("output", &self.output)
            .field("buffered", &self.buffered())
            .field("mirror_point", &self.mirror_point)
            .finish()
    }
}
