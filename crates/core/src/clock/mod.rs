use std::time::{Duration, Instant};

use crate::{
    pipeline::AudioPipeline,
    render::{FrameUniforms, UniformSink},
    ring::Sample,
    AppConfig, Result,
};

/// Surface size used until the windowing layer reports one.
pub const DEFAULT_RESOLUTION: [f32; 2] = [200.0, 200.0];

/// Elapsed time plus the latest input state reported by the windowing layer.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    pointer: [f32; 2],
    resolution: [f32; 2],
}

impl FrameClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            pointer: [0.0, 0.0],
            resolution: DEFAULT_RESOLUTION,
        }
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer = [x, y];
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.resolution = [width as f32, height as f32];
    }

    pub fn pointer(&self) -> [f32; 2] {
        self.pointer
    }

    pub fn resolution(&self) -> [f32; 2] {
        self.resolution
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Once-per-frame handoff from the audio domain to the renderer.
///
/// Each [`tick`](Self::tick) runs a few production steps so the ring stays
/// ahead of the output callback, then uploads time, pointer, and the current
/// snapshot. No locks are taken; the snapshot may be a frame stale.
#[derive(Debug)]
pub struct UniformBridge {
    clock: FrameClock,
    snapshot: Vec<Sample>,
    top_up_iterations: usize,
}

impl UniformBridge {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            clock: FrameClock::start(),
            snapshot: Vec::with_capacity(config.visual.snapshot_len),
            top_up_iterations: config.audio.top_up_iterations,
        }
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    /// Advances one rendered frame. Returns the elapsed time in seconds that
    /// was uploaded as `iTime`.
    pub fn tick(&mut self, pipeline: &mut AudioPipeline, sink: &mut dyn UniformSink) -> Result<f32> {
        let time = self.clock.elapsed().as_secs_f32();

        for _ in 0..self.top_up_iterations {
            pipeline.produce_step();
        }

        pipeline.snapshot_into(&mut self.snapshot);
        sink.upload(&FrameUniforms {
            resolution: self.clock.resolution(),
            time,
            mouse: self.clock.pointer(),
            audio: &self.snapshot,
        })?;
        Ok(time)
    }
}
