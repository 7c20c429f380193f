//! Boundary with the rendering collaborator.
//!
//! The GPU side (context creation, program linking, texture upload) lives
//! outside this crate. It receives one [`FrameUniforms`] per frame through
//! [`UniformSink`] and binds each field to the uniform of the same name.

use std::path::{Path, PathBuf};

use crate::{ring::Sample, Result, ShadedError};

pub const I_RESOLUTION: &str = "iResolution";
pub const I_TIME: &str = "iTime";
pub const I_MOUSE: &str = "iMouse";
pub const I_AUDIO: &str = "iAudio";
pub const I_AUDIO_SIZE: &str = "iAudioSize";

/// Everything a shader sees for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms<'a> {
    /// Surface size in pixels (`iResolution`).
    pub resolution: [f32; 2],
    /// Seconds since start (`iTime`).
    pub time: f32,
    /// Last pointer position in pixels (`iMouse`).
    pub mouse: [f32; 2],
    /// Visualization snapshot (`iAudio`), oldest sample first.
    pub audio: &'a [Sample],
}

impl FrameUniforms<'_> {
    /// Value for `iAudioSize`.
    pub fn audio_size(&self) -> i32 {
        self.audio.len() as i32
    }
}

/// Implemented by the renderer to receive per-frame uniforms.
pub trait UniformSink {
    fn upload(&mut self, uniforms: &FrameUniforms<'_>) -> Result<()>;
}

/// Fragment shader text loaded from disk.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub path: PathBuf,
    pub code: String,
}

impl ShaderSource {
    /// Reads a fragment shader. Unreadable or empty files are configuration
    /// errors.
    pub fn load(path: &Path) -> Result<Self> {
        let code = std::fs::read_to_string(path).map_err(|err| {
            ShadedError::config(format!("cannot read shader `{}`: {err}", path.display()))
        })?;
        if code.trim().is_empty() {
            return Err(ShadedError::config(format!(
                "shader `{}` is empty",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            code,
        })
    }
}

/// Owned copy of the most recent uniforms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformRecord {
    pub resolution: [f32; 2],
    pub time: f32,
    pub mouse: [f32; 2],
    pub audio: Vec<Sample>,
    pub audio_size: i32,
}

/// Sink that keeps the latest uniforms in memory instead of drawing. Used
/// when no GPU collaborator is attached.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    shader: Option<ShaderSource>,
    last: UniformRecord,
    frames: u64,
}

impl HeadlessRenderer {
    pub fn new(shader: ShaderSource) -> Self {
        Self {
            shader: Some(shader),
            ..Self::default()
        }
    }

    pub fn shader(&self) -> Option<&ShaderSource> {
        self.shader.as_ref()
    }

    pub fn last(&self) -> &UniformRecord {
        &self.last
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Peak absolute amplitude in the last uploaded snapshot.
    pub fn peak(&self) -> f32 {
        self.last
            .audio
            .iter()
            .fold(0.0_f32, |peak, sample| peak.max(sample.abs()))
    }
}

impl UniformSink for HeadlessRenderer {
    fn upload(&mut self, uniforms: &FrameUniforms<'_>) -> Result<()> {
        self.last.resolution = uniforms.resolution;
        self.last.time = uniforms.time;
        self.last.mouse = uniforms.mouse;
        self.last.audio.clear();
        self.last.audio.extend_from_slice(uniforms.audio);
        self.last.audio_size = uniforms.audio_size();
        self.frames += 1;
        Ok(())
    }
}
