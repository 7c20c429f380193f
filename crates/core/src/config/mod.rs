use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, ShadedError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub tone: ToneConfig,
    pub visual: VisualConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to their
    /// defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            ShadedError::config(format!("cannot read config `{}`: {err}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return Err(ShadedError::config("sample rate must be positive"));
        }
        if !(1..=2).contains(&audio.channels) {
            return Err(ShadedError::config(format!(
                "output must be mono or stereo, got {} channels",
                audio.channels
            )));
        }
        if audio.ring_capacity < 2 {
            return Err(ShadedError::config("ring capacity must be at least 2"));
        }
        if !(0.0..1.0).contains(&audio.low_water_ratio) {
            return Err(ShadedError::config("low-water ratio must be in [0, 1)"));
        }
        if audio.produce_block == 0 {
            return Err(ShadedError::config("production block must be non-empty"));
        }
        if self.tone.frequency <= 0.0 {
            return Err(ShadedError::config("tone frequency must be positive"));
        }
        let nyquist = audio.sample_rate as f32 / 2.0;
        if self.tone.frequency >= nyquist {
            return Err(ShadedError::config(format!(
                "tone frequency {} Hz must be below the Nyquist limit of {nyquist} Hz",
                self.tone.frequency
            )));
        }
        if !(0.0..=1.0).contains(&self.tone.amplitude) {
            return Err(ShadedError::config("tone amplitude must be in [0, 1]"));
        }
        if self.visual.snapshot_len == 0 {
            return Err(ShadedError::config("snapshot length must be positive"));
        }
        Ok(())
    }

    /// Ring free space (in samples) above which another block is decoded.
    pub fn low_water_mark(&self) -> usize {
        (self.audio.ring_capacity as f32 * self.audio.low_water_ratio) as usize
    }
}

/// Where produced audio is copied into the visualization mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorPoint {
    /// Mirror every sample as it is produced on the render thread.
    #[default]
    Production,
    /// Mirror every sample as the output callback plays it.
    Playback,
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub ring_capacity: usize,
    pub low_water_ratio: f32,
    pub produce_block: usize,
    pub top_up_iterations: usize,
    pub device_buffer_frames: Option<u32>,
    pub mirror_point: MirrorPoint,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            ring_capacity: 65_536,
            low_water_ratio: 0.2,
            produce_block: 1024,
            top_up_iterations: 5,
            device_buffer_frames: None,
            mirror_point: MirrorPoint::Production,
        }
    }
}

/// Synthetic tone parameters. The amplitude is kept low on purpose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    pub frequency: f32,
    pub amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            amplitude: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub snapshot_len: usize,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self { snapshot_len: 512 }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.audio.ring_capacity, 65_536);
        assert_eq!(config.visual.snapshot_len, 512);
        assert_eq!(config.low_water_mark(), 13_107);
    }

    #[test]
    fn loads_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "audio": {{ "ring_capacity": 4096, "mirror_point": "playback" }}, "visual": {{ "snapshot_len": 256 }} }}"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.audio.ring_capacity, 4096);
        assert_eq!(config.audio.mirror_point, MirrorPoint::Playback);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.visual.snapshot_len, 256);
        assert_eq!(config.tone, ToneConfig::default());
    }

    #[test]
    fn rejects_surround_output() {
        let mut config = AppConfig::default();
        config.audio.channels = 6;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ShadedError::Config(_)));
    }

    #[test]
    fn rejects_tone_above_nyquist() {
        let mut config = AppConfig::default();
        config.tone.frequency = 100_000.0;
        assert!(matches!(config.validate(), Err(ShadedError::Config(_))));

        config.tone.frequency = 22_050.0;
        assert!(config.validate().is_err());

        config.tone.frequency = 22_049.0;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_tiny_ring() {
        let mut config = AppConfig::default();
        config.audio.ring_capacity = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = AppConfig::load(Path::new("/nonexistent/shaded.json")).unwrap_err();
        assert!(matches!(err, ShadedError::Config(_)));
    }
}
