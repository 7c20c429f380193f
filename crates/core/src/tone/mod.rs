use std::f32::consts::TAU;

use crate::{ring::Sample, ToneConfig};

/// Sine oscillator used when no audio file is supplied.
#[derive(Debug, Clone)]
pub struct ToneSource {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    phase: f32,
    step: f32,
}

impl ToneSource {
    pub fn new(frequency: f32, amplitude: f32, sample_rate: u32) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate,
            phase: 0.0,
            step: TAU * frequency / sample_rate.max(1) as f32,
        }
    }

    pub fn from_config(config: &ToneConfig, sample_rate: u32) -> Self {
        Self::new(config.frequency, config.amplitude, sample_rate)
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Emits the next sample and advances the phase, keeping it in `[0, 2π)`.
    pub fn next_sample(&mut self) -> Sample {
        let sample = self.amplitude * self.phase.sin();
        self.phase = (self.phase + self.step).rem_euclid(TAU);
        // rem_euclid may round up to exactly TAU.
        if self.phase >= TAU {
            self.phase = 0.0;
        }
        sample
    }
}

impl Default for ToneSource {
    fn default() -> Self {
        Self::from_config(&ToneConfig::default(), 44_100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_amplitude() {
        let mut tone = ToneSource::default();
        for _ in 0..100_000 {
            assert!(tone.next_sample().abs() <= 0.1 + f32::EPSILON);
        }
    }

    #[test]
    fn zero_crossings_follow_frequency() {
        let mut tone = ToneSource::new(440.0, 0.1, 44_100);
        let samples: Vec<f32> = (0..44_100).map(|_| tone.next_sample()).collect();

        let crossings: Vec<usize> = samples
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| (pair[0] < 0.0) != (pair[1] < 0.0))
            .map(|(index, _)| index)
            .collect();

        let expected = 44_100.0 / (2.0 * 440.0);
        assert!(crossings.len() > 800);
        for pair in crossings.windows(2) {
            let interval = (pair[1] - pair[0]) as f32;
            assert!(
                (interval - expected).abs() <= 1.0,
                "crossing interval {interval} too far from {expected}"
            );
        }
    }

    #[test]
    fn phase_stays_wrapped_when_step_exceeds_full_turn() {
        let mut tone = ToneSource::new(100_000.0, 0.1, 44_100);
        for _ in 0..1000 {
            let sample = tone.next_sample();
            assert!(sample.abs() <= 0.1 + f32::EPSILON);
            assert!(
                (0.0..TAU).contains(&tone.phase),
                "phase left [0, 2pi): {}",
                tone.phase
            );
        }
    }

    #[test]
    fn reset_restarts_waveform() {
        let mut tone = ToneSource::default();
        let first: Vec<f32> = (0..16).map(|_| tone.next_sample()).collect();
        tone.reset();
        let again: Vec<f32> = (0..16).map(|_| tone.next_sample()).collect();
        assert_eq!(first, again);
    }
}
