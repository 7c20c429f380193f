//! Chooses where each produced sample comes from and pushes it downstream.

use std::collections::VecDeque;

use tracing::{info, warn};

use crate::{
    decode::{BlockRead, BlockSource},
    ring::{RingProducer, Sample},
    tone::ToneSource,
    visual::VisualizationSampler,
};

/// Which generator feeds the pipeline. Fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    Synthetic,
    FileDecoded,
}

/// Decoded-file feed: the owned decoder session plus a staging queue of mono
/// samples waiting to be pushed into the ring.
struct DecodedFeed {
    session: Option<Box<dyn BlockSource>>,
    staging: VecDeque<Sample>,
    low_water: usize,
    empty_loops: u32,
}

enum Feed {
    Synthetic(ToneSource),
    FileDecoded(DecodedFeed),
}

/// Per-sample switch between the tone generator and the decoded stream.
pub struct AudioSourceSelector {
    feed: Feed,
}

impl AudioSourceSelector {
    pub fn synthetic(tone: ToneSource) -> Self {
        Self {
            feed: Feed::Synthetic(tone),
        }
    }

    /// Builds a file-backed selector. Another block is decoded whenever the
    /// ring has more than `low_water` free slots.
    pub fn file_decoded(session: Box<dyn BlockSource>, low_water: usize) -> Self {
        Self {
            feed: Feed::FileDecoded(DecodedFeed {
                session: Some(session),
                staging: VecDeque::new(),
                low_water,
                empty_loops: 0,
            }),
        }
    }

    pub fn mode(&self) -> PlaybackMode {
        match self.feed {
            Feed::Synthetic(_) => PlaybackMode::Synthetic,
            Feed::FileDecoded(_) => PlaybackMode::FileDecoded,
        }
    }

    /// True once a decode failure has ended the file session.
    pub fn is_halted(&self) -> bool {
        matches!(&self.feed, Feed::FileDecoded(feed) if feed.session.is_none())
    }

    /// Number of decoded samples waiting to be produced.
    pub fn staged(&self) -> usize {
        match &self.feed {
            Feed::Synthetic(_) => 0,
            Feed::FileDecoded(feed) => feed.staging.len(),
        }
    }

    /// Whether [`produce_next`](Self::produce_next) has something meaningful
    /// to return. A live file session with an empty staging queue must wait
    /// for the next top-up instead of injecting silence mid-stream.
    pub fn can_produce(&self) -> bool {
        match &self.feed {
            Feed::Synthetic(_) => true,
            Feed::FileDecoded(feed) => feed.session.is_none() || !feed.staging.is_empty(),
        }
    }

    /// Returns the next sample for the active mode. A halted or starved file
    /// session yields silence.
    pub fn produce_next(&mut self) -> Sample {
        match &mut self.feed {
            Feed::Synthetic(tone) => tone.next_sample(),
            Feed::FileDecoded(feed) => feed.staging.pop_front().unwrap_or(0.0),
        }
    }

    /// Decodes one more block into the staging queue if the ring has room
    /// beyond the low-water mark once already staged samples are counted.
    /// Loops the stream at end-of-stream and halts the session on decode
    /// errors.
    pub fn top_up(&mut self, available_space: usize) {
        let Feed::FileDecoded(feed) = &mut self.feed else {
            return;
        };
        // Staged samples are already spoken for; the queue stays within one
        // block of the ring's free space.
        if available_space.saturating_sub(feed.staging.len()) <= feed.low_water {
            return;
        }
        let Some(session) = feed.session.as_mut() else {
            return;
        };

        let end_of_stream = match session.read_block() {
            Ok(BlockRead::Samples(samples)) => {
                feed.staging.extend(samples.iter().copied());
                if !samples.is_empty() {
                    feed.empty_loops = 0;
                }
                Ok(false)
            }
            Ok(BlockRead::EndOfStream) => Ok(true),
            Err(err) => Err(err.to_string()),
        };

        let failure = match end_of_stream {
            Ok(false) => None,
            Ok(true) => {
                feed.empty_loops += 1;
                if feed.empty_loops > 1 {
                    Some("stream produced no audio before looping".to_string())
                } else {
                    session.seek_to_start().err().map(|err| err.to_string())
                }
            }
            Err(reason) => Some(reason),
        };

        if let Some(reason) = failure {
            warn!(%reason, "audio decoding halted, continuing in silence");
            feed.session = None;
        }
    }

    /// Produces up to `max_samples` samples, pushing each into the ring and,
    /// when `mirror` is set, into the visualization mirror. Stops early when
    /// the ring is full or the staging queue runs dry. Returns the number of
    /// samples pushed.
    pub fn pump(
        &mut self,
        ring: &mut RingProducer,
        mirror: Option<&VisualizationSampler>,
        max_samples: usize,
    ) -> usize {
        let mut pushed = 0;
        while pushed < max_samples && ring.available_space() > 0 && self.can_produce() {
            let sample = self.produce_next();
            if !ring.push(sample) {
                break;
            }
            if let Some(mirror) = mirror {
                mirror.mirror(sample);
            }
            pushed += 1;
        }
        pushed
    }

    /// Replaces the file session, clearing any halted state and stale
    /// staged samples. Has no effect in synthetic mode.
    pub fn reopen(&mut self, session: Box<dyn BlockSource>) {
        if let Feed::FileDecoded(feed) = &mut self.feed {
            info!(format = ?session.format(), "reopened audio session");
            feed.session = Some(session);
            feed.staging.clear();
            feed.empty_loops = 0;
        }
    }

    /// Drops the decoder session. Production continues in silence.
    pub fn close_session(&mut self) {
        if let Feed::FileDecoded(feed) = &mut self.feed {
            feed.session = None;
            feed.staging.clear();
        }
    }
}

impl std::fmt::Debug for AudioSourceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSourceSelector")
            .field("mode", &self.mode())
            .field("halted", &self.is_halted())
            .field("staged", &self.staged())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{decode::FormatInfo, ring::RingBuffer, DecodeError};

    /// Scripted block source: replays `blocks`, then reports end-of-stream,
    /// optionally failing on a given read.
    pub(crate) struct ScriptedSource {
        pub blocks: Vec<Vec<Sample>>,
        pub position: usize,
        pub fail_on_read: Option<usize>,
        pub reads: usize,
    }

    impl ScriptedSource {
        pub(crate) fn new(blocks: Vec<Vec<Sample>>) -> Self {
            Self {
                blocks,
                position: 0,
                fail_on_read: None,
                reads: 0,
            }
        }
    }

    impl BlockSource for ScriptedSource {
        fn format(&self) -> FormatInfo {
            FormatInfo {
                sample_rate: 44_100,
                channels: 1,
            }
        }

        fn read_block(&mut self) -> Result<BlockRead<'_>, DecodeError> {
            self.reads += 1;
            if self.fail_on_read == Some(self.reads) {
                return Err(DecodeError::Read("corrupt frame".to_string()));
            }
            match self.blocks.get(self.position) {
                Some(block) => {
                    self.position += 1;
                    Ok(BlockRead::Samples(block))
                }
                None => Ok(BlockRead::EndOfStream),
            }
        }

        fn seek_to_start(&mut self) -> Result<(), DecodeError> {
            self.position = 0;
            Ok(())
        }
    }

    #[test]
    fn synthetic_mode_always_produces() {
        let mut selector = AudioSourceSelector::synthetic(ToneSource::default());
        let (mut ring, _consumer) = RingBuffer::new(64);
        let mirror = VisualizationSampler::new(16);

        assert_eq!(selector.mode(), PlaybackMode::Synthetic);
        assert_eq!(selector.pump(&mut ring, Some(&mirror), 32), 32);
        assert_eq!(ring.used(), 32);
        assert!(mirror.snapshot().iter().any(|sample| *sample != 0.0));
    }

    #[test]
    fn file_mode_waits_for_staged_samples() {
        let source = ScriptedSource::new(vec![vec![0.1, 0.2, 0.3]]);
        let mut selector = AudioSourceSelector::file_decoded(Box::new(source), 2);
        let (mut ring, mut consumer) = RingBuffer::new(16);

        assert!(!selector.can_produce());
        assert_eq!(selector.pump(&mut ring, None, 10), 0);

        selector.top_up(ring.available_space());
        assert_eq!(selector.staged(), 3);
        assert_eq!(selector.pump(&mut ring, None, 10), 3);

        let played: Vec<_> = std::iter::from_fn(|| consumer.pop()).collect();
        assert_eq!(played, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn skips_decoding_below_low_water() {
        let source = ScriptedSource::new(vec![vec![0.5; 4]]);
        let mut selector = AudioSourceSelector::file_decoded(Box::new(source), 8);

        selector.top_up(8);
        assert_eq!(selector.staged(), 0);
        selector.top_up(9);
        assert_eq!(selector.staged(), 4);
    }

    #[test]
    fn staging_stays_bounded_when_production_lags() {
        const RING: usize = 8192;
        const BLOCK: usize = 1152;
        let source = ScriptedSource::new(vec![vec![0.3; BLOCK]]);
        let mut selector = AudioSourceSelector::file_decoded(Box::new(source), RING / 5);
        let (mut ring, mut consumer) = RingBuffer::new(RING);

        // The callback drains a 60 fps frame's worth of audio while the render
        // thread only manages a few small pushes.
        for _ in 0..600 {
            for _ in 0..5 {
                selector.top_up(ring.available_space());
                selector.pump(&mut ring, None, 16);
            }
            for _ in 0..735 {
                consumer.pop();
            }
            assert!(
                selector.staged() <= RING + BLOCK,
                "staging grew to {}",
                selector.staged()
            );
        }
        assert!(!selector.is_halted());
    }

    #[test]
    fn counts_staged_samples_against_free_space() {
        let source = ScriptedSource::new(vec![vec![0.5; 4], vec![0.5; 4]]);
        let mut selector = AudioSourceSelector::file_decoded(Box::new(source), 8);

        selector.top_up(12);
        assert_eq!(selector.staged(), 4);
        // 12 free minus 4 staged leaves nothing above the mark.
        selector.top_up(12);
        assert_eq!(selector.staged(), 4);
        selector.top_up(13);
        assert_eq!(selector.staged(), 8);
    }

    #[test]
    fn loops_at_end_of_stream() {
        let source = ScriptedSource::new(vec![vec![0.1], vec![0.2]]);
        let mut selector = AudioSourceSelector::file_decoded(Box::new(source), 0);

        for _ in 0..5 {
            selector.top_up(100);
        }
        // Two blocks, end-of-stream (rewind), two more blocks.
        let staged: Vec<_> = (0..selector.staged()).map(|_| selector.produce_next()).collect();
        assert_eq!(staged, vec![0.1, 0.2, 0.1, 0.2]);
        assert!(!selector.is_halted());
    }

    #[test]
    fn empty_stream_halts_instead_of_spinning() {
        let source = ScriptedSource::new(Vec::new());
        let mut selector = AudioSourceSelector::file_decoded(Box::new(source), 0);

        selector.top_up(100);
        assert!(!selector.is_halted());
        selector.top_up(100);
        assert!(selector.is_halted());
    }

    #[test]
    fn decode_error_degrades_to_silence() {
        let mut source = ScriptedSource::new(vec![vec![0.4; 2], vec![0.4; 2]]);
        source.fail_on_read = Some(2);
        let mut selector = AudioSourceSelector::file_decoded(Box::new(source), 0);
        let (mut ring, mut consumer) = RingBuffer::new(8);

        selector.top_up(ring.available_space());
        selector.top_up(ring.available_space());
        assert!(selector.is_halted());

        // Staged audio drains first, then silence fills the remaining space.
        assert_eq!(selector.pump(&mut ring, None, 5), 5);
        let played: Vec<_> = std::iter::from_fn(|| consumer.pop()).collect();
        assert_eq!(played, vec![0.4, 0.4, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn reopen_recovers_halted_session() {
        let mut failing = ScriptedSource::new(vec![vec![0.9]]);
        failing.fail_on_read = Some(1);
        let mut selector = AudioSourceSelector::file_decoded(Box::new(failing), 0);
        selector.top_up(10);
        assert!(selector.is_halted());

        selector.reopen(Box::new(ScriptedSource::new(vec![vec![0.25]])));
        assert!(!selector.is_halted());
        selector.top_up(10);
        assert_eq!(selector.produce_next(), 0.25);
    }

    #[test]
    fn pump_respects_backpressure() {
        let mut selector = AudioSourceSelector::synthetic(ToneSource::default());
        let (mut ring, _consumer) = RingBuffer::new(8);
        assert_eq!(selector.pump(&mut ring, None, 100), 7);
        assert_eq!(selector.pump(&mut ring, None, 100), 0);
    }
}
