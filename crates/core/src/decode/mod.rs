//! Compressed audio decoding via Symphonia.
//!
//! [`StreamDecoder`] opens a file, reports its native format, and hands out
//! successive blocks of mono samples. Stereo input is downmixed by averaging
//! the two channels; layouts with more than two channels are rejected.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::{ring::Sample, DecodeError};

/// Native format negotiated when a stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub sample_rate: u32,
    pub channels: usize,
}

/// Outcome of a successful block read.
#[derive(Debug, PartialEq)]
pub enum BlockRead<'a> {
    /// Mono samples, valid until the next call on the source.
    Samples(&'a [Sample]),
    /// The stream is exhausted; call [`BlockSource::seek_to_start`] to loop.
    EndOfStream,
}

/// A rewindable producer of mono sample blocks. [`StreamDecoder`] is the
/// production implementation.
pub trait BlockSource {
    fn format(&self) -> FormatInfo;

    fn read_block(&mut self) -> Result<BlockRead<'_>, DecodeError>;

    fn seek_to_start(&mut self) -> Result<(), DecodeError>;
}

struct Scratch {
    buffer: SampleBuffer<f32>,
    spec: SignalSpec,
}

/// Decoder session for a single audio file.
pub struct StreamDecoder {
    path: PathBuf,
    sequential: bool,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: FormatInfo,
    scratch: Option<Scratch>,
    block: Vec<Sample>,
}

impl StreamDecoder {
    /// Opens `path` and prepares a decoder for its first audio track.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        Self::open_with(path.as_ref(), false)
    }

    /// Like [`open`](Self::open), but reads the file as a forward-only
    /// stream (named pipes, devices). Rewinding such a stream reopens it.
    pub fn open_sequential(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        Self::open_with(path.as_ref(), true)
    }

    fn open_with(path: &Path, sequential: bool) -> Result<Self, DecodeError> {
        let path = path.to_path_buf();
        let (reader, decoder, track_id, format) = open_stream(&path, sequential)?;

        debug!(
            path = %path.display(),
            sequential,
            sample_rate = format.sample_rate,
            channels = format.channels,
            "opened audio stream"
        );

        Ok(Self {
            path,
            sequential,
            reader,
            decoder,
            track_id,
            format,
            scratch: None,
            block: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reopen(&mut self) -> Result<(), DecodeError> {
        let (reader, decoder, track_id, format) = open_stream(&self.path, self.sequential)?;
        self.reader = reader;
        self.decoder = decoder;
        self.track_id = track_id;
        self.format = format;
        Ok(())
    }
}

impl BlockSource for StreamDecoder {
    fn format(&self) -> FormatInfo {
        self.format
    }

    fn read_block(&mut self) -> Result<BlockRead<'_>, DecodeError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(BlockRead::EndOfStream);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(err) => return Err(DecodeError::Read(err.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    debug!(reason, "skipping corrupt audio packet");
                    continue;
                }
                Err(err) => return Err(DecodeError::Read(err.to_string())),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            let reusable = self
                .scratch
                .as_ref()
                .map(|scratch| {
                    scratch.spec == spec
                        && scratch.buffer.capacity() >= decoded.frames() * channels
                })
                .unwrap_or(false);
            if !reusable {
                self.scratch = Some(Scratch {
                    buffer: SampleBuffer::new(decoded.capacity() as u64, spec),
                    spec,
                });
            }

            let Some(scratch) = self.scratch.as_mut() else {
                continue;
            };
            scratch.buffer.copy_interleaved_ref(decoded);
            downmix_into(scratch.buffer.samples(), channels, &mut self.block)?;
            return Ok(BlockRead::Samples(&self.block));
        }
    }

    fn seek_to_start(&mut self) -> Result<(), DecodeError> {
        let target = SeekTo::TimeStamp {
            ts: 0,
            track_id: self.track_id,
        };
        match self.reader.seek(SeekMode::Accurate, target) {
            Ok(_) => {
                self.decoder.reset();
                Ok(())
            }
            Err(err) => {
                debug!(error = %err, "stream is not seekable, reopening");
                self.reopen()
                    .map_err(|reopen| DecodeError::Seek(format!("{err}; reopen failed: {reopen}")))
            }
        }
    }
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("path", &self.path)
            .field("sequential", &self.sequential)
            .field("track_id", &self.track_id)
            .field("format", &self.format)
            .finish()
    }
}

type OpenedStream = (Box<dyn FormatReader>, Box<dyn Decoder>, u32, FormatInfo);

fn open_stream(path: &Path, sequential: bool) -> Result<OpenedStream, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let source: Box<dyn MediaSource> = if sequential {
        Box::new(ReadOnlySource::new(file))
    } else {
        Box::new(file)
    };
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| DecodeError::UnsupportedFormat(err.to_string()))?;
    let reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;
    let params = track.codec_params.clone();
    let sample_rate = params.sample_rate.ok_or(DecodeError::MissingSampleRate)?;
    let channels = params.channels.map(|channels| channels.count()).unwrap_or(0);
    if !(1..=2).contains(&channels) {
        return Err(DecodeError::UnsupportedChannels(channels));
    }

    let decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|err| DecodeError::UnsupportedFormat(err.to_string()))?;

    Ok((
        reader,
        decoder,
        track_id,
        FormatInfo {
            sample_rate,
            channels,
        },
    ))
}

/// Converts interleaved samples into mono, replacing the contents of `out`.
/// Stereo frames become `(left + right) / 2`; mono passes through.
pub fn downmix_into(
    interleaved: &[Sample],
    channels: usize,
    out: &mut Vec<Sample>,
) -> Result<(), DecodeError> {
    out.clear();
    match channels {
        1 => out.extend_from_slice(interleaved),
        2 => out.extend(
            interleaved
                .chunks_exact(2)
                .map(|frame| (frame[0] + frame[1]) / 2.0),
        ),
        other => return Err(DecodeError::UnsupportedChannels(other)),
    }
    Ok(())
}
