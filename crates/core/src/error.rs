/// Result alias that carries the custom [`ShadedError`] type.
pub type Result<T> = std::result::Result<T, ShadedError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum ShadedError {
    /// Free-form context for failures that do not fit a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Missing or unusable startup configuration (shader file, CLI input,
    /// configuration values). Always fatal.
    #[error("configuration error: {0}")]
    Config(String),
    /// The hardware output stream could not be opened or started.
    #[error("audio device error: {0}")]
    Device(String),
    /// Compressed audio could not be opened or decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON configuration.
    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShadedError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a configuration error.
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}

/// Failures raised by the stream decoder. None of them are fatal once the
/// pipeline is running; the selector falls back to silence.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to open audio file `{path}`: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("no decodable audio track found")]
    NoAudioTrack,
    #[error("audio track does not report a sample rate")]
    MissingSampleRate,
    #[error("unsupported channel layout: {0} channels (mono or stereo only)")]
    UnsupportedChannels(usize),
    #[error("failed to decode audio: {0}")]
    Read(String),
    #[error("failed to seek audio stream: {0}")]
    Seek(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_convert_transparently() {
        let err: ShadedError = DecodeError::UnsupportedChannels(6).into();
        assert!(matches!(err, ShadedError::Decode(_)));
        assert_eq!(
            err.to_string(),
            "unsupported channel layout: 6 channels (mono or stereo only)"
        );
    }

    #[test]
    fn message_helper_wraps_text() {
        let err = ShadedError::msg(format!("context lost after {} frames", 3));
        assert!(matches!(&err, ShadedError::Message(text) if text == "context lost after 3 frames"));
        assert_eq!(err.to_string(), "context lost after 3 frames");
    }

    #[test]
    fn config_errors_carry_context() {
        let err = ShadedError::config("missing shader");
        assert_eq!(err.to_string(), "configuration error: missing shader");
    }
}
