use thiserror::Error;

/// Every way a transcript fetch can fail.
///
/// The first four variants describe a definitive state of the video or its
/// caption data. `Failed` covers everything else (transport errors, a page
/// without an API key, non-success responses from the player endpoint).
#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("Impossible to retrieve YouTube video ID from {0:?}")]
    InvalidIdentifier(String),

    #[error("Video {0} is unavailable")]
    VideoUnavailable(String),

    #[error("No transcript available for video {0}")]
    NoTranscriptAvailable(String),

    #[error("Malformed caption data: {0}")]
    MalformedCaptionData(String),

    #[error("{0}")]
    Failed(String),
}

impl TranscriptError {
    /// Whether retrying the same request can be expected to give the same answer.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, TranscriptError::Failed(_))
    }
}

pub type Result<T> = std::result::Result<T, TranscriptError>;
