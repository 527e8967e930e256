pub mod config;
pub mod error;
pub mod html;
pub mod http;
pub mod output;
pub mod tracks;
pub mod xml;
pub mod youtube;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub use error::{Result, TranscriptError};
pub use html::decode_html;
pub use tracks::{CaptionTrack, select_track};
pub use xml::parse_transcript_xml;
pub use youtube::{InnertubeConfig, KeyExtractor, Transcriber, extract_api_key, fetch_transcript};

/// A single captioned segment, times in seconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptItem {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// Transcript together with the caption track it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub video_id: String,
    pub language_code: String,
    pub is_generated: bool,
    pub items: Vec<TranscriptItem>,
}

/// Options for a single transcript fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Proxy URL every request is routed through, e.g. `http://localhost:8080` or `socks5://host:9050`
    pub proxy: Option<String>,
    /// Language codes in descending priority
    pub lang: Vec<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            lang: vec!["en".to_string()],
        }
    }
}

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?|shorts|live)/|.*[?&]v=)|youtu\.be/)([^"&?/ ]{11})"#)
        .unwrap()
});

/// Extract video ID from various YouTube URL formats
///
/// Anything exactly 11 characters long is taken to be an ID already.
pub fn extract_video_id(input: &str) -> Result<String> {
    if input.chars().count() == 11 {
        return Ok(input.to_string());
    }

    VIDEO_ID_RE
        .captures(input)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| TranscriptError::InvalidIdentifier(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(input: &str) -> String {
        extract_video_id(input).unwrap()
    }

    #[test]
    fn test_bare_video_id() {
        assert_eq!(id("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_any_eleven_chars_pass_through() {
        assert_eq!(id("not a valid"), "not a valid");
        assert_eq!(id("ßßßßßßßßßßß"), "ßßßßßßßßßßß");
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_watch_url_with_extra_params() {
        assert_eq!(id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=120"), "dQw4w9WgXcQ");
        assert_eq!(
            id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_mobile_url() {
        assert_eq!(id("https://m.youtube.com/watch?v=dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_short_url() {
        assert_eq!(id("https://youtu.be/dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(id("https://youtu.be/dQw4w9WgXcQ?si=abc"), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_embed_url() {
        assert_eq!(id("https://www.youtube.com/embed/dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(id("https://www.youtube.com/e/dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(id("https://www.youtube.com/v/dQw4w9WgXcQ?version=3"), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_shorts_and_live_urls() {
        assert_eq!(id("https://www.youtube.com/shorts/dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(id("https://www.youtube.com/live/dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_nested_path_url() {
        assert_eq!(id("https://www.youtube.com/user/someone/dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            extract_video_id("https://www.google.com"),
            Err(TranscriptError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            extract_video_id("not-a-valid-id"),
            Err(TranscriptError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_video_id("").is_err());
    }

    #[test]
    fn test_default_options() {
        let options = FetchOptions::default();
        assert!(options.proxy.is_none());
        assert_eq!(options.lang, vec!["en".to_string()]);
    }
}
