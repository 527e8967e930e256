use log::debug;
use serde::Deserialize;

/// `kind` value YouTube uses for speech-recognition tracks
const ASR_KIND: &str = "asr";

/// One caption track advertised by the player response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    pub fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some(ASR_KIND)
    }
}

/// Pick the caption track to download.
///
/// Languages are tried in order; within a language a manual track beats an
/// auto-generated one. When nothing matches, the first track is used.
pub fn select_track<'a, S: AsRef<str>>(tracks: &'a [CaptionTrack], langs: &[S]) -> Option<&'a CaptionTrack> {
    for lang in langs {
        let lang = lang.as_ref();
        let matching = |generated: bool| {
            tracks
                .iter()
                .find(|t| t.language_code == lang && t.is_generated() == generated)
        };
        if let Some(track) = matching(false).or_else(|| matching(true)) {
            return Some(track);
        }
    }

    let fallback = tracks.first();
    if let Some(track) = fallback {
        debug!("No preferred language matched, falling back to {}", track.language_code);
    }
    fallback
}
