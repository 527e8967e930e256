use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, TranscriptError};
use crate::http::{Fetch, HttpRequest, HttpResponse, ReqwestFetcher};
use crate::tracks::{CaptionTrack, select_track};
use crate::xml::parse_transcript_xml;
use crate::{FetchOptions, Transcript, TranscriptItem, extract_video_id};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""INNERTUBE_API_KEY":"([a-zA-Z0-9_-]+)""#).unwrap());

/// Pulls the InnerTube API key out of a watch page
pub type KeyExtractor = fn(&str) -> Option<String>;

/// Find `"INNERTUBE_API_KEY":"<key>"` in the watch page HTML
pub fn extract_api_key(html: &str) -> Option<String> {
    API_KEY_RE.captures(html).map(|caps| caps[1].to_string())
}

/// Endpoints, client identity and headers used to talk to YouTube
#[derive(Debug, Clone)]
pub struct InnertubeConfig {
    /// Watch page URL with a `{video_id}` placeholder
    pub watch_url: String,
    /// Player endpoint URL with an `{api_key}` placeholder
    pub player_url: String,
    pub client_name: String,
    pub client_version: String,
    pub user_agent: String,
    pub accept_language: String,
    pub key_extractor: KeyExtractor,
}

impl Default for InnertubeConfig {
    fn default() -> Self {
        Self {
            watch_url: "https://www.youtube.com/watch?v={video_id}".to_string(),
            player_url: "https://www.youtube.com/youtubei/v1/player?key={api_key}".to_string(),
            client_name: "ANDROID".to_string(),
            client_version: "19.30.36".to_string(),
            user_agent: USER_AGENT.to_string(),
            accept_language: ACCEPT_LANGUAGE.to_string(),
            key_extractor: extract_api_key,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    captions: Option<CaptionsData>,
    playability_status: Option<PlayabilityStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionsData {
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTracklistRenderer {
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

impl PlayerResponse {
    /// Advertised tracks that carry a URL
    fn caption_tracks(self) -> Vec<CaptionTrack> {
        self.captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default()
            .into_iter()
            .filter(|t| !t.base_url.is_empty())
            .collect()
    }

    fn playability_error(&self) -> Option<&str> {
        let status = self.playability_status.as_ref()?;
        if status.status.as_deref() != Some("ERROR") {
            return None;
        }
        Some(status.reason.as_deref().unwrap_or("unknown reason"))
    }
}

/// Runs the transcript pipeline over an injected `Fetch`
pub struct Transcriber<F: Fetch> {
    fetcher: F,
    config: InnertubeConfig,
}

impl Transcriber<ReqwestFetcher> {
    /// Transcriber over reqwest, with every request routed through `proxy` if given
    pub fn with_proxy(proxy: Option<&str>) -> Result<Self> {
        let fetcher = ReqwestFetcher::new(proxy).map_err(wrap)?;
        Ok(Self::new(fetcher, InnertubeConfig::default()))
    }
}

impl<F: Fetch> Transcriber<F> {
    pub fn new(fetcher: F, config: InnertubeConfig) -> Self {
        Self { fetcher, config }
    }

    /// Fetch the transcript of a video ID or URL, preferring `langs` in order.
    pub async fn fetch<S: AsRef<str>>(&self, video: &str, langs: &[S]) -> Result<Transcript> {
        let video_id = extract_video_id(video)?;
        self.run(&video_id, langs).await.map_err(|e| match e {
            PipelineError::Transcript(e) => e,
            PipelineError::Other(e) => wrap(e),
        })
    }

    async fn run<S: AsRef<str>>(&self, video_id: &str, langs: &[S]) -> std::result::Result<Transcript, PipelineError> {
        let html = self.fetch_watch_page(video_id).await?;

        let api_key = (self.config.key_extractor)(&html).ok_or_else(|| {
            TranscriptError::Failed("Could not extract YouTube API key from video page.".to_string())
        })?;
        debug!("Extracted InnerTube API key: {api_key}");

        let player = self.fetch_player(video_id, &api_key).await?;
        let unavailable = player.playability_error().map(str::to_string);
        let tracks = player.caption_tracks();

        let Some(track) = select_track(&tracks, langs) else {
            if let Some(reason) = unavailable {
                debug!("Player reports playability error for {video_id}: {reason}");
                return Err(TranscriptError::VideoUnavailable(video_id.to_string()).into());
            }
            return Err(TranscriptError::NoTranscriptAvailable(video_id.to_string()).into());
        };
        debug!(
            "Using caption track: lang={} kind={}",
            track.language_code,
            track.kind.as_deref().unwrap_or("manual")
        );

        let xml = self.fetch_caption_xml(&track.base_url).await?;
        let items = parse_transcript_xml(&xml)?;

        Ok(Transcript {
            video_id: video_id.to_string(),
            language_code: track.language_code.clone(),
            is_generated: track.is_generated(),
            items,
        })
    }

    fn browser_request(&self, request: HttpRequest) -> HttpRequest {
        request
            .header("User-Agent", self.config.user_agent.as_str())
            .header("Accept-Language", self.config.accept_language.as_str())
    }

    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, PipelineError> {
        Ok(self.fetcher.fetch(self.browser_request(request)).await?)
    }

    async fn fetch_watch_page(&self, video_id: &str) -> std::result::Result<String, PipelineError> {
        let url = self.config.watch_url.replace("{video_id}", video_id);
        debug!("Fetching watch page: {url}");

        let resp = self.send(HttpRequest::get(url)).await?;
        if !resp.is_success() {
            debug!("Watch page returned {}", resp.status);
            return Err(TranscriptError::VideoUnavailable(video_id.to_string()).into());
        }
        Ok(resp.body)
    }

    async fn fetch_player(&self, video_id: &str, api_key: &str) -> std::result::Result<PlayerResponse, PipelineError> {
        let url = self.config.player_url.replace("{api_key}", api_key);
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": self.config.client_name,
                    "clientVersion": self.config.client_version
                }
            },
            "videoId": video_id
        });

        let request = HttpRequest::post(url, body.to_string()).header("Content-Type", "application/json");
        let resp = self.send(request).await?;
        if !resp.is_success() {
            return Err(TranscriptError::Failed(format!("Failed to fetch player data: {}", resp.status_text())).into());
        }

        Ok(serde_json::from_str(&resp.body)?)
    }

    async fn fetch_caption_xml(&self, url: &str) -> std::result::Result<String, PipelineError> {
        debug!("Fetching caption track: {url}");
        let resp = self.send(HttpRequest::get(url)).await?;
        if !resp.is_success() {
            debug!("Caption track returned {}", resp.status);
            return Err(TranscriptError::Failed("Failed to fetch transcript XML".to_string()).into());
        }
        Ok(resp.body)
    }
}

/// Failure inside the pipeline: already classified, or still to be wrapped
#[derive(Debug)]
enum PipelineError {
    Transcript(TranscriptError),
    Other(eyre::Report),
}

impl From<TranscriptError> for PipelineError {
    fn from(e: TranscriptError) -> Self {
        PipelineError::Transcript(e)
    }
}

impl From<eyre::Report> for PipelineError {
    fn from(e: eyre::Report) -> Self {
        PipelineError::Other(e)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Other(e.into())
    }
}

fn wrap(e: eyre::Report) -> TranscriptError {
    TranscriptError::Failed(format!("Failed to fetch transcript: {e}"))
}

/// Fetch the transcript of a YouTube video ID or URL.
///
/// Every request goes through `options.proxy` when set. Caption tracks are
/// chosen by `options.lang`, falling back to the first track available.
pub async fn fetch_transcript(video: &str, options: &FetchOptions) -> Result<Vec<TranscriptItem>> {
    let video_id = extract_video_id(video)?;
    let transcriber = Transcriber::with_proxy(options.proxy.as_deref())?;
    let transcript = transcriber.fetch(&video_id, options.lang.as_slice()).await?;
    Ok(transcript.items)
}
