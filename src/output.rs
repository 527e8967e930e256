use eyre::Result;

use crate::TranscriptItem;

/// Render transcript as plain text (one segment per line, no timestamps)
pub fn render_text(items: &[TranscriptItem]) -> String {
    items
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render transcript as a pretty-printed JSON array of `{text, start, duration}`
pub fn render_json(items: &[TranscriptItem]) -> Result<String> {
    Ok(serde_json::to_string_pretty(items)?)
}

/// Render transcript as SubRip subtitles
pub fn render_srt(items: &[TranscriptItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                srt_timestamp(s.start),
                srt_timestamp(s.start + s.duration),
                s.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `HH:MM:SS,mmm`
fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let (hours, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (minutes, rem) = (rem / 60_000, rem % 60_000);
    let (secs, ms) = (rem / 1000, rem % 1000);
    format!("{hours:02}:{minutes:02}:{secs:02},{ms:03}")
}
