use std::sync::LazyLock;

use regex::{Captures, Regex};

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(?:(amp|lt|gt|quot|apos|nbsp)|#(\d+));").unwrap());

/// Decode the HTML entities YouTube leaves in caption text, then trim.
///
/// All entities are replaced in one pass, so `&amp;#39;` becomes `&#39;`
/// rather than `'`. A numeric reference that is not a valid code point is
/// left as-is. `None` decodes to an empty string.
pub fn decode_html<'a>(html: impl Into<Option<&'a str>>) -> String {
    let Some(html) = html.into() else {
        return String::new();
    };

    ENTITY_RE
        .replace_all(html, |caps: &Captures| {
            if let Some(name) = caps.get(1) {
                return match name.as_str() {
                    "amp" => "&",
                    "lt" => "<",
                    "gt" => ">",
                    "quot" => "\"",
                    "apos" => "'",
                    _ => " ", // nbsp
                }
                .to_string();
            }
            caps[2]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .trim()
        .to_string()
}
