use std::sync::LazyLock;

use log::debug;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use crate::TranscriptItem;
use crate::error::{Result, TranscriptError};
use crate::html::decode_html;

#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, text: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => text.push_str(t),
                Node::Element(el) => el.collect_text(text),
            }
        }
    }

    /// All elements named `name` below this one, in document order
    fn descendants(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if let Node::Element(el) = child {
                if el.name == name {
                    found.push(el);
                }
                el.collect_descendants(name, found);
            }
        }
    }
}

static NAMED_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap());

const XML_ENTITIES: [&str; 5] = ["amp", "lt", "gt", "quot", "apos"];

/// XML-unescape `raw`, keeping entities XML does not predefine (`&nbsp;`)
/// verbatim so decode_html sees them. A chunk quick-xml rejects stays raw.
fn unescape_lenient(raw: &str) -> String {
    fn push_unescaped(out: &mut String, chunk: &str) {
        match unescape(chunk) {
            Ok(text) => out.push_str(&text),
            Err(_) => out.push_str(chunk),
        }
    }

    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    for caps in NAMED_ENTITY_RE.captures_iter(raw) {
        let Some(entity) = caps.get(0) else { continue };
        if XML_ENTITIES.contains(&&caps[1]) {
            continue;
        }
        push_unescaped(&mut out, &raw[last..entity.start()]);
        out.push_str(entity.as_str());
        last = entity.end();
    }
    push_unescaped(&mut out, &raw[last..]);
    out
}

fn malformed(reason: impl Into<String>) -> TranscriptError {
    TranscriptError::MalformedCaptionData(reason.into())
}

fn element_from(start: &BytesStart) -> Result<Element> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(format!("bad attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = unescape_lenient(&String::from_utf8_lossy(&attr.value));
        attributes.push((key, value));
    }

    Ok(Element {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

/// Read the whole document into a tree rooted at a nameless document node.
fn parse_document(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Element::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(element_from(e)?),
            Ok(Event::Empty(ref e)) => {
                let el = element_from(e)?;
                attach(&mut stack, Node::Element(el));
            }
            Ok(Event::End(ref e)) => {
                if stack.len() < 2 {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    return Err(malformed(format!("unexpected closing tag </{name}>")));
                }
                if let Some(el) = stack.pop() {
                    attach(&mut stack, Node::Element(el));
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = unescape_lenient(&String::from_utf8_lossy(e));
                attach(&mut stack, Node::Text(text));
            }
            Ok(Event::CData(ref e)) => {
                attach(&mut stack, Node::Text(String::from_utf8_lossy(e).into_owned()));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(malformed(format!(
                    "error at position {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    if stack.len() > 1 {
        let name = stack.last().map(|el| el.name.clone()).unwrap_or_default();
        return Err(malformed(format!("unclosed element <{name}>")));
    }

    let document = stack.pop().unwrap_or_default();
    if !document.children.iter().any(|n| matches!(n, Node::Element(_))) {
        return Err(malformed("document has no root element"));
    }
    Ok(document)
}

/// Parse a finite number; anything else counts as absent
fn number(value: Option<&str>) -> Option<f64> {
    value?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// `<p t="ms" d="ms"><s>..</s></p>` (timedtext format 3)
fn paragraph_item(p: &Element) -> Option<TranscriptItem> {
    let start_ms = number(p.attr("t"))?;
    let duration_ms = number(p.attr("d")).unwrap_or(0.0);

    let sentences: String = p
        .descendants("s")
        .into_iter()
        .map(Element::text_content)
        .filter(|t| !t.trim().is_empty())
        .collect();
    let text = if sentences.is_empty() { p.text_content() } else { sentences };

    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    Some(TranscriptItem {
        text: decode_html(text),
        start: (start_ms / 1000.0).max(0.0),
        duration: (duration_ms / 1000.0).max(0.0),
    })
}

/// `<text start="s" dur="s">..</text>` (legacy transcript format)
fn flat_item(el: &Element) -> Option<TranscriptItem> {
    let start = number(el.attr("start"))?;
    let duration = number(el.attr("dur"))
        .or_else(|| number(el.attr("duration")))
        .unwrap_or(0.0);

    Some(TranscriptItem {
        text: decode_html(el.text_content().trim()),
        start: start.max(0.0),
        duration: duration.max(0.0),
    })
}

/// Parse caption XML in either the paragraph or the legacy `<text>` schema.
///
/// The paragraph schema wins whenever the document has any `<p>` element;
/// the two are never mixed. Paragraphs without text are dropped, `<text>`
/// elements without text are kept.
pub fn parse_transcript_xml(xml: &str) -> Result<Vec<TranscriptItem>> {
    let document = parse_document(xml)?;

    let paragraphs = document.descendants("p");
    let items: Vec<TranscriptItem> = if paragraphs.is_empty() {
        document
            .descendants("text")
            .into_iter()
            .filter_map(flat_item)
            .collect()
    } else {
        paragraphs.into_iter().filter_map(paragraph_item).collect()
    };

    debug!("Parsed {} caption segments", items.len());
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_schema() {
        let xml = r#"<transcript><p t="1000" d="2000"><s>Hello</s><s> World</s></p></transcript>"#;
        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Hello World");
        assert_eq!(items[0].start, 1.0);
        assert_eq!(items[0].duration, 2.0);
    }

    #[test]
    fn test_flat_schema() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?>
<transcript>
    <text start="0" dur="2.5">Hello World</text>
    <text start="2.5" dur="1.5">This is a test</text>
</transcript>"#;

        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "Hello World");
        assert_eq!(items[0].start, 0.0);
        assert_eq!(items[0].duration, 2.5);
        assert_eq!(items[1].text, "This is a test");
        assert_eq!(items[1].start, 2.5);
    }

    #[test]
    fn test_timedtext_format3_document() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><timedtext format="3">
<head><ws id="0"/></head>
<body>
<p t="160" d="2400" w="1"><s ac="0">so</s><s t="400" ac="0"> today</s></p>
<p t="2560" d="1200" w="1" a="1">
</p>
<p t="3000">we&amp;#39;re back</p>
</body>
</timedtext>"#;

        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "so today");
        assert!((items[0].start - 0.16).abs() < f64::EPSILON);
        assert!((items[0].duration - 2.4).abs() < f64::EPSILON);
        assert_eq!(items[1].text, "we're back");
        assert_eq!(items[1].start, 3.0);
        assert_eq!(items[1].duration, 0.0);
    }

    #[test]
    fn test_paragraph_without_start_skipped() {
        let xml = r#"<body><p d="100"><s>orphan</s></p><p t="0" d="100">kept</p></body>"#;
        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "kept");
    }

    #[test]
    fn test_whitespace_sentences_fall_back_to_paragraph_text() {
        let xml = r#"<body><p t="0" d="500"><s>  </s>fallback</p></body>"#;
        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items[0].text, "fallback");
    }

    #[test]
    fn test_paragraph_schema_takes_precedence() {
        let xml = r#"<root><text start="0" dur="1">flat</text><p t="0" d="1000">para</p></root>"#;
        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "para");
    }

    #[test]
    fn test_flat_schema_keeps_empty_text() {
        let xml = r#"<transcript><text start="1" dur="1"></text><text start="2" dur="1"/></transcript>"#;
        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.text.is_empty()));
        assert_eq!(items[1].start, 2.0);
    }

    #[test]
    fn test_flat_schema_duration_alias_and_default() {
        let xml = r#"<transcript>
<text start="1" duration="3">alias</text>
<text start="4">no duration</text>
<text dur="1">no start</text>
</transcript>"#;
        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].duration, 3.0);
        assert_eq!(items[1].duration, 0.0);
    }

    #[test]
    fn test_html_entities_decoded() {
        let xml = r#"<transcript>
    <text start="0.0" dur="1.0">it&amp;#39;s a &amp;quot;test&amp;quot;</text>
    <text start="1.0" dur="1.0">Tom &amp; Jerry&nbsp;show</text>
</transcript>"#;

        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items[0].text, "it's a \"test\"");
        assert_eq!(items[1].text, "Tom & Jerry show");
    }

    #[test]
    fn test_nbsp_does_not_change_decoding_of_other_entities() {
        let xml = r#"<transcript>
<text start="0" dur="1">it&amp;#39;s&nbsp;here</text>
<text start="1" dur="1">it&amp;#39;s here</text>
</transcript>"#;
        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items[0].text, "it's here");
        assert_eq!(items[1].text, "it's here");
    }

    #[test]
    fn test_unknown_entity_kept_in_paragraph() {
        let xml = r#"<body><p t="0" d="1000">&copy; Tom &amp; Jerry&nbsp;&lt;3</p></body>"#;
        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items[0].text, "&copy; Tom & Jerry <3");
    }

    #[test]
    fn test_unescape_lenient() {
        assert_eq!(unescape_lenient("a &amp; b"), "a & b");
        assert_eq!(unescape_lenient("x&nbsp;y &#65;"), "x&nbsp;y A");
        assert_eq!(unescape_lenient("Q&amp;A&hellip;"), "Q&A&hellip;");
        assert_eq!(unescape_lenient("plain"), "plain");
    }

    #[test]
    fn test_attribute_with_unknown_entity() {
        let xml = r#"<transcript><text start="1" dur="2" name="a&nbsp;b&amp;c">x</text></transcript>"#;
        let document = parse_document(xml).unwrap();
        let text = document.descendants("text")[0];
        assert_eq!(text.attr("name"), Some("a&nbsp;b&c"));
        assert_eq!(text.attr("dur"), Some("2"));
    }

    #[test]
    fn test_negative_duration_clamped() {
        let xml = r#"<transcript><text start="1" dur="-2">x</text></transcript>"#;
        let items = parse_transcript_xml(xml).unwrap();
        assert_eq!(items[0].duration, 0.0);
    }

    #[test]
    fn test_empty_transcript() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript></transcript>"#;
        assert!(parse_transcript_xml(xml).unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_tags_malformed() {
        let xml = r#"<transcript><text start="0">hi</transcript>"#;
        assert!(matches!(
            parse_transcript_xml(xml),
            Err(TranscriptError::MalformedCaptionData(_))
        ));
    }

    #[test]
    fn test_unclosed_root_malformed() {
        let xml = r#"<transcript><text start="0">hi</text>"#;
        assert!(matches!(
            parse_transcript_xml(xml),
            Err(TranscriptError::MalformedCaptionData(_))
        ));
    }

    #[test]
    fn test_non_xml_malformed() {
        assert!(matches!(
            parse_transcript_xml("<html><body>Sorry"),
            Err(TranscriptError::MalformedCaptionData(_))
        ));
        assert!(matches!(
            parse_transcript_xml(""),
            Err(TranscriptError::MalformedCaptionData(_))
        ));
    }
}
