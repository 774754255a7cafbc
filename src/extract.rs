//! Recovers the telemetry object from a miner's HTTP response body.
//!
//! Most firmware answers with plain JSON, but some builds and reverse proxies
//! wrap it in an HTML page. Strategies are tried in order and the first one
//! that yields a JSON object wins:
//!
//! 1. the whole body as JSON,
//! 2. the text of `<pre>`, then `<code>`, then `<script>` elements,
//! 3. everything between the first `{` and the last `}` of the body.

use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use thiserror::Error;

const CONTAINER_TAGS: [&str; 3] = ["pre", "code", "script"];

static CONTAINERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    CONTAINER_TAGS
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{0}\b[^>]*>(.*?)</{0}\s*>", tag)).expect("valid regex"))
        .collect()
});
static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static BRACED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
static NUMERIC_ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,8})|([0-9]{1,10}));").expect("valid regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("response body is empty")]
    EmptyBody,
    #[error("no JSON object found in {0} byte response body")]
    NoPayload(usize),
}

pub type Record = Map<String, Value>;

pub fn extract(body: &[u8]) -> Result<Record, ExtractionError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ExtractionError::EmptyBody);
    }

    if let Ok(Value::Object(record)) = serde_json::from_slice::<Value>(body) {
        return Ok(record);
    }

    let text = String::from_utf8_lossy(body);

    if let Some(record) = from_containers(&text) {
        return Ok(record);
    }

    if let Some(record) = outermost_braces(&text).and_then(parse_object) {
        debug!("Recovered payload from the outermost braces of the body");
        return Ok(record);
    }

    Err(ExtractionError::NoPayload(body.len()))
}

fn from_containers(markup: &str) -> Option<Record> {
    for (tag, pattern) in CONTAINER_TAGS.iter().zip(CONTAINERS.iter()) {
        for element in pattern.captures_iter(markup) {
            let inner = match element.get(1) {
                Some(inner) => inner.as_str(),
                None => continue,
            };
            let text = decode_entities(&MARKUP.replace_all(inner, ""));
            if let Some(record) = BRACED.find(&text).and_then(|found| parse_object(found.as_str())) {
                debug!("Recovered payload from a <{}> element", tag);
                return Some(record);
            }
        }
    }
    None
}

fn outermost_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

fn parse_object(candidate: &str) -> Option<Record> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(record)) => Some(record),
        _ => None,
    }
}

fn decode_numeric_entities(text: &str) -> String {
    NUMERIC_ENTITY
        .replace_all(text, |caps: &Captures| {
            let code = match (caps.get(1), caps.get(2)) {
                (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
                (None, None) => None,
            };
            // surrogates and values past U+10FFFF stay as written
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entities(text: &str) -> String {
    // &amp; goes last so "&amp;lt;" decodes to "&lt;" and not "<"
    decode_numeric_entities(text)
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn plain_json_is_returned_unchanged() {
        let payload = json!({
            "hostname": "bitaxe",
            "hashRate": 512.25,
            "sharesRejectedReasons": [{"message": "Stale", "count": 2}],
            "nested": {"a": [1, 2, 3]}
        });
        let body = serde_json::to_vec(&payload).unwrap();

        assert_eq!(extract(&body).unwrap(), object(payload));
    }

    #[test]
    fn json_inside_pre_element() {
        let body = b"<html><body><pre>{\"a\":1}</pre></body></html>";
        assert_eq!(extract(body).unwrap(), object(json!({"a": 1})));
    }

    #[test]
    fn pre_wins_over_code() {
        let body = br#"<html><code>{"from": "code"}</code><pre style="x">{"from": "pre"}</pre></html>"#;
        assert_eq!(extract(body).unwrap(), object(json!({"from": "pre"})));
    }

    #[test]
    fn invalid_pre_falls_through_to_code() {
        let body = br#"<pre>{not json}</pre><code>{"hostname": "bitaxe"}</code>"#;
        assert_eq!(extract(body).unwrap(), object(json!({"hostname": "bitaxe"})));
    }

    #[test]
    fn escaped_and_highlighted_markup_is_unwrapped() {
        let body = b"<pre><span class=\"k\">{&quot;hostname&quot;: &quot;a&amp;b&quot;,\n \"temp\": 51}</span></pre>";
        assert_eq!(extract(body).unwrap(), object(json!({"hostname": "a&b", "temp": 51})));
    }

    #[test]
    fn json_assigned_in_script() {
        let body = br#"<html><head><script>
            window.__INFO__ = {"hostname": "bitaxe", "temp": 60.5};
        </script></head></html>"#;
        assert_eq!(extract(body).unwrap(), object(json!({"hostname": "bitaxe", "temp": 60.5})));
    }

    #[test]
    fn outermost_braces_are_the_last_resort() {
        let body = br#"HTTP debug dump: {"hostname": "bitaxe", "nested": {"x": 1}} -- end"#;
        assert_eq!(extract(body).unwrap(), object(json!({"hostname": "bitaxe", "nested": {"x": 1}})));
    }

    #[test]
    fn plain_text_is_an_extraction_error() {
        assert_eq!(extract(b"not json"), Err(ExtractionError::NoPayload(8)));
    }

    #[test]
    fn empty_body_is_an_extraction_error() {
        assert_eq!(extract(b""), Err(ExtractionError::EmptyBody));
        assert_eq!(extract(b" \r\n"), Err(ExtractionError::EmptyBody));
    }

    #[test]
    fn json_that_is_not_an_object_is_rejected() {
        assert_eq!(extract(b"[1, 2, 3]"), Err(ExtractionError::NoPayload(9)));
        assert_eq!(extract(b"} reversed {"), Err(ExtractionError::NoPayload(12)));
    }

    #[test]
    fn numeric_entities_are_decoded() {
        let body = br#"<pre>&#123;&#x22;hostname&#X22;: &#34;bitaxe&#x2d;1&#34;, "note": "&amp;#34; &#xD800;"&#125;</pre>"#;
        assert_eq!(extract(body).unwrap(), object(json!({"hostname": "bitaxe-1", "note": "&#34; &#xD800;"})));
    }
}
