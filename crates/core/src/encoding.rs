//! Character set detection for fetched pages.
//!
//! Japanese retail pages still ship in Shift_JIS and EUC-JP, and their
//! `Content-Type` headers are not always present. The charset is taken from,
//! in order: a byte-order mark, the `Content-Type` header, a `<meta>`
//! declaration near the top of the document, and finally a statistical guess.

use std::sync::LazyLock;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use regex::Regex;

static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_\-:.]+)"#).expect("valid meta charset regex")
});

static HEADER_CHARSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([a-z0-9_\-:.]+)"#).expect("valid header charset regex"));

/// How far into the document a `<meta charset>` is looked for.
const META_SCAN_BYTES: usize = 4096;

/// Decodes a response body to a string using [`detect_encoding`].
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = detect_encoding(bytes, content_type);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(encoding = used.name(), "body contained malformed sequences for detected encoding");
    }
    text.into_owned()
}

/// Picks the character encoding of a response body.
pub fn detect_encoding(bytes: &[u8], content_type: Option<&str>) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }

    if let Some(encoding) = content_type.and_then(|ct| label_encoding(&HEADER_CHARSET_RE, ct)) {
        return encoding;
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(META_SCAN_BYTES)]);
    if let Some(encoding) = label_encoding(&META_CHARSET_RE, &head) {
        return encoding;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

fn label_encoding(re: &Regex, haystack: &str) -> Option<&'static Encoding> {
    let label = re.captures(haystack)?.get(1)?.as_str();
    Encoding::for_label(label.as_bytes())
}
