//! MIME type to format mapping.
//!
//! # Design Decisions
//! - Fixed table, no wildcards other than `*/*` in `Accept`
//! - MIME parameters (`; charset=...`) are ignored for lookup
//! - `Accept` entries are tried in descending q-value order, ties in header order

use thiserror::Error;

use super::Format;

/// MIME negotiation failures.
#[derive(Debug, Error)]
pub enum MimeError {
    #[error("unsupported MIME type {0:?}")]
    Unsupported(String),

    #[error("none of the accepted MIME types {0:?} is supported")]
    NotAcceptable(String),
}

/// MIME types the gateway knows how to map to formats.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "application/json",
    "application/x-yt-yson-binary",
    "application/x-yt-yson-text",
    "application/x-yt-yson-pretty",
    "application/octet-stream",
    "text/tab-separated-values",
    "text/x-tskv",
];

/// Map a bare MIME type to its format.
pub fn format_for_mime(mime: &str) -> Option<Format> {
    let format = match essence(mime).as_str() {
        "application/json" => Format::new("json"),
        "application/x-yt-yson-binary" => Format::new("yson").with_attribute("format", "binary"),
        "application/x-yt-yson-text" => Format::new("yson").with_attribute("format", "text"),
        "application/x-yt-yson-pretty" => Format::new("yson").with_attribute("format", "pretty"),
        "application/octet-stream" => Format::new("yson"),
        "text/tab-separated-values" => Format::new("dsv"),
        "text/x-tskv" => Format::new("dsv").with_attribute("line_prefix", "tskv"),
        _ => return None,
    };
    Some(format)
}

/// Format for a `Content-Type` header value.
pub fn format_for_content_type(value: &str) -> Result<Format, MimeError> {
    format_for_mime(value).ok_or_else(|| MimeError::Unsupported(value.to_string()))
}

/// Pick an output format from an `Accept` header value.
///
/// Returns `Ok(None)` when the client accepts anything (`*/*` wins before any
/// concrete supported type), in which case the command default applies.
pub fn negotiate_accept(value: &str) -> Result<Option<(Format, &'static str)>, MimeError> {
    let mut candidates: Vec<(f32, usize, String)> = value
        .split(',')
        .enumerate()
        .filter_map(|(position, entry)| {
            let mut parts = entry.split(';');
            let mime = parts.next()?.trim().to_ascii_lowercase();
            if mime.is_empty() {
                return None;
            }
            let quality = parts
                .filter_map(|param| param.trim().strip_prefix("q="))
                .filter_map(|q| q.trim().parse::<f32>().ok())
                .next()
                .unwrap_or(1.0);
            Some((quality, position, mime))
        })
        .filter(|(quality, _, _)| *quality > 0.0)
        .collect();

    if candidates.is_empty() {
        return Ok(None);
    }

    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    for (_, _, mime) in &candidates {
        if mime == "*/*" {
            return Ok(None);
        }
        if let Some(&known) = SUPPORTED_MIME_TYPES.iter().find(|known| **known == mime) {
            if let Some(format) = format_for_mime(known) {
                return Ok(Some((format, known)));
            }
        }
    }

    Err(MimeError::NotAcceptable(value.to_string()))
}

fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}
