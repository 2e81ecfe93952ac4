//! File naming for stored media
//!
//! Stored files land at `<year>/<YYYY-MM-DD>-<id>-<originalName>` relative to
//! the media store root, with both date parts taken from `taken_date` in UTC.

use crate::models::{Media, MediaType};
use chrono::{DateTime, Datelike, Utc};
use url::Url;

/// Longest original name kept, in characters.
pub const MAX_NAME_CHARS: usize = 64;

const FORBIDDEN_CHARS: &[char] = &['/', '\\', '<', '>', ':', '"', '[', ']', '|', '?', '*'];

/// Replaces characters that are unsafe in file names with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if FORBIDDEN_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Extension (with the leading dot) of the last path segment of `url`, or
/// the default for the media type when there is none.
pub fn extension_for(url: &str, media_type: MediaType) -> String {
    let from_url = Url::parse(url).ok().and_then(|parsed| {
        let segment = parsed.path_segments()?.next_back()?.to_string();
        let index = segment.rfind('.')?;
        let extension = &segment[index..];
        (extension.len() > 1).then(|| extension.to_string())
    });

    from_url.unwrap_or_else(|| match media_type {
        MediaType::Video => ".mp4".to_string(),
        _ => ".jpg".to_string(),
    })
}

/// Derives the stored name from the title (or the id when the title is
/// blank) and the extension of the resolved URL.
///
/// The result is sanitized and at most [`MAX_NAME_CHARS`] characters; the
/// stem is shortened first so the extension survives.
pub fn original_name<T>(media: &Media<T>) -> String {
    let stem = if media.title.trim().is_empty() {
        media.id.as_str()
    } else {
        media.title.trim()
    };
    let stem = sanitize(stem);
    let extension = sanitize(&extension_for(&media.url, media.media_type));

    let extension_chars = extension.chars().count();
    if extension_chars >= MAX_NAME_CHARS {
        return format!("{}{}", stem, extension)
            .chars()
            .take(MAX_NAME_CHARS)
            .collect();
    }

    let stem: String = stem.chars().take(MAX_NAME_CHARS - extension_chars).collect();
    format!("{}{}", stem, extension)
}

fn taken_at(taken_date_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(taken_date_ms).unwrap_or_default()
}

/// `<year>/<YYYY-MM-DD>-<id>-<originalName>`, always `/`-separated.
pub fn relative_path<T>(media: &Media<T>) -> String {
    let taken = taken_at(media.taken_date);
    format!(
        "{}/{}-{}-{}",
        taken.year(),
        taken.format("%Y-%m-%d"),
        media.id,
        media.original_name
    )
}
