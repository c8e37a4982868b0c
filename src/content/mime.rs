use std::path::Path;

/// MIME types a browser `<video>`/`<audio>`/`<img>` element plays without transcoding.
/// Used by the default web renderer to decide what is directly playable.
pub const BROWSER_PLAYABLE: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/ogg",
    "audio/mpeg",
    "audio/mp4",
    "audio/aac",
    "audio/ogg",
    "audio/wav",
    "audio/flac",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Media kind classification for discovered files.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

const EXTENSIONS: &[(&str, MediaKind, &str)] = &[
    ("mp4", MediaKind::Video, "video/mp4"),
    ("m4v", MediaKind::Video, "video/mp4"),
    ("mkv", MediaKind::Video, "video/x-matroska"),
    ("avi", MediaKind::Video, "video/x-msvideo"),
    ("mov", MediaKind::Video, "video/quicktime"),
    ("ts", MediaKind::Video, "video/MP2T"),
    ("m2ts", MediaKind::Video, "video/MP2T"),
    ("mpg", MediaKind::Video, "video/mpeg"),
    ("mpeg", MediaKind::Video, "video/mpeg"),
    ("wmv", MediaKind::Video, "video/x-ms-wmv"),
    ("ogv", MediaKind::Video, "video/ogg"),
    ("webm", MediaKind::Video, "video/webm"),
    ("mp3", MediaKind::Audio, "audio/mpeg"),
    ("flac", MediaKind::Audio, "audio/flac"),
    ("wav", MediaKind::Audio, "audio/wav"),
    ("m4a", MediaKind::Audio, "audio/mp4"),
    ("aac", MediaKind::Audio, "audio/aac"),
    ("ogg", MediaKind::Audio, "audio/ogg"),
    ("opus", MediaKind::Audio, "audio/ogg"),
    ("wma", MediaKind::Audio, "audio/x-ms-wma"),
    ("jpg", MediaKind::Image, "image/jpeg"),
    ("jpeg", MediaKind::Image, "image/jpeg"),
    ("png", MediaKind::Image, "image/png"),
    ("gif", MediaKind::Image, "image/gif"),
    ("webp", MediaKind::Image, "image/webp"),
    ("bmp", MediaKind::Image, "image/bmp"),
];

/// Classify a file path by its extension into a (MediaKind, MIME type) pair.
///
/// Returns `None` for unrecognized extensions. Extensions are matched case-insensitively.
pub fn classify(path: &Path) -> Option<(MediaKind, &'static str)> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(known, _, _)| *known == ext)
        .map(|&(_, kind, mime)| (kind, mime))
}
