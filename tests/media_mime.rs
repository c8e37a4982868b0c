use std::path::Path;
use mediafront::content::mime::{classify, MediaKind, BROWSER_PLAYABLE};

#[test]
fn test_mp4_classified_as_video() {
    let (kind, mime) = classify(Path::new("movie.mp4")).unwrap();
    assert_eq!(kind, MediaKind::Video);
    assert_eq!(mime, "video/mp4");
}

#[test]
fn test_subtitles_are_not_media() {
    assert!(classify(Path::new("movie.srt")).is_none());
}

#[test]
fn test_txt_returns_none() {
    assert!(classify(Path::new("readme.txt")).is_none());
}

#[test]
fn test_no_extension_returns_none() {
    assert!(classify(Path::new("Makefile")).is_none());
}

#[test]
fn test_case_insensitive() {
    assert!(classify(Path::new("MOVIE.MP4")).is_some());
}

#[test]
fn test_mp3_classified_as_audio() {
    let (kind, mime) = classify(Path::new("song.mp3")).unwrap();
    assert_eq!(kind, MediaKind::Audio);
    assert_eq!(mime, "audio/mpeg");
}

#[test]
fn test_jpeg_classified_as_image() {
    let (kind, mime) = classify(Path::new("photo.jpg")).unwrap();
    assert_eq!(kind, MediaKind::Image);
    assert_eq!(mime, "image/jpeg");
}

#[test]
fn test_browser_playability() {
    assert!(BROWSER_PLAYABLE.contains(&"video/mp4"));
    assert!(BROWSER_PLAYABLE.contains(&"audio/mpeg"));
    assert!(!BROWSER_PLAYABLE.contains(&"video/x-matroska"));
    assert!(!BROWSER_PLAYABLE.contains(&"video/x-msvideo"));
}

#[test]
fn test_every_playable_mime_is_classifiable() {
    let extensions = [
        "mp4", "webm", "ogv", "mp3", "m4a", "aac", "ogg",
        "wav", "flac", "jpg", "png", "gif", "webp",
    ];
    for mime in BROWSER_PLAYABLE {
        let known = extensions.iter().any(|ext| {
            let file = format!("x.{ext}");
            classify(Path::new(&file)).map(|(_, m)| m) == Some(*mime)
        });
        assert!(known, "{mime} has no extension");
    }
}
