use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use crate::content::mime::{classify, MediaKind};
use crate::content::node::ROOT_ID;
use crate::content::tree::MemoryTree;

/// Build a content tree mirroring the given directories.
///
/// Each root becomes a folder under the tree root; subdirectories become
/// folders and recognised media files become media nodes. Missing or
/// unreadable entries are logged and skipped.
pub fn scan(paths: &[PathBuf], root_name: &str) -> MemoryTree {
    let start = Instant::now();
    let tree = MemoryTree::new(root_name);
    let mut media = 0usize;
    let mut folders = 0usize;

    for root in paths {
        if !root.is_dir() {
            tracing::warn!("Scan path is not a directory, skipping: {}", root.display());
            continue;
        }
        let mut ids: HashMap<PathBuf, String> = HashMap::new();
        ids.insert(root.clone(), tree.add_folder(ROOT_ID, &display_name(root)));
        folders += 1;

        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Cannot access entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            let Some(parent) = path.parent().and_then(|p| ids.get(p)).cloned() else {
                continue;
            };
            if entry.file_type().is_dir() {
                ids.insert(path.to_path_buf(), tree.add_folder(&parent, &display_name(path)));
                folders += 1;
            } else if let Some((kind, mime)) = classify(path) {
                let id = tree.add_media(&parent, &title(path, kind), kind, mime);
                tracing::debug!("indexed {} -> {}", id, path.display());
                media += 1;
            }
        }
    }

    tracing::info!(
        "Scanned {} media files in {} folders in {:.1}s",
        media,
        folders,
        start.elapsed().as_secs_f64()
    );
    tree
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Photos keep their extension; audio and video use the bare file stem.
fn title(path: &Path, kind: MediaKind) -> String {
    match kind {
        MediaKind::Image => display_name(path),
        MediaKind::Video | MediaKind::Audio => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| display_name(path)),
    }
}
