//! JSON projection of a browse listing, as consumed by the web UI.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowsePage {
    pub name: String,
    /// Browse path of the parent; absent at the root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub folders: Vec<FolderEntry>,
    pub media: Vec<MediaEntry>,
    pub push: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
    pub thumbnail: String,
    pub path: String,
}

/// A playable (or greyed-out) entry.
///
/// `media` and `enabled` are both absent for items the caller can neither
/// play nor push to a control renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaEntry {
    pub id: String,
    pub name: String,
    pub thumbnail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}
