use std::sync::atomic::{AtomicUsize, Ordering};

use crate::content::mime;
use crate::content::node::ResourceNode;

/// Renderer capability negotiation, as needed by the browse API.
pub trait RendererCapabilities: Send + Sync {
    /// Profile name passed to the content tree when listing children.
    fn profile(&self) -> &str;

    /// Whether the requesting web renderer can play `node` without transcoding.
    fn can_render_directly(&self, node: &ResourceNode) -> bool;

    /// Whether any external renderer that accepts remote control is connected.
    fn has_connected_control_renderers(&self) -> bool;
}

/// Browser-based renderer: plays a fixed set of MIME types natively.
#[derive(Debug)]
pub struct BrowserRenderer {
    playable: Vec<&'static str>,
    control_renderers: AtomicUsize,
}

impl Default for BrowserRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserRenderer {
    pub fn new() -> Self {
        Self::with_mimes(mime::BROWSER_PLAYABLE.to_vec())
    }

    pub fn with_mimes(playable: Vec<&'static str>) -> Self {
        Self { playable, control_renderers: AtomicUsize::new(0) }
    }

    pub fn control_renderer_connected(&self) {
        self.control_renderers.fetch_add(1, Ordering::SeqCst);
    }

    pub fn control_renderer_disconnected(&self) {
        // Saturate at zero; a stray disconnect must not wrap the counter.
        let _ = self
            .control_renderers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

impl RendererCapabilities for BrowserRenderer {
    fn profile(&self) -> &str {
        "WebRender"
    }

    fn can_render_directly(&self, node: &ResourceNode) -> bool {
        node.mime().is_some_and(|m| self.playable.contains(&m))
    }

    fn has_connected_control_renderers(&self) -> bool {
        self.control_renderers.load(Ordering::SeqCst) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::mime::MediaKind;
    use crate::content::node::NodeKind;

    fn media(mime: &'static str) -> ResourceNode {
        ResourceNode {
            kind: NodeKind::Media { kind: MediaKind::Video, mime },
            ..ResourceNode::folder("1", Some("0".into()), "clip")
        }
    }

    #[test]
    fn mp4_plays_in_browser() {
        assert!(BrowserRenderer::new().can_render_directly(&media("video/mp4")));
    }

    #[test]
    fn matroska_does_not_play_in_browser() {
        assert!(!BrowserRenderer::new().can_render_directly(&media("video/x-matroska")));
    }

    #[test]
    fn folders_are_never_directly_renderable() {
        let folder = ResourceNode::folder("1", Some("0".into()), "dir");
        assert!(!BrowserRenderer::new().can_render_directly(&folder));
    }

    #[test]
    fn control_renderer_count_saturates_at_zero() {
        let r = BrowserRenderer::new();
        r.control_renderer_disconnected();
        assert!(!r.has_connected_control_renderers());
        r.control_renderer_connected();
        assert!(r.has_connected_control_renderers());
        r.control_renderer_disconnected();
        assert!(!r.has_connected_control_renderers());
    }
}
