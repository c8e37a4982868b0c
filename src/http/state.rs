use std::sync::Arc;

use crate::content::renderer::RendererCapabilities;
use crate::content::tree::ContentTree;
use crate::net::ip_filter::IpFilter;

/// Shared application state injected into all route handlers via axum::extract::State.
/// Every field is behind an Arc, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    pub tree: Arc<dyn ContentTree>,
    pub renderer: Arc<dyn RendererCapabilities>,
    /// Callers allowed to use the browse API.
    pub api_filter: Arc<IpFilter>,
    /// Callers allowed to push media to connected control renderers.
    pub control_allow: Arc<IpFilter>,
    /// Shown as the page name when browsing the root.
    pub server_name: String,
    /// Whether the web UI may expect push-style control updates.
    pub web_control: bool,
}
