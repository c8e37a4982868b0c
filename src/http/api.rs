//! `GET /api/{id}?str=...`: the web UI's browse endpoint.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use url::form_urlencoded;

use crate::content::node::{ResourceNode, ROOT_ID};
use crate::content::tree::{post_search, ChildQuery};
use crate::http::state::AppState;
use crate::http::view::{BrowsePage, FolderEntry, MediaEntry};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Access denied")]
    AccessDenied,
    #[error("Auth error")]
    AuthFailed,
    #[error("No such resource: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::AccessDenied | ApiError::AuthFailed => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}

/// Exactly one response per request: either a listing or a redirect.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowseOutcome {
    Page(BrowsePage),
    Redirect(String),
}

impl IntoResponse for BrowseOutcome {
    fn into_response(self) -> Response {
        match self {
            BrowseOutcome::Page(page) => Json(page).into_response(),
            BrowseOutcome::Redirect(location) => (
                StatusCode::FOUND,
                [(header::LOCATION, location), (header::CONTENT_TYPE, "text/html".to_string())],
            )
                .into_response(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiQuery {
    #[serde(rename = "str")]
    pub search: Option<String>,
}

pub async fn api_root(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<ApiQuery>,
) -> Result<BrowseOutcome, ApiError> {
    browse(&state, ROOT_ID, query.search.as_deref().unwrap_or(""), peer.ip())
}

pub async fn api_browse(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<ApiQuery>,
) -> Result<BrowseOutcome, ApiError> {
    let id = if id.is_empty() { ROOT_ID } else { id.as_str() };
    browse(&state, id, query.search.as_deref().unwrap_or(""), peer.ip())
}

/// List the children of `id` for `caller`.
///
/// Below a code-protected folder `search` is the entered code: a wrong code
/// fails with [`ApiError::AuthFailed`], a right one redirects to the guarded
/// target. Everywhere else it filters children by display name.
pub fn browse(state: &AppState, id: &str, search: &str, caller: IpAddr) -> Result<BrowseOutcome, ApiError> {
    if !state.api_filter.allowed(caller) {
        tracing::trace!("Denying api request from {}", caller);
        return Err(ApiError::AccessDenied);
    }
    tracing::debug!("Got an api request found id {}", id);

    let query = ChildQuery {
        search: Some(search).filter(|s| !s.is_empty()),
        ..ChildQuery::all(state.renderer.profile())
    };
    let mut children = state.tree.children(id, &query);

    if let Some(gate) = children
        .first()
        .and_then(|first| first.parent_id.as_deref())
        .and_then(|parent| state.tree.node(parent))
        .and_then(|parent| parent.code_gate)
    {
        if !gate.validate(search) {
            tracing::debug!("Wrong code entered for {} by {}", id, caller);
            return Err(ApiError::AuthFailed);
        }
        let target = gate.target();
        let location = if target.is_folder {
            format!("/browse/{}", encode(&target.id))
        } else {
            format!("/play/{}", encode(&target.id))
        };
        return Ok(BrowseOutcome::Redirect(location));
    }

    if !search.is_empty() {
        post_search(&mut children, search);
    }

    let control = state.renderer.has_connected_control_renderers() && state.control_allow.allowed(caller);
    let mut folders = Vec::new();
    let mut media = Vec::new();
    for node in &children {
        project(state, node, control, &mut folders, &mut media);
    }

    let (name, parent) = if id == ROOT_ID {
        (state.server_name.clone(), None)
    } else {
        let node = state.tree.node(id).ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        let parent = node.parent_id.as_deref().map(|p| format!("/api/{}", encode(p)));
        (escape(&node.display_name), parent)
    };

    Ok(BrowseOutcome::Page(BrowsePage {
        name,
        parent,
        folders,
        media,
        push: state.web_control,
    }))
}

fn project(
    state: &AppState,
    node: &ResourceNode,
    control: bool,
    folders: &mut Vec<FolderEntry>,
    media: &mut Vec<MediaEntry>,
) {
    let id = encode(&node.id);
    let name = escape(node.web_name());
    let thumbnail = format!("/thumb/{id}");

    if node.is_virtual_action() {
        media.push(MediaEntry {
            media: Some(format!("/raw/{id}")),
            enabled: Some(true),
            id,
            name,
            thumbnail,
        });
        return;
    }

    if node.is_folder() {
        folders.push(FolderEntry { path: format!("/api/{id}"), id, name, thumbnail });
        return;
    }

    let (link, enabled) = if state.renderer.can_render_directly(node) || node.is_resume() {
        (Some(format!("/raw/{id}")), Some(true))
    } else if control {
        (None, Some(false))
    } else {
        (None, None)
    };
    media.push(MediaEntry { id, name, thumbnail, media: link, enabled });
}

/// URL-safe form of a resource id.
pub fn encode(id: &str) -> String {
    form_urlencoded::byte_serialize(id.as_bytes()).collect()
}

fn escape(name: &str) -> String {
    html_escape::encode_safe(name).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_escapes_separators() {
        assert_eq!(encode("0$1 2"), "0%241+2");
    }

    #[test]
    fn escape_handles_markup() {
        assert_eq!(escape("<b>Tom & Jerry"), "&lt;b&gt;Tom &amp; Jerry");
    }
}
