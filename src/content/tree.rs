use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::content::mime::MediaKind;
use crate::content::node::{CodeGate, GuardedTarget, NodeKind, ResourceNode, ROOT_ID};

/// Parameters of a child listing.
#[derive(Debug, Clone, Copy)]
pub struct ChildQuery<'a> {
    /// Force (re)discovery of the children before listing them.
    pub deep: bool,
    pub offset: usize,
    /// `0` means no limit.
    pub limit: usize,
    /// Renderer profile the listing is prepared for.
    pub renderer: &'a str,
    /// Substring filter over display names; ignored below code-protected nodes.
    pub search: Option<&'a str>,
}

impl<'a> ChildQuery<'a> {
    pub fn all(renderer: &'a str) -> Self {
        Self { deep: true, offset: 0, limit: 0, renderer, search: None }
    }
}

/// The virtual content tree as seen by request handlers.
///
/// Implementations are shared between concurrent requests and must treat
/// lookups as read-mostly.
pub trait ContentTree: Send + Sync {
    /// Immediate children of `id` in tree order. Unknown ids yield an empty list.
    fn children(&self, id: &str, query: &ChildQuery<'_>) -> Vec<ResourceNode>;

    fn node(&self, id: &str) -> Option<ResourceNode>;
}

/// Drop every node whose display name does not contain `search`, ignoring case.
pub fn post_search(nodes: &mut Vec<ResourceNode>, search: &str) {
    let needle = search.to_lowercase();
    nodes.retain(|n| n.display_name.to_lowercase().contains(&needle));
}

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<String, ResourceNode>,
    children: HashMap<String, Vec<String>>,
    next_id: u64,
}

/// In-memory [`ContentTree`] with sequential ids. The root (`"0"`) always exists.
#[derive(Debug)]
pub struct MemoryTree {
    inner: RwLock<Inner>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new("Root")
    }
}

impl MemoryTree {
    pub fn new(root_name: &str) -> Self {
        let mut inner = Inner { next_id: 1, ..Inner::default() };
        inner
            .nodes
            .insert(ROOT_ID.to_string(), ResourceNode::folder(ROOT_ID, None, root_name));
        Self { inner: RwLock::new(inner) }
    }

    pub fn len(&self) -> usize {
        self.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    pub fn add_folder(&self, parent: &str, name: &str) -> String {
        self.insert(parent, NodeKind::Folder, name, |_| {})
    }

    pub fn add_media(&self, parent: &str, name: &str, kind: MediaKind, mime: &'static str) -> String {
        self.insert(parent, NodeKind::Media { kind, mime }, name, |_| {})
    }

    pub fn add_virtual_action(&self, parent: &str, name: &str) -> String {
        self.insert(parent, NodeKind::VirtualAction, name, |_| {})
    }

    /// Add a resumable play-state node for a media item.
    pub fn add_resume(
        &self,
        parent: &str,
        name: &str,
        resume_name: &str,
        kind: MediaKind,
        mime: &'static str,
    ) -> String {
        self.insert(parent, NodeKind::Media { kind, mime }, name, |n| {
            n.resume_name = Some(resume_name.to_string());
        })
    }

    /// Add a code-protected folder guarding `target`, with a single placeholder
    /// child that the UI shows as the code prompt.
    ///
    /// Returns `(gate id, placeholder id)`, or `None` when `target` is unknown.
    pub fn add_code_gate(&self, parent: &str, name: &str, code: &str, target: &str) -> Option<(String, String)> {
        let guarded = {
            let inner = self.read();
            let node = inner.nodes.get(target)?;
            GuardedTarget { id: node.id.clone(), is_folder: node.is_folder() }
        };
        let gate = Arc::new(CodeGate::new(code, guarded));
        let gate_id = self.insert(parent, NodeKind::Folder, name, |n| n.code_gate = Some(gate));
        let placeholder = self.insert(&gate_id, NodeKind::VirtualAction, "Enter code", |_| {});
        Some((gate_id, placeholder))
    }

    fn insert(&self, parent: &str, kind: NodeKind, name: &str, customize: impl FnOnce(&mut ResourceNode)) -> String {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id.to_string();
        inner.next_id += 1;
        let mut node = ResourceNode {
            id: id.clone(),
            parent_id: Some(parent.to_string()),
            kind,
            display_name: name.to_string(),
            resume_name: None,
            code_gate: None,
        };
        customize(&mut node);
        inner.nodes.insert(id.clone(), node);
        inner.children.entry(parent.to_string()).or_default().push(id.clone());
        id
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContentTree for MemoryTree {
    fn children(&self, id: &str, query: &ChildQuery<'_>) -> Vec<ResourceNode> {
        let inner = self.read();
        let Some(ids) = inner.children.get(id) else {
            return Vec::new();
        };
        let gated = inner.nodes.get(id).is_some_and(ResourceNode::is_code_protected);
        let take = if query.limit == 0 { usize::MAX } else { query.limit };
        let mut out: Vec<ResourceNode> = ids
            .iter()
            .filter_map(|child| inner.nodes.get(child))
            .skip(query.offset)
            .take(take)
            .cloned()
            .collect();
        if let Some(search) = query.search.filter(|s| !s.is_empty() && !gated) {
            post_search(&mut out, search);
        }
        out
    }

    fn node(&self, id: &str) -> Option<ResourceNode> {
        self.read().nodes.get(id).cloned()
    }
}
