use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::content::mime::MediaKind;

/// Identifier of the tree root. Browsing it reports the server name instead of a parent.
pub const ROOT_ID: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Media { kind: MediaKind, mime: &'static str },
    /// Synthetic entry that triggers a server-side action when "played".
    /// May have children in the tree but is never browsed as a folder.
    VirtualAction,
}

/// One entry of the virtual content tree, as handed out by a [`ContentTree`].
///
/// Nodes hold their parent as an id rather than a pointer; callers resolve it
/// through the tree when they need the parent itself.
///
/// [`ContentTree`]: crate::content::tree::ContentTree
#[derive(Debug, Clone)]
pub struct ResourceNode {
    /// Opaque id, stable for the lifetime of the tree.
    pub id: String,
    /// `None` only for the root.
    pub parent_id: Option<String>,
    pub kind: NodeKind,
    pub display_name: String,
    /// Set on resumable play-state nodes; shown instead of the display name.
    pub resume_name: Option<String>,
    /// Present when this node's children are hidden behind an access code.
    pub code_gate: Option<Arc<CodeGate>>,
}

impl ResourceNode {
    pub fn folder(id: impl Into<String>, parent_id: Option<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id,
            kind: NodeKind::Folder,
            display_name: name.into(),
            resume_name: None,
            code_gate: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_virtual_action(&self) -> bool {
        self.kind == NodeKind::VirtualAction
    }

    pub fn is_resume(&self) -> bool {
        self.resume_name.is_some()
    }

    pub fn is_code_protected(&self) -> bool {
        self.code_gate.is_some()
    }

    pub fn mime(&self) -> Option<&'static str> {
        match self.kind {
            NodeKind::Media { mime, .. } => Some(mime),
            _ => None,
        }
    }

    /// Name presented to the web UI: the resume name for play-state nodes,
    /// otherwise the display name.
    pub fn web_name(&self) -> &str {
        self.resume_name.as_deref().unwrap_or(&self.display_name)
    }
}

/// The resource a code gate unlocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedTarget {
    pub id: String,
    pub is_folder: bool,
}

/// Access-code state embedded in a code-protected folder.
///
/// Each attempt is stored and checked under one lock, so two callers
/// validating against the same gate can never observe each other's code.
pub struct CodeGate {
    code: String,
    target: GuardedTarget,
    state: Mutex<GateState>,
}

#[derive(Default)]
struct GateState {
    entered: String,
    attempts: u64,
}

impl CodeGate {
    pub fn new(code: impl Into<String>, target: GuardedTarget) -> Self {
        Self {
            code: code.into(),
            target,
            state: Mutex::new(GateState::default()),
        }
    }

    /// Record `attempt` as the entered code and report whether it unlocks the gate.
    pub fn validate(&self, attempt: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entered.clear();
        state.entered.push_str(attempt);
        state.attempts += 1;
        !self.code.is_empty() && state.entered == self.code
    }

    pub fn target(&self) -> &GuardedTarget {
        &self.target
    }

    pub fn attempts(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).attempts
    }
}

impl fmt::Debug for CodeGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeGate")
            .field("target", &self.target)
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> CodeGate {
        CodeGate::new(
            "1234",
            GuardedTarget { id: "7".into(), is_folder: true },
        )
    }

    #[test]
    fn wrong_code_is_rejected() {
        assert!(!gate().validate("0000"));
    }

    #[test]
    fn right_code_is_accepted() {
        assert!(gate().validate("1234"));
    }

    #[test]
    fn every_attempt_is_counted() {
        let g = gate();
        g.validate("1");
        g.validate("1234");
        assert_eq!(g.attempts(), 2);
    }

    #[test]
    fn empty_code_never_unlocks() {
        let g = CodeGate::new("", GuardedTarget { id: "7".into(), is_folder: false });
        assert!(!g.validate(""));
    }

    #[test]
    fn debug_output_hides_code() {
        let rendered = format!("{:?}", gate());
        assert!(!rendered.contains("1234"), "{rendered}");
    }

    #[test]
    fn concurrent_attempts_do_not_clobber_each_other() {
        let g = Arc::new(gate());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let g = Arc::clone(&g);
                std::thread::spawn(move || {
                    let attempt = if i % 2 == 0 { "1234" } else { "bad" };
                    (0..200).all(|_| g.validate(attempt) == (i % 2 == 0))
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(g.attempts(), 8 * 200);
    }
}
