//! Projection of an extraction result into a labeled tree for display.
//!
//! The tree is rebuilt from scratch for every snapshot. A later snapshot may
//! revise earlier fields, so nothing is patched in place.

use serde::{Deserialize, Serialize};

use crate::schema::PartialExtractionResult;

pub const ROOT_ID: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// Labels used where the result has no text yet (or never will).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholders {
    pub root: &'static str,
    pub point: &'static str,
}

impl Placeholders {
    /// While the provider is still generating.
    pub const STREAMING: Placeholders = Placeholders {
        root: "Loading...",
        point: "Loading...",
    };
    /// After the stream has ended.
    pub const FINAL: Placeholders = Placeholders {
        root: "Untitled Document",
        point: "No content",
    };
}

fn label_or(text: Option<&str>, placeholder: &str) -> String {
    match text {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => placeholder.to_string(),
    }
}

/// Build the tree for `result`. Total: absent fields become placeholders or
/// empty child lists. Ids keep the original array index, so a sparse
/// `keyPoints` array still yields unique, stable ids.
pub fn project(result: &PartialExtractionResult, placeholders: Placeholders) -> Node {
    let children = result
        .key_points
        .iter()
        .flatten()
        .enumerate()
        .filter_map(|(i, slot)| slot.as_ref().map(|kp| (i, kp)))
        .map(|(i, kp)| Node {
            id: format!("point-{i}"),
            label: label_or(kp.point.as_deref(), placeholders.point),
            children: kp
                .context
                .iter()
                .flatten()
                .enumerate()
                .map(|(j, ctx)| Node::leaf(format!("context-{i}-{j}"), ctx.clone()))
                .collect(),
        })
        .collect();

    Node {
        id: ROOT_ID.to_string(),
        label: label_or(result.title.as_deref(), placeholders.root),
        children,
    }
}

impl Node {
    fn leaf(id: String, label: String) -> Self {
        Self {
            id,
            label,
            children: Vec::new(),
        }
    }

    /// The tree shown before anything has been generated.
    pub fn empty_root(placeholders: Placeholders) -> Self {
        Self::leaf(ROOT_ID.to_string(), placeholders.root.to_string())
    }

    /// Depth-first lookup by id.
    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(Node::leaf_count).sum()
        }
    }
}
