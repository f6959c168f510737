//! Fragment location
//!
//! A fragment is the smallest region of code that gets its own CFG: a method,
//! a lambda, an initializer block, or a field with an initializer.

use crate::tree::{NodeId, NodeKind, SourceTree, TreePath};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Method,
    Lambda,
    Initializer,
    FieldInitializer,
}

/// Path to the tree node that roots an analyzable fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fragment {
    path: TreePath,
    kind: FragmentKind,
}

impl Fragment {
    pub fn path(&self) -> &TreePath {
        &self.path
    }

    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    pub fn tree(&self) -> &Arc<SourceTree> {
        self.path.tree()
    }

    pub fn root(&self) -> NodeId {
        self.path.leaf()
    }

    /// The node whose evaluation the fragment's CFG models
    ///
    /// `None` only for methods without a body.
    pub fn body(&self) -> Option<NodeId> {
        match self.path.leaf_kind() {
            NodeKind::Method { body, .. } => *body,
            NodeKind::Lambda { body, .. } => Some(*body),
            NodeKind::Field { init, .. } => *init,
            NodeKind::Block { .. } => Some(self.root()),
            _ => None,
        }
    }

    pub fn has_body(&self) -> bool {
        self.body().is_some()
    }

    /// Human-readable name, e.g. `Test.f`, `Test.<clinit>`, `Test.lambda$12`
    pub fn name(&self) -> String {
        let class = self.path.enclosing_class().unwrap_or("<unit>");
        match self.path.leaf_kind() {
            NodeKind::Method { name, .. } | NodeKind::Field { name, .. } => format!("{class}.{name}"),
            NodeKind::Block { is_static: true, .. } => format!("{class}.<clinit>"),
            NodeKind::Block { .. } => format!("{class}.<init>"),
            _ => format!("{class}.lambda${}", self.root().0),
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Classify `node` given its parent, if it roots a fragment
fn classify(tree: &SourceTree, node: NodeId, parent: Option<NodeId>) -> Option<FragmentKind> {
    let parent_kind = parent.map(|p| tree.kind(p));
    match (tree.kind(node), parent_kind) {
        (NodeKind::Method { .. }, _) => Some(FragmentKind::Method),
        (NodeKind::Lambda { .. }, _) => Some(FragmentKind::Lambda),
        (NodeKind::Block { .. }, Some(NodeKind::Class { .. })) => Some(FragmentKind::Initializer),
        (NodeKind::Field { init: Some(_), .. }, Some(NodeKind::Class { .. })) => {
            Some(FragmentKind::FieldInitializer)
        }
        _ => None,
    }
}

/// Find the innermost fragment enclosing the leaf of `path`
///
/// Walks outward from the leaf. Methods are recognised at the leaf itself;
/// initializer blocks and initialized fields when their parent is a class; a
/// node whose parent is a lambda resolves to that lambda. Positions outside
/// every fragment (imports, class headers, class-level annotations) yield
/// `None`.
pub fn locate(path: &TreePath) -> Option<Fragment> {
    let tree = path.tree();
    let nodes = path.nodes();
    for depth in (1..=nodes.len()).rev() {
        let node = nodes[depth - 1];
        let parent = (depth > 1).then(|| nodes[depth - 2]);

        match tree.kind(node) {
            NodeKind::Method { .. } => {
                return Some(Fragment {
                    path: path.prefix(depth),
                    kind: FragmentKind::Method,
                })
            }
            NodeKind::Block { .. } | NodeKind::Field { .. } => {
                if let Some(kind) = classify(tree, node, parent) {
                    return Some(Fragment {
                        path: path.prefix(depth),
                        kind,
                    });
                }
            }
            _ => {}
        }

        if let Some(parent) = parent {
            if matches!(tree.kind(parent), NodeKind::Lambda { .. }) {
                return Some(Fragment {
                    path: path.prefix(depth - 1),
                    kind: FragmentKind::Lambda,
                });
            }
        }
    }
    None
}

/// Every fragment of the unit, in source order
pub fn fragments(tree: &Arc<SourceTree>) -> Vec<Fragment> {
    tree.descendants(tree.root())
        .into_iter()
        .filter_map(|id| {
            classify(tree, id, tree.parent(id)).map(|kind| Fragment {
                path: tree.path_to(id),
                kind,
            })
        })
        .collect()
}

/// Tree nodes belonging to `fragment`, in source order
///
/// Nested lambdas appear as single nodes; their bodies are separate fragments.
pub fn fragment_nodes(fragment: &Fragment) -> Vec<NodeId> {
    let tree = fragment.tree();
    let Some(body) = fragment.body() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut stack = vec![body];
    while let Some(id) = stack.pop() {
        out.push(id);
        if matches!(tree.kind(id), NodeKind::Lambda { .. }) {
            continue;
        }
        stack.extend(tree.kind(id).children().into_iter().rev());
    }
    out
}
