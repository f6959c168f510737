//! Control Flow Graph over a single fragment
//!
//! Nodes are individual evaluations (one per expression, declaration or
//! control transfer), not basic blocks, so every expression of the fragment
//! has a program point before and after it. Edges carry an [`EdgeKind`] so
//! abrupt completions stay visible to edge-sensitive analyses.

use crate::tree::{BinOp, Literal, NodeId, UnaryOp};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CFG_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a built CFG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CfgId(u64);

impl CfgId {
    pub(crate) fn fresh() -> Self {
        CfgId(NEXT_CFG_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CfgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cfg{}", self.0)
    }
}

/// Index of a node within one [`Cfg`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CfgNodeId(pub u32);

impl CfgNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CfgNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// How control reaches the target of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Normal,
    /// Taken when the boolean source evaluated to true
    True,
    False,
    /// Source raised; carries the source's input store
    Exception,
    Break,
    Continue,
    Return,
}

impl EdgeKind {
    pub fn is_conditional(self) -> bool {
        matches!(self, EdgeKind::True | EdgeKind::False)
    }

    pub fn is_abrupt(self) -> bool {
        matches!(
            self,
            EdgeKind::Exception | EdgeKind::Break | EdgeKind::Continue | EdgeKind::Return
        )
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeKind::Normal => "normal",
            EdgeKind::True => "true",
            EdgeKind::False => "false",
            EdgeKind::Exception => "exception",
            EdgeKind::Break => "break",
            EdgeKind::Continue => "continue",
            EdgeKind::Return => "return",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgEdge {
    pub from: CfgNodeId,
    pub to: CfgNodeId,
    pub kind: EdgeKind,
}

/// What a CFG node evaluates
#[derive(Debug, Clone, PartialEq)]
pub enum CfgNodeKind {
    Entry,
    RegularExit,
    ExceptionalExit,
    /// Binding of a method or lambda parameter on entry
    Parameter { name: String },
    /// Local variable or field declaration; operand 0 is the initializer
    VarDecl { name: String },
    Literal(Literal),
    Ident { name: String },
    /// Operand 0 is the assigned value
    Assign { target: String },
    Binary { op: BinOp },
    Unary { op: UnaryOp },
    /// Merge of `c ? a : b`; operands are `[c, a, b]`
    Conditional,
    Call { callee: String },
    New { ty: String },
    /// Creation of a lambda value; its body is a separate fragment
    Lambda,
    Return,
    Throw,
    /// Handler entry binding the caught exception
    CatchParam { name: String, ty: String },
    LoopHead,
    /// Re-raise at the end of the exceptional copy of a finally block
    Rethrow,
}

impl CfgNodeKind {
    /// Nodes whose evaluation can raise
    pub fn can_throw(&self) -> bool {
        match self {
            CfgNodeKind::Call { .. } | CfgNodeKind::New { .. } | CfgNodeKind::Throw | CfgNodeKind::Rethrow => true,
            CfgNodeKind::Binary { op } => op.can_throw(),
            _ => false,
        }
    }
}

impl fmt::Display for CfgNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfgNodeKind::Entry => write!(f, "entry"),
            CfgNodeKind::RegularExit => write!(f, "exit"),
            CfgNodeKind::ExceptionalExit => write!(f, "exceptional-exit"),
            CfgNodeKind::Parameter { name } => write!(f, "param {name}"),
            CfgNodeKind::VarDecl { name } => write!(f, "decl {name}"),
            CfgNodeKind::Literal(Literal::Int(v)) => write!(f, "lit {v}"),
            CfgNodeKind::Literal(Literal::Bool(v)) => write!(f, "lit {v}"),
            CfgNodeKind::Literal(Literal::Str(s)) => write!(f, "lit {s:?}"),
            CfgNodeKind::Literal(Literal::Null) => write!(f, "lit null"),
            CfgNodeKind::Ident { name } => write!(f, "ident {name}"),
            CfgNodeKind::Assign { target } => write!(f, "assign {target}"),
            CfgNodeKind::Binary { op } => write!(f, "binary {}", op.symbol()),
            CfgNodeKind::Unary { op } => write!(f, "unary {}", op.symbol()),
            CfgNodeKind::Conditional => write!(f, "conditional"),
            CfgNodeKind::Call { callee } => write!(f, "call {callee}"),
            CfgNodeKind::New { ty } => write!(f, "new {ty}"),
            CfgNodeKind::Lambda => write!(f, "lambda"),
            CfgNodeKind::Return => write!(f, "return"),
            CfgNodeKind::Throw => write!(f, "throw"),
            CfgNodeKind::CatchParam { name, ty } => write!(f, "catch {ty} {name}"),
            CfgNodeKind::LoopHead => write!(f, "loop-head"),
            CfgNodeKind::Rethrow => write!(f, "rethrow"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CfgNode {
    pub id: CfgNodeId,
    pub kind: CfgNodeKind,
    /// Tree node this node evaluates, if any
    pub tree: Option<NodeId>,
    /// CFG nodes whose values this node consumes, in evaluation order
    pub operands: SmallVec<[CfgNodeId; 2]>,
    pub(crate) succs: SmallVec<[usize; 2]>,
    pub(crate) preds: SmallVec<[usize; 2]>,
}

/// Immutable control-flow graph of one fragment
#[derive(Debug)]
pub struct Cfg {
    pub(crate) id: CfgId,
    pub(crate) label: String,
    pub(crate) nodes: Vec<CfgNode>,
    pub(crate) edges: Vec<CfgEdge>,
    pub(crate) entry: CfgNodeId,
    pub(crate) regular_exit: CfgNodeId,
    pub(crate) exceptional_exit: CfgNodeId,
    /// Tree node → CFG nodes; the first entry is canonical
    pub(crate) tree_nodes: IndexMap<NodeId, SmallVec<[CfgNodeId; 1]>>,
    pub(crate) rpo_rank: Vec<usize>,
    pub(crate) free_variables: Vec<String>,
}

impl Cfg {
    pub fn id(&self) -> CfgId {
        self.id
    }

    /// Name of the fragment this graph models
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn entry(&self) -> CfgNodeId {
        self.entry
    }

    pub fn regular_exit(&self) -> CfgNodeId {
        self.regular_exit
    }

    pub fn exceptional_exit(&self) -> CfgNodeId {
        self.exceptional_exit
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: CfgNodeId) -> &CfgNode {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[CfgNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[CfgEdge] {
        &self.edges
    }

    pub fn successors(&self, id: CfgNodeId) -> impl Iterator<Item = &CfgEdge> + '_ {
        self.nodes[id.index()].succs.iter().map(move |&e| &self.edges[e])
    }

    pub fn predecessors(&self, id: CfgNodeId) -> impl Iterator<Item = &CfgEdge> + '_ {
        self.nodes[id.index()].preds.iter().map(move |&e| &self.edges[e])
    }

    /// Canonical CFG node for a tree node
    pub fn node_for(&self, tree: NodeId) -> Option<CfgNodeId> {
        self.tree_nodes.get(&tree).and_then(|ids| ids.first().copied())
    }

    /// Every CFG node built for a tree node (more than one inside duplicated
    /// finally blocks)
    pub fn nodes_for(&self, tree: NodeId) -> &[CfgNodeId] {
        self.tree_nodes.get(&tree).map(|ids| ids.as_slice()).unwrap_or(&[])
    }

    /// Parameter names bound on entry, in declaration order
    pub fn parameters(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                CfgNodeKind::Parameter { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every variable name the fragment binds, reads or assigns
    pub fn variables(&self) -> BTreeSet<&str> {
        self.nodes.iter().filter_map(|n| variable_of(&n.kind)).collect()
    }

    /// Names read or assigned but never declared in this fragment: fields,
    /// and locals a lambda captures from its enclosing method
    pub fn free_variables(&self) -> &[String] {
        &self.free_variables
    }

    /// Position of a node in reverse postorder; unreachable nodes rank last
    pub fn rpo_rank(&self, id: CfgNodeId) -> usize {
        self.rpo_rank[id.index()]
    }

    /// Nodes reachable from the entry in reverse postorder (useful for forward
    /// dataflow)
    pub fn reverse_postorder(&self) -> Vec<CfgNodeId> {
        let mut postorder = self.postorder();
        postorder.reverse();
        postorder
    }

    /// Reachable nodes in postorder
    pub fn postorder(&self) -> Vec<CfgNodeId> {
        let mut visited = HashSet::new();
        let mut postorder = Vec::new();
        // Iterative DFS; deep fragments would overflow a recursive walk
        let mut stack: Vec<(CfgNodeId, usize)> = vec![(self.entry, 0)];
        visited.insert(self.entry);
        while let Some((node, next)) = stack.pop() {
            let succs = &self.nodes[node.index()].succs;
            if next < succs.len() {
                stack.push((node, next + 1));
                let to = self.edges[succs[next]].to;
                if visited.insert(to) {
                    stack.push((to, 0));
                }
            } else {
                postorder.push(node);
            }
        }
        postorder
    }

    pub(crate) fn compute_rpo_rank(&mut self) {
        let mut rank = vec![usize::MAX; self.nodes.len()];
        for (i, id) in self.reverse_postorder().into_iter().enumerate() {
            rank[id.index()] = i;
        }
        self.rpo_rank = rank;
    }

    pub(crate) fn compute_free_variables(&mut self) {
        let mut declared = HashSet::new();
        let mut used = BTreeSet::new();
        for node in &self.nodes {
            match &node.kind {
                CfgNodeKind::Parameter { name }
                | CfgNodeKind::VarDecl { name }
                | CfgNodeKind::CatchParam { name, .. } => {
                    declared.insert(name.as_str());
                }
                CfgNodeKind::Ident { name } | CfgNodeKind::Assign { target: name } => {
                    used.insert(name.as_str());
                }
                _ => {}
            }
        }
        let free: Vec<String> = used
            .into_iter()
            .filter(|name| !declared.contains(name))
            .map(str::to_string)
            .collect();
        self.free_variables = free;
    }
}

fn variable_of(kind: &CfgNodeKind) -> Option<&str> {
    match kind {
        CfgNodeKind::Parameter { name }
        | CfgNodeKind::VarDecl { name }
        | CfgNodeKind::CatchParam { name, .. }
        | CfgNodeKind::Ident { name }
        | CfgNodeKind::Assign { target: name } => Some(name.as_str()),
        _ => None,
    }
}

impl fmt::Display for Cfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} nodes)", self.label, self.nodes.len())?;
        for node in &self.nodes {
            write!(f, "  {} {}", node.id, node.kind)?;
            if !node.operands.is_empty() {
                let ops: Vec<String> = node.operands.iter().map(|o| o.to_string()).collect();
                write!(f, " [{}]", ops.join(", "))?;
            }
            let succs: Vec<String> = node
                .succs
                .iter()
                .map(|&e| {
                    let edge = &self.edges[e];
                    match edge.kind {
                        EdgeKind::Normal => edge.to.to_string(),
                        kind => format!("{}:{}", edge.to, kind),
                    }
                })
                .collect();
            if !succs.is_empty() {
                write!(f, " -> {}", succs.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_classes() {
        assert!(EdgeKind::True.is_conditional());
        assert!(!EdgeKind::Normal.is_abrupt());
        assert!(EdgeKind::Exception.is_abrupt());
        assert!(EdgeKind::Return.is_abrupt());
    }

    #[test]
    fn test_throwing_kinds() {
        assert!(CfgNodeKind::Call { callee: "f".into() }.can_throw());
        assert!(CfgNodeKind::Binary { op: BinOp::Rem }.can_throw());
        assert!(!CfgNodeKind::Binary { op: BinOp::Add }.can_throw());
        assert!(!CfgNodeKind::Ident { name: "x".into() }.can_throw());
    }

    #[test]
    fn test_cfg_ids_are_unique() {
        assert_ne!(CfgId::fresh(), CfgId::fresh());
    }
}
