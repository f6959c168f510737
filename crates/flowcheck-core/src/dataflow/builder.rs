//! CFG construction from fragments
//!
//! The builder threads a list of *pending* edges through the fragment: the
//! edges that will enter whatever node is created next. An empty list means
//! the current point is unreachable. Branching splits the list into
//! `True`/`False` halves; `break`, `continue`, `return` and exceptions park
//! their edges in the enclosing loop or try frame until the target exists.

use super::cfg::{Cfg, CfgEdge, CfgId, CfgNode, CfgNodeId, CfgNodeKind, EdgeKind};
use super::fragment::{Fragment, FragmentKind};
use crate::env::ProgramEnv;
use crate::error::{DataflowError, DataflowResult};
use crate::tree::{BinOp, NodeId, NodeKind, SourceTree};
use indexmap::IndexMap;
use smallvec::{smallvec, SmallVec};
use std::mem::take;
use tracing::{trace, warn};

type Pending = (CfgNodeId, EdgeKind);
type Operands = SmallVec<[CfgNodeId; 2]>;

#[derive(Default)]
struct LoopFrame {
    breaks: Vec<Pending>,
    continues: Vec<Pending>,
}

struct Handler {
    entry: CfgNodeId,
    catches_all: bool,
}

struct TryFrame {
    handlers: Vec<Handler>,
    finally: Option<NodeId>,
    /// Set once the protected body is built; exceptions raised from the
    /// handlers skip this frame's catch clauses
    in_handlers: bool,
    /// Exception edges waiting for the exceptional copy of the finally block
    exceptional: Vec<Pending>,
}

enum Frame {
    Loop(LoopFrame),
    Try(TryFrame),
}

/// `catch (Exception e)` and `catch (Throwable t)` stop propagation
fn catches_all(ty: &str) -> bool {
    matches!(ty.rsplit('.').next(), Some("Throwable" | "Exception"))
}

/// Builder for constructing a CFG from one fragment
pub struct CfgBuilder<'a, E: ProgramEnv + ?Sized> {
    tree: &'a SourceTree,
    env: &'a E,
    nodes: Vec<CfgNode>,
    edges: Vec<CfgEdge>,
    tree_nodes: IndexMap<NodeId, SmallVec<[CfgNodeId; 1]>>,
    pending: Vec<Pending>,
    frames: Vec<Frame>,
    returns: Vec<Pending>,
    uncaught: Vec<Pending>,
    /// Non-zero while building a secondary copy of a finally block
    duplicating: usize,
}

impl<'a, E: ProgramEnv + ?Sized> CfgBuilder<'a, E> {
    pub fn new(tree: &'a SourceTree, env: &'a E) -> Self {
        let mut builder = Self {
            tree,
            env,
            nodes: Vec::new(),
            edges: Vec::new(),
            tree_nodes: IndexMap::new(),
            pending: Vec::new(),
            frames: Vec::new(),
            returns: Vec::new(),
            uncaught: Vec::new(),
            duplicating: 0,
        };
        let entry = builder.add_node(CfgNodeKind::Entry, None);
        builder.pending.push((entry, EdgeKind::Normal));
        builder
    }

    /// Build the CFG of `fragment`, resolving types through the environment
    pub fn build(mut self, fragment: &Fragment) -> DataflowResult<Cfg> {
        let tree = self.tree;
        let root = fragment.root();
        match (fragment.kind(), tree.kind(root)) {
            (FragmentKind::Method, NodeKind::Method { params, body, .. }) => {
                let body = (*body).ok_or_else(|| {
                    DataflowError::Internal(format!("{fragment} has no body to build a CFG for"))
                })?;
                for param in params {
                    self.env.resolve_type(&param.ty)?;
                    self.push(CfgNodeKind::Parameter { name: param.name.clone() }, None, smallvec![]);
                }
                self.stmt(body)?;
            }
            (FragmentKind::Lambda, NodeKind::Lambda { params, body }) => {
                for name in params {
                    self.push(CfgNodeKind::Parameter { name: name.clone() }, None, smallvec![]);
                }
                if matches!(tree.kind(*body), NodeKind::Block { .. }) {
                    self.stmt(*body)?;
                } else {
                    // Expression body: implicit return of its value
                    let value = self.expr(*body)?;
                    self.push(CfgNodeKind::Return, None, smallvec![value]);
                    let exits = self.exit_through(0, EdgeKind::Return)?;
                    self.returns.extend(exits);
                }
            }
            (FragmentKind::Initializer, NodeKind::Block { .. }) => self.stmt(root)?,
            (
                FragmentKind::FieldInitializer,
                NodeKind::Field {
                    name,
                    ty,
                    init: Some(init),
                    ..
                },
            ) => {
                self.env.resolve_type(ty)?;
                let value = self.expr(*init)?;
                self.push(CfgNodeKind::VarDecl { name: name.clone() }, Some(root), smallvec![value]);
            }
            (kind, node) => {
                return Err(DataflowError::Internal(format!(
                    "fragment kind {kind:?} does not match tree node {}",
                    node.name()
                )))
            }
        }
        Ok(self.finish(fragment.name()))
    }

    fn finish(mut self, label: String) -> Cfg {
        let regular_exit = self.add_node(CfgNodeKind::RegularExit, None);
        let mut exits = take(&mut self.pending);
        exits.append(&mut self.returns);
        for (from, kind) in exits {
            self.add_edge(from, regular_exit, kind);
        }

        let exceptional_exit = self.add_node(CfgNodeKind::ExceptionalExit, None);
        for (from, kind) in take(&mut self.uncaught) {
            self.add_edge(from, exceptional_exit, kind);
        }

        let mut cfg = Cfg {
            id: CfgId::fresh(),
            label,
            nodes: self.nodes,
            edges: self.edges,
            entry: CfgNodeId(0),
            regular_exit,
            exceptional_exit,
            tree_nodes: self.tree_nodes,
            rpo_rank: Vec::new(),
            free_variables: Vec::new(),
        };
        cfg.compute_rpo_rank();
        cfg.compute_free_variables();
        trace!(
            cfg = %cfg.id(),
            fragment = cfg.label(),
            nodes = cfg.len(),
            edges = cfg.edges().len(),
            "built cfg"
        );
        cfg
    }

    // ------------------------------------------------------------------
    // Graph plumbing
    // ------------------------------------------------------------------

    fn add_node(&mut self, kind: CfgNodeKind, tree: Option<NodeId>) -> CfgNodeId {
        let id = CfgNodeId(self.nodes.len() as u32);
        self.nodes.push(CfgNode {
            id,
            kind,
            tree,
            operands: SmallVec::new(),
            succs: SmallVec::new(),
            preds: SmallVec::new(),
        });
        if let Some(tree) = tree {
            let ids = self.tree_nodes.entry(tree).or_default();
            if self.duplicating > 0 {
                ids.push(id);
            } else {
                ids.insert(0, id);
            }
        }
        id
    }

    fn add_edge(&mut self, from: CfgNodeId, to: CfgNodeId, kind: EdgeKind) {
        let edge = CfgEdge { from, to, kind };
        if self.nodes[from.index()].succs.iter().any(|&e| self.edges[e] == edge) {
            return;
        }
        let index = self.edges.len();
        self.edges.push(edge);
        self.nodes[from.index()].succs.push(index);
        self.nodes[to.index()].preds.push(index);
    }

    fn connect_pending(&mut self, to: CfgNodeId) {
        for (from, kind) in take(&mut self.pending) {
            self.add_edge(from, to, kind);
        }
    }

    /// Create a node at the current point and make it the new current point
    fn push(&mut self, kind: CfgNodeKind, tree: Option<NodeId>, operands: Operands) -> CfgNodeId {
        let id = self.add_node(kind, tree);
        self.nodes[id.index()].operands = operands;
        self.connect_pending(id);
        self.pending.push((id, EdgeKind::Normal));
        id
    }

    /// Split the current point on the boolean just evaluated
    fn split(&mut self) -> (Vec<Pending>, Vec<Pending>) {
        let pending = take(&mut self.pending);
        let on_true = pending.iter().map(|&(n, _)| (n, EdgeKind::True)).collect();
        let on_false = pending.into_iter().map(|(n, _)| (n, EdgeKind::False)).collect();
        (on_true, on_false)
    }

    /// Route an exception raised by `from` to the innermost handlers
    fn raise(&mut self, from: CfgNodeId) {
        let mut targets: SmallVec<[CfgNodeId; 2]> = SmallVec::new();
        let mut handled = false;
        for frame in self.frames.iter_mut().rev() {
            let Frame::Try(t) = frame else { continue };
            if !t.in_handlers {
                targets.extend(t.handlers.iter().map(|h| h.entry));
                if t.handlers.iter().any(|h| h.catches_all) {
                    handled = true;
                    break;
                }
            }
            if t.finally.is_some() {
                t.exceptional.push((from, EdgeKind::Exception));
                handled = true;
                break;
            }
        }
        if !handled {
            self.uncaught.push((from, EdgeKind::Exception));
        }
        for to in targets {
            self.add_edge(from, to, EdgeKind::Exception);
        }
    }

    /// Leave every frame above `depth`, inlining the finally blocks crossed on
    /// the way. Returns the current point retagged as `kind`.
    fn exit_through(&mut self, depth: usize, kind: EdgeKind) -> DataflowResult<Vec<Pending>> {
        let mut index = self.frames.len();
        while index > depth {
            index -= 1;
            let finally = match &self.frames[index] {
                Frame::Try(t) => t.finally,
                Frame::Loop(_) => None,
            };
            if let Some(finally) = finally {
                // The inline copy runs outside the try it belongs to
                let saved = self.frames.split_off(index);
                self.duplicating += 1;
                let built = self.stmt(finally);
                self.duplicating -= 1;
                self.frames.extend(saved);
                built?;
            }
        }
        Ok(take(&mut self.pending)
            .into_iter()
            .map(|(n, k)| (n, if k == EdgeKind::Normal { kind } else { k }))
            .collect())
    }

    fn innermost_loop(&self) -> Option<usize> {
        self.frames.iter().rposition(|f| matches!(f, Frame::Loop(_)))
    }

    fn pop_loop(&mut self) -> DataflowResult<LoopFrame> {
        match self.frames.pop() {
            Some(Frame::Loop(frame)) => Ok(frame),
            _ => Err(DataflowError::Internal("unbalanced loop frame".to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn stmt(&mut self, id: NodeId) -> DataflowResult<()> {
        let tree = self.tree;
        match tree.kind(id) {
            NodeKind::Block { stmts, .. } => {
                for &s in stmts {
                    self.stmt(s)?;
                }
            }
            NodeKind::Local { name, ty, init } => {
                self.env.resolve_type(ty)?;
                let operands = match init {
                    Some(init) => smallvec![self.expr(*init)?],
                    None => SmallVec::new(),
                };
                self.push(CfgNodeKind::VarDecl { name: name.clone() }, Some(id), operands);
            }
            NodeKind::ExprStmt { expr } => {
                self.expr(*expr)?;
            }
            NodeKind::If { cond, then, otherwise } => {
                self.expr(*cond)?;
                let (on_true, on_false) = self.split();
                self.pending = on_true;
                self.stmt(*then)?;
                let mut merged = take(&mut self.pending);
                self.pending = on_false;
                if let Some(otherwise) = otherwise {
                    self.stmt(*otherwise)?;
                }
                merged.append(&mut self.pending);
                self.pending = merged;
            }
            NodeKind::While { cond, body } => {
                let head = self.push(CfgNodeKind::LoopHead, Some(id), smallvec![]);
                self.expr(*cond)?;
                let (on_true, on_false) = self.split();
                self.pending = on_true;
                self.build_loop_body(*body, &[], head, on_false)?;
            }
            NodeKind::For {
                init,
                cond,
                update,
                body,
            } => {
                for &s in init {
                    self.stmt(s)?;
                }
                let head = self.push(CfgNodeKind::LoopHead, Some(id), smallvec![]);
                let exits = match cond {
                    Some(cond) => {
                        self.expr(*cond)?;
                        let (on_true, on_false) = self.split();
                        self.pending = on_true;
                        on_false
                    }
                    None => Vec::new(),
                };
                self.build_loop_body(*body, update, head, exits)?;
            }
            NodeKind::Return { value } => {
                let operands = match value {
                    Some(value) => smallvec![self.expr(*value)?],
                    None => SmallVec::new(),
                };
                self.push(CfgNodeKind::Return, Some(id), operands);
                let exits = self.exit_through(0, EdgeKind::Return)?;
                self.returns.extend(exits);
            }
            NodeKind::Break | NodeKind::Continue => {
                let is_break = matches!(tree.kind(id), NodeKind::Break);
                let Some(index) = self.innermost_loop() else {
                    warn!(node = %id, "jump outside of a loop ignored");
                    self.pending.clear();
                    return Ok(());
                };
                let kind = if is_break { EdgeKind::Break } else { EdgeKind::Continue };
                let exits = self.exit_through(index + 1, kind)?;
                if let Frame::Loop(frame) = &mut self.frames[index] {
                    if is_break {
                        frame.breaks.extend(exits);
                    } else {
                        frame.continues.extend(exits);
                    }
                }
            }
            NodeKind::Throw { value } => {
                let value = self.expr(*value)?;
                let throw = self.push(CfgNodeKind::Throw, Some(id), smallvec![value]);
                self.pending.clear();
                self.raise(throw);
            }
            NodeKind::Try { body, catches, finally } => self.build_try(*body, catches, *finally)?,
            kind if kind.is_expression() => {
                self.expr(id)?;
            }
            other => {
                return Err(DataflowError::Internal(format!(
                    "unexpected {} in statement position",
                    other.name()
                )))
            }
        }
        Ok(())
    }

    /// Body, continue edges, updates and the back edge to `head`; afterwards the
    /// current point is the loop exit
    fn build_loop_body(
        &mut self,
        body: NodeId,
        update: &[NodeId],
        head: CfgNodeId,
        exits: Vec<Pending>,
    ) -> DataflowResult<()> {
        self.frames.push(Frame::Loop(LoopFrame::default()));
        self.stmt(body)?;
        let frame = self.pop_loop()?;
        self.pending.extend(frame.continues);
        for &u in update {
            self.expr(u)?;
        }
        self.connect_pending(head);
        self.pending = exits;
        self.pending.extend(frame.breaks);
        Ok(())
    }

    fn build_try(&mut self, body: NodeId, catches: &[NodeId], finally: Option<NodeId>) -> DataflowResult<()> {
        let tree = self.tree;
        let mut handlers = Vec::with_capacity(catches.len());
        let mut clauses = Vec::with_capacity(catches.len());
        for &c in catches {
            let NodeKind::Catch {
                name,
                ty,
                body: handler_body,
            } = tree.kind(c)
            else {
                return Err(DataflowError::Internal("try clause is not a catch".to_string()));
            };
            self.env.resolve_type(ty)?;
            let entry = self.add_node(
                CfgNodeKind::CatchParam {
                    name: name.clone(),
                    ty: ty.clone(),
                },
                Some(c),
            );
            handlers.push(Handler {
                entry,
                catches_all: catches_all(ty),
            });
            clauses.push((entry, *handler_body));
        }

        self.frames.push(Frame::Try(TryFrame {
            handlers,
            finally,
            in_handlers: false,
            exceptional: Vec::new(),
        }));
        self.stmt(body)?;
        let mut continuation = take(&mut self.pending);

        if let Some(Frame::Try(frame)) = self.frames.last_mut() {
            frame.in_handlers = true;
        }
        for (entry, handler_body) in clauses {
            self.pending = vec![(entry, EdgeKind::Normal)];
            self.stmt(handler_body)?;
            continuation.append(&mut self.pending);
        }

        let frame = match self.frames.pop() {
            Some(Frame::Try(frame)) => frame,
            _ => return Err(DataflowError::Internal("unbalanced try frame".to_string())),
        };

        if let Some(finally) = finally {
            if !frame.exceptional.is_empty() {
                self.duplicating += 1;
                self.pending = frame.exceptional;
                let built = self.stmt(finally);
                self.duplicating -= 1;
                built?;
                let rethrow = self.push(CfgNodeKind::Rethrow, None, smallvec![]);
                self.pending.clear();
                self.raise(rethrow);
            }
            self.pending = continuation;
            self.stmt(finally)?;
        } else {
            self.pending = continuation;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn exprs(&mut self, ids: &[NodeId]) -> DataflowResult<Operands> {
        ids.iter().map(|&id| self.expr(id)).collect()
    }

    fn expr(&mut self, id: NodeId) -> DataflowResult<CfgNodeId> {
        let tree = self.tree;
        let node = match tree.kind(id) {
            NodeKind::Literal(lit) => self.push(CfgNodeKind::Literal(lit.clone()), Some(id), smallvec![]),
            NodeKind::Ident { name } => self.push(CfgNodeKind::Ident { name: name.clone() }, Some(id), smallvec![]),
            NodeKind::Assign { target, value } => {
                let value = self.expr(*value)?;
                self.push(CfgNodeKind::Assign { target: target.clone() }, Some(id), smallvec![value])
            }
            NodeKind::Binary { op, lhs, rhs } if op.is_short_circuit() => {
                let left = self.expr(*lhs)?;
                let (on_true, on_false) = self.split();
                let (evaluate, skip) = if *op == BinOp::And {
                    (on_true, on_false)
                } else {
                    (on_false, on_true)
                };
                self.pending = evaluate;
                let right = self.expr(*rhs)?;
                self.pending.extend(skip);
                self.push(CfgNodeKind::Binary { op: *op }, Some(id), smallvec![left, right])
            }
            NodeKind::Binary { op, lhs, rhs } => {
                let left = self.expr(*lhs)?;
                let right = self.expr(*rhs)?;
                let node = self.push(CfgNodeKind::Binary { op: *op }, Some(id), smallvec![left, right]);
                if op.can_throw() {
                    self.raise(node);
                }
                node
            }
            NodeKind::Unary { op, operand } => {
                let operand = self.expr(*operand)?;
                self.push(CfgNodeKind::Unary { op: *op }, Some(id), smallvec![operand])
            }
            NodeKind::Conditional { cond, then, otherwise } => {
                let c = self.expr(*cond)?;
                let (on_true, on_false) = self.split();
                self.pending = on_true;
                let a = self.expr(*then)?;
                let mut merged = take(&mut self.pending);
                self.pending = on_false;
                let b = self.expr(*otherwise)?;
                merged.append(&mut self.pending);
                self.pending = merged;
                self.push(CfgNodeKind::Conditional, Some(id), smallvec![c, a, b])
            }
            NodeKind::Call { callee, args } => {
                let operands = self.exprs(args)?;
                let node = self.push(CfgNodeKind::Call { callee: callee.clone() }, Some(id), operands);
                self.raise(node);
                node
            }
            NodeKind::New { ty, args } => {
                self.env.resolve_type(ty)?;
                let operands = self.exprs(args)?;
                let node = self.push(CfgNodeKind::New { ty: ty.clone() }, Some(id), operands);
                self.raise(node);
                node
            }
            NodeKind::Lambda { .. } => self.push(CfgNodeKind::Lambda, Some(id), smallvec![]),
            other => {
                return Err(DataflowError::Internal(format!(
                    "unexpected {} in expression position",
                    other.name()
                )))
            }
        };
        Ok(node)
    }
}

/// Build the CFG of `fragment` in `env`
pub fn build_cfg<E: ProgramEnv + ?Sized>(fragment: &Fragment, env: &E) -> DataflowResult<Cfg> {
    CfgBuilder::new(fragment.tree(), env).build(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::fragment::fragments;
    use crate::env::SymbolTable;
    use crate::tree::{CatchClause, ClassDecl, CompilationUnit, Expr, Member, Param, SourceTree, Stmt};
    use std::sync::Arc;

    fn make_method(params: Vec<Param>, body: Vec<Stmt>) -> (Arc<SourceTree>, Fragment) {
        let tree = SourceTree::from_unit(&CompilationUnit {
            name: "Test.java".into(),
            imports: vec![],
            classes: vec![ClassDecl {
                name: "Test".into(),
                annotations: vec![],
                members: vec![Member::Method {
                    name: "f".into(),
                    params,
                    annotations: vec![],
                    body: Some(body),
                }],
            }],
        });
        let fragment = fragments(&tree).remove(0);
        (tree, fragment)
    }

    fn build(fragment: &Fragment) -> Cfg {
        build_cfg(fragment, &SymbolTable::with_builtins()).unwrap()
    }

    fn nodes_of(cfg: &Cfg, pred: impl Fn(&CfgNodeKind) -> bool) -> Vec<CfgNodeId> {
        cfg.nodes().iter().filter(|n| pred(&n.kind)).map(|n| n.id).collect()
    }

    fn local(name: &str, init: Expr) -> Stmt {
        Stmt::Local {
            name: name.into(),
            ty: "int".into(),
            init: Some(init),
        }
    }

    fn call(name: &str) -> Stmt {
        Stmt::Expr {
            expr: Expr::call(name, vec![]),
        }
    }

    #[test]
    fn test_cfg_straight_line_rendering() {
        let (_, fragment) = make_method(
            vec![Param::new("a", "int")],
            vec![
                local("x", Expr::binary(BinOp::Div, Expr::ident("a"), Expr::int(2))),
                Stmt::Return {
                    value: Some(Expr::ident("x")),
                },
            ],
        );
        let cfg = build(&fragment);
        insta::assert_snapshot!(cfg.to_string(), @r"
        Test.f (10 nodes)
          n0 entry -> n1
          n1 param a -> n2
          n2 ident a -> n3
          n3 lit 2 -> n4
          n4 binary / [n2, n3] -> n5, n9:exception
          n5 decl x [n4] -> n6
          n6 ident x -> n7
          n7 return [n6] -> n8:return
          n8 exit
          n9 exceptional-exit
        ");
    }

    #[test]
    fn test_cfg_if_statement_branches() {
        let (tree, fragment) = make_method(
            vec![Param::new("p", "boolean")],
            vec![
                local("x", Expr::int(1)),
                Stmt::If {
                    cond: Expr::ident("p"),
                    then: vec![Stmt::Expr {
                        expr: Expr::assign("x", Expr::int(2)),
                    }],
                    otherwise: None,
                },
                Stmt::Return {
                    value: Some(Expr::ident("x")),
                },
            ],
        );
        let cfg = build(&fragment);

        let cond = tree.find(|k| matches!(k, NodeKind::Ident { name } if name == "p")).unwrap();
        let cond = cfg.node_for(cond).unwrap();
        let kinds: Vec<EdgeKind> = cfg.successors(cond).map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EdgeKind::True, EdgeKind::False]);

        // The read of x after the if has two predecessors: the assignment and
        // the false edge
        let ret = tree.find(|k| matches!(k, NodeKind::Return { .. })).unwrap();
        let read = tree.kind(ret).children()[0];
        let read = cfg.node_for(read).unwrap();
        assert_eq!(cfg.predecessors(read).count(), 2);
    }

    #[test]
    fn test_cfg_short_circuit() {
        let (tree, fragment) = make_method(
            vec![Param::new("a", "boolean"), Param::new("b", "boolean")],
            vec![Stmt::Return {
                value: Some(Expr::binary(BinOp::And, Expr::ident("a"), Expr::ident("b"))),
            }],
        );
        let cfg = build(&fragment);

        let a = cfg
            .node_for(tree.find(|k| matches!(k, NodeKind::Ident { name } if name == "a")).unwrap())
            .unwrap();
        let b = cfg
            .node_for(tree.find(|k| matches!(k, NodeKind::Ident { name } if name == "b")).unwrap())
            .unwrap();
        let and = nodes_of(&cfg, |k| matches!(k, CfgNodeKind::Binary { op: BinOp::And }))[0];

        let out: Vec<(CfgNodeId, EdgeKind)> = cfg.successors(a).map(|e| (e.to, e.kind)).collect();
        assert_eq!(out, vec![(b, EdgeKind::True), (and, EdgeKind::False)]);
        assert_eq!(cfg.node(and).operands.as_slice(), &[a, b]);
    }

    #[test]
    fn test_cfg_while_loop_back_edge() {
        let (_, fragment) = make_method(
            vec![Param::new("n", "int")],
            vec![
                local("i", Expr::int(0)),
                Stmt::While {
                    cond: Expr::binary(BinOp::Lt, Expr::ident("i"), Expr::ident("n")),
                    body: vec![Stmt::Expr {
                        expr: Expr::assign("i", Expr::binary(BinOp::Add, Expr::ident("i"), Expr::int(1))),
                    }],
                },
            ],
        );
        let cfg = build(&fragment);
        let head = nodes_of(&cfg, |k| matches!(k, CfgNodeKind::LoopHead))[0];
        let assign = nodes_of(&cfg, |k| matches!(k, CfgNodeKind::Assign { .. }))[0];
        assert!(cfg.predecessors(head).any(|e| e.from == assign));
        // The loop exit reaches the regular exit on the false edge
        assert!(cfg
            .predecessors(cfg.regular_exit())
            .any(|e| e.kind == EdgeKind::False));
    }

    #[test]
    fn test_reverse_postorder_starts_at_entry() {
        let (_, fragment) = make_method(vec![], vec![Stmt::Return { value: Some(Expr::int(42)) }]);
        let cfg = build(&fragment);
        let rpo = cfg.reverse_postorder();
        assert_eq!(rpo[0], cfg.entry());
        assert_eq!(cfg.rpo_rank(cfg.entry()), 0);
        // The exceptional exit is unreachable here
        assert!(!rpo.contains(&cfg.exceptional_exit()));
    }

    #[test]
    fn test_cfg_exception_edges_to_handler() {
        let (_, fragment) = make_method(
            vec![],
            vec![Stmt::Try {
                body: vec![call("risky")],
                catches: vec![CatchClause {
                    name: "e".into(),
                    ty: "IllegalStateException".into(),
                    body: vec![call("recover")],
                }],
                finally: None,
            }],
        );
        let cfg = build(&fragment);
        let risky = nodes_of(&cfg, |k| matches!(k, CfgNodeKind::Call { callee } if callee == "risky"))[0];
        let handler = nodes_of(&cfg, |k| matches!(k, CfgNodeKind::CatchParam { .. }))[0];
        let targets: Vec<(CfgNodeId, EdgeKind)> = cfg.successors(risky).map(|e| (e.to, e.kind)).collect();
        assert!(targets.contains(&(handler, EdgeKind::Exception)));
        // Not a catch-all: the exception may also escape
        assert!(targets.contains(&(cfg.exceptional_exit(), EdgeKind::Exception)));

        let recover = nodes_of(&cfg, |k| matches!(k, CfgNodeKind::Call { callee } if callee == "recover"))[0];
        assert!(cfg
            .successors(recover)
            .any(|e| e.to == cfg.exceptional_exit() && e.kind == EdgeKind::Exception));
    }

    #[test]
    fn test_cfg_catch_all_stops_propagation() {
        let (_, fragment) = make_method(
            vec![],
            vec![Stmt::Try {
                body: vec![call("risky")],
                catches: vec![CatchClause {
                    name: "e".into(),
                    ty: "java.lang.Exception".into(),
                    body: vec![],
                }],
                finally: None,
            }],
        );
        let cfg = build(&fragment);
        assert_eq!(cfg.predecessors(cfg.exceptional_exit()).count(), 0);
    }

    #[test]
    fn test_cfg_finally_is_duplicated() {
        let (tree, fragment) = make_method(
            vec![Param::new("p", "boolean")],
            vec![Stmt::Try {
                body: vec![
                    Stmt::If {
                        cond: Expr::ident("p"),
                        then: vec![Stmt::Return { value: None }],
                        otherwise: None,
                    },
                    call("work"),
                ],
                catches: vec![],
                finally: Some(vec![call("cleanup")]),
            }],
        );
        let cfg = build(&fragment);
        let cleanup_tree = tree
            .find(|k| matches!(k, NodeKind::Call { callee, .. } if callee == "cleanup"))
            .unwrap();

        // Normal path, exceptional path and the inline copy for `return`
        let copies = cfg.nodes_for(cleanup_tree);
        assert_eq!(copies.len(), 3);
        assert_eq!(nodes_of(&cfg, |k| matches!(k, CfgNodeKind::Rethrow)).len(), 1);

        // The canonical copy is the one on the normal path: it follows `work`
        let work = nodes_of(&cfg, |k| matches!(k, CfgNodeKind::Call { callee } if callee == "work"))[0];
        let canonical = cfg.node_for(cleanup_tree).unwrap();
        assert!(cfg.predecessors(canonical).any(|e| e.from == work && e.kind == EdgeKind::Normal));

        // Exceptions from `work` enter the exceptional copy, which rethrows
        let rethrow = nodes_of(&cfg, |k| matches!(k, CfgNodeKind::Rethrow))[0];
        assert!(cfg.successors(work).any(|e| e.kind == EdgeKind::Exception && copies.contains(&e.to)));
        assert!(cfg
            .successors(rethrow)
            .any(|e| e.to == cfg.exceptional_exit() && e.kind == EdgeKind::Exception));

        // The inline copy leaves on a return edge
        assert!(cfg.predecessors(cfg.regular_exit()).any(|e| e.kind == EdgeKind::Return
            && copies.contains(&e.from)));
    }

    #[test]
    fn test_cfg_break_runs_enclosed_finally() {
        let (tree, fragment) = make_method(
            vec![],
            vec![Stmt::While {
                cond: Expr::bool(true),
                body: vec![Stmt::Try {
                    body: vec![Stmt::Break],
                    catches: vec![],
                    finally: Some(vec![call("cleanup")]),
                }],
            }],
        );
        let cfg = build(&fragment);
        let cleanup_tree = tree
            .find(|k| matches!(k, NodeKind::Call { callee, .. } if callee == "cleanup"))
            .unwrap();
        let copies = cfg.nodes_for(cleanup_tree);
        assert!(copies
            .iter()
            .any(|&c| cfg.successors(c).any(|e| e.kind == EdgeKind::Break && e.to == cfg.regular_exit())));
    }

    #[test]
    fn test_cfg_unknown_type_is_completion_failure() {
        let (_, fragment) = make_method(
            vec![],
            vec![Stmt::Local {
                name: "w".into(),
                ty: "com.acme.Widget".into(),
                init: None,
            }],
        );
        let err = build_cfg(&fragment, &SymbolTable::with_builtins()).unwrap_err();
        assert!(matches!(err, DataflowError::CompletionFailure { symbol } if symbol == "com.acme.Widget"));
    }

    #[test]
    fn test_cfg_deterministic_shape() {
        let body = vec![
            local("x", Expr::int(1)),
            Stmt::While {
                cond: Expr::binary(BinOp::Lt, Expr::ident("x"), Expr::int(10)),
                body: vec![Stmt::Expr {
                    expr: Expr::assign("x", Expr::binary(BinOp::Mul, Expr::ident("x"), Expr::int(2))),
                }],
            },
        ];
        let (_, first) = make_method(vec![], body.clone());
        let (_, second) = make_method(vec![], body);
        let a = build(&first);
        let b = build(&second);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_cfg_free_variables() {
        // void f(int a) { int b = a + count; total = b; }
        let (_, fragment) = make_method(
            vec![Param::new("a", "int")],
            vec![
                local("b", Expr::binary(BinOp::Add, Expr::ident("a"), Expr::ident("count"))),
                Stmt::Expr {
                    expr: Expr::assign("total", Expr::ident("b")),
                },
            ],
        );
        let cfg = build(&fragment);
        assert_eq!(cfg.free_variables(), ["count", "total"]);
        assert_eq!(cfg.variables().into_iter().collect::<Vec<_>>(), ["a", "b", "count", "total"]);
    }
}
