//! Program tree model
//!
//! The dataflow engine does not parse source code. It consumes a compilation
//! unit described by the serde-friendly [`CompilationUnit`] types and lowers it
//! into a [`SourceTree`]: an arena of [`Node`]s with parent links, so that any
//! position can be addressed by a [`TreePath`] from the root.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Index of a node inside a [`SourceTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Process-unique identity of one lowered compilation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TreeId(u64);

/// Literal constants
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Str(String),
    Null,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Short-circuit `&&`
    And,
    /// Short-circuit `||`
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    /// Integer division and remainder raise on a zero divisor
    pub fn can_throw(self) -> bool {
        matches!(self, BinOp::Div | BinOp::Rem)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
        }
    }
}

// ============================================================================
// Input description
// ============================================================================

/// A compilation unit as read from disk or written by tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub name: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub classes: Vec<ClassDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub annotations: Vec<AnnotationDecl>,
    #[serde(default)]
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDecl {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "member", rename_all = "snake_case")]
pub enum Member {
    Method {
        name: String,
        #[serde(default)]
        params: Vec<Param>,
        #[serde(default)]
        annotations: Vec<AnnotationDecl>,
        /// `None` for abstract and interface methods
        body: Option<Vec<Stmt>>,
    },
    Field {
        name: String,
        ty: String,
        #[serde(default)]
        is_static: bool,
        init: Option<Expr>,
    },
    Initializer {
        #[serde(default)]
        is_static: bool,
        body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub name: String,
    pub ty: String,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum Stmt {
    Local {
        name: String,
        ty: String,
        init: Option<Expr>,
    },
    Expr {
        expr: Expr,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        #[serde(default)]
        init: Vec<Stmt>,
        cond: Option<Expr>,
        #[serde(default)]
        update: Vec<Expr>,
        body: Vec<Stmt>,
    },
    Return {
        value: Option<Expr>,
    },
    Break,
    Continue,
    Throw {
        value: Expr,
    },
    Try {
        body: Vec<Stmt>,
        #[serde(default)]
        catches: Vec<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    Block {
        body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LambdaBody {
    Value(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: Literal,
    },
    Ident {
        name: String,
    },
    Assign {
        target: String,
        value: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        callee: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    New {
        ty: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Lambda {
        #[serde(default)]
        params: Vec<String>,
        body: LambdaBody,
    },
}

// Shorthand constructors, mostly for building trees in tests
impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Literal {
            value: Literal::Int(value),
        }
    }

    pub fn bool(value: bool) -> Self {
        Expr::Literal {
            value: Literal::Bool(value),
        }
    }

    pub fn str(value: &str) -> Self {
        Expr::Literal {
            value: Literal::Str(value.to_string()),
        }
    }

    pub fn null() -> Self {
        Expr::Literal { value: Literal::Null }
    }

    pub fn ident(name: &str) -> Self {
        Expr::Ident {
            name: name.to_string(),
        }
    }

    pub fn assign(target: &str, value: Expr) -> Self {
        Expr::Assign {
            target: target.to_string(),
            value: Box::new(value),
        }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn call(callee: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: callee.to_string(),
            args,
        }
    }
}

// ============================================================================
// Lowered arena
// ============================================================================

/// Node kinds of the lowered tree; children are referenced by [`NodeId`]
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    CompilationUnit { name: String, members: Vec<NodeId> },
    Import { path: String },
    Class { name: String, members: Vec<NodeId> },
    Annotation { name: String, args: Vec<NodeId> },
    Method { name: String, params: Vec<Param>, annotations: Vec<NodeId>, body: Option<NodeId> },
    Field { name: String, ty: String, is_static: bool, init: Option<NodeId> },
    /// Statement block; a block directly inside a class is an initializer
    Block { is_static: bool, stmts: Vec<NodeId> },
    Local { name: String, ty: String, init: Option<NodeId> },
    ExprStmt { expr: NodeId },
    If { cond: NodeId, then: NodeId, otherwise: Option<NodeId> },
    While { cond: NodeId, body: NodeId },
    For { init: Vec<NodeId>, cond: Option<NodeId>, update: Vec<NodeId>, body: NodeId },
    Return { value: Option<NodeId> },
    Break,
    Continue,
    Throw { value: NodeId },
    Try { body: NodeId, catches: Vec<NodeId>, finally: Option<NodeId> },
    Catch { name: String, ty: String, body: NodeId },
    Literal(Literal),
    Ident { name: String },
    Assign { target: String, value: NodeId },
    Binary { op: BinOp, lhs: NodeId, rhs: NodeId },
    Unary { op: UnaryOp, operand: NodeId },
    Conditional { cond: NodeId, then: NodeId, otherwise: NodeId },
    Call { callee: String, args: Vec<NodeId> },
    New { ty: String, args: Vec<NodeId> },
    Lambda { params: Vec<String>, body: NodeId },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::CompilationUnit { .. } => "compilation unit",
            NodeKind::Import { .. } => "import",
            NodeKind::Class { .. } => "class",
            NodeKind::Annotation { .. } => "annotation",
            NodeKind::Method { .. } => "method",
            NodeKind::Field { .. } => "field",
            NodeKind::Block { .. } => "block",
            NodeKind::Local { .. } => "local variable",
            NodeKind::ExprStmt { .. } => "expression statement",
            NodeKind::If { .. } => "if",
            NodeKind::While { .. } => "while",
            NodeKind::For { .. } => "for",
            NodeKind::Return { .. } => "return",
            NodeKind::Break => "break",
            NodeKind::Continue => "continue",
            NodeKind::Throw { .. } => "throw",
            NodeKind::Try { .. } => "try",
            NodeKind::Catch { .. } => "catch",
            NodeKind::Literal(_) => "literal",
            NodeKind::Ident { .. } => "identifier",
            NodeKind::Assign { .. } => "assignment",
            NodeKind::Binary { .. } => "binary expression",
            NodeKind::Unary { .. } => "unary expression",
            NodeKind::Conditional { .. } => "conditional expression",
            NodeKind::Call { .. } => "call",
            NodeKind::New { .. } => "instance creation",
            NodeKind::Lambda { .. } => "lambda",
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Literal(_)
                | NodeKind::Ident { .. }
                | NodeKind::Assign { .. }
                | NodeKind::Binary { .. }
                | NodeKind::Unary { .. }
                | NodeKind::Conditional { .. }
                | NodeKind::Call { .. }
                | NodeKind::New { .. }
                | NodeKind::Lambda { .. }
        )
    }

    /// Children in source (and evaluation) order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::CompilationUnit { members, .. } | NodeKind::Class { members, .. } => members.clone(),
            NodeKind::Annotation { args, .. } | NodeKind::Call { args, .. } | NodeKind::New { args, .. } => args.clone(),
            NodeKind::Method { annotations, body, .. } => annotations.iter().copied().chain(*body).collect(),
            NodeKind::Field { init, .. } | NodeKind::Local { init, .. } => init.iter().copied().collect(),
            NodeKind::Block { stmts, .. } => stmts.clone(),
            NodeKind::ExprStmt { expr } => vec![*expr],
            NodeKind::If { cond, then, otherwise } => {
                std::iter::once(*cond).chain(std::iter::once(*then)).chain(*otherwise).collect()
            }
            NodeKind::While { cond, body } => vec![*cond, *body],
            NodeKind::For {
                init,
                cond,
                update,
                body,
            } => init
                .iter()
                .copied()
                .chain(*cond)
                .chain(update.iter().copied())
                .chain(std::iter::once(*body))
                .collect(),
            NodeKind::Return { value } => value.iter().copied().collect(),
            NodeKind::Throw { value } => vec![*value],
            NodeKind::Try { body, catches, finally } => std::iter::once(*body)
                .chain(catches.iter().copied())
                .chain(*finally)
                .collect(),
            NodeKind::Catch { body, .. } => vec![*body],
            NodeKind::Assign { value, .. } => vec![*value],
            NodeKind::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            NodeKind::Unary { operand, .. } => vec![*operand],
            NodeKind::Conditional { cond, then, otherwise } => vec![*cond, *then, *otherwise],
            NodeKind::Lambda { body, .. } => vec![*body],
            NodeKind::Import { .. }
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Literal(_)
            | NodeKind::Ident { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
}

/// One lowered compilation unit
#[derive(Debug)]
pub struct SourceTree {
    id: TreeId,
    name: String,
    nodes: Vec<Node>,
    root: NodeId,
}

impl SourceTree {
    /// Lower a compilation unit into a fresh tree with a new [`TreeId`]
    pub fn from_unit(unit: &CompilationUnit) -> Arc<Self> {
        let mut lowering = Lowering::default();
        let root = lowering.unit(unit);
        Arc::new(Self {
            id: TreeId(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed)),
            name: unit.name.clone(),
            nodes: lowering.nodes,
            root,
        })
    }

    pub fn from_json(source: &str) -> serde_json::Result<Arc<Self>> {
        let unit: CompilationUnit = serde_json::from_str(source)?;
        Ok(Self::from_unit(&unit))
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    /// Preorder walk below (and including) `from`
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = self.kind(id).children();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// First node in source order matching `pred`
    pub fn find(&self, pred: impl Fn(&NodeKind) -> bool) -> Option<NodeId> {
        self.descendants(self.root).into_iter().find(|&id| pred(self.kind(id)))
    }

    pub fn find_all(&self, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| pred(self.kind(id)))
            .collect()
    }

    /// Names of the classes declared in this unit
    pub fn class_names(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Class { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Path from the root to `id`
    pub fn path_to(self: &Arc<Self>, id: NodeId) -> TreePath {
        let mut nodes = vec![id];
        let mut cur = id;
        while let Some(parent) = self.parent(cur) {
            nodes.push(parent);
            cur = parent;
        }
        nodes.reverse();
        TreePath {
            tree: Arc::clone(self),
            nodes,
        }
    }

    /// Render an expression back to source-like text
    pub fn render(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Literal(Literal::Int(v)) => v.to_string(),
            NodeKind::Literal(Literal::Bool(v)) => v.to_string(),
            NodeKind::Literal(Literal::Str(s)) => format!("{s:?}"),
            NodeKind::Literal(Literal::Null) => "null".to_string(),
            NodeKind::Ident { name } => name.clone(),
            NodeKind::Assign { target, value } => format!("{target} = {}", self.render(*value)),
            NodeKind::Binary { op, lhs, rhs } => {
                format!("{} {} {}", self.render_operand(*lhs), op.symbol(), self.render_operand(*rhs))
            }
            NodeKind::Unary { op, operand } => format!("{}{}", op.symbol(), self.render_operand(*operand)),
            NodeKind::Conditional { cond, then, otherwise } => format!(
                "{} ? {} : {}",
                self.render_operand(*cond),
                self.render_operand(*then),
                self.render_operand(*otherwise)
            ),
            NodeKind::Call { callee, args } => format!("{callee}({})", self.render_args(args)),
            NodeKind::New { ty, args } => format!("new {ty}({})", self.render_args(args)),
            NodeKind::Lambda { params, .. } => format!("({}) -> {{...}}", params.join(", ")),
            other => format!("<{}>", other.name()),
        }
    }

    fn render_operand(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Binary { .. } | NodeKind::Conditional { .. } | NodeKind::Assign { .. } => {
                format!("({})", self.render(id))
            }
            _ => self.render(id),
        }
    }

    fn render_args(&self, args: &[NodeId]) -> String {
        args.iter().map(|a| self.render(*a)).collect::<Vec<_>>().join(", ")
    }
}

/// Post-order lowering; parents adopt their children once allocated
#[derive(Default)]
struct Lowering {
    nodes: Vec<Node>,
}

impl Lowering {
    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for child in kind.children() {
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes.push(Node { kind, parent: None });
        id
    }

    fn unit(&mut self, unit: &CompilationUnit) -> NodeId {
        let mut members: Vec<NodeId> = unit
            .imports
            .iter()
            .map(|path| self.push(NodeKind::Import { path: path.clone() }))
            .collect();
        members.extend(unit.classes.iter().map(|c| self.class(c)));
        self.push(NodeKind::CompilationUnit {
            name: unit.name.clone(),
            members,
        })
    }

    fn class(&mut self, class: &ClassDecl) -> NodeId {
        let mut members: Vec<NodeId> = class.annotations.iter().map(|a| self.annotation(a)).collect();
        for member in &class.members {
            let id = match member {
                Member::Method {
                    name,
                    params,
                    annotations,
                    body,
                } => {
                    let annotations = annotations.iter().map(|a| self.annotation(a)).collect();
                    let body = body.as_ref().map(|stmts| self.block(stmts, false));
                    self.push(NodeKind::Method {
                        name: name.clone(),
                        params: params.clone(),
                        annotations,
                        body,
                    })
                }
                Member::Field {
                    name,
                    ty,
                    is_static,
                    init,
                } => {
                    let init = init.as_ref().map(|e| self.expr(e));
                    self.push(NodeKind::Field {
                        name: name.clone(),
                        ty: ty.clone(),
                        is_static: *is_static,
                        init,
                    })
                }
                Member::Initializer { is_static, body } => self.block(body, *is_static),
            };
            members.push(id);
        }
        self.push(NodeKind::Class {
            name: class.name.clone(),
            members,
        })
    }

    fn annotation(&mut self, annotation: &AnnotationDecl) -> NodeId {
        let args = annotation.args.iter().map(|e| self.expr(e)).collect();
        self.push(NodeKind::Annotation {
            name: annotation.name.clone(),
            args,
        })
    }

    fn block(&mut self, stmts: &[Stmt], is_static: bool) -> NodeId {
        let stmts = stmts.iter().map(|s| self.stmt(s)).collect();
        self.push(NodeKind::Block { is_static, stmts })
    }

    fn stmt(&mut self, stmt: &Stmt) -> NodeId {
        let kind = match stmt {
            Stmt::Local { name, ty, init } => NodeKind::Local {
                name: name.clone(),
                ty: ty.clone(),
                init: init.as_ref().map(|e| self.expr(e)),
            },
            Stmt::Expr { expr } => NodeKind::ExprStmt { expr: self.expr(expr) },
            Stmt::If { cond, then, otherwise } => NodeKind::If {
                cond: self.expr(cond),
                then: self.block(then, false),
                otherwise: otherwise.as_ref().map(|b| self.block(b, false)),
            },
            Stmt::While { cond, body } => NodeKind::While {
                cond: self.expr(cond),
                body: self.block(body, false),
            },
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => NodeKind::For {
                init: init.iter().map(|s| self.stmt(s)).collect(),
                cond: cond.as_ref().map(|e| self.expr(e)),
                update: update.iter().map(|e| self.expr(e)).collect(),
                body: self.block(body, false),
            },
            Stmt::Return { value } => NodeKind::Return {
                value: value.as_ref().map(|e| self.expr(e)),
            },
            Stmt::Break => NodeKind::Break,
            Stmt::Continue => NodeKind::Continue,
            Stmt::Throw { value } => NodeKind::Throw { value: self.expr(value) },
            Stmt::Try { body, catches, finally } => NodeKind::Try {
                body: self.block(body, false),
                catches: catches
                    .iter()
                    .map(|c| {
                        let body = self.block(&c.body, false);
                        self.push(NodeKind::Catch {
                            name: c.name.clone(),
                            ty: c.ty.clone(),
                            body,
                        })
                    })
                    .collect(),
                finally: finally.as_ref().map(|b| self.block(b, false)),
            },
            Stmt::Block { body } => return self.block(body, false),
        };
        self.push(kind)
    }

    fn expr(&mut self, expr: &Expr) -> NodeId {
        let kind = match expr {
            Expr::Literal { value } => NodeKind::Literal(value.clone()),
            Expr::Ident { name } => NodeKind::Ident { name: name.clone() },
            Expr::Assign { target, value } => NodeKind::Assign {
                target: target.clone(),
                value: self.expr(value),
            },
            Expr::Binary { op, lhs, rhs } => NodeKind::Binary {
                op: *op,
                lhs: self.expr(lhs),
                rhs: self.expr(rhs),
            },
            Expr::Unary { op, operand } => NodeKind::Unary {
                op: *op,
                operand: self.expr(operand),
            },
            Expr::Conditional { cond, then, otherwise } => NodeKind::Conditional {
                cond: self.expr(cond),
                then: self.expr(then),
                otherwise: self.expr(otherwise),
            },
            Expr::Call { callee, args } => NodeKind::Call {
                callee: callee.clone(),
                args: args.iter().map(|a| self.expr(a)).collect(),
            },
            Expr::New { ty, args } => NodeKind::New {
                ty: ty.clone(),
                args: args.iter().map(|a| self.expr(a)).collect(),
            },
            Expr::Lambda { params, body } => NodeKind::Lambda {
                params: params.clone(),
                body: match body {
                    LambdaBody::Value(e) => self.expr(e),
                    LambdaBody::Block(stmts) => self.block(stmts, false),
                },
            },
        };
        self.push(kind)
    }
}

/// A position in a [`SourceTree`]: the node chain from the root to a leaf.
///
/// Equality and hashing are positional: two paths are equal when they belong
/// to the same lowered tree and name the same chain of nodes.
#[derive(Clone)]
pub struct TreePath {
    tree: Arc<SourceTree>,
    nodes: Vec<NodeId>,
}

impl TreePath {
    pub fn tree(&self) -> &Arc<SourceTree> {
        &self.tree
    }

    pub fn leaf(&self) -> NodeId {
        // Paths always contain at least the root
        self.nodes[self.nodes.len() - 1]
    }

    pub fn leaf_kind(&self) -> &NodeKind {
        self.tree.kind(self.leaf())
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn depth(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent_path(&self) -> Option<TreePath> {
        (self.nodes.len() > 1).then(|| self.prefix(self.nodes.len() - 1))
    }

    /// The first `len` nodes of this path
    pub fn prefix(&self, len: usize) -> TreePath {
        TreePath {
            tree: Arc::clone(&self.tree),
            nodes: self.nodes[..len].to_vec(),
        }
    }

    /// Nearest enclosing class name, if any
    pub fn enclosing_class(&self) -> Option<&str> {
        self.nodes.iter().rev().find_map(|&id| match self.tree.kind(id) {
            NodeKind::Class { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}

impl PartialEq for TreePath {
    fn eq(&self, other: &Self) -> bool {
        self.tree.id == other.tree.id && self.nodes == other.nodes
    }
}

impl Eq for TreePath {}

impl Hash for TreePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tree.id.hash(state);
        self.nodes.hash(state);
    }
}

impl fmt::Debug for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreePath({}", self.tree.name)?;
        for id in &self.nodes {
            write!(f, "/{}", id.0)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.tree.name, self.leaf(), self.leaf_kind().name())
    }
}
