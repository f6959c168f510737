//! Constant propagation over the flat [`Constant`] lattice

use super::cfg::{Cfg, CfgEdge, CfgNodeKind, EdgeKind};
use super::lattice::{Constant, ConstantStore};
use super::solver::{ForwardTransferFunction, TransferInput, TransferResult};
use crate::tree::{BinOp, UnaryOp};

/// Forward constant propagation
///
/// Every variable starts out unknown (⊤), so fields and captured locals stay
/// ⊤ until the fragment itself assigns them. Calls and instance creation
/// produce ⊤ and may write any field, so they reset the fragment's free
/// variables to ⊤. Two instances with the same settings are the same analysis
/// for caching purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantPropagation {
    /// Fold arithmetic and comparisons; when off, only literals and copies
    /// propagate
    pub fold_arithmetic: bool,
}

impl Default for ConstantPropagation {
    fn default() -> Self {
        Self { fold_arithmetic: true }
    }
}

impl ConstantPropagation {
    pub fn copies_only() -> Self {
        Self { fold_arithmetic: false }
    }

    fn binary(&self, op: BinOp, lhs: &Constant, rhs: &Constant) -> Constant {
        use Constant::*;

        match op {
            // Short-circuit results are decided by the left operand when it is
            // known; the right one may not have been evaluated
            BinOp::And => match lhs {
                Bottom => Bottom,
                Bool(false) => Bool(false),
                Bool(true) => rhs.clone(),
                _ => Top,
            },
            BinOp::Or => match lhs {
                Bottom => Bottom,
                Bool(true) => Bool(true),
                Bool(false) => rhs.clone(),
                _ => Top,
            },
            _ if matches!(lhs, Bottom) || matches!(rhs, Bottom) => Bottom,
            _ if !self.fold_arithmetic => Top,
            _ => fold(op, lhs, rhs).unwrap_or(Top),
        }
    }

    fn unary(&self, op: UnaryOp, operand: &Constant) -> Constant {
        match (op, operand) {
            (_, Constant::Bottom) => Constant::Bottom,
            (UnaryOp::Not, Constant::Bool(b)) => Constant::Bool(!b),
            (UnaryOp::Neg, Constant::Int(v)) if self.fold_arithmetic => {
                v.checked_neg().map(Constant::Int).unwrap_or(Constant::Top)
            }
            _ => Constant::Top,
        }
    }
}

/// Fold two known constants; `None` when the result is not a constant
fn fold(op: BinOp, lhs: &Constant, rhs: &Constant) -> Option<Constant> {
    use Constant::*;

    match (lhs, rhs) {
        (Int(a), Int(b)) => match op {
            BinOp::Add => a.checked_add(*b).map(Int),
            BinOp::Sub => a.checked_sub(*b).map(Int),
            BinOp::Mul => a.checked_mul(*b).map(Int),
            // Division by zero raises rather than producing a value
            BinOp::Div => a.checked_div(*b).map(Int),
            BinOp::Rem => a.checked_rem(*b).map(Int),
            BinOp::Eq => Some(Bool(a == b)),
            BinOp::Ne => Some(Bool(a != b)),
            BinOp::Lt => Some(Bool(a < b)),
            BinOp::Le => Some(Bool(a <= b)),
            BinOp::Gt => Some(Bool(a > b)),
            BinOp::Ge => Some(Bool(a >= b)),
            BinOp::And | BinOp::Or => None,
        },
        (Bool(a), Bool(b)) => match op {
            BinOp::Eq => Some(Bool(a == b)),
            BinOp::Ne => Some(Bool(a != b)),
            _ => None,
        },
        (Str(a), Str(b)) if op == BinOp::Add => Some(Str(format!("{a}{b}"))),
        (Null, Null) => match op {
            BinOp::Eq => Some(Bool(true)),
            BinOp::Ne => Some(Bool(false)),
            _ => None,
        },
        // A string literal is never null
        (Null, Str(_)) | (Str(_), Null) => match op {
            BinOp::Eq => Some(Bool(false)),
            BinOp::Ne => Some(Bool(true)),
            _ => None,
        },
        _ => None,
    }
}

impl ForwardTransferFunction for ConstantPropagation {
    type Value = Constant;
    type Store = ConstantStore;

    fn initial_store(&self, cfg: &Cfg) -> ConstantStore {
        ConstantStore::top_for_vars(&cfg.variables().into_iter().collect::<Vec<_>>())
    }

    fn transfer(&self, input: &TransferInput<'_, Constant, ConstantStore>) -> TransferResult<Constant, ConstantStore> {
        let operand = |i: usize| input.operand(i).cloned().unwrap_or(Constant::Bottom);
        let mut store = input.store().clone();

        let value = match &input.node().kind {
            CfgNodeKind::Parameter { name } | CfgNodeKind::CatchParam { name, .. } => {
                store.set(name, Constant::Top);
                None
            }
            CfgNodeKind::VarDecl { name } => {
                if input.operand_count() > 0 {
                    store.set(name, operand(0));
                }
                None
            }
            CfgNodeKind::Literal(lit) => Some(Constant::from_literal(lit)),
            CfgNodeKind::Ident { name } => Some(store.get(name)),
            CfgNodeKind::Assign { target } => {
                let value = operand(0);
                store.set(target, value.clone());
                Some(value)
            }
            CfgNodeKind::Binary { op } => Some(self.binary(*op, &operand(0), &operand(1))),
            CfgNodeKind::Unary { op } => Some(self.unary(*op, &operand(0))),
            CfgNodeKind::Conditional => Some(match operand(0) {
                Constant::Bool(true) => operand(1),
                Constant::Bool(false) => operand(2),
                Constant::Bottom => Constant::Bottom,
                _ => operand(1).join(&operand(2)),
            }),
            CfgNodeKind::Call { .. } | CfgNodeKind::New { .. } => {
                forget_free_variables(input.cfg(), &mut store);
                Some(Constant::Top)
            }
            CfgNodeKind::Lambda => Some(Constant::Top),
            CfgNodeKind::Entry
            | CfgNodeKind::RegularExit
            | CfgNodeKind::ExceptionalExit
            | CfgNodeKind::Return
            | CfgNodeKind::Throw
            | CfgNodeKind::LoopHead
            | CfgNodeKind::Rethrow => None,
        };

        TransferResult { value, store }
    }

    fn transfer_edge(&self, cfg: &Cfg, edge: &CfgEdge, store: &ConstantStore) -> ConstantStore {
        // A callee that raised may have written fields before doing so
        let raised_by_call = edge.kind == EdgeKind::Exception
            && matches!(cfg.node(edge.from).kind, CfgNodeKind::Call { .. } | CfgNodeKind::New { .. });
        if !raised_by_call {
            return store.clone();
        }
        let mut store = store.clone();
        forget_free_variables(cfg, &mut store);
        store
    }
}

fn forget_free_variables(cfg: &Cfg, store: &mut ConstantStore) {
    for name in cfg.free_variables() {
        store.set(name, Constant::Top);
    }
}
