//! Lattice contracts for dataflow analysis
//!
//! An analysis pairs a per-expression [`AbstractValue`] with a per-program-point
//! [`Store`]. The engine only ever compares and joins them; it never looks
//! inside.
//!
//! [`Constant`] and [`ConstantStore`] are the lattice used by constant
//! propagation:
//! - Bottom (⊥) = unreachable
//! - Top (⊤) = not a single known constant
//! - Int/Bool/Str/Null form the flat middle of the lattice

use crate::tree::Literal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Per-expression abstract value
///
/// An expression inside a duplicated finally block is evaluated by several
/// CFG nodes; its value is the join over the copies that were reached.
pub trait AbstractValue: Clone + PartialEq + fmt::Debug {
    fn join(&self, other: &Self) -> Self;
}

/// For analyses that only track stores
impl AbstractValue for () {
    fn join(&self, _other: &()) {}
}

/// Per-program-point abstract state
///
/// `join` must be a least upper bound: commutative, associative and
/// idempotent. The fixpoint solver terminates only if every ascending chain
/// of stores produced by an analysis is finite.
pub trait Store: Clone + PartialEq + fmt::Debug {
    fn join(&self, other: &Self) -> Self;
}

/// A value in the flat constant lattice
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Constant {
    Bottom,
    Int(i64),
    Bool(bool),
    Str(String),
    Null,
    Top,
}

impl Constant {
    /// Join operation (least upper bound)
    pub fn join(&self, other: &Constant) -> Constant {
        match (self, other) {
            // Bottom is identity for join
            (Constant::Bottom, c) | (c, Constant::Bottom) => c.clone(),
            (Constant::Top, _) | (_, Constant::Top) => Constant::Top,
            (a, b) if a == b => a.clone(),
            _ => Constant::Top,
        }
    }

    /// Lattice order: `self ⊑ other`
    pub fn is_below(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Bottom, _) | (_, Constant::Top) => true,
            (a, b) => a == b,
        }
    }

    pub fn from_literal(lit: &Literal) -> Self {
        match lit {
            Literal::Int(v) => Constant::Int(*v),
            Literal::Bool(v) => Constant::Bool(*v),
            Literal::Str(s) => Constant::Str(s.clone()),
            Literal::Null => Constant::Null,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// A single known value (neither ⊥ nor ⊤)
    pub fn is_known(&self) -> bool {
        !matches!(self, Constant::Bottom | Constant::Top)
    }
}

impl AbstractValue for Constant {
    fn join(&self, other: &Constant) -> Constant {
        Constant::join(self, other)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Bottom => write!(f, "⊥"),
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Bool(v) => write!(f, "{v}"),
            Constant::Str(s) => write!(f, "{s:?}"),
            Constant::Null => write!(f, "null"),
            Constant::Top => write!(f, "⊤"),
        }
    }
}

/// Variable environment at a single program point
///
/// Variables absent from the map are ⊥. Bindings to ⊥ are never stored, so
/// structural equality coincides with lattice equality. Constant propagation
/// seeds every name a fragment mentions with ⊤ at entry, so a reached store
/// never reports ⊥ for a variable the code can read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ConstantStore {
    vars: BTreeMap<String, Constant>,
}

impl ConstantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store mapping each of `vars` to ⊤
    pub fn top_for_vars<S: AsRef<str>>(vars: &[S]) -> Self {
        let mut store = Self::new();
        for var in vars {
            store.set(var.as_ref(), Constant::Top);
        }
        store
    }

    pub fn get(&self, var: &str) -> Constant {
        self.vars.get(var).cloned().unwrap_or(Constant::Bottom)
    }

    pub fn set(&mut self, var: &str, value: Constant) {
        if value == Constant::Bottom {
            self.vars.remove(var);
        } else {
            self.vars.insert(var.to_string(), value);
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Constant)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Pointwise order: every binding of `self` is below the one in `other`
    pub fn is_below(&self, other: &ConstantStore) -> bool {
        self.vars.iter().all(|(var, c)| c.is_below(&other.get(var)))
    }
}

impl Store for ConstantStore {
    fn join(&self, other: &ConstantStore) -> ConstantStore {
        let mut result = self.clone();
        for (var, c) in &other.vars {
            let joined = self.get(var).join(c);
            result.set(var, joined);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn constant() -> impl Strategy<Value = Constant> {
        prop_oneof![
            Just(Constant::Bottom),
            Just(Constant::Top),
            Just(Constant::Null),
            (-3i64..3).prop_map(Constant::Int),
            any::<bool>().prop_map(Constant::Bool),
            "[ab]{0,1}".prop_map(Constant::Str),
        ]
    }

    fn store() -> impl Strategy<Value = ConstantStore> {
        prop::collection::vec(("[xyz]", constant()), 0..4).prop_map(|bindings| {
            let mut s = ConstantStore::new();
            for (var, c) in bindings {
                s.set(&var, c);
            }
            s
        })
    }

    #[test]
    fn test_join_bottom_and_top() {
        let one = Constant::Int(1);
        assert_eq!(Constant::Bottom.join(&one), one);
        assert_eq!(one.join(&Constant::Bottom), one);
        assert_eq!(Constant::Top.join(&one), Constant::Top);
    }

    #[test]
    fn test_join_distinct_constants_is_top() {
        assert_eq!(Constant::Int(1).join(&Constant::Int(2)), Constant::Top);
        assert_eq!(Constant::Int(1).join(&Constant::Bool(true)), Constant::Top);
        assert_eq!(Constant::Null.join(&Constant::Null), Constant::Null);
    }

    #[test]
    fn test_store_join_unions_variables() {
        let mut a = ConstantStore::new();
        a.set("x", Constant::Int(1));
        a.set("y", Constant::Str("s".into()));

        let mut b = ConstantStore::new();
        b.set("x", Constant::Int(1));
        b.set("z", Constant::Bool(false));

        let joined = a.join(&b);
        assert_eq!(joined.get("x"), Constant::Int(1));
        assert_eq!(joined.get("y"), Constant::Str("s".into()));
        assert_eq!(joined.get("z"), Constant::Bool(false));
        assert_eq!(joined.get("w"), Constant::Bottom);
    }

    #[test]
    fn test_store_never_holds_bottom() {
        let mut s = ConstantStore::new();
        s.set("x", Constant::Int(3));
        s.set("x", Constant::Bottom);
        assert!(s.is_empty());
        assert_eq!(s, ConstantStore::new());
    }

    proptest! {
        #[test]
        fn prop_store_join_commutative(a in store(), b in store()) {
            prop_assert_eq!(a.join(&b), b.join(&a));
        }

        #[test]
        fn prop_store_join_associative(a in store(), b in store(), c in store()) {
            prop_assert_eq!(a.join(&b).join(&c), a.join(&b.join(&c)));
        }

        #[test]
        fn prop_store_join_is_upper_bound(a in store(), b in store()) {
            let j = a.join(&b);
            prop_assert!(a.is_below(&j));
            prop_assert!(b.is_below(&j));
        }
    }

    #[quickcheck_macros::quickcheck]
    fn qc_constant_join_idempotent(v: Option<i64>) -> bool {
        let c = v.map(Constant::Int).unwrap_or(Constant::Top);
        c.join(&c) == c
    }
}
