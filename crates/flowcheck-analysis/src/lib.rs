//! # Flowcheck Analysis
//!
//! Checkers built on the dataflow query surface of `flowcheck-core`, and a
//! runner that drives them over whole compilation units.
//!
//! ## Modules
//!
//! - **[`checkers`]** - The [`Checker`] trait and the shipped checkers
//! - **[`diagnostic`]** - [`Diagnostic`] and [`Severity`]
//! - **[`runner`]** - [`CheckRunner`], visiting fragments in source order
//!
//! ## Quick Start
//!
//! ```rust
//! use flowcheck_analysis::prelude::*;
//! use flowcheck_core::{DataflowConfig, SourceTree, SymbolTable};
//!
//! let tree = SourceTree::from_json(r#"{
//!     "name": "Calc.java",
//!     "classes": [{
//!         "name": "Calc",
//!         "members": [{
//!             "member": "method",
//!             "name": "broken",
//!             "params": [{"name": "a", "ty": "int"}],
//!             "body": [{
//!                 "stmt": "return",
//!                 "value": {"expr": "binary", "op": "div",
//!                           "lhs": {"expr": "ident", "name": "a"},
//!                           "rhs": {"expr": "literal", "value": {"int": 0}}}
//!             }]
//!         }]
//!     }]
//! }"#).unwrap();
//!
//! let runner = CheckRunner::with_default_checkers(DataflowConfig::default());
//! let report = runner.check_unit(&tree, &SymbolTable::for_tree(&tree)).unwrap();
//! assert!(report.has_errors());
//! ```

pub mod checkers;
pub mod diagnostic;
pub mod runner;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::checkers::{default_checkers, Checker, ConstantConditionChecker, DivisionByZeroChecker};
    pub use crate::diagnostic::{Diagnostic, Severity};
    pub use crate::runner::{CheckReport, CheckRunner, SkippedFragment};
}

pub use checkers::{default_checkers, Checker, ConstantConditionChecker, DivisionByZeroChecker};
pub use diagnostic::{Diagnostic, Severity};
pub use runner::{CheckReport, CheckRunner, SkippedFragment};
