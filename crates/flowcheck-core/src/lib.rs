//! # Flowcheck Core
//!
//! Control-flow graphs, forward dataflow fixpoint analysis and the caches that
//! let many checkers query the same code without rebuilding graphs or
//! re-running analyses.
//!
//! ## Modules
//!
//! - **[`tree`]** - Program tree model and positions ([`TreePath`])
//! - **[`dataflow`]** - Fragment location, CFG construction, fixpoint solver,
//!   caches and the [`AnalysisContext`] query surface
//! - **[`env`]** - Symbol resolution used while building CFGs
//!
//! ## Quick Start
//!
//! ```rust
//! use flowcheck_core::prelude::*;
//!
//! let tree = SourceTree::from_json(r#"{
//!     "name": "Example.java",
//!     "classes": [{
//!         "name": "Example",
//!         "members": [{
//!             "member": "method",
//!             "name": "answer",
//!             "body": [
//!                 {"stmt": "local", "name": "x", "ty": "int",
//!                  "init": {"expr": "literal", "value": {"int": 42}}},
//!                 {"stmt": "return", "value": {"expr": "ident", "name": "x"}}
//!             ]
//!         }]
//!     }]
//! }"#).unwrap();
//!
//! let env = SymbolTable::for_tree(&tree);
//! let ctx = AnalysisContext::default();
//!
//! let read = tree.find(|k| matches!(k, NodeKind::Ident { .. })).unwrap();
//! let value = ctx
//!     .value_of(&tree.path_to(read), &env, &ConstantPropagation::default())
//!     .unwrap();
//! assert_eq!(value, Some(Constant::Int(42)));
//! ```

pub mod config;
pub mod dataflow;
pub mod env;
pub mod error;
pub mod tree;

pub use config::DataflowConfig;
pub use dataflow::{AnalysisContext, CacheStatsSnapshot, Fragment, FragmentKind, FragmentResult};
pub use env::{ProgramEnv, SymbolTable};
pub use error::{DataflowError, DataflowResult};
pub use tree::{NodeId, NodeKind, SourceTree, TreePath};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::DataflowConfig;
    pub use crate::dataflow::{
        fragment_nodes, fragments, locate, AnalysisContext, Cfg, CfgNodeKind, Constant, ConstantPropagation,
        ConstantStore, EdgeKind, ForwardTransferFunction, Fragment, FragmentKind, Store, TransferInput,
        TransferResult,
    };
    pub use crate::env::{ProgramEnv, SymbolTable};
    pub use crate::error::{DataflowError, DataflowResult};
    pub use crate::tree::{NodeId, NodeKind, SourceTree, TreePath};
}
