//! Forward dataflow analysis over program fragments
//!
//! This module implements:
//! - Fragment location (method, lambda, initializer, field initializer)
//! - Control Flow Graph construction with short-circuit, loop, exception and
//!   finally-duplication edges
//! - Lattice contracts and a worklist-based fixpoint solver
//! - A single-entry CFG cache and an analysis result cache tied to it
//! - Constant propagation as a ready-made analysis

mod builder;
mod cache;
mod cfg;
mod context;
mod fragment;
mod lattice;
mod propagation;
mod solver;

pub use builder::{build_cfg, CfgBuilder};
pub use cache::{AnalysisCache, CacheStatsSnapshot, CfgCache};
pub use cfg::{Cfg, CfgEdge, CfgId, CfgNode, CfgNodeId, CfgNodeKind, EdgeKind};
pub use context::{AnalysisContext, FragmentResult};
pub use fragment::{fragment_nodes, fragments, locate, Fragment, FragmentKind};
pub use lattice::{AbstractValue, Constant, ConstantStore, Store};
pub use propagation::ConstantPropagation;
pub use solver::{AnalysisResult, FixpointSolver, ForwardTransferFunction, NodeFacts, TransferInput, TransferResult};
