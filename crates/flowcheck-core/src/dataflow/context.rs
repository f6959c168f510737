//! Query surface for checkers
//!
//! One [`AnalysisContext`] is shared by every checker analysing a compilation
//! unit. Callers are expected to finish all queries on one fragment before
//! moving to the next: the CFG cache holds a single graph, so interleaving
//! fragments rebuilds graphs and discards analysis results each time.

use super::cache::{AnalysisCache, CacheCounters, CacheStatsSnapshot, CfgCache};
use super::cfg::{Cfg, CfgNodeId};
use super::fragment::{locate, Fragment};
use super::lattice::{AbstractValue, Store};
use super::solver::{AnalysisResult, FixpointSolver, ForwardTransferFunction};
use crate::config::DataflowConfig;
use crate::env::ProgramEnv;
use crate::error::{DataflowError, DataflowResult};
use crate::tree::{NodeId, TreePath};
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// An analysis result paired with the CFG it was computed over
#[derive(Debug)]
pub struct FragmentResult<V, S> {
    analysis: Arc<AnalysisResult<V, S>>,
    cfg: Arc<Cfg>,
}

impl<V, S> Clone for FragmentResult<V, S> {
    fn clone(&self) -> Self {
        Self {
            analysis: Arc::clone(&self.analysis),
            cfg: Arc::clone(&self.cfg),
        }
    }
}

impl<V, S> FragmentResult<V, S> {
    pub fn analysis(&self) -> &Arc<AnalysisResult<V, S>> {
        &self.analysis
    }

    pub fn cfg(&self) -> &Arc<Cfg> {
        &self.cfg
    }

    /// Store on normal completion of the fragment
    pub fn exit_store(&self) -> Option<&S> {
        self.analysis.store_before(self.cfg.regular_exit())
    }
}

impl<V: AbstractValue, S: Store> FragmentResult<V, S> {
    /// Value of a tree expression, joined over every reached CFG node that
    /// evaluates it
    ///
    /// Statements inside a finally block are built once per way of leaving
    /// the protected code, so one expression can have several nodes.
    pub fn value_of(&self, tree: NodeId) -> Option<V> {
        join_all(self.reached(tree).filter_map(|id| self.analysis.value(id)), V::join)
    }

    pub fn store_before(&self, tree: NodeId) -> Option<S> {
        join_all(self.reached(tree).filter_map(|id| self.analysis.store_before(id)), S::join)
    }

    pub fn store_after(&self, tree: NodeId) -> Option<S> {
        join_all(self.reached(tree).filter_map(|id| self.analysis.store_after(id)), S::join)
    }

    fn reached(&self, tree: NodeId) -> impl Iterator<Item = CfgNodeId> + '_ {
        self.cfg
            .nodes_for(tree)
            .iter()
            .copied()
            .filter(move |&id| self.analysis.is_reached(id))
    }
}

fn join_all<'a, T: Clone + 'a>(mut items: impl Iterator<Item = &'a T>, join: impl Fn(&T, &T) -> T) -> Option<T> {
    let first = items.next()?.clone();
    Some(items.fold(first, |acc, item| join(&acc, item)))
}

/// Owns the CFG and analysis caches for one analysis session
pub struct AnalysisContext {
    config: DataflowConfig,
    solver: FixpointSolver,
    counters: Arc<CacheCounters>,
    cfgs: CfgCache,
    analyses: AnalysisCache,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::new(DataflowConfig::default())
    }
}

impl AnalysisContext {
    pub fn new(config: DataflowConfig) -> Self {
        let counters = Arc::new(CacheCounters::default());
        Self {
            solver: FixpointSolver::new(config.clone()),
            config,
            cfgs: CfgCache::with_counters(Arc::clone(&counters)),
            analyses: AnalysisCache::with_counters(Arc::clone(&counters)),
            counters,
        }
    }

    pub fn config(&self) -> &DataflowConfig {
        &self.config
    }

    /// The CFG of `fragment`, served from the cache when resident
    pub fn cfg_for<E: ProgramEnv + ?Sized>(&self, fragment: &Fragment, env: &E) -> DataflowResult<Arc<Cfg>> {
        self.cfgs.get_or_build(fragment, env, &self.analyses)
    }

    /// Run (or fetch) `tf` over an already built CFG
    pub fn analysis_for<T>(&self, cfg: &Arc<Cfg>, tf: &T) -> DataflowResult<Arc<AnalysisResult<T::Value, T::Store>>>
    where
        T: ForwardTransferFunction + Clone + Eq + Hash + Send + Sync + 'static,
        T::Value: Send + Sync + 'static,
        T::Store: Send + Sync + 'static,
    {
        self.analyses.get_or_run(cfg, tf, &self.solver)
    }

    /// Analysis of the fragment enclosing `position`
    ///
    /// `Ok(None)` when the position is outside every fragment or inside a
    /// method without a body.
    pub fn result_for<E, T>(
        &self,
        position: &TreePath,
        env: &E,
        tf: &T,
    ) -> DataflowResult<Option<FragmentResult<T::Value, T::Store>>>
    where
        E: ProgramEnv + ?Sized,
        T: ForwardTransferFunction + Clone + Eq + Hash + Send + Sync + 'static,
        T::Value: Send + Sync + 'static,
        T::Store: Send + Sync + 'static,
    {
        let Some(fragment) = locate(position) else {
            debug!(position = %position, "no enclosing fragment");
            return Ok(None);
        };
        if !fragment.has_body() {
            return Ok(None);
        }
        self.fragment_result(&fragment, env, tf).map(Some)
    }

    /// Analysis of a known fragment
    pub fn fragment_result<E, T>(
        &self,
        fragment: &Fragment,
        env: &E,
        tf: &T,
    ) -> DataflowResult<FragmentResult<T::Value, T::Store>>
    where
        E: ProgramEnv + ?Sized,
        T: ForwardTransferFunction + Clone + Eq + Hash + Send + Sync + 'static,
        T::Value: Send + Sync + 'static,
        T::Store: Send + Sync + 'static,
    {
        let cfg = self.cfg_for(fragment, env)?;
        let analysis = self.analysis_for(&cfg, tf)?;
        Ok(FragmentResult { analysis, cfg })
    }

    /// Abstract value of the expression at `expr`
    ///
    /// `Ok(None)` when there is no enclosing fragment, the fragment is a
    /// bodiless method, or the expression is never reached.
    pub fn value_of<E, T>(&self, expr: &TreePath, env: &E, tf: &T) -> DataflowResult<Option<T::Value>>
    where
        E: ProgramEnv + ?Sized,
        T: ForwardTransferFunction + Clone + Eq + Hash + Send + Sync + 'static,
        T::Value: Send + Sync + 'static,
        T::Store: Send + Sync + 'static,
    {
        let leaf = expr.leaf_kind();
        if !leaf.is_expression() {
            return Err(DataflowError::NotAnExpression { kind: leaf.name() });
        }
        let Some(result) = self.result_for(expr, env, tf)? else {
            return Ok(None);
        };
        Ok(result.value_of(expr.leaf()))
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.counters.snapshot()
    }

    pub fn resident_cfg(&self) -> Option<Arc<Cfg>> {
        self.cfgs.resident()
    }

    pub fn resident_fragment(&self) -> Option<Fragment> {
        self.cfgs.resident_fragment()
    }

    /// Number of analysis results cached for the resident CFG
    pub fn cached_analyses(&self) -> usize {
        self.analyses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_context_is_shareable() {
        assert_send_sync::<AnalysisContext>();
    }

    #[test]
    fn test_fresh_context_is_empty() {
        let ctx = AnalysisContext::default();
        assert!(ctx.resident_cfg().is_none());
        assert_eq!(ctx.cached_analyses(), 0);
        assert_eq!(ctx.stats(), CacheStatsSnapshot::default());
    }
}
