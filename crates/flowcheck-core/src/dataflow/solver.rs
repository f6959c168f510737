//! Forward dataflow framework with worklist-based fixpoint solver

use super::cfg::{Cfg, CfgEdge, CfgId, CfgNode, CfgNodeId, EdgeKind};
use super::lattice::{AbstractValue, Store};
use crate::config::DataflowConfig;
use crate::error::{DataflowError, DataflowResult};
use std::collections::BTreeSet;
use tracing::debug;

/// What a transfer function sees at one node
pub struct TransferInput<'a, V, S> {
    cfg: &'a Cfg,
    node: &'a CfgNode,
    store: &'a S,
    facts: &'a [Option<NodeFacts<V, S>>],
}

impl<'a, V, S> TransferInput<'a, V, S> {
    /// Graph being solved
    pub fn cfg(&self) -> &'a Cfg {
        self.cfg
    }

    pub fn node(&self) -> &'a CfgNode {
        self.node
    }

    /// Store flowing into the node (join over incoming edges)
    pub fn store(&self) -> &'a S {
        self.store
    }

    /// Latest value computed for operand `index`, if it has been reached
    pub fn operand(&self, index: usize) -> Option<&'a V> {
        let id = *self.node.operands.get(index)?;
        self.value_of(id)
    }

    pub fn operand_count(&self) -> usize {
        self.node.operands.len()
    }

    /// Latest value computed for any node of the graph
    pub fn value_of(&self, id: CfgNodeId) -> Option<&'a V> {
        self.facts.get(id.index())?.as_ref()?.value.as_ref()
    }
}

/// Value produced by the node and the store after it
#[derive(Debug, Clone, PartialEq)]
pub struct TransferResult<V, S> {
    pub value: Option<V>,
    pub store: S,
}

impl<V, S> TransferResult<V, S> {
    pub fn new(value: V, store: S) -> Self {
        Self {
            value: Some(value),
            store,
        }
    }

    pub fn store_only(store: S) -> Self {
        Self { value: None, store }
    }
}

/// A forward dataflow analysis
///
/// Implementations used through the analysis cache are compared by value: two
/// equal transfer functions must compute the same result on the same CFG.
pub trait ForwardTransferFunction {
    type Value: AbstractValue;
    type Store: Store;

    /// Store at the entry of `cfg`
    fn initial_store(&self, cfg: &Cfg) -> Self::Store;

    fn transfer(
        &self,
        input: &TransferInput<'_, Self::Value, Self::Store>,
    ) -> TransferResult<Self::Value, Self::Store>;

    /// Refine the store carried along `edge` of `cfg`; identity by default
    fn transfer_edge(&self, _cfg: &Cfg, _edge: &CfgEdge, store: &Self::Store) -> Self::Store {
        store.clone()
    }
}

/// Facts at one CFG node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFacts<V, S> {
    pub value: Option<V>,
    pub input: S,
    pub output: S,
}

/// Result of a fixpoint computation over one CFG
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult<V, S> {
    cfg: CfgId,
    facts: Vec<Option<NodeFacts<V, S>>>,
    node_visits: Vec<u32>,
    visits: usize,
}

impl<V, S> AnalysisResult<V, S> {
    /// Identity of the CFG this result was computed over
    pub fn cfg_id(&self) -> CfgId {
        self.cfg
    }

    /// Facts at `node`; `None` when the node was never reached
    pub fn facts(&self, node: CfgNodeId) -> Option<&NodeFacts<V, S>> {
        self.facts.get(node.index())?.as_ref()
    }

    pub fn value(&self, node: CfgNodeId) -> Option<&V> {
        self.facts(node)?.value.as_ref()
    }

    pub fn store_before(&self, node: CfgNodeId) -> Option<&S> {
        self.facts(node).map(|f| &f.input)
    }

    pub fn store_after(&self, node: CfgNodeId) -> Option<&S> {
        self.facts(node).map(|f| &f.output)
    }

    pub fn is_reached(&self, node: CfgNodeId) -> bool {
        self.facts(node).is_some()
    }

    /// Times the transfer function ran at `node`
    pub fn visits_of(&self, node: CfgNodeId) -> u32 {
        self.node_visits.get(node.index()).copied().unwrap_or(0)
    }

    /// Total transfer-function evaluations to reach the fixpoint
    pub fn visits(&self) -> usize {
        self.visits
    }
}

/// Worklist-based fixpoint solver
///
/// The worklist is ordered by reverse postorder, so an acyclic graph is
/// solved in a single pass and loops are re-visited only until stable.
#[derive(Debug, Clone, Default)]
pub struct FixpointSolver {
    config: DataflowConfig,
}

impl FixpointSolver {
    pub fn new(config: DataflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DataflowConfig {
        &self.config
    }

    /// Run `tf` over `cfg` starting from `initial` at the entry
    pub fn solve<T: ForwardTransferFunction>(
        &self,
        cfg: &Cfg,
        tf: &T,
        initial: T::Store,
    ) -> DataflowResult<AnalysisResult<T::Value, T::Store>> {
        let n = cfg.len();
        let mut facts: Vec<Option<NodeFacts<T::Value, T::Store>>> = (0..n).map(|_| None).collect();
        let mut node_visits = vec![0u32; n];

        // Entry gets the initial store
        facts[cfg.entry().index()] = Some(NodeFacts {
            value: None,
            input: initial.clone(),
            output: initial,
        });

        let mut worklist: BTreeSet<(usize, CfgNodeId)> = cfg
            .successors(cfg.entry())
            .map(|e| (cfg.rpo_rank(e.to), e.to))
            .collect();

        let limit = self.config.visit_limit(n);
        let mut visits = 0;

        while let Some((_, id)) = worklist.pop_first() {
            visits += 1;
            if visits > limit {
                return Err(DataflowError::NonConvergent {
                    fragment: cfg.label().to_string(),
                    visits,
                    limit,
                });
            }

            // Join the stores arriving on every reached incoming edge
            let mut input: Option<T::Store> = None;
            for edge in cfg.predecessors(id) {
                let Some(pred) = &facts[edge.from.index()] else {
                    continue;
                };
                let carried = if edge.kind == EdgeKind::Exception {
                    &pred.input
                } else {
                    &pred.output
                };
                let refined = tf.transfer_edge(cfg, edge, carried);
                input = Some(match input {
                    Some(acc) => acc.join(&refined),
                    None => refined,
                });
            }
            let Some(input) = input else {
                continue;
            };

            let result = tf.transfer(&TransferInput {
                cfg,
                node: cfg.node(id),
                store: &input,
                facts: &facts,
            });
            node_visits[id.index()] += 1;

            let changed = match &facts[id.index()] {
                Some(old) => old.value != result.value || old.output != result.store || old.input != input,
                None => true,
            };
            if changed {
                facts[id.index()] = Some(NodeFacts {
                    value: result.value,
                    input,
                    output: result.store,
                });
                for edge in cfg.successors(id) {
                    worklist.insert((cfg.rpo_rank(edge.to), edge.to));
                }
            }
        }

        debug!(cfg = %cfg.id(), fragment = cfg.label(), visits, "dataflow fixpoint reached");

        Ok(AnalysisResult {
            cfg: cfg.id(),
            facts,
            node_visits,
            visits,
        })
    }
}
