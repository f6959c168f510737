//! Dataflow engine configuration

use serde::{Deserialize, Serialize};

/// Tuning knobs for the fixpoint solver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataflowConfig {
    /// Visit budget per CFG node before an analysis is declared non-convergent
    pub max_visits_per_node: usize,
    /// Lower bound on the total visit budget, regardless of CFG size
    pub min_visit_limit: usize,
}

impl Default for DataflowConfig {
    fn default() -> Self {
        Self {
            max_visits_per_node: 1_000,
            min_visit_limit: 10_000,
        }
    }
}

impl DataflowConfig {
    /// Total node visits allowed for a CFG with `node_count` nodes
    pub fn visit_limit(&self, node_count: usize) -> usize {
        node_count
            .saturating_mul(self.max_visits_per_node)
            .max(self.min_visit_limit)
    }
}
