use super::Checker;
use crate::diagnostic::{Diagnostic, Severity};
use flowcheck_core::dataflow::{fragment_nodes, Constant, ConstantPropagation, Fragment};
use flowcheck_core::{AnalysisContext, DataflowResult, NodeId, NodeKind, ProgramEnv};

/// Flags branch and loop conditions that always evaluate to the same boolean
///
/// Literal conditions (`while (true)`) are taken as intentional and skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantConditionChecker;

impl ConstantConditionChecker {
    fn condition_of(kind: &NodeKind) -> Option<NodeId> {
        match kind {
            NodeKind::If { cond, .. } | NodeKind::While { cond, .. } | NodeKind::Conditional { cond, .. } => {
                Some(*cond)
            }
            NodeKind::For { cond, .. } => *cond,
            _ => None,
        }
    }
}

impl Checker for ConstantConditionChecker {
    fn name(&self) -> &'static str {
        "constant-condition"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check_fragment(
        &self,
        ctx: &AnalysisContext,
        fragment: &Fragment,
        env: &dyn ProgramEnv,
    ) -> DataflowResult<Vec<Diagnostic>> {
        let tree = fragment.tree();
        let conditions: Vec<NodeId> = fragment_nodes(fragment)
            .into_iter()
            .filter_map(|id| Self::condition_of(tree.kind(id)))
            .filter(|cond| !matches!(tree.kind(*cond), NodeKind::Literal(_)))
            .collect();
        if conditions.is_empty() {
            return Ok(Vec::new());
        }

        let result = ctx.fragment_result(fragment, env, &ConstantPropagation::default())?;
        Ok(conditions
            .into_iter()
            .filter_map(|cond| match result.value_of(cond) {
                Some(Constant::Bool(value)) => Some(Diagnostic::new(
                    self.name(),
                    self.severity(),
                    fragment,
                    cond,
                    format!("condition is always {value}"),
                )),
                _ => None,
            })
            .collect())
    }
}
