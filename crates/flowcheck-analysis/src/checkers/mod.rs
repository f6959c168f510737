//! Checkers that query dataflow facts through an [`AnalysisContext`]

mod constant_condition;
mod division_by_zero;

pub use constant_condition::ConstantConditionChecker;
pub use division_by_zero::DivisionByZeroChecker;

use crate::diagnostic::{Diagnostic, Severity};
use flowcheck_core::dataflow::Fragment;
use flowcheck_core::{AnalysisContext, DataflowResult, ProgramEnv};

/// A bug pattern evaluated one fragment at a time
///
/// Checkers get a shared context; every checker runs on a fragment before the
/// runner moves on, so their queries all hit the same resident CFG.
pub trait Checker: Send + Sync {
    fn name(&self) -> &'static str;

    fn severity(&self) -> Severity;

    fn check_fragment(
        &self,
        ctx: &AnalysisContext,
        fragment: &Fragment,
        env: &dyn ProgramEnv,
    ) -> DataflowResult<Vec<Diagnostic>>;
}

/// Every checker shipped with this crate
pub fn default_checkers() -> Vec<Box<dyn Checker>> {
    vec![Box::new(ConstantConditionChecker), Box::new(DivisionByZeroChecker)]
}

#[cfg(test)]
pub(crate) mod test_support {
    use flowcheck_core::tree::{ClassDecl, CompilationUnit, Member, Param, Stmt};
    use flowcheck_core::SourceTree;
    use std::sync::Arc;

    pub fn single_method(params: Vec<Param>, body: Vec<Stmt>) -> Arc<SourceTree> {
        SourceTree::from_unit(&CompilationUnit {
            name: "Test.java".to_string(),
            imports: vec![],
            classes: vec![ClassDecl {
                name: "Test".to_string(),
                annotations: vec![],
                members: vec![Member::Method {
                    name: "f".to_string(),
                    params,
                    annotations: vec![],
                    body: Some(body),
                }],
            }],
        })
    }
}
