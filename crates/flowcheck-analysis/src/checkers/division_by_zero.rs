use super::Checker;
use crate::diagnostic::{Diagnostic, Severity};
use flowcheck_core::dataflow::{fragment_nodes, Constant, ConstantPropagation, Fragment};
use flowcheck_core::tree::BinOp;
use flowcheck_core::{AnalysisContext, DataflowResult, NodeId, NodeKind, ProgramEnv};

/// Flags `/` and `%` whose divisor is the constant zero on every path
#[derive(Debug, Clone, Copy, Default)]
pub struct DivisionByZeroChecker;

impl Checker for DivisionByZeroChecker {
    fn name(&self) -> &'static str {
        "division-by-zero"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check_fragment(
        &self,
        ctx: &AnalysisContext,
        fragment: &Fragment,
        env: &dyn ProgramEnv,
    ) -> DataflowResult<Vec<Diagnostic>> {
        let tree = fragment.tree();
        let divisions: Vec<(NodeId, BinOp, NodeId)> = fragment_nodes(fragment)
            .into_iter()
            .filter_map(|id| match tree.kind(id) {
                NodeKind::Binary { op, rhs, .. } if op.can_throw() => Some((id, *op, *rhs)),
                _ => None,
            })
            .collect();
        if divisions.is_empty() {
            return Ok(Vec::new());
        }

        let result = ctx.fragment_result(fragment, env, &ConstantPropagation::default())?;
        let mut diagnostics = Vec::new();
        for (id, op, divisor) in divisions {
            if result.value_of(divisor) != Some(Constant::Int(0)) {
                continue;
            }
            let message = match op {
                BinOp::Rem => "remainder by zero",
                _ => "division by zero",
            };
            diagnostics.push(Diagnostic::new(self.name(), self.severity(), fragment, id, message));
        }
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::test_support::single_method;
    use flowcheck_core::dataflow::fragments;
    use flowcheck_core::tree::{Expr, Param, Stmt};
    use flowcheck_core::SymbolTable;

    fn check(params: Vec<Param>, body: Vec<Stmt>) -> Vec<Diagnostic> {
        let tree = single_method(params, body);
        let env = SymbolTable::for_tree(&tree);
        let ctx = AnalysisContext::default();
        DivisionByZeroChecker
            .check_fragment(&ctx, &fragments(&tree)[0], &env)
            .unwrap()
    }

    fn local(name: &str, init: Expr) -> Stmt {
        Stmt::Local {
            name: name.to_string(),
            ty: "int".to_string(),
            init: Some(init),
        }
    }

    #[test]
    fn test_flags_propagated_zero() {
        // int f(int a) { int d = 0; return a / d; }
        let diags = check(
            vec![Param::new("a", "int")],
            vec![
                local("d", Expr::int(0)),
                Stmt::Return {
                    value: Some(Expr::binary(BinOp::Div, Expr::ident("a"), Expr::ident("d"))),
                },
            ],
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].rule, "division-by-zero");
        assert_eq!(diags[0].message, "division by zero");
        assert_eq!(diags[0].snippet, "a / d");
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn test_flags_remainder() {
        let diags = check(
            vec![Param::new("a", "int")],
            vec![Stmt::Return {
                value: Some(Expr::binary(
                    BinOp::Rem,
                    Expr::ident("a"),
                    Expr::binary(BinOp::Sub, Expr::int(2), Expr::int(2)),
                )),
            }],
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "remainder by zero");
    }

    #[test]
    fn test_divisor_that_may_be_nonzero() {
        // int f(int a, boolean p) { int d = 0; if (p) { d = 1; } return a / d; }
        let diags = check(
            vec![Param::new("a", "int"), Param::new("p", "boolean")],
            vec![
                local("d", Expr::int(0)),
                Stmt::If {
                    cond: Expr::ident("p"),
                    then: vec![Stmt::Expr {
                        expr: Expr::assign("d", Expr::int(1)),
                    }],
                    otherwise: None,
                },
                Stmt::Return {
                    value: Some(Expr::binary(BinOp::Div, Expr::ident("a"), Expr::ident("d"))),
                },
            ],
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_field_copied_into_divisor() {
        // int f(boolean p) { int d = 0; if (p) { d = count; } return 10 / d; }
        let diags = check(
            vec![Param::new("p", "boolean")],
            vec![
                local("d", Expr::int(0)),
                Stmt::If {
                    cond: Expr::ident("p"),
                    then: vec![Stmt::Expr {
                        expr: Expr::assign("d", Expr::ident("count")),
                    }],
                    otherwise: None,
                },
                Stmt::Return {
                    value: Some(Expr::binary(BinOp::Div, Expr::int(10), Expr::ident("d"))),
                },
            ],
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_finally_divisor_differs_per_exit() {
        // int f(boolean p) { int d = 5; try { if (p) { return 1; } d = 0; } finally { r = 10 / d; } return 0; }
        let diags = check(
            vec![Param::new("p", "boolean")],
            vec![
                local("d", Expr::int(5)),
                Stmt::Try {
                    body: vec![
                        Stmt::If {
                            cond: Expr::ident("p"),
                            then: vec![Stmt::Return {
                                value: Some(Expr::int(1)),
                            }],
                            otherwise: None,
                        },
                        Stmt::Expr {
                            expr: Expr::assign("d", Expr::int(0)),
                        },
                    ],
                    catches: vec![],
                    finally: Some(vec![Stmt::Expr {
                        expr: Expr::assign("r", Expr::binary(BinOp::Div, Expr::int(10), Expr::ident("d"))),
                    }]),
                },
                Stmt::Return {
                    value: Some(Expr::int(0)),
                },
            ],
        );
        assert!(diags.is_empty());
    }
}
