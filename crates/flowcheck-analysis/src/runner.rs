//! Runs checkers over compilation units, one fragment at a time

use crate::checkers::{default_checkers, Checker};
use crate::diagnostic::{Diagnostic, Severity};
use anyhow::{Context, Result};
use flowcheck_core::dataflow::fragments;
use flowcheck_core::{AnalysisContext, CacheStatsSnapshot, DataflowConfig, DataflowError, ProgramEnv, SourceTree};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// A fragment the runner could not analyse
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFragment {
    pub fragment: String,
    pub reason: String,
}

/// Outcome of checking one compilation unit
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub unit: String,
    pub fragments_checked: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub skipped: Vec<SkippedFragment>,
}

impl CheckReport {
    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity.is_at_least(severity))
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.count_at_least(Severity::Error) > 0
    }
}

/// Owns the analysis context and the registered checkers
pub struct CheckRunner {
    ctx: AnalysisContext,
    checkers: Vec<Box<dyn Checker>>,
}

impl CheckRunner {
    /// A runner without checkers
    pub fn new(config: DataflowConfig) -> Self {
        Self {
            ctx: AnalysisContext::new(config),
            checkers: Vec::new(),
        }
    }

    pub fn with_default_checkers(config: DataflowConfig) -> Self {
        let mut runner = Self::new(config);
        runner.checkers = default_checkers();
        runner
    }

    pub fn register(&mut self, checker: Box<dyn Checker>) {
        self.checkers.push(checker);
    }

    /// Drop checkers by name; returns the names that matched nothing
    pub fn disable<'a>(&mut self, names: &'a [String]) -> Vec<&'a str> {
        let unknown = names
            .iter()
            .filter(|n| !self.checkers.iter().any(|c| c.name() == n.as_str()))
            .map(String::as_str)
            .collect();
        self.checkers.retain(|c| !names.iter().any(|n| n == c.name()));
        unknown
    }

    pub fn checker_names(&self) -> Vec<&'static str> {
        self.checkers.iter().map(|c| c.name()).collect()
    }

    pub fn context(&self) -> &AnalysisContext {
        &self.ctx
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.ctx.stats()
    }

    /// Run every checker on every fragment of `tree`
    ///
    /// Fragments are visited in source order and all checkers finish on one
    /// fragment before the next, so each fragment's CFG is built once.
    /// Fragments whose CFG cannot be built, or whose analysis does not
    /// converge, are reported as skipped.
    pub fn check_unit(&self, tree: &Arc<SourceTree>, env: &dyn ProgramEnv) -> Result<CheckReport> {
        let mut report = CheckReport {
            unit: tree.name().to_string(),
            ..CheckReport::default()
        };

        for fragment in fragments(tree) {
            if !fragment.has_body() {
                continue;
            }
            report.fragments_checked += 1;
            debug!(fragment = %fragment, "checking fragment");

            for checker in &self.checkers {
                match checker.check_fragment(&self.ctx, &fragment, env) {
                    Ok(found) => report.diagnostics.extend(found),
                    Err(err @ (DataflowError::CompletionFailure { .. } | DataflowError::NonConvergent { .. })) => {
                        warn!(fragment = %fragment, checker = checker.name(), error = %err, "skipping fragment");
                        report.skipped.push(SkippedFragment {
                            fragment: fragment.name(),
                            reason: err.to_string(),
                        });
                        break;
                    }
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!("checker `{}` failed on {} in {}", checker.name(), fragment, tree.name())
                        })
                    }
                }
            }
        }

        Ok(report)
    }
}
