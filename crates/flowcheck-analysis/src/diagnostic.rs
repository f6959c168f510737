//! Findings reported by checkers

use flowcheck_core::dataflow::Fragment;
use flowcheck_core::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl Severity {
    pub fn is_at_least(self, threshold: Severity) -> bool {
        self >= threshold
    }
}

/// A single finding, located by fragment and tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Name of the checker that produced it
    pub rule: String,
    pub severity: Severity,
    /// Compilation unit name, e.g. `Test.java`
    pub unit: String,
    /// Fragment name, e.g. `Test.f`
    pub fragment: String,
    pub node: NodeId,
    /// The offending expression rendered as source text
    pub snippet: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(rule: &str, severity: Severity, fragment: &Fragment, node: NodeId, message: impl Into<String>) -> Self {
        let tree = fragment.tree();
        Self {
            rule: rule.to_string(),
            severity,
            unit: tree.name().to_string(),
            fragment: fragment.name(),
            node,
            snippet: tree.render(node),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}[{}] in {}: {} (`{}`)",
            self.unit, self.severity, self.rule, self.fragment, self.message, self.snippet
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Error.is_at_least(Severity::Warning));
        assert!(!Severity::Info.is_at_least(Severity::Warning));
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"warning\"");
    }

    #[test]
    fn test_display() {
        let diag = Diagnostic {
            rule: "division-by-zero".to_string(),
            severity: Severity::Error,
            unit: "Test.java".to_string(),
            fragment: "Test.f".to_string(),
            node: NodeId(4),
            snippet: "x / 0".to_string(),
            message: "division by zero".to_string(),
        };
        insta::assert_snapshot!(diag.to_string(), @"Test.java: error[division-by-zero] in Test.f: division by zero (`x / 0`)");
    }
}
