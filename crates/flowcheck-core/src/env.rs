//! Program environment: symbol resolution for the CFG builder

use crate::error::{DataflowError, DataflowResult};
use crate::tree::SourceTree;
use std::collections::BTreeSet;

/// Names visible without declaration in every unit
const BUILTIN_TYPES: &[&str] = &[
    "void",
    "var",
    "int",
    "long",
    "short",
    "byte",
    "char",
    "float",
    "double",
    "boolean",
    "Object",
    "String",
    "Integer",
    "Long",
    "Boolean",
    "Runnable",
    "Throwable",
    "Exception",
    "Error",
    "RuntimeException",
    "ArithmeticException",
    "IllegalArgumentException",
    "IllegalStateException",
    "NullPointerException",
    "UnsupportedOperationException",
];

/// The compilation context a CFG is built in
///
/// Implementations must be shareable across threads; the caches never retain
/// an environment beyond a single build.
pub trait ProgramEnv: Send + Sync {
    /// Resolve a type name, failing with [`DataflowError::CompletionFailure`]
    /// when it is unknown
    fn resolve_type(&self, name: &str) -> DataflowResult<()>;
}

/// Set-of-names environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    known: BTreeSet<String>,
}

impl SymbolTable {
    /// Empty table; every lookup fails
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.extend(BUILTIN_TYPES.iter().copied());
        table
    }

    /// Builtins plus the classes declared in `tree`
    pub fn for_tree(tree: &SourceTree) -> Self {
        let mut table = Self::with_builtins();
        table.extend(tree.class_names());
        table
    }

    pub fn with_type(mut self, name: impl Into<String>) -> Self {
        self.known.insert(name.into());
        self
    }

    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known.extend(names.into_iter().map(Into::into));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.known.contains(name)
    }
}

/// `List<String>[]` resolves through `List`
fn base_name(name: &str) -> &str {
    let name = name.trim();
    let name = name.split('<').next().unwrap_or(name);
    name.trim_end_matches("[]").trim()
}

impl ProgramEnv for SymbolTable {
    fn resolve_type(&self, name: &str) -> DataflowResult<()> {
        let base = base_name(name);
        let simple = base.rsplit('.').next().unwrap_or(base);
        if self.known.contains(base) || self.known.contains(simple) {
            Ok(())
        } else {
            Err(DataflowError::completion_failure(name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve() {
        let env = SymbolTable::with_builtins();
        assert!(env.resolve_type("int").is_ok());
        assert!(env.resolve_type("java.lang.String").is_ok());
        assert!(env.resolve_type("String[]").is_ok());
    }

    #[test]
    fn test_unknown_type_is_completion_failure() {
        let env = SymbolTable::with_builtins();
        let err = env.resolve_type("com.acme.Widget").unwrap_err();
        assert!(matches!(err, DataflowError::CompletionFailure { symbol } if symbol == "com.acme.Widget"));
    }

    #[test]
    fn test_generic_base_and_extra_names() {
        let env = SymbolTable::with_builtins().with_type("List");
        assert!(env.resolve_type("List<String>").is_ok());
        assert!(env.resolve_type("Map<String, Integer>").is_err());
    }
}
