//! Module and builtin policies for submissions
//!
//! Three fixed tables decide what a submission can reach:
//! - [`AllowlistPolicy`]: top-level modules the gated import accepts
//! - [`DenylistPolicy`]: builtins that are never exposed
//! - [`BuiltinPolicy`]: builtins that are exposed (must not overlap the denylist)
//!
//! The allowlist checks only the top-level name. An allowed module keeps its
//! own capabilities: `os` can spawn processes and `requests` can reach the
//! network. That is a trust boundary chosen to support data-processing code,
//! not an isolation guarantee.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Modules a submission may import out of the box
pub const DEFAULT_ALLOWED_MODULES: &[&str] = &[
    "json",
    "math",
    "random",
    "datetime",
    "time",
    "collections",
    "itertools",
    "functools",
    "operator",
    "re",
    "string",
    "os",
    "typing",
    "boto3",
    "botocore",
    "requests",
    "numpy",
    "pandas",
    "matplotlib",
    "PIL",
    "anthropic",
    "openai",
    "ibm_watsonx_ai",
    "ibm_watson_machine_learning",
];

/// Builtins removed from every submission namespace
pub const DENIED_BUILTINS: &[&str] = &["open", "eval", "exec", "compile"];

/// Builtins exposed to submissions, besides the builtin exception types
pub const PERMITTED_BUILTINS: &[&str] = &[
    "abs",
    "aiter",
    "all",
    "anext",
    "any",
    "ascii",
    "bin",
    "bool",
    "bytearray",
    "bytes",
    "callable",
    "chr",
    "classmethod",
    "complex",
    "delattr",
    "dict",
    "dir",
    "divmod",
    "enumerate",
    "filter",
    "float",
    "format",
    "frozenset",
    "getattr",
    "globals",
    "hasattr",
    "hash",
    "hex",
    "id",
    "input",
    "int",
    "isinstance",
    "issubclass",
    "iter",
    "len",
    "list",
    "locals",
    "map",
    "max",
    "memoryview",
    "min",
    "next",
    "object",
    "oct",
    "ord",
    "pow",
    "print",
    "property",
    "range",
    "repr",
    "reversed",
    "round",
    "set",
    "setattr",
    "slice",
    "sorted",
    "staticmethod",
    "str",
    "sum",
    "super",
    "tuple",
    "type",
    "vars",
    "zip",
    "Ellipsis",
    "NotImplemented",
    "__build_class__",
];

static DEFAULT_ALLOWLIST: Lazy<AllowlistPolicy> =
    Lazy::new(|| AllowlistPolicy::new(DEFAULT_ALLOWED_MODULES.iter().copied()));

/// Set of importable top-level module names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowlistPolicy {
    modules: BTreeSet<String>,
}

impl AllowlistPolicy {
    pub fn new<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }

    /// Copy of this policy with one more module
    #[must_use]
    pub fn with(mut self, module: impl Into<String>) -> Self {
        self.modules.insert(module.into());
        self
    }

    /// Whether an import of `name` (possibly dotted) is allowed
    #[must_use]
    pub fn permits(&self, name: &str) -> bool {
        self.modules.contains(top_level(name))
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for AllowlistPolicy {
    fn default() -> Self {
        DEFAULT_ALLOWLIST.clone()
    }
}

/// Builtins stripped from the namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenylistPolicy {
    names: &'static [&'static str],
}

impl DenylistPolicy {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            names: DENIED_BUILTINS,
        }
    }

    #[must_use]
    pub fn denies(&self, name: &str) -> bool {
        self.names.contains(&name)
    }

    #[must_use]
    pub const fn names(&self) -> &'static [&'static str] {
        self.names
    }
}

impl Default for DenylistPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Builtins handed to the submission namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinPolicy {
    names: &'static [&'static str],
}

impl BuiltinPolicy {
    /// Build the exposed set, refusing any overlap with `denylist`
    pub fn new(denylist: &DenylistPolicy) -> crate::Result<Self> {
        if let Some(name) = PERMITTED_BUILTINS.iter().find(|n| denylist.denies(n)) {
            return Err(crate::ExecutorError::Config(format!(
                "builtin '{name}' is both permitted and denied"
            )));
        }
        Ok(Self {
            names: PERMITTED_BUILTINS,
        })
    }

    #[must_use]
    pub const fn names(&self) -> &'static [&'static str] {
        self.names
    }
}

/// Leading component of a dotted module path
#[must_use]
pub fn top_level(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_checks_top_level_name() {
        let policy = AllowlistPolicy::default();
        assert!(policy.permits("json"));
        assert!(policy.permits("os.path"));
        assert!(policy.permits("collections.abc"));
        assert!(!policy.permits("subprocess"));
        assert!(!policy.permits("socket"));
        assert!(!policy.permits("jsonx"));
        assert!(!policy.permits(""));
    }

    #[test]
    fn allowlist_is_exact_not_prefix() {
        let policy = AllowlistPolicy::new(["re"]);
        assert!(policy.permits("re"));
        assert!(!policy.permits("requests"));
    }

    #[test]
    fn builtin_policy_is_disjoint_from_denylist() {
        let denylist = DenylistPolicy::default();
        let builtins = BuiltinPolicy::new(&denylist).unwrap();
        for name in builtins.names() {
            assert!(!denylist.denies(name), "{name} is denied");
        }
        for name in ["open", "eval", "exec", "compile"] {
            assert!(denylist.denies(name));
            assert!(!builtins.names().contains(&name));
        }
        assert!(builtins.names().contains(&"print"));
        assert!(!builtins.names().contains(&"__import__"));
    }

    #[test]
    fn top_level_splits_on_first_dot() {
        assert_eq!(top_level("a.b.c"), "a");
        assert_eq!(top_level("plain"), "plain");
    }

    #[test]
    fn allowlist_round_trips_as_plain_list() {
        let policy = AllowlistPolicy::new(["math", "json"]);
        let json = serde_json::to_string(&policy).unwrap();
        assert_eq!(json, r#"["json","math"]"#);
    }
}
