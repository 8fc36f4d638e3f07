//! The weighted pattern table driving both the pattern-only pass and the
//! pattern half of the hybrid inferer.

use crate::types::DependencyType;

pub struct DependencyPattern {
    pub name: &'static str,
    pub dependent_keywords: &'static [&'static str],
    pub dependency_keywords: &'static [&'static str],
    /// An additional ordered-occurrence requirement on the dependency side,
    /// e.g. `("database", "design")` for `database.*design`: the first
    /// keyword must occur, and the second must occur somewhere after it.
    pub dependency_ordered_pair: Option<(&'static str, &'static str)>,
    pub confidence: f64,
    pub mandatory: bool,
}

/// True if `first` occurs in `text`, and `second` occurs again somewhere
/// after that first occurrence.
#[must_use]
pub fn ordered_occurrence(text: &str, first: &str, second: &str) -> bool {
    text.find(first).is_some_and(|start| text[start + first.len()..].contains(second))
}

/// Ordered highest-to-lowest priority isn't required; matches are scored and
/// the highest-confidence hit per pair wins.
pub const PATTERNS: &[DependencyPattern] = &[
    DependencyPattern {
        name: "setup_blocks_all",
        dependent_keywords: &["implement", "build", "create", "develop", "test", "deploy"],
        dependency_keywords: &["setup", "init", "configure", "install", "scaffold"],
        dependency_ordered_pair: None,
        confidence: 0.95,
        mandatory: true,
    },
    DependencyPattern {
        name: "design_before_implementation",
        dependent_keywords: &["implement", "build", "create", "code", "develop"],
        dependency_keywords: &["design", "architect", "plan", "wireframe", "spec"],
        dependency_ordered_pair: None,
        confidence: 0.95,
        mandatory: true,
    },
    DependencyPattern {
        name: "backend_before_frontend",
        dependent_keywords: &["frontend", "ui", "client", "interface"],
        dependency_keywords: &["backend", "api", "server", "endpoint", "service"],
        dependency_ordered_pair: None,
        confidence: 0.85,
        mandatory: false,
    },
    DependencyPattern {
        name: "implementation_before_testing",
        dependent_keywords: &["test", "qa", "quality", "verify", "testing"],
        dependency_keywords: &["implement", "build", "create", "develop"],
        dependency_ordered_pair: None,
        confidence: 0.95,
        mandatory: true,
    },
    DependencyPattern {
        name: "testing_before_deployment",
        dependent_keywords: &["deploy", "release", "launch", "production"],
        dependency_keywords: &["test", "qa", "quality", "verify", "testing"],
        dependency_ordered_pair: None,
        confidence: 0.95,
        mandatory: true,
    },
    DependencyPattern {
        name: "schema_before_models",
        dependent_keywords: &["model", "entity", "orm"],
        dependency_keywords: &["schema"],
        dependency_ordered_pair: Some(("database", "design")),
        confidence: 0.85,
        mandatory: false,
    },
    DependencyPattern {
        name: "auth_before_authz",
        dependent_keywords: &["authorization", "permission", "role", "access"],
        dependency_keywords: &["authentication", "login", "signin"],
        dependency_ordered_pair: None,
        confidence: 0.90,
        mandatory: true,
    },
    DependencyPattern {
        name: "basic_before_advanced",
        dependent_keywords: &["advanced", "complex", "optimization", "caching"],
        dependency_keywords: &["basic", "crud", "create", "read", "update", "delete"],
        dependency_ordered_pair: None,
        confidence: 0.75,
        mandatory: false,
    },
];

/// `schema_before_models` and `backend_before_frontend` are component-level
/// rules: they additionally require the two task names to share a
/// non-stop-word, or the match is almost certainly a false positive
/// (e.g. two unrelated "model" tasks in different subsystems).
#[must_use]
pub fn requires_shared_word(pattern_name: &str) -> bool {
    matches!(pattern_name, "schema_before_models" | "backend_before_frontend")
}

#[must_use]
pub fn dependency_type_for(pattern: &DependencyPattern) -> DependencyType {
    if pattern.mandatory {
        DependencyType::Hard
    } else {
        DependencyType::Soft
    }
}
