//! classify
//!
//! File change classification.
//!
//! Every changed path in a sync cycle is classified as either
//! **additive** (independent contributions that accumulate, safe to
//! merge automatically) or **shared state** (agreed structure where
//! concurrent edits need a human decision).
//!
//! # Rules
//!
//! Classification is driven by glob rules compiled once per manifest
//! load:
//!
//! - Built-in rules cover the conventional vault layout: `examples/`,
//!   `learnings/`, and `traces/` hold additive content; `schema/`,
//!   `instructions/`, and `metrics/` hold shared state.
//! - The manifest's `auto_merge_patterns` add additive rules and
//!   `review_required_patterns` add shared-state rules.
//!
//! When several rules match, the most specific one (longest pattern)
//! wins. A tie between classes resolves to shared state, and a path no
//! rule matches is shared state. Unknown content defaulting to the
//! cautious class means a misconfigured vault asks for review rather
//! than silently merging.
//!
//! Classification is pure and total: the same path always gets the
//! same answer and no input panics or errors.

use glob::{MatchOptions, Pattern};

use crate::core::types::VaultPath;
use crate::manifest::SyncPolicy;

/// Built-in additive rules for the conventional vault layout.
const BUILT_IN_ADDITIVE: [&str; 3] = ["examples/**", "learnings/**", "traces/**"];

/// Built-in shared-state rules for the conventional vault layout.
const BUILT_IN_SHARED: [&str; 3] = ["schema/**", "instructions/**", "metrics/**"];

/// Glob semantics: `*` stays within one path component, `**` crosses
/// components.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// How a changed file merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeClass {
    /// Independent contributions; concurrent changes union cleanly.
    Additive,
    /// Agreed structure; concurrent changes need a human decision.
    SharedState,
}

impl ChangeClass {
    /// Whether this class merges without review.
    pub fn is_additive(&self) -> bool {
        matches!(self, ChangeClass::Additive)
    }
}

impl std::fmt::Display for ChangeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeClass::Additive => write!(f, "additive"),
            ChangeClass::SharedState => write!(f, "shared-state"),
        }
    }
}

/// One compiled classification rule.
#[derive(Debug, Clone)]
struct Rule {
    pattern: Pattern,
    class: ChangeClass,
    /// Longer patterns are more specific and win over shorter ones.
    specificity: usize,
}

impl Rule {
    fn compile(pattern: &str, class: ChangeClass) -> Option<Self> {
        let compiled = Pattern::new(pattern).ok()?;
        Some(Self {
            pattern: compiled,
            class,
            specificity: pattern.len(),
        })
    }
}

/// The compiled rule set for a vault.
///
/// Compiled once when the manifest loads; classification afterwards is
/// allocation-free matching.
///
/// # Example
///
/// ```
/// use collabvault::classify::{ChangeClass, RuleSet};
/// use collabvault::core::types::VaultPath;
///
/// let rules = RuleSet::built_in();
/// let path = VaultPath::new("learnings/retries.md").unwrap();
/// assert_eq!(rules.classify(&path), ChangeClass::Additive);
/// ```
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// The built-in rules alone, with no manifest extensions.
    pub fn built_in() -> Self {
        Self::with_extensions(&[], &[])
    }

    /// Compile built-in rules plus a manifest's pattern lists.
    pub fn from_policy(policy: &SyncPolicy) -> Self {
        Self::with_extensions(
            &policy.auto_merge_patterns,
            &policy.review_required_patterns,
        )
    }

    fn with_extensions(additive: &[String], shared: &[String]) -> Self {
        let mut rules = Vec::new();

        for pattern in BUILT_IN_ADDITIVE {
            if let Some(rule) = Rule::compile(pattern, ChangeClass::Additive) {
                rules.push(rule);
            }
        }
        for pattern in BUILT_IN_SHARED {
            if let Some(rule) = Rule::compile(pattern, ChangeClass::SharedState) {
                rules.push(rule);
            }
        }

        // Manifest validation rejects bad globs before they get here;
        // skipping keeps classification total regardless.
        for pattern in additive {
            if let Some(rule) = Rule::compile(pattern, ChangeClass::Additive) {
                rules.push(rule);
            }
        }
        for pattern in shared {
            if let Some(rule) = Rule::compile(pattern, ChangeClass::SharedState) {
                rules.push(rule);
            }
        }

        Self { rules }
    }

    /// Classify a vault path.
    ///
    /// The most specific matching rule decides; a specificity tie or
    /// no match at all resolves to [`ChangeClass::SharedState`].
    pub fn classify(&self, path: &VaultPath) -> ChangeClass {
        let mut best: Option<(usize, ChangeClass)> = None;

        for rule in &self.rules {
            if !rule.pattern.matches_with(path.as_str(), MATCH_OPTIONS) {
                continue;
            }

            best = Some(match best {
                None => (rule.specificity, rule.class),
                Some((specificity, class)) => {
                    if rule.specificity > specificity {
                        (rule.specificity, rule.class)
                    } else if rule.specificity == specificity && rule.class != class {
                        (specificity, ChangeClass::SharedState)
                    } else {
                        (specificity, class)
                    }
                }
            });
        }

        best.map(|(_, class)| class).unwrap_or(ChangeClass::SharedState)
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the rule set is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
