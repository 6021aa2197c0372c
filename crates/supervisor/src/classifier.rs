// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error classification rules (§4.F), evaluated first-match-wins.

use crate::backoff::BackoffFlavor;

/// Broad category a classified error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Transient,
    Permanent,
    Process,
    Resource,
    Api,
    Unknown,
}

/// What the recovery manager should do in response to a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Ignore,
    Retry,
    Restart,
    Fail,
    OpenBreaker,
}

/// Result of classifying one error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub action: Action,
    pub retryable: bool,
    pub backoff: BackoffFlavor,
}

struct Rule {
    patterns: &'static [&'static str],
    classification: Classification,
}

/// A priority-ordered list of substring rules classifying error text.
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Classifier {
    /// The default rule set from §4.F, evaluated in the order listed.
    pub fn with_defaults() -> Self {
        Self {
            rules: vec![
                Rule {
                    patterns: &["connection refused", "timeout", "temporarily unavailable"],
                    classification: Classification {
                        category: Category::Transient,
                        action: Action::Retry,
                        retryable: true,
                        backoff: BackoffFlavor::Exponential,
                    },
                },
                Rule {
                    patterns: &["permission denied", "invalid api key", "unauthorized"],
                    classification: Classification {
                        category: Category::Permanent,
                        action: Action::Fail,
                        retryable: false,
                        backoff: BackoffFlavor::Fixed,
                    },
                },
                Rule {
                    patterns: &["process exited", "signal: killed"],
                    classification: Classification {
                        category: Category::Process,
                        action: Action::Restart,
                        retryable: true,
                        backoff: BackoffFlavor::Exponential,
                    },
                },
                Rule {
                    patterns: &["out of memory", "resource limit"],
                    classification: Classification {
                        category: Category::Resource,
                        action: Action::OpenBreaker,
                        retryable: false,
                        backoff: BackoffFlavor::Fixed,
                    },
                },
            ],
        }
    }

    /// Classify `error_text`, case-insensitively, returning the first
    /// matching rule or the `Unknown/Ignore` default.
    pub fn classify(&self, error_text: &str) -> Classification {
        let lower = error_text.to_lowercase();
        for rule in &self.rules {
            if rule.patterns.iter().any(|p| lower.contains(p)) {
                return rule.classification;
            }
        }
        Classification {
            category: Category::Unknown,
            action: Action::Ignore,
            retryable: false,
            backoff: BackoffFlavor::Fixed,
        }
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
