//! Regex pattern matching for chat messages.
//!
//! A [`PatternMatcher`] holds a set of [`CompiledRule`]s in registration
//! order. Every rule is compiled case-insensitive and multi-line. Parsing a
//! message tests every enabled rule and returns all of the matches, each with
//! the fields extracted from its capture groups.
//!
//! # Isolation
//!
//! A rule whose regex fails to compile is logged and left out of the matcher;
//! the remaining rules keep working. Use [`CompiledRule::compile`] directly
//! when a bad rule should be a hard error instead.
//!
//! # Example
//!
//! ```rust,ignore
//! use hookwire_framework::PatternMatcher;
//!
//! let matcher = PatternMatcher::with_defaults();
//! for m in matcher.parse("#expense $45.60 lunch with client", None) {
//!     println!("{} -> {:?}", m.rule.id, m.fields);
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use hookwire_core::{PatternRule, ServiceTag};
use regex::{Regex, RegexBuilder};
use tracing::{trace, warn};

use crate::builtin::default_pattern_rules;
use crate::error::{RuleError, RuleResult};

/// Fields extracted from one rule match, keyed by field name.
pub type ExtractedFields = BTreeMap<String, String>;

/// A pattern rule together with its compiled regex.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Arc<PatternRule>,
    regex: Regex,
}

impl CompiledRule {
    /// Compiles `rule`, checking its field mapping against the pattern's
    /// capture groups.
    pub fn compile(rule: PatternRule) -> RuleResult<Self> {
        let regex = build_regex(&rule.pattern).map_err(|e| RuleError::InvalidPattern {
            id: rule.id.clone(),
            reason: e.to_string(),
        })?;

        // captures_len() counts the implicit whole-match group 0.
        let available = regex.captures_len() - 1;
        if let Some((field, group)) = rule.field_groups().find(|(_, group)| *group > available) {
            return Err(RuleError::FieldOutOfRange {
                id: rule.id.clone(),
                field: field.to_string(),
                group,
                available,
            });
        }

        Ok(Self {
            rule: Arc::new(rule),
            regex,
        })
    }

    /// Returns the underlying rule.
    pub fn rule(&self) -> &Arc<PatternRule> {
        &self.rule
    }

    /// Applies the rule to `text`, returning the extracted fields on a match.
    ///
    /// Groups that did not participate (or captured nothing) are omitted.
    pub fn apply(&self, text: &str) -> Option<ExtractedFields> {
        let caps = self.regex.captures(text)?;

        let fields = self
            .rule
            .field_groups()
            .filter_map(|(name, group)| {
                caps.get(group)
                    .filter(|m| !m.as_str().is_empty())
                    .map(|m| (name.to_string(), m.as_str().trim().to_string()))
            })
            .collect();

        Some(fields)
    }
}

fn build_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
}

/// One matching rule and its extracted fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule: Arc<PatternRule>,
    pub fields: ExtractedFields,
}

impl RuleMatch {
    /// The service tag of the matched rule.
    pub fn service(&self) -> ServiceTag {
        self.rule.service
    }
}

/// An ordered set of compiled pattern rules.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    rules: Vec<CompiledRule>,
}

impl PatternMatcher {
    /// Compiles every enabled rule, skipping (and logging) rules that fail.
    pub fn new<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = PatternRule>,
    {
        let mut matcher = Self::default();
        for rule in rules.into_iter().filter(|rule| rule.enabled) {
            let id = rule.id.clone();
            if let Err(e) = matcher.push(rule) {
                warn!(rule = %id, error = %e, "Skipping pattern rule");
            }
        }
        matcher
    }

    /// Creates a matcher over the built-in rules.
    pub fn with_defaults() -> Self {
        Self::new(default_pattern_rules())
    }

    /// Compiles and appends a single rule.
    ///
    /// Disabled rules are accepted but never compiled into the matcher.
    pub fn push(&mut self, rule: PatternRule) -> RuleResult<()> {
        if self.rules.iter().any(|c| c.rule.id == rule.id) {
            return Err(RuleError::DuplicateId(rule.id));
        }
        if !rule.enabled {
            return Ok(());
        }
        self.rules.push(CompiledRule::compile(rule)?);
        Ok(())
    }

    /// Number of active rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Iterates over the active rules in registration order.
    pub fn rules(&self) -> impl Iterator<Item = &Arc<PatternRule>> {
        self.rules.iter().map(CompiledRule::rule)
    }

    /// Tests `text` against every active rule, optionally restricted to one
    /// service, and returns all matches in registration order.
    ///
    /// An empty result means no rule matched.
    pub fn parse(&self, text: &str, service: Option<ServiceTag>) -> Vec<RuleMatch> {
        self.rules
            .iter()
            .filter(|c| service.is_none_or(|s| c.rule.service == s))
            .filter_map(|c| {
                let fields = c.apply(text)?;
                trace!(rule = %c.rule.id, fields = fields.len(), "Pattern rule matched");
                Some(RuleMatch {
                    rule: Arc::clone(&c.rule),
                    fields,
                })
            })
            .collect()
    }

    /// Returns the first match, if any.
    pub fn first_match(&self, text: &str, service: Option<ServiceTag>) -> Option<RuleMatch> {
        self.rules
            .iter()
            .filter(|c| service.is_none_or(|s| c.rule.service == s))
            .find_map(|c| {
                c.apply(text).map(|fields| RuleMatch {
                    rule: Arc::clone(&c.rule),
                    fields,
                })
            })
    }

    /// Returns true if any active rule matches.
    pub fn has_match(&self, text: &str, service: Option<ServiceTag>) -> bool {
        self.first_match(text, service).is_some()
    }
}

/// Checks whether `pattern` compiles under the matcher's flags.
pub fn validate_pattern(pattern: &str) -> Result<(), regex::Error> {
    build_regex(pattern).map(|_| ())
}

/// The outcome of trying a single rule against a sample message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTest {
    pub matches: bool,
    pub fields: Option<ExtractedFields>,
    pub error: Option<String>,
}

/// Tries `rule` against `sample` regardless of its enabled flag.
pub fn test_rule(rule: &PatternRule, sample: &str) -> RuleTest {
    match CompiledRule::compile(rule.clone()) {
        Ok(compiled) => match compiled.apply(sample) {
            Some(fields) => RuleTest {
                matches: true,
                fields: Some(fields),
                error: None,
            },
            None => RuleTest::default(),
        },
        Err(e) => RuleTest {
            matches: false,
            fields: None,
            error: Some(e.to_string()),
        },
    }
}
