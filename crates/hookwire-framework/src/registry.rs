//! The webhook and pattern rule registry.
//!
//! One [`RuleRegistry`] instance is built at startup and shared (behind an
//! `Arc`) by the router and whoever manages rules. There is no global state:
//! tests and sessions each construct their own.
//!
//! # Webhook Selection
//!
//! [`find_webhook_for_rule`](RuleRegistry::find_webhook_for_rule) considers
//! enabled rules for the requested service that are in scope for the room.
//! A rule scoped to that exact room wins over a global one; within the same
//! tier the earliest registered rule wins.

use std::sync::Arc;

use hookwire_core::{PatternRule, ServiceTag, WebhookRule};
use parking_lot::RwLock;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::builtin::default_pattern_rules;
use crate::error::{RegistryError, RegistryResult, RuleError};
use crate::matcher::{CompiledRule, PatternMatcher};
use crate::template::template_by_id;

/// Pattern rules and the matcher compiled from them, swapped together.
#[derive(Default)]
struct PatternSet {
    rules: Vec<PatternRule>,
    matcher: Arc<PatternMatcher>,
}

/// Holds webhook rules and pattern rules.
#[derive(Default)]
pub struct RuleRegistry {
    webhooks: RwLock<Vec<WebhookRule>>,
    patterns: RwLock<PatternSet>,
}

impl RuleRegistry {
    /// Creates an empty registry with no pattern rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry seeded with the built-in pattern rules.
    pub fn with_defaults() -> Self {
        let rules = default_pattern_rules();
        let matcher = PatternMatcher::new(rules.clone());
        Self {
            webhooks: RwLock::new(Vec::new()),
            patterns: RwLock::new(PatternSet {
                rules,
                matcher: Arc::new(matcher),
            }),
        }
    }

    // =========================================================================
    // Pattern rules
    // =========================================================================

    /// Returns the current matcher.
    ///
    /// The matcher is immutable; later additions produce a new one, so a
    /// caller holding this `Arc` sees a consistent rule set.
    pub fn matcher(&self) -> Arc<PatternMatcher> {
        Arc::clone(&self.patterns.read().matcher)
    }

    /// Returns every pattern rule, including disabled ones.
    pub fn pattern_rules(&self) -> Vec<PatternRule> {
        self.patterns.read().rules.clone()
    }

    /// Appends a pattern rule after validating it.
    ///
    /// Unlike the built-in set, a user rule that fails to compile is an
    /// error here so the problem is reported at load time.
    pub fn add_pattern_rule(&self, rule: PatternRule) -> RegistryResult<()> {
        insert_pattern(&mut self.patterns.write(), rule)
    }

    // =========================================================================
    // Webhook rules
    // =========================================================================

    /// Appends a fully specified webhook rule.
    pub fn add_webhook(&self, rule: WebhookRule) -> RegistryResult<()> {
        let mut webhooks = self.webhooks.write();
        if webhooks.iter().any(|w| w.id == rule.id) {
            return Err(RegistryError::DuplicateWebhook(rule.id));
        }
        info!(
            webhook = %rule.id,
            service = %rule.service,
            room_id = rule.room_id.as_deref().unwrap_or("*"),
            "Registered webhook"
        );
        webhooks.push(rule);
        Ok(())
    }

    /// Instantiates a webhook rule from a built-in template and appends it.
    ///
    /// If the template's default parser is not yet covered by a registered
    /// pattern rule (same id, or same pattern for the same service), it is
    /// registered as well so the new webhook can actually fire.
    pub fn add_from_template(
        &self,
        template_id: &str,
        url: &str,
        created_by: &str,
        room_id: Option<&str>,
    ) -> RegistryResult<WebhookRule> {
        let template = template_by_id(template_id)
            .ok_or_else(|| RegistryError::UnknownTemplate(template_id.to_string()))?;

        let parser = &template.default_parser;
        {
            // Check and insert under one guard so concurrent callers register it once.
            let mut set = self.patterns.write();
            let covered = set.rules.iter().any(|r| {
                r.id == parser.id || (r.service == parser.service && r.pattern == parser.pattern)
            });
            if !covered {
                insert_pattern(&mut set, parser.clone())?;
            }
        }

        let mut rule = template.instantiate(
            url,
            created_by,
            room_id.map(str::to_string),
            OffsetDateTime::now_utc(),
        );

        let mut webhooks = self.webhooks.write();
        // Two rules from the same template within one millisecond share a base id.
        let base = rule.id.clone();
        let mut n = 1;
        while webhooks.iter().any(|w| w.id == rule.id) {
            rule.id = format!("{base}-{n}");
            n += 1;
        }

        info!(
            webhook = %rule.id,
            template = template_id,
            room_id = room_id.unwrap_or("*"),
            "Created webhook from template"
        );
        webhooks.push(rule.clone());
        Ok(rule)
    }

    /// Selects the webhook for a matched pattern in `room_id`.
    ///
    /// Room-scoped rules take precedence over global rules; registration
    /// order breaks ties within each tier.
    pub fn find_webhook_for_rule(&self, service: ServiceTag, room_id: &str) -> Option<WebhookRule> {
        let webhooks = self.webhooks.read();
        let candidates = || {
            webhooks
                .iter()
                .filter(|w| w.enabled && w.service == service && w.is_in_scope(room_id))
        };

        candidates()
            .find(|w| w.is_room_scoped())
            .or_else(|| candidates().next())
            .cloned()
    }

    /// Records a successful dispatch for the webhook `id`.
    ///
    /// Returns the new trigger count, or `None` if the webhook is unknown.
    pub fn record_trigger(&self, id: &str) -> Option<u64> {
        let mut webhooks = self.webhooks.write();
        let rule = webhooks.iter_mut().find(|w| w.id == id)?;
        rule.record_trigger(OffsetDateTime::now_utc());
        Some(rule.trigger_count)
    }

    /// Returns a copy of the webhook `id`.
    pub fn webhook(&self, id: &str) -> Option<WebhookRule> {
        self.webhooks.read().iter().find(|w| w.id == id).cloned()
    }

    /// Returns a copy of every webhook in registration order.
    pub fn webhooks(&self) -> Vec<WebhookRule> {
        self.webhooks.read().clone()
    }

    /// Number of registered webhooks.
    pub fn webhook_count(&self) -> usize {
        self.webhooks.read().len()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("webhook_count", &self.webhooks.read().len())
            .field("pattern_count", &self.patterns.read().rules.len())
            .finish()
    }
}

fn insert_pattern(set: &mut PatternSet, rule: PatternRule) -> RegistryResult<()> {
    if set.rules.iter().any(|r| r.id == rule.id) {
        return Err(RuleError::DuplicateId(rule.id).into());
    }

    let mut matcher = PatternMatcher::clone(&set.matcher);
    if rule.enabled {
        matcher.push(rule.clone())?;
    } else {
        // Still reject a broken rule even if it starts out disabled.
        CompiledRule::compile(rule.clone())?;
    }

    debug!(rule = %rule.id, service = %rule.service, "Registered pattern rule");
    set.rules.push(rule);
    set.matcher = Arc::new(matcher);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOM: &str = "!ops:example.org";
    const OTHER_ROOM: &str = "!random:example.org";

    fn hook(id: &str, service: ServiceTag) -> WebhookRule {
        WebhookRule::new(id, id, format!("https://hook.example.com/{id}"), service, "@admin:x")
    }

    #[test]
    fn test_room_scoped_wins_over_global() {
        let registry = RuleRegistry::new();
        registry.add_webhook(hook("global", ServiceTag::Trello)).unwrap();
        registry
            .add_webhook(hook("scoped", ServiceTag::Trello).in_room(ROOM))
            .unwrap();

        let found = registry.find_webhook_for_rule(ServiceTag::Trello, ROOM).unwrap();
        assert_eq!(found.id, "scoped");

        let found = registry
            .find_webhook_for_rule(ServiceTag::Trello, OTHER_ROOM)
            .unwrap();
        assert_eq!(found.id, "global");
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let registry = RuleRegistry::new();
        registry.add_webhook(hook("first", ServiceTag::Gmail)).unwrap();
        registry.add_webhook(hook("second", ServiceTag::Gmail)).unwrap();
        registry
            .add_webhook(hook("scoped-a", ServiceTag::Gmail).in_room(ROOM))
            .unwrap();
        registry
            .add_webhook(hook("scoped-b", ServiceTag::Gmail).in_room(ROOM))
            .unwrap();

        assert_eq!(
            registry.find_webhook_for_rule(ServiceTag::Gmail, OTHER_ROOM).unwrap().id,
            "first"
        );
        assert_eq!(
            registry.find_webhook_for_rule(ServiceTag::Gmail, ROOM).unwrap().id,
            "scoped-a"
        );
    }

    #[test]
    fn test_disabled_and_out_of_scope_rules_are_skipped() {
        let registry = RuleRegistry::new();
        registry
            .add_webhook(hook("off", ServiceTag::Slack).enabled(false))
            .unwrap();
        registry
            .add_webhook(hook("elsewhere", ServiceTag::Slack).in_room(OTHER_ROOM))
            .unwrap();

        assert!(registry.find_webhook_for_rule(ServiceTag::Slack, ROOM).is_none());
        assert!(registry.find_webhook_for_rule(ServiceTag::Gmail, ROOM).is_none());
    }

    #[test]
    fn test_duplicate_webhook_rejected() {
        let registry = RuleRegistry::new();
        registry.add_webhook(hook("a", ServiceTag::Custom)).unwrap();
        assert_eq!(
            registry.add_webhook(hook("a", ServiceTag::Custom)),
            Err(RegistryError::DuplicateWebhook("a".into()))
        );
    }

    #[test]
    fn test_add_from_template() {
        let registry = RuleRegistry::with_defaults();
        let rule = registry
            .add_from_template(
                "trello-task-creator",
                "https://hook.example.com/t0k3n",
                "@alice:example.org",
                Some(ROOM),
            )
            .unwrap();

        assert!(rule.id.starts_with("trello-task-creator-"));
        assert_eq!(rule.created_by, "@alice:example.org");
        assert_eq!(rule.room_id.as_deref(), Some(ROOM));
        assert_eq!(registry.webhook(&rule.id), Some(rule.clone()));

        let again = registry
            .add_from_template("trello-task-creator", "https://hook.example.com/2", "@a:x", None)
            .unwrap();
        assert_ne!(again.id, rule.id);
        assert_eq!(registry.webhook_count(), 2);
    }

    #[test]
    fn test_add_from_template_registers_missing_parser() {
        let registry = RuleRegistry::with_defaults();
        assert!(!registry.matcher().has_match("@slack #general hi", None));

        registry
            .add_from_template("slack-crosspost", "https://hook.example.com/s", "@a:x", None)
            .unwrap();
        assert!(registry.matcher().has_match("@slack #general hi", None));

        // Same pattern as the built-in sheets rule: nothing new is registered.
        let before = registry.pattern_rules().len();
        registry
            .add_from_template("sheets-expense-tracker", "https://hook.example.com/e", "@a:x", None)
            .unwrap();
        assert_eq!(registry.pattern_rules().len(), before);
    }

    #[test]
    fn test_concurrent_template_adds_register_parser_once() {
        let registry = RuleRegistry::with_defaults();
        let before = registry.pattern_rules().len();

        let ids: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let registry = &registry;
                    scope.spawn(move || {
                        registry
                            .add_from_template(
                                "slack-crosspost",
                                &format!("https://hook.example.com/s{i}"),
                                "@a:x",
                                None,
                            )
                            .unwrap()
                            .id
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(registry.pattern_rules().len(), before + 1);
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 8);
        assert_eq!(registry.webhook_count(), 8);
    }

    #[test]
    fn test_unknown_template() {
        let registry = RuleRegistry::with_defaults();
        assert_eq!(
            registry.add_from_template("nope", "https://x/1", "@a:x", None),
            Err(RegistryError::UnknownTemplate("nope".into()))
        );
    }

    #[test]
    fn test_record_trigger_counts_every_call() {
        let registry = RuleRegistry::new();
        registry.add_webhook(hook("w", ServiceTag::Calendar)).unwrap();

        assert_eq!(registry.record_trigger("w"), Some(1));
        assert_eq!(registry.record_trigger("w"), Some(2));
        let rule = registry.webhook("w").unwrap();
        assert_eq!(rule.trigger_count, 2);
        assert!(rule.last_triggered.is_some());
        assert_eq!(registry.record_trigger("missing"), None);
    }

    #[test]
    fn test_add_pattern_rule() {
        let registry = RuleRegistry::with_defaults();
        let rule = PatternRule::new("deploy", "Deploy", r"^!deploy\s+(\w+)", ServiceTag::Custom)
            .with_fields(["env"]);
        registry.add_pattern_rule(rule).unwrap();
        assert!(registry.matcher().has_match("!deploy staging", None));

        let broken = PatternRule::new("broken", "Broken", "(", ServiceTag::Custom).enabled(false);
        assert!(matches!(
            registry.add_pattern_rule(broken),
            Err(RegistryError::Rule(RuleError::InvalidPattern { .. }))
        ));

        let dup = PatternRule::new("deploy", "Again", "x", ServiceTag::Custom);
        assert_eq!(
            registry.add_pattern_rule(dup),
            Err(RegistryError::Rule(RuleError::DuplicateId("deploy".into())))
        );
    }
}
