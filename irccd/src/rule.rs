//! Rule engine (spec §4.3, component B).
//!
//! Ported directly from spec.md: an ordered list of rules, each matching a
//! `(server, channel, origin, plugin, event)` tuple when every one of its
//! five sets is either empty or contains the corresponding value. Rules are
//! addressed purely by position — there are no rule identifiers.

use irccd_protocol::{Rule, RuleAction, RuleMatch};
use irccd_util::{IrccdError, Result};

/// Does `rule` match `tuple`? (spec §4.3 "Match")
pub fn matches(rule: &Rule, tuple: &RuleMatch<'_>) -> bool {
    field_matches(&rule.servers, tuple.server)
        && field_matches(&rule.channels, tuple.channel)
        && field_matches(&rule.origins, tuple.origin)
        && field_matches(&rule.plugins, tuple.plugin)
        && field_matches(&rule.events, tuple.event)
}

fn field_matches(set: &std::collections::HashSet<String>, value: &str) -> bool {
    set.is_empty() || set.contains(value)
}

/// An ordered, index-addressed sequence of rules (spec §4.3 "Operations").
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn list(&self) -> &[Rule] {
        &self.rules
    }

    /// Append a rule at the end.
    pub fn add(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Insert `rule` at `pos`, shifting later rules up. `pos == len()` is
    /// allowed and behaves like `add`.
    pub fn insert(&mut self, rule: Rule, pos: usize) -> Result<()> {
        if pos > self.rules.len() {
            return Err(IrccdError::RuleIndexOutOfRange {
                index: pos,
                len: self.rules.len(),
            });
        }
        self.rules.insert(pos, rule);
        Ok(())
    }

    /// Remove the rule at `pos`, shifting later rules down.
    pub fn remove(&mut self, pos: usize) -> Result<Rule> {
        if pos >= self.rules.len() {
            return Err(IrccdError::RuleIndexOutOfRange {
                index: pos,
                len: self.rules.len(),
            });
        }
        Ok(self.rules.remove(pos))
    }

    /// Resolve the verdict for `tuple` (spec §4.3 "Resolve"): start from
    /// `Accept`, walk rules in order, let each match overwrite the running
    /// verdict, return the verdict after the last matching rule.
    pub fn resolve(&self, tuple: &RuleMatch<'_>) -> RuleAction {
        let mut verdict = RuleAction::Accept;
        for rule in &self.rules {
            if matches(rule, tuple) {
                verdict = rule.action;
            }
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(plugins: &[&str], events: &[&str], action: RuleAction) -> Rule {
        Rule {
            plugins: plugins.iter().map(|s| s.to_string()).collect(),
            events: events.iter().map(|s| s.to_string()).collect(),
            action,
            ..Rule::default()
        }
    }

    fn tuple<'a>(plugin: &'a str, event: &'a str) -> RuleMatch<'a> {
        RuleMatch {
            server: "s",
            channel: "#x",
            origin: "a!b@c",
            plugin,
            event,
        }
    }

    #[test]
    fn empty_rule_set_accepts_everything() {
        let rules = RuleSet::new();
        assert_eq!(rules.resolve(&tuple("logger", "onMessage")), RuleAction::Accept);
    }

    #[test]
    fn empty_set_field_matches_anything() {
        // spec §8 invariant: empty-set fields never cause a rule to fail to match.
        let mut rules = RuleSet::new();
        rules.add(rule(&[], &["onMessage"], RuleAction::Drop));
        assert_eq!(rules.resolve(&tuple("anything", "onMessage")), RuleAction::Drop);
    }

    #[test]
    fn later_matching_rule_overwrites_verdict() {
        let mut rules = RuleSet::new();
        rules.add(rule(&["logger"], &["onMessage"], RuleAction::Drop));
        rules.add(rule(&["logger"], &[], RuleAction::Accept));
        assert_eq!(rules.resolve(&tuple("logger", "onMessage")), RuleAction::Accept);
    }

    #[test]
    fn scenario_rule_drop_from_spec_section_8() {
        let mut rules = RuleSet::new();
        rules.add(rule(&["logger"], &["onMessage"], RuleAction::Drop));
        assert_eq!(rules.resolve(&tuple("logger", "onMessage")), RuleAction::Drop);
        assert_eq!(rules.resolve(&tuple("other", "onMessage")), RuleAction::Accept);
    }

    #[test]
    fn add_then_list_returns_rule_at_last_position() {
        let mut rules = RuleSet::new();
        rules.add(rule(&["a"], &[], RuleAction::Accept));
        let r = rule(&["b"], &[], RuleAction::Drop);
        rules.add(r.clone());
        assert_eq!(rules.list().last().unwrap(), &r);
    }

    #[test]
    fn insert_then_remove_restores_previous_sequence() {
        let mut rules = RuleSet::new();
        rules.add(rule(&["a"], &[], RuleAction::Accept));
        rules.add(rule(&["c"], &[], RuleAction::Accept));
        let before: Vec<_> = rules.list().to_vec();

        rules.insert(rule(&["b"], &[], RuleAction::Drop), 1).unwrap();
        rules.remove(1).unwrap();

        assert_eq!(rules.list(), before.as_slice());
    }

    #[test]
    fn insert_out_of_range_errors() {
        let mut rules = RuleSet::new();
        assert!(rules.insert(rule(&[], &[], RuleAction::Accept), 1).is_err());
    }

    #[test]
    fn remove_out_of_range_errors() {
        let mut rules = RuleSet::new();
        assert!(rules.remove(0).is_err());
    }

    #[test]
    fn case_sensitive_matching_rule() {
        let mut rules = RuleSet::new();
        rules.add(rule(&["Logger"], &[], RuleAction::Drop));
        assert_eq!(rules.resolve(&tuple("logger", "onMessage")), RuleAction::Accept);
        assert_eq!(rules.resolve(&tuple("Logger", "onMessage")), RuleAction::Drop);
    }
}
