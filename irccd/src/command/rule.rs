//! `rule-*` commands (spec §4.5, §4.3).

use std::collections::HashSet;

use irccd_protocol::{Rule, RuleAction};
use irccd_util::{IrccdError, Result};

use super::require_str;
use crate::dispatch::DispatchState;

fn string_set(frame: &serde_json::Value, key: &str) -> HashSet<String> {
    frame
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).map(String::from).collect())
        .unwrap_or_default()
}

fn parse_action(frame: &serde_json::Value) -> Result<RuleAction> {
    match require_str(frame, "action")? {
        "accept" => Ok(RuleAction::Accept),
        "drop" => Ok(RuleAction::Drop),
        other => Err(IrccdError::InvalidPropertyType {
            name: "action".to_string(),
            expected: "'accept' or 'drop'",
            got: if other.is_empty() { "empty string" } else { "string" },
        }),
    }
}

fn build_rule(frame: &serde_json::Value) -> Result<Rule> {
    Ok(Rule {
        servers: string_set(frame, "servers"),
        channels: string_set(frame, "channels"),
        origins: string_set(frame, "origins"),
        plugins: string_set(frame, "plugins"),
        events: string_set(frame, "events"),
        action: parse_action(frame)?,
    })
}

pub fn add(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let rule = build_rule(frame)?;
    state.rules.add(rule);
    Ok(serde_json::json!({"index": state.rules.len() - 1}))
}

fn index_of(frame: &serde_json::Value) -> Result<usize> {
    frame
        .get("index")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| IrccdError::MissingProperty("index".to_string()))
}

pub fn remove(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let index = index_of(frame)?;
    state.rules.remove(index)?;
    Ok(serde_json::json!({}))
}

pub fn list(state: &mut DispatchState, _frame: &serde_json::Value) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(state.rules.list()).unwrap())
}

pub fn move_rule(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let from = index_of(frame)?;
    let to = frame
        .get("to")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| IrccdError::MissingProperty("to".to_string()))?;
    let rule = state.rules.remove(from)?;
    state.rules.insert(rule, to)?;
    Ok(serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DispatchState {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        DispatchState::new(tx)
    }

    #[test]
    fn add_then_list_round_trips() {
        let mut s = state();
        let frame = serde_json::json!({"plugins": ["logger"], "events": ["onMessage"], "action": "drop"});
        add(&mut s, &frame).unwrap();
        let listed = list(&mut s, &serde_json::json!({})).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[test]
    fn rejects_unknown_action_string() {
        let mut s = state();
        let frame = serde_json::json!({"action": "sideways"});
        assert!(add(&mut s, &frame).is_err());
    }

    #[test]
    fn move_rule_reorders() {
        let mut s = state();
        add(&mut s, &serde_json::json!({"plugins": ["a"], "action": "accept"})).unwrap();
        add(&mut s, &serde_json::json!({"plugins": ["b"], "action": "drop"})).unwrap();
        move_rule(&mut s, &serde_json::json!({"index": 1, "to": 0})).unwrap();
        assert!(s.rules.list()[0].plugins.contains("b"));
    }
}
