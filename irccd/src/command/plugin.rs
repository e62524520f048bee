//! `plugin-*` commands (spec §4.5).
//!
//! The scripting host that actually loads and runs plugins is out of
//! scope (spec §1); these commands operate against a minimal in-daemon
//! plugin registry (name -> loaded flag + opaque string config map) so
//! the command surface and the rule engine's per-plugin routing are fully
//! exercised without a real host.

use irccd_util::{IrccdError, Result};

use super::require_str;
use crate::dispatch::{DispatchState, PluginEntry};

pub fn load(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let name = require_str(frame, "plugin")?.to_string();
    let entry = state.plugins.entry(name.clone()).or_default();
    entry.loaded = true;
    Ok(serde_json::json!({"plugin": name}))
}

pub fn unload(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let name = require_str(frame, "plugin")?;
    match state.plugins.get_mut(name) {
        Some(entry) => {
            entry.loaded = false;
            Ok(serde_json::json!({}))
        }
        None => Err(IrccdError::InvalidPropertyType {
            name: "plugin".to_string(),
            expected: "loaded plugin name",
            got: "unknown plugin",
        }),
    }
}

pub fn reload(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let name = require_str(frame, "plugin")?;
    match state.plugins.get_mut(name) {
        Some(entry) => {
            entry.loaded = true;
            Ok(serde_json::json!({}))
        }
        None => Err(IrccdError::InvalidPropertyType {
            name: "plugin".to_string(),
            expected: "loaded plugin name",
            got: "unknown plugin",
        }),
    }
}

pub fn list(state: &mut DispatchState, _frame: &serde_json::Value) -> Result<serde_json::Value> {
    let names: Vec<&str> = state
        .plugins
        .iter()
        .filter(|(_, e)| e.loaded)
        .map(|(name, _)| name.as_str())
        .collect();
    Ok(serde_json::json!({"list": names}))
}

pub fn info(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let name = require_str(frame, "plugin")?;
    let entry = state
        .plugins
        .get(name)
        .ok_or_else(|| IrccdError::InvalidPropertyType {
            name: "plugin".to_string(),
            expected: "known plugin",
            got: "unknown plugin",
        })?;
    Ok(serde_json::json!({"name": name, "loaded": entry.loaded}))
}

pub fn config(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let name = require_str(frame, "plugin")?.to_string();
    let entry: &mut PluginEntry = state.plugins.entry(name).or_default();

    if let Some(key) = frame.get("variable").and_then(|v| v.as_str()) {
        if let Some(value) = frame.get("value").and_then(|v| v.as_str()) {
            entry.config.insert(key.to_string(), value.to_string());
            return Ok(serde_json::json!({}));
        }
        return Ok(serde_json::json!({"value": entry.config.get(key)}));
    }
    Ok(serde_json::to_value(&entry.config).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DispatchState {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        DispatchState::new(tx)
    }

    #[test]
    fn load_then_list_shows_plugin() {
        let mut s = state();
        load(&mut s, &serde_json::json!({"plugin": "logger"})).unwrap();
        let listed = list(&mut s, &serde_json::json!({})).unwrap();
        assert_eq!(listed["list"], serde_json::json!(["logger"]));
    }

    #[test]
    fn unload_hides_from_list_but_keeps_entry() {
        let mut s = state();
        load(&mut s, &serde_json::json!({"plugin": "logger"})).unwrap();
        unload(&mut s, &serde_json::json!({"plugin": "logger"})).unwrap();
        let listed = list(&mut s, &serde_json::json!({})).unwrap();
        assert_eq!(listed["list"], serde_json::json!([]));
        assert!(info(&mut s, &serde_json::json!({"plugin": "logger"})).is_ok());
    }

    #[test]
    fn config_sets_and_reads_back_a_variable() {
        let mut s = state();
        config(&mut s, &serde_json::json!({"plugin": "logger", "variable": "level", "value": "debug"})).unwrap();
        let read = config(&mut s, &serde_json::json!({"plugin": "logger", "variable": "level"})).unwrap();
        assert_eq!(read["value"], "debug");
    }

    #[test]
    fn unload_unknown_plugin_errors() {
        let mut s = state();
        assert!(unload(&mut s, &serde_json::json!({"plugin": "ghost"})).is_err());
    }
}
