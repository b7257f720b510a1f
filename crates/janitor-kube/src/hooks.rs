//! Resource context hooks
//!
//! A context hook enriches the `_context` document with deployment
//! specific facts so rules can query them. Hooks are plain functions
//! registered by name at build time and selected with
//! `--resource-context-hook=<name>`; there is no dynamic code loading.

use std::collections::BTreeMap;

use rand::Rng;
use serde_json::{Map, Value};

use crate::resource::Resource;

/// Hook failures are logged and swallowed, never aborting a resource.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// A context hook receives the resource and a cycle-wide scratch map and
/// returns extra `_context` entries.
pub type ContextHook = fn(&Resource, &mut BTreeMap<String, Value>) -> Result<Map<String, Value>, HookError>;

/// Look up a built-in hook by its registered name.
pub fn resolve_hook(name: &str) -> Option<ContextHook> {
    match name {
        "random-dice" => Some(random_dice),
        _ => None,
    }
}

const DICE_CACHE_KEY: &str = "random_dice";

/// Example hook: expose `_context.random_dice` as a dice value (1-6),
/// rolled once per clean-up cycle via the shared scratch map.
pub fn random_dice(
    _resource: &Resource,
    cache: &mut BTreeMap<String, Value>,
) -> Result<Map<String, Value>, HookError> {
    let value = match cache.get(DICE_CACHE_KEY) {
        Some(value) => value.clone(),
        None => {
            let roll = rand::thread_rng().gen_range(1..=6);
            let value = Value::from(roll);
            cache.insert(DICE_CACHE_KEY.to_string(), value.clone());
            value
        }
    };

    let mut extra = Map::new();
    extra.insert(DICE_CACHE_KEY.to_string(), value);
    Ok(extra)
}
