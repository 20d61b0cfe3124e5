//! Change tracking.
//!
//! Records every value written through `set_value`/`add_value` into the
//! owner's change set at the same path, and resets the change set whenever
//! the whole document is replaced.

use json_values_path::set;
use serde_json::{Map, Value};

use crate::error::ValuesResult;
use crate::hooks::{Hook, HookId, Subject, ValueChanged};
use crate::store::Store;

/// Register change tracking for a subject.
///
/// The store installs it globally unless
/// [`StoreOptions::track_changes`](crate::StoreOptions::track_changes) is off.
pub fn track_changes(store: &Store, subject: Subject) -> Vec<HookId> {
    let hooks = store.hooks();
    vec![
        hooks.register(
            subject.clone(),
            Hook::post_set_values(|_, event| {
                *event.owner.values().changes.borrow_mut() = Value::Object(Map::new());
                Ok(())
            }),
        ),
        hooks.register(subject.clone(), Hook::post_set_value(record_change)),
        hooks.register(subject, Hook::post_add_value(record_change)),
    ]
}

fn record_change(_: &Store, event: &ValueChanged<'_>) -> ValuesResult<()> {
    // Every write is recorded; an unset only when it removed something.
    if !event.value.is_null() || event.modified {
        set(
            &mut event.owner.values().changes.borrow_mut(),
            event.path,
            event.value.clone(),
        );
    }
    Ok(())
}

/// Deep-merge `source` into `target`. Mappings merge key by key, anything else
/// in `source` replaces what `target` holds.
pub fn merge_changes(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge_changes(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
