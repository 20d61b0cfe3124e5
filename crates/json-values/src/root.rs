//! Root propagation.
//!
//! Once registered on an owner, every object attached, added or materialized
//! below it learns the top-most owner of the tree and its full path from there.

use std::rc::{Rc, Weak};

use json_values_path::{format_path, Path};
use serde_json::Value;
use tracing::trace;

use crate::document::Slot;
use crate::error::ValuesResult;
use crate::hooks::{Hook, ObjectEvent, Subject};
use crate::model::{Model, OwnerId};
use crate::store::Store;

/// Link from a descendant to the root of its tree.
#[derive(Debug, Clone)]
pub struct RootRef {
    id: OwnerId,
    type_name: &'static str,
    key: Path,
    slot: Weak<Slot>,
}

impl RootRef {
    pub fn id(&self) -> OwnerId {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Path of the descendant inside the root's document.
    pub fn key(&self) -> &[String] {
        &self.key
    }

    /// The descendant's region as the root currently sees it. `None` once the
    /// root is gone or the region was removed.
    pub fn value(&self) -> Option<Value> {
        self.slot.upgrade()?.get(&self.key)
    }
}

/// Register the root propagation hooks on `owner`.
pub fn register_propagate_root_hooks(store: &Store, owner: &dyn Model) {
    let subject = Subject::instance(owner);
    let hooks = store.hooks();
    hooks.register(subject.clone(), Hook::post_set_object(propagate_and_register));
    hooks.register(subject.clone(), Hook::post_add_object(propagate_and_register));
    hooks.register(subject, Hook::post_build_sub_object(propagate_and_register));
}

fn propagate_and_register(store: &Store, event: &ObjectEvent<'_>) -> ValuesResult<()> {
    register_propagate_root_hooks(store, event.object.as_ref());
    propagate_root(event.object.as_ref(), event.owner, event.path);
    Ok(())
}

/// Link `object`, attached at `path` below `parent`, to the parent's root.
pub fn propagate_root(object: &dyn Model, parent: &dyn Model, path: &[String]) {
    let parent_values = parent.values();
    let link = match parent_values.root() {
        Some(root) => RootRef {
            key: [root.key.as_slice(), path].concat(),
            ..root
        },
        None => RootRef {
            id: parent_values.id(),
            type_name: parent_values.type_name(),
            key: path.to_vec(),
            slot: Rc::downgrade(&parent_values.slot),
        },
    };
    trace!(
        object = %object.values().id(),
        root = %link.id,
        key = %format_path(&link.key),
        "propagated root"
    );
    *object.values().root.borrow_mut() = Some(link);
}
