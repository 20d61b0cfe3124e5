//! The value store: the only entry points that read or mutate an owner's
//! document, so every registered hook sees every operation.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;

use json_values_path::{
    append, get, join_key, set, unset, validate_path, IntoPath, Path, PathError,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::cast::{register_cast_hooks, CastTo};
use crate::changes::{merge_changes, track_changes};
use crate::config::StoreOptions;
use crate::error::{ValuesError, ValuesResult};
use crate::hooks::{
    Hook, HookEvent, HookRegistry, Subject, ValueChanged, ValueEvent, ValueRead, ValuesReplaced,
};
use crate::model::{Model, ModelKind, ModelType};
use crate::objects::register_cache_hooks;

/// Context for all value and object operations.
///
/// Holds the hook registry and the registered model types. Owners are plain
/// structs, the store is passed alongside them:
///
/// ```
/// use json_values::{impl_model, Store, Values};
/// use serde_json::json;
///
/// struct Repository {
///     values: Values,
/// }
///
/// impl Default for Repository {
///     fn default() -> Self {
///         Self { values: Values::of::<Self>() }
///     }
/// }
///
/// impl_model!(Repository);
///
/// let store = Store::new();
/// let repo = Repository::default();
/// store.set_value(&repo, "owner.login", "symfony").unwrap();
/// assert_eq!(store.get_value(&repo, "owner.login").unwrap(), json!("symfony"));
/// assert_eq!(store.get_changes(&repo), json!({"owner": {"login": "symfony"}}));
/// ```
pub struct Store {
    options: StoreOptions,
    hooks: HookRegistry,
    types: RefCell<HashMap<String, ModelType>>,
    prepared: RefCell<HashSet<&'static str>>,
    prepared_generation: Cell<u64>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    pub fn with_options(options: StoreOptions) -> Self {
        let store = Self {
            options,
            hooks: HookRegistry::new(),
            types: RefCell::new(HashMap::new()),
            prepared: RefCell::new(HashSet::new()),
            prepared_generation: Cell::new(0),
        };
        store.install_default_hooks();
        store
    }

    fn install_default_hooks(&self) {
        if self.options.track_changes {
            track_changes(self, Subject::Global);
        }
        if self.options.cast_values {
            register_cast_hooks(self, Subject::Global);
        }
        debug!(
            track_changes = self.options.track_changes,
            cast_values = self.options.cast_values,
            "installed default hooks"
        );
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Clear the hook registry, then reinstall the interceptors the options
    /// ask for.
    pub fn clear_hooks(&self) {
        self.hooks.clear_all();
        self.install_default_hooks();
    }

    /// Make a model type resolvable by name.
    pub fn register_type<T: ModelKind>(&self) -> ModelType {
        let model_type = ModelType::of::<T>();
        self.types
            .borrow_mut()
            .insert(model_type.name().to_string(), model_type);
        model_type
    }

    /// Look up a registered model type.
    pub fn model_type(&self, name: &str) -> ValuesResult<ModelType> {
        self.registered_type(name)
            .ok_or_else(|| ValuesError::UnknownType {
                name: name.to_string(),
            })
    }

    pub(crate) fn registered_type(&self, name: &str) -> Option<ModelType> {
        self.types.borrow().get(name).copied()
    }

    pub(crate) fn path(&self, path: impl IntoPath) -> ValuesResult<Path> {
        let path = path.into_path();
        validate_path(&path, self.options.path_policy, self.options.max_path_depth)
            .map_err(|source| ValuesError::invalid_path(&path, source))?;
        Ok(path)
    }

    /// Like [`Store::path`], rejecting the root.
    pub(crate) fn member_path(&self, path: impl IntoPath) -> ValuesResult<Path> {
        let path = self.path(path)?;
        if path.is_empty() {
            return Err(ValuesError::invalid_path(&path, PathError::Empty));
        }
        Ok(path)
    }

    /// Install the object cache interceptors for the owner's type, once per
    /// registry generation.
    pub(crate) fn prepare(&self, owner: &dyn Model) {
        let generation = self.hooks.generation();
        if self.prepared_generation.get() != generation {
            self.prepared.borrow_mut().clear();
            self.prepared_generation.set(generation);
        }
        let type_name = owner.values().type_name();
        if self.prepared.borrow_mut().insert(type_name) {
            register_cache_hooks(self, Subject::type_name(type_name));
            debug!(model = type_name, "registered object cache hooks");
        }
    }

    fn prepare_if_caching(&self, owner: &dyn Model) {
        if !owner.values().objects.borrow().is_empty() {
            self.prepare(owner);
        }
    }

    /// Replace the owner's whole document.
    ///
    /// Resets the change set and clears the object cache through the
    /// `post_set_values` hooks. On a bound child the new document is written
    /// into the parent's region.
    pub fn set_values(&self, owner: &dyn Model, values: Value) -> ValuesResult<()> {
        if !json_values_path::is_container(&values) {
            return Err(ValuesError::type_conflict(&[], "replace values", &values));
        }
        self.prepare_if_caching(owner);
        owner.values().slot.replace(values.clone());
        trace!(owner = %owner.values().id(), "replaced values");
        self.fire_values_replaced(owner, &values, false)
    }

    pub(crate) fn fire_values_replaced(
        &self,
        owner: &dyn Model,
        values: &Value,
        by_reference: bool,
    ) -> ValuesResult<()> {
        let event = ValuesReplaced {
            owner,
            values,
            by_reference,
        };
        for hook in self.hooks.query(owner.values(), HookEvent::PostSetValues) {
            if let Hook::PostSetValues(f) = hook {
                f(self, &event)?;
            }
        }
        Ok(())
    }

    /// Copy of the owner's whole document.
    pub fn get_values(&self, owner: &dyn Model) -> Value {
        json_values_path::copy(&owner.values().slot.snapshot())
    }

    /// Write a value at a path. Null removes the value.
    ///
    /// `pre_set_value` hooks may replace the value first. Cached objects at or
    /// below the path are invalidated.
    pub fn set_value(
        &self,
        owner: &dyn Model,
        path: impl IntoPath,
        value: impl Into<Value>,
    ) -> ValuesResult<()> {
        let path = self.member_path(path)?;
        self.prepare_if_caching(owner);
        let value = self.run_pre_hooks(HookEvent::PreSetValue, owner, &path, None, value.into())?;

        let modified = owner.values().slot.write(&path, |root, full| {
            if value.is_null() {
                unset(root, full)
            } else {
                set(root, full, value.clone())
            }
        });
        trace!(owner = %owner.values().id(), path = ?path, modified, "set value");

        self.fire_changed(HookEvent::PostSetValue, owner, &path, &value, modified)
    }

    /// Append a value to the collection at `path` and return its key.
    ///
    /// Without `key` the next integer position is used. An explicit key is a
    /// single literal step and may contain dots. The member path, key
    /// included, is validated like any other path.
    ///
    /// # Errors
    ///
    /// - [`ValuesError::InvalidPath`] when the key breaks the path policy or
    ///   the member path is too deep.
    /// - [`ValuesError::TypeConflict`] when the path holds a scalar.
    pub fn add_value(
        &self,
        owner: &dyn Model,
        path: impl IntoPath,
        value: impl Into<Value>,
        key: Option<&str>,
    ) -> ValuesResult<String> {
        let path = self.path(path)?;
        // Generated positions are digits, so "0" stands in for them.
        self.path(join_key(&path, key.unwrap_or("0")))?;
        self.prepare_if_caching(owner);
        let value = self.run_pre_hooks(HookEvent::PreAddValue, owner, &path, key, value.into())?;

        let (key, modified) = owner
            .values()
            .slot
            .write(&path, |root, full| append(root, full, value.clone(), key))
            .map_err(|err| match err {
                PathError::NotAContainer { found } => ValuesError::TypeConflict {
                    path: json_values_path::format_path(&path),
                    action: "append",
                    found,
                },
                other => ValuesError::invalid_path(&path, other),
            })?;
        trace!(owner = %owner.values().id(), path = ?path, key = %key, "added value");

        let member = join_key(&path, &key);
        self.fire_changed(HookEvent::PostAddValue, owner, &member, &value, modified)?;
        Ok(key)
    }

    /// Read the value at a path, null when absent.
    pub fn get_value(&self, owner: &dyn Model, path: impl IntoPath) -> ValuesResult<Value> {
        self.read_value(owner, path, Value::Null, None)
    }

    /// Read the value at a path, `default` when absent or null.
    pub fn get_value_or(
        &self,
        owner: &dyn Model,
        path: impl IntoPath,
        default: impl Into<Value>,
    ) -> ValuesResult<Value> {
        self.read_value(owner, path, default.into(), None)
    }

    /// Read the value at a path and ask the cast hooks to convert it.
    pub fn get_value_cast(
        &self,
        owner: &dyn Model,
        path: impl IntoPath,
        default: impl Into<Value>,
        cast_to: CastTo,
    ) -> ValuesResult<Value> {
        self.read_value(owner, path, default.into(), Some(cast_to))
    }

    /// Read the value at a path and deserialize it. `None` when absent.
    pub fn get_value_as<T: DeserializeOwned>(
        &self,
        owner: &dyn Model,
        path: impl IntoPath,
    ) -> ValuesResult<Option<T>> {
        match self.get_value(owner, path)? {
            Value::Null => Ok(None),
            value => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Whether the path holds a non-null value. Runs no hooks.
    pub fn has_value(&self, owner: &dyn Model, path: impl IntoPath) -> ValuesResult<bool> {
        let path = self.path(path)?;
        Ok(owner
            .values()
            .slot
            .read(&path, |root, full| json_values_path::has(root, full)))
    }

    fn read_value(
        &self,
        owner: &dyn Model,
        path: impl IntoPath,
        default: Value,
        cast_to: Option<CastTo>,
    ) -> ValuesResult<Value> {
        let path = self.path(path)?;
        let value = owner
            .values()
            .slot
            .read(&path, |root, full| get(root, full).cloned())
            .filter(|value| !value.is_null())
            .unwrap_or_else(|| default.clone());

        let event = ValueRead {
            owner,
            path: &path,
            value: &value,
            default: &default,
            cast_to,
        };
        for hook in self.hooks.query(owner.values(), HookEvent::PostGetValue) {
            if let Hook::PostGetValue(f) = hook {
                if let Some(replaced) = f(self, &event)?.filter(|value| !value.is_null()) {
                    return Ok(replaced);
                }
            }
        }
        Ok(value)
    }

    /// The change set recorded on this owner since its last full replace.
    pub fn get_changes(&self, owner: &dyn Model) -> Value {
        owner.values().changes.borrow().clone()
    }

    /// The owner's change set merged with the changes of every cached child,
    /// placed at the child's path.
    pub fn collect_changes(&self, owner: &dyn Model) -> Value {
        let mut changes = self.get_changes(owner);
        let children: Vec<_> = owner
            .values()
            .objects
            .borrow()
            .iter()
            .map(|(path, child)| (path.clone(), child.clone()))
            .collect();
        for (path, child) in children {
            let child_changes = self.collect_changes(child.as_ref());
            if child_changes.as_object().is_some_and(Map::is_empty) {
                continue;
            }
            let target = json_values_path::ensure_container(&mut changes, &path);
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            merge_changes(target, child_changes);
        }
        changes
    }

    fn run_pre_hooks(
        &self,
        event: HookEvent,
        owner: &dyn Model,
        path: &[String],
        key: Option<&str>,
        mut value: Value,
    ) -> ValuesResult<Value> {
        for hook in self.hooks.query(owner.values(), event) {
            let f = match hook {
                Hook::PreSetValue(f) | Hook::PreAddValue(f) => f,
                _ => continue,
            };
            let replaced = f(
                self,
                &ValueEvent {
                    owner,
                    path,
                    key,
                    value: &value,
                },
            )?;
            if let Some(replaced) = replaced.filter(|value| !value.is_null()) {
                value = replaced;
            }
        }
        Ok(value)
    }

    fn fire_changed(
        &self,
        event: HookEvent,
        owner: &dyn Model,
        path: &[String],
        value: &Value,
        modified: bool,
    ) -> ValuesResult<()> {
        let payload = ValueChanged {
            owner,
            path,
            value,
            modified,
        };
        for hook in self.hooks.query(owner.values(), event) {
            if let Hook::PostSetValue(f) | Hook::PostAddValue(f) = hook {
                f(self, &payload)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("options", &self.options)
            .field("hooks", &self.hooks)
            .field("types", &self.types.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
