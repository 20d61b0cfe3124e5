//! Object materialization.
//!
//! Sub-documents are turned into typed child objects on demand. A child's
//! document is a view over the parent's region, so writes through either side
//! are visible on the other. Children are cached per parent and path, and the
//! cache hooks registered here detach and evict them when the region is
//! overwritten.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use json_values_path::{format_path, is_at_or_under, is_container, join_key, set, IntoPath, Path};
use serde_json::Value;
use tracing::debug;

use crate::error::{ValuesError, ValuesResult};
use crate::hooks::{ClassQuery, Hook, HookEvent, ObjectBuilt, ObjectEvent, Subject};
use crate::model::{downcast, Model, ModelKind, ModelType, ObjectRef, Values};
use crate::store::Store;

/// How to pick the model type of a materialized object.
#[derive(Clone, Default)]
pub enum Class {
    /// Ask the `get_object_class` hooks.
    #[default]
    Auto,
    Type(ModelType),
    /// A type registered with [`Store::register_type`], or one a
    /// `get_object_class` hook resolves from the name.
    Named(String),
    /// Choose from the raw sub-document. `None` falls back to the hooks.
    Factory(Rc<dyn Fn(&Value) -> Option<ModelType>>),
}

impl Class {
    pub fn of<T: ModelKind>() -> Self {
        Self::Type(ModelType::of::<T>())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<ModelType> + 'static,
    {
        Self::Factory(Rc::new(f))
    }
}

impl From<ModelType> for Class {
    fn from(model_type: ModelType) -> Self {
        Self::Type(model_type)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "Auto"),
            Self::Type(model_type) => write!(f, "Type({})", model_type.name()),
            Self::Named(name) => write!(f, "Named({name})"),
            Self::Factory(_) => write!(f, "Factory"),
        }
    }
}

/// Children for [`Store::set_objects`].
pub enum Members {
    /// Stored as a list, keyed by position.
    List(Vec<ObjectRef>),
    /// Stored as a mapping. Keys are literal and may contain dots.
    Keyed(Vec<(String, ObjectRef)>),
}

impl Members {
    pub fn list(objects: impl IntoIterator<Item = ObjectRef>) -> Self {
        Self::List(objects.into_iter().collect())
    }

    pub fn keyed<K: Into<String>>(objects: impl IntoIterator<Item = (K, ObjectRef)>) -> Self {
        Self::Keyed(
            objects
                .into_iter()
                .map(|(key, object)| (key.into(), object))
                .collect(),
        )
    }

    fn into_entries(self) -> Vec<(String, ObjectRef)> {
        match self {
            Self::List(objects) => objects
                .into_iter()
                .enumerate()
                .map(|(position, object)| (position.to_string(), object))
                .collect(),
            Self::Keyed(entries) => entries,
        }
    }

    fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

/// Lazy iterator over the members of a collection, see [`Store::get_objects`].
///
/// The member keys are read once, when the iterator is created. Each key is
/// visited at most once; members are materialized as they are reached.
pub struct ObjectsIter<'s> {
    store: &'s Store,
    owner: &'s dyn Model,
    path: Path,
    class: Class,
    keys: std::vec::IntoIter<String>,
}

impl Iterator for ObjectsIter<'_> {
    type Item = ValuesResult<(String, ObjectRef)>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.next()?;
        let member = join_key(&self.path, &key);
        Some(
            match self.store.get_object(self.owner, member.clone(), self.class.clone()) {
                Ok(Some(object)) => Ok((key, object)),
                Ok(None) => Err(ValuesError::missing_member(&member)),
                Err(err) => Err(err),
            },
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.keys.len()))
    }
}

impl<'s> ObjectsIter<'s> {
    /// Downcast every member to `T`.
    pub fn typed<T: ModelKind>(self) -> TypedObjectsIter<'s, T> {
        TypedObjectsIter {
            inner: self,
            _marker: PhantomData,
        }
    }
}

/// [`ObjectsIter`] yielding concrete model types.
pub struct TypedObjectsIter<'s, T> {
    inner: ObjectsIter<'s>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ModelKind> Iterator for TypedObjectsIter<'_, T> {
    type Item = ValuesResult<(String, Rc<T>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let member = self.inner.next()?;
        Some(member.and_then(|(key, object)| {
            let typed = expect_type::<T>(&object, &join_key(&self.inner.path, &key))?;
            Ok((key, typed))
        }))
    }
}

impl Store {
    /// The object at `path`, materializing it on first access.
    ///
    /// Returns the cached instance when there is one, `None` when the path
    /// holds no value.
    ///
    /// # Errors
    ///
    /// - [`ValuesError::TypeConflict`] when the path holds a scalar.
    /// - [`ValuesError::Configuration`] when no model type could be resolved.
    pub fn get_object(
        &self,
        owner: &dyn Model,
        path: impl IntoPath,
        class: Class,
    ) -> ValuesResult<Option<ObjectRef>> {
        let path = self.member_path(path)?;
        self.prepare(owner);
        if let Some(cached) = owner.values().objects.borrow().get(&path).cloned() {
            return Ok(Some(cached));
        }
        self.materialize(owner, &path, &class)
    }

    /// Typed [`Store::get_object`].
    pub fn get_object_as<T: ModelKind>(
        &self,
        owner: &dyn Model,
        path: impl IntoPath,
    ) -> ValuesResult<Option<Rc<T>>> {
        let path = self.member_path(path)?;
        self.get_object(owner, path.clone(), Class::of::<T>())?
            .map(|object| expect_type::<T>(&object, &path))
            .transpose()
    }

    /// Attach `object` at `path`, or remove the value there when `None`.
    ///
    /// The parent receives a copy of the object's document, then the object is
    /// rebound to that region. A previously attached object at the path is
    /// detached and keeps its own copy.
    pub fn set_object(
        &self,
        owner: &dyn Model,
        path: impl IntoPath,
        object: Option<ObjectRef>,
    ) -> ValuesResult<()> {
        let path = self.member_path(path)?;
        self.prepare(owner);
        let Some(object) = object else {
            self.set_value(owner, path.clone(), Value::Null)?;
            evict(owner.values(), &path);
            return Ok(());
        };
        self.check_cycle(owner, &object, &path)?;

        let snapshot = object.values().slot.snapshot();
        self.set_value(owner, path.clone(), Value::Null)?;
        self.set_value(owner, path.clone(), snapshot)?;
        self.attach(owner, &path, &object)?;
        self.fire_object_event(HookEvent::PostSetObject, owner, &path, &object)
    }

    /// Attach a collection of objects at `path`, or remove it when `None`.
    ///
    /// An empty collection stores an empty list.
    pub fn set_objects(
        &self,
        owner: &dyn Model,
        path: impl IntoPath,
        members: Option<Members>,
    ) -> ValuesResult<()> {
        let path = self.member_path(path)?;
        self.prepare(owner);
        let Some(members) = members else {
            evict(owner.values(), &path);
            return self.set_value(owner, path, Value::Null);
        };

        let as_list = members.is_list();
        let entries = members.into_entries();
        for (key, object) in &entries {
            self.member_path(join_key(&path, key))?;
            self.check_cycle(owner, object, &path)?;
        }
        evict(owner.values(), &path);
        let collection = if as_list {
            Value::Array(
                entries
                    .iter()
                    .map(|(_, object)| object.values().slot.snapshot())
                    .collect(),
            )
        } else {
            Value::Object(
                entries
                    .iter()
                    .map(|(key, object)| (key.clone(), object.values().slot.snapshot()))
                    .collect(),
            )
        };
        self.set_value(owner, path.clone(), collection)?;

        for (key, object) in &entries {
            let member = join_key(&path, key);
            self.attach(owner, &member, object)?;
            self.fire_object_event(HookEvent::PostSetObject, owner, &member, object)?;
        }
        Ok(())
    }

    /// Append `object` to the collection at `path` and return its key.
    pub fn add_object(
        &self,
        owner: &dyn Model,
        path: impl IntoPath,
        object: ObjectRef,
        key: Option<&str>,
    ) -> ValuesResult<String> {
        let path = self.path(path)?;
        self.prepare(owner);
        self.check_cycle(owner, &object, &path)?;

        let snapshot = object.values().slot.snapshot();
        let key = self.add_value(owner, path.clone(), snapshot, key)?;
        let member = join_key(&path, &key);
        self.attach(owner, &member, &object)?;
        self.fire_object_event(HookEvent::PostAddObject, owner, &member, &object)?;
        Ok(key)
    }

    /// Iterate the members of the collection at `path`, materializing each.
    ///
    /// An absent collection yields nothing. A member holding null yields
    /// [`ValuesError::MissingMember`].
    pub fn get_objects<'s>(
        &'s self,
        owner: &'s dyn Model,
        path: impl IntoPath,
        class: Class,
    ) -> ValuesResult<ObjectsIter<'s>> {
        let path = self.path(path)?;
        let keys = match owner.values().slot.get(&path) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => (0..items.len())
                .map(|position| position.to_string())
                .collect(),
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            Some(other) => {
                return Err(ValuesError::type_conflict(&path, "iterate objects", &other))
            }
        };
        Ok(ObjectsIter {
            store: self,
            owner,
            path,
            class,
            keys: keys.into_iter(),
        })
    }

    /// Typed [`Store::get_objects`].
    pub fn get_objects_as<'s, T: ModelKind>(
        &'s self,
        owner: &'s dyn Model,
        path: impl IntoPath,
    ) -> ValuesResult<TypedObjectsIter<'s, T>> {
        Ok(self.get_objects(owner, path, Class::of::<T>())?.typed())
    }

    /// Build a top-level object from a document.
    ///
    /// Constructor defaults fill the top-level keys the document lacks.
    pub fn build_object(&self, class: Class, values: Value) -> ValuesResult<ObjectRef> {
        let model_type = self.resolve_class(&class, &values, None, &[])?;
        let object = model_type.construct();
        let merged = merge_defaults(object.values().slot.snapshot(), values);
        self.set_values(object.as_ref(), merged)?;
        debug!(model = model_type.name(), object = %object.values().id(), "built object");

        let event = ObjectBuilt { object: &object };
        for hook in self.hooks().query(object.values(), HookEvent::PostBuildObject) {
            if let Hook::PostBuildObject(f) = hook {
                f(self, &event)?;
            }
        }
        Ok(object)
    }

    /// Typed [`Store::build_object`].
    pub fn build_object_as<T: ModelKind>(&self, values: Value) -> ValuesResult<Rc<T>> {
        let object = self.build_object(Class::of::<T>(), values)?;
        expect_type::<T>(&object, &[])
    }

    /// A new object of the same type with an independent copy of the
    /// document and an empty cache and change set.
    pub fn clone_object(&self, object: &dyn Model) -> ValuesResult<ObjectRef> {
        self.build_object(Class::Type(object.values().model_type()), self.get_values(object))
    }

    /// Typed [`Store::clone_object`].
    pub fn clone_object_as<T: ModelKind>(&self, object: &T) -> ValuesResult<Rc<T>> {
        let cloned = self.clone_object(object)?;
        expect_type::<T>(&cloned, &[])
    }

    fn materialize(
        &self,
        owner: &dyn Model,
        path: &[String],
        class: &Class,
    ) -> ValuesResult<Option<ObjectRef>> {
        let values = owner.values();
        let raw = match values.slot.get(path) {
            None | Some(Value::Null) => return Ok(None),
            Some(raw) if is_container(&raw) => raw,
            Some(scalar) => return Err(ValuesError::type_conflict(path, "build object", &scalar)),
        };
        let model_type = self.resolve_class(class, &raw, Some(owner), path)?;
        let object = model_type.construct();

        let merged = merge_defaults(object.values().slot.snapshot(), raw.clone());
        if merged != raw {
            values.slot.write(path, |root, full| set(root, full, merged));
        }
        self.attach(owner, path, &object)?;
        debug!(
            owner = %values.id(),
            path = %format_path(path),
            model = model_type.name(),
            "materialized object"
        );
        self.fire_object_event(HookEvent::PostBuildSubObject, owner, path, &object)?;
        Ok(Some(object))
    }

    fn resolve_class(
        &self,
        class: &Class,
        raw: &Value,
        owner: Option<&dyn Model>,
        path: &[String],
    ) -> ValuesResult<ModelType> {
        let resolved = match class {
            Class::Type(model_type) => Some(*model_type),
            Class::Factory(f) => match f(raw) {
                Some(model_type) => Some(model_type),
                None => self.class_from_hooks(raw, owner, path, None)?,
            },
            Class::Named(name) => match self.registered_type(name) {
                Some(model_type) => Some(model_type),
                None => self.class_from_hooks(raw, owner, path, Some(name))?,
            },
            Class::Auto => self.class_from_hooks(raw, owner, path, None)?,
        };
        resolved.ok_or_else(|| ValuesError::configuration(path))
    }

    fn class_from_hooks(
        &self,
        raw: &Value,
        owner: Option<&dyn Model>,
        path: &[String],
        requested: Option<&str>,
    ) -> ValuesResult<Option<ModelType>> {
        let hooks = match owner {
            Some(owner) => self.hooks().query(owner.values(), HookEvent::GetObjectClass),
            None => self.hooks().query_global(HookEvent::GetObjectClass),
        };
        let query = ClassQuery {
            values: raw,
            owner,
            path,
            requested,
        };
        for hook in hooks {
            if let Hook::GetObjectClass(f) = hook {
                if let Some(model_type) = f(self, &query)? {
                    return Ok(Some(model_type));
                }
            }
        }
        Ok(None)
    }

    fn check_cycle(
        &self,
        owner: &dyn Model,
        object: &ObjectRef,
        path: &[String],
    ) -> ValuesResult<()> {
        if object.values().slot.would_cycle(&owner.values().slot) {
            return Err(ValuesError::cycle(path));
        }
        Ok(())
    }

    /// Bind `object` to the region at `path` of the owner and cache it.
    fn attach(&self, owner: &dyn Model, path: &[String], object: &ObjectRef) -> ValuesResult<()> {
        let parent = &owner.values().slot;
        let child = object.values();
        child.slot.bind(parent, path.to_vec());
        self.fire_values_replaced(object.as_ref(), &child.slot.snapshot(), true)?;
        owner
            .values()
            .objects
            .borrow_mut()
            .insert(path.to_vec(), object.clone());
        debug!(
            owner = %owner.values().id(),
            path = %format_path(path),
            object = %child.id(),
            "attached object"
        );
        Ok(())
    }

    fn fire_object_event(
        &self,
        event: HookEvent,
        owner: &dyn Model,
        path: &[String],
        object: &ObjectRef,
    ) -> ValuesResult<()> {
        let payload = ObjectEvent {
            object,
            owner,
            path,
        };
        for hook in self.hooks().query(owner.values(), event) {
            if let Hook::PostSetObject(f)
            | Hook::PostAddObject(f)
            | Hook::PostBuildSubObject(f) = hook
            {
                f(self, &payload)?;
            }
        }
        Ok(())
    }
}

fn expect_type<T: ModelKind>(object: &ObjectRef, path: &[String]) -> ValuesResult<Rc<T>> {
    downcast::<T>(object).ok_or_else(|| ValuesError::UnexpectedType {
        path: format_path(path),
        expected: T::NAME,
        found: object.values().type_name(),
    })
}

/// Fill the top-level keys `raw` lacks from `defaults`. Only mappings merge.
fn merge_defaults(defaults: Value, raw: Value) -> Value {
    match (defaults, raw) {
        (Value::Object(defaults), Value::Object(mut raw)) => {
            for (key, value) in defaults {
                raw.entry(key).or_insert(value);
            }
            Value::Object(raw)
        }
        (_, raw) => raw,
    }
}

/// Install the cache maintenance hooks for a subject.
pub(crate) fn register_cache_hooks(store: &Store, subject: Subject) {
    let hooks = store.hooks();
    hooks.register(
        subject.clone(),
        Hook::pre_set_value(|_, event| {
            let values = event.owner.values();
            if !values.objects.borrow().is_empty() {
                evict(values, &invalidation_scope(values, event.path, event.value));
            }
            Ok(None)
        }),
    );
    hooks.register(
        subject.clone(),
        Hook::pre_add_value(|_, event| {
            if let Some(key) = event.key {
                evict(event.owner.values(), &join_key(event.path, key));
            }
            Ok(None)
        }),
    );
    hooks.register(
        subject,
        Hook::post_set_values(|_, event| {
            evict(event.owner.values(), &[]);
            Ok(())
        }),
    );
}

/// Removing a list position shifts the later ones, so every cached member of
/// that list goes stale.
fn invalidation_scope(values: &Values, path: &[String], value: &Value) -> Path {
    if let Some((_, parent)) = path.split_last() {
        if value.is_null() && matches!(values.slot.get(parent), Some(Value::Array(_))) {
            return parent.to_vec();
        }
    }
    path.to_vec()
}

/// Detach and drop every cached object at or under `scope`.
fn evict(values: &Values, scope: &[String]) {
    let evicted: Vec<(Path, ObjectRef)> = {
        let mut objects = values.objects.borrow_mut();
        let paths: Vec<Path> = objects
            .keys()
            .filter(|path| is_at_or_under(scope, path))
            .cloned()
            .collect();
        paths
            .into_iter()
            .filter_map(|path| objects.remove(&path).map(|object| (path, object)))
            .collect()
    };
    for (path, object) in evicted {
        object.values().slot.detach();
        debug!(owner = %values.id(), path = %format_path(&path), "evicted cached object");
    }
}
