//! Hook registry.
//!
//! Hooks are registered per event for a [`Subject`]: every owner, every owner
//! of one model type, or one owner instance. [`HookRegistry::query`] returns
//! them in that order, so instance hooks run after, and can override, the
//! more generic ones.

mod events;

pub use events::{
    ClassQuery, HookEvent, ObjectBuilt, ObjectEvent, ValueChanged, ValueEvent, ValueRead,
    ValuesReplaced,
};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::ValuesResult;
use crate::model::{Model, ModelKind, ModelType, OwnerId, Values};
use crate::store::Store;

pub type ValueHook = Rc<dyn Fn(&Store, &ValueEvent<'_>) -> ValuesResult<Option<Value>>>;
pub type ChangeHook = Rc<dyn Fn(&Store, &ValueChanged<'_>) -> ValuesResult<()>>;
pub type ReplaceHook = Rc<dyn Fn(&Store, &ValuesReplaced<'_>) -> ValuesResult<()>>;
pub type ReadHook = Rc<dyn Fn(&Store, &ValueRead<'_>) -> ValuesResult<Option<Value>>>;
pub type ObjectHook = Rc<dyn Fn(&Store, &ObjectEvent<'_>) -> ValuesResult<()>>;
pub type BuiltHook = Rc<dyn Fn(&Store, &ObjectBuilt<'_>) -> ValuesResult<()>>;
pub type ClassHook = Rc<dyn Fn(&Store, &ClassQuery<'_>) -> ValuesResult<Option<ModelType>>>;

/// A hook callback together with the event it handles.
///
/// Pre hooks and the read hook return a replacement value, `None` (or null)
/// keeps the current one. The class hook returns the model type to build.
#[derive(Clone)]
pub enum Hook {
    PreSetValue(ValueHook),
    PreAddValue(ValueHook),
    PostSetValue(ChangeHook),
    PostSetValues(ReplaceHook),
    PostAddValue(ChangeHook),
    PostGetValue(ReadHook),
    PostSetObject(ObjectHook),
    PostAddObject(ObjectHook),
    PostBuildObject(BuiltHook),
    PostBuildSubObject(ObjectHook),
    GetObjectClass(ClassHook),
}

impl Hook {
    pub fn pre_set_value<F>(f: F) -> Self
    where
        F: Fn(&Store, &ValueEvent<'_>) -> ValuesResult<Option<Value>> + 'static,
    {
        Self::PreSetValue(Rc::new(f))
    }

    pub fn pre_add_value<F>(f: F) -> Self
    where
        F: Fn(&Store, &ValueEvent<'_>) -> ValuesResult<Option<Value>> + 'static,
    {
        Self::PreAddValue(Rc::new(f))
    }

    pub fn post_set_value<F>(f: F) -> Self
    where
        F: Fn(&Store, &ValueChanged<'_>) -> ValuesResult<()> + 'static,
    {
        Self::PostSetValue(Rc::new(f))
    }

    pub fn post_set_values<F>(f: F) -> Self
    where
        F: Fn(&Store, &ValuesReplaced<'_>) -> ValuesResult<()> + 'static,
    {
        Self::PostSetValues(Rc::new(f))
    }

    pub fn post_add_value<F>(f: F) -> Self
    where
        F: Fn(&Store, &ValueChanged<'_>) -> ValuesResult<()> + 'static,
    {
        Self::PostAddValue(Rc::new(f))
    }

    pub fn post_get_value<F>(f: F) -> Self
    where
        F: Fn(&Store, &ValueRead<'_>) -> ValuesResult<Option<Value>> + 'static,
    {
        Self::PostGetValue(Rc::new(f))
    }

    pub fn post_set_object<F>(f: F) -> Self
    where
        F: Fn(&Store, &ObjectEvent<'_>) -> ValuesResult<()> + 'static,
    {
        Self::PostSetObject(Rc::new(f))
    }

    pub fn post_add_object<F>(f: F) -> Self
    where
        F: Fn(&Store, &ObjectEvent<'_>) -> ValuesResult<()> + 'static,
    {
        Self::PostAddObject(Rc::new(f))
    }

    pub fn post_build_object<F>(f: F) -> Self
    where
        F: Fn(&Store, &ObjectBuilt<'_>) -> ValuesResult<()> + 'static,
    {
        Self::PostBuildObject(Rc::new(f))
    }

    pub fn post_build_sub_object<F>(f: F) -> Self
    where
        F: Fn(&Store, &ObjectEvent<'_>) -> ValuesResult<()> + 'static,
    {
        Self::PostBuildSubObject(Rc::new(f))
    }

    pub fn get_object_class<F>(f: F) -> Self
    where
        F: Fn(&Store, &ClassQuery<'_>) -> ValuesResult<Option<ModelType>> + 'static,
    {
        Self::GetObjectClass(Rc::new(f))
    }

    pub fn event(&self) -> HookEvent {
        match self {
            Self::PreSetValue(_) => HookEvent::PreSetValue,
            Self::PreAddValue(_) => HookEvent::PreAddValue,
            Self::PostSetValue(_) => HookEvent::PostSetValue,
            Self::PostSetValues(_) => HookEvent::PostSetValues,
            Self::PostAddValue(_) => HookEvent::PostAddValue,
            Self::PostGetValue(_) => HookEvent::PostGetValue,
            Self::PostSetObject(_) => HookEvent::PostSetObject,
            Self::PostAddObject(_) => HookEvent::PostAddObject,
            Self::PostBuildObject(_) => HookEvent::PostBuildObject,
            Self::PostBuildSubObject(_) => HookEvent::PostBuildSubObject,
            Self::GetObjectClass(_) => HookEvent::GetObjectClass,
        }
    }

    /// Address of the callback, used to tell registrations of the same
    /// callback apart from equal-looking ones.
    fn identity(&self) -> *const () {
        match self {
            Self::PreSetValue(f) | Self::PreAddValue(f) => Rc::as_ptr(f) as *const (),
            Self::PostSetValue(f) | Self::PostAddValue(f) => Rc::as_ptr(f) as *const (),
            Self::PostSetValues(f) => Rc::as_ptr(f) as *const (),
            Self::PostGetValue(f) => Rc::as_ptr(f) as *const (),
            Self::PostSetObject(f) | Self::PostAddObject(f) | Self::PostBuildSubObject(f) => {
                Rc::as_ptr(f) as *const ()
            }
            Self::PostBuildObject(f) => Rc::as_ptr(f) as *const (),
            Self::GetObjectClass(f) => Rc::as_ptr(f) as *const (),
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook({})", self.event())
    }
}

/// Who a hook applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Global,
    /// Every owner of the named model type.
    Type(String),
    Instance(OwnerId),
}

impl Subject {
    pub fn of<T: ModelKind>() -> Self {
        Self::Type(T::NAME.to_string())
    }

    pub fn type_name(name: impl Into<String>) -> Self {
        Self::Type(name.into())
    }

    pub fn instance(owner: &dyn Model) -> Self {
        Self::Instance(owner.values().id())
    }
}

/// Handle returned by [`HookRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

type Buckets = HashMap<HookEvent, HashMap<Subject, IndexMap<HookId, Hook>>>;

/// Registry of hooks, owned by a [`Store`].
pub struct HookRegistry {
    hooks: RefCell<Buckets>,
    next_id: Cell<u64>,
    generation: Cell<u64>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            hooks: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
            generation: Cell::new(0),
        }
    }

    /// Append a hook to the bucket of its event and `subject`.
    ///
    /// Registering the same callback twice in one bucket keeps the first
    /// registration and returns its id.
    pub fn register(&self, subject: Subject, hook: Hook) -> HookId {
        let mut hooks = self.hooks.borrow_mut();
        let bucket = hooks
            .entry(hook.event())
            .or_default()
            .entry(subject)
            .or_default();
        if let Some((id, _)) = bucket
            .iter()
            .find(|(_, existing)| existing.identity() == hook.identity())
        {
            return *id;
        }
        let id = HookId(self.next_id.get());
        self.next_id.set(id.0.saturating_add(1));
        bucket.insert(id, hook);
        id
    }

    pub fn register_global(&self, hook: Hook) -> HookId {
        self.register(Subject::Global, hook)
    }

    /// Remove one registration. Returns whether it existed.
    pub fn unregister(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.borrow_mut();
        hooks
            .values_mut()
            .flat_map(|subjects| subjects.values_mut())
            .any(|bucket| bucket.shift_remove(&id).is_some())
    }

    /// Hooks for `event` that apply to the owner of `values`: global ones,
    /// then those of its type, then those of the instance.
    ///
    /// The callbacks are cloned out, so they may register further hooks.
    pub fn query(&self, values: &Values, event: HookEvent) -> Vec<Hook> {
        let subjects = [
            Subject::Global,
            Subject::Type(values.type_name().to_string()),
            Subject::Instance(values.id()),
        ];
        self.collect(event, &subjects)
    }

    /// Global hooks for `event`.
    pub fn query_global(&self, event: HookEvent) -> Vec<Hook> {
        self.collect(event, &[Subject::Global])
    }

    fn collect(&self, event: HookEvent, subjects: &[Subject]) -> Vec<Hook> {
        let hooks = self.hooks.borrow();
        let Some(by_subject) = hooks.get(&event) else {
            return Vec::new();
        };
        let matched: Vec<Hook> = subjects
            .iter()
            .filter_map(|subject| by_subject.get(subject))
            .flat_map(|bucket| bucket.values().cloned())
            .collect();
        trace!(event = %event, hooks = matched.len(), "dispatching hooks");
        matched
    }

    /// Remove every registration.
    pub fn clear_all(&self) {
        self.hooks.borrow_mut().clear();
        self.generation.set(self.generation.get() + 1);
        debug!(generation = self.generation.get(), "cleared hook registry");
    }

    /// Incremented by every [`HookRegistry::clear_all`].
    pub(crate) fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub fn len(&self) -> usize {
        self.hooks
            .borrow()
            .values()
            .flat_map(|subjects| subjects.values())
            .map(IndexMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.len())
            .field("generation", &self.generation.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_model;
    use serde_json::json;

    struct Thing {
        values: Values,
    }

    impl Default for Thing {
        fn default() -> Self {
            Self {
                values: Values::of::<Self>(),
            }
        }
    }

    impl_model!(Thing);

    fn tagging(tag: &'static str) -> Hook {
        Hook::pre_set_value(move |_, _| Ok(Some(json!(tag))))
    }

    fn tags(hooks: &[Hook], store: &Store, owner: &Thing) -> Vec<Value> {
        hooks
            .iter()
            .map(|hook| match hook {
                Hook::PreSetValue(f) => f(
                    store,
                    &ValueEvent {
                        owner,
                        path: &[],
                        key: None,
                        value: &Value::Null,
                    },
                )
                .unwrap()
                .unwrap(),
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_query_order_is_global_type_instance() {
        let store = Store::new();
        let registry = HookRegistry::new();
        let thing = Thing::default();

        registry.register(Subject::instance(&thing), tagging("instance"));
        registry.register(Subject::of::<Thing>(), tagging("type"));
        registry.register_global(tagging("global"));
        registry.register(Subject::type_name("Other"), tagging("other type"));

        let hooks = registry.query(thing.values(), HookEvent::PreSetValue);
        assert_eq!(
            tags(&hooks, &store, &thing),
            vec![json!("global"), json!("type"), json!("instance")]
        );
        assert!(registry.query(thing.values(), HookEvent::PreAddValue).is_empty());
    }

    #[test]
    fn test_same_callback_registers_once_per_bucket() {
        let registry = HookRegistry::new();
        let hook = tagging("a");

        let first = registry.register_global(hook.clone());
        let second = registry.register_global(hook.clone());
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);

        registry.register(Subject::type_name("Thing"), hook);
        registry.register_global(tagging("a"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_unregister() {
        let registry = HookRegistry::new();
        let id = registry.register_global(tagging("a"));
        registry.register_global(tagging("b"));

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear_all_bumps_generation() {
        let registry = HookRegistry::new();
        registry.register_global(tagging("a"));
        let before = registry.generation();

        registry.clear_all();
        assert!(registry.is_empty());
        assert_eq!(registry.generation(), before + 1);
    }

    #[test]
    fn test_event_names() {
        let names: Vec<String> = HookEvent::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names[0], "pre_set_value");
        assert_eq!(names[3], "post_set_values");
        assert_eq!(names[9], "post_build_sub_object");
        assert_eq!(names[10], "get_object_class");
    }
}
