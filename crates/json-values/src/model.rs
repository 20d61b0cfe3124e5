//! Owners: model objects backed by a [`Values`] record.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use json_values_path::Path;
use serde_json::{Map, Value};

use crate::cast::Cast;
use crate::document::Slot;
use crate::root::RootRef;

/// Stable identity of an owner, used as the instance key in the hook registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An object whose state lives in a [`Values`] record.
///
/// Implement it with [`impl_model!`](crate::impl_model).
pub trait Model: 'static {
    fn values(&self) -> &Values;

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;

    /// The cast capability, for models that convert values on the way in
    /// and out.
    fn caster(&self) -> Option<&dyn Cast> {
        None
    }
}

/// A model that can be constructed without arguments and has a static name.
pub trait ModelKind: Model + Default {
    const NAME: &'static str;
}

/// Shared handle to a materialized or attached object.
pub type ObjectRef = Rc<dyn Model>;

impl fmt::Debug for dyn Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.values();
        f.debug_struct(values.type_name())
            .field("id", &values.id())
            .field("values", &values.slot.snapshot())
            .finish()
    }
}

/// A model type that can be constructed at runtime.
#[derive(Clone, Copy)]
pub struct ModelType {
    name: &'static str,
    construct: fn() -> ObjectRef,
}

impl ModelType {
    pub fn of<T: ModelKind>() -> Self {
        fn construct<T: ModelKind>() -> ObjectRef {
            Rc::new(T::default())
        }
        Self {
            name: T::NAME,
            construct: construct::<T>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn construct(&self) -> ObjectRef {
        (self.construct)()
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelType").field(&self.name).finish()
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// The state of one owner: its document, change set, object cache and root
/// link.
///
/// The document is only reachable through [`Store`](crate::Store) operations,
/// so every read and write passes the registered hooks.
pub struct Values {
    id: OwnerId,
    model: ModelType,
    pub(crate) slot: Rc<Slot>,
    pub(crate) changes: RefCell<Value>,
    pub(crate) objects: RefCell<BTreeMap<Path, ObjectRef>>,
    pub(crate) root: RefCell<Option<RootRef>>,
}

impl Values {
    /// Empty values for a model of type `T`.
    pub fn of<T: ModelKind>() -> Self {
        Self::with_defaults::<T>(Value::Object(Map::new()))
    }

    /// Values seeded with constructor defaults.
    ///
    /// When the model is materialized from a sub-document, these defaults fill
    /// the top-level keys the sub-document lacks.
    pub fn with_defaults<T: ModelKind>(defaults: Value) -> Self {
        Self {
            id: OwnerId::next(),
            model: ModelType::of::<T>(),
            slot: Slot::new(defaults),
            changes: RefCell::new(Value::Object(Map::new())),
            objects: RefCell::new(BTreeMap::new()),
            root: RefCell::new(None),
        }
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.model.name
    }

    pub fn model_type(&self) -> ModelType {
        self.model
    }

    /// Whether the document is a view over a parent's document.
    pub fn is_bound(&self) -> bool {
        self.slot.is_view()
    }

    /// Paths of the currently cached child objects.
    pub fn cached_paths(&self) -> Vec<Path> {
        self.objects.borrow().keys().cloned().collect()
    }

    pub fn root(&self) -> Option<RootRef> {
        self.root.borrow().clone()
    }
}

impl fmt::Debug for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Values")
            .field("id", &self.id)
            .field("type", &self.model.name)
            .field("slot", &self.slot)
            .field("cached", &self.objects.borrow().len())
            .finish()
    }
}

/// Implement [`Model`] and [`ModelKind`] for a struct with a `values: Values`
/// field. Add `cast` when the struct implements [`Cast`].
///
/// ```
/// use json_values::{impl_model, Values};
///
/// #[derive(Debug)]
/// struct Owner {
///     values: Values,
/// }
///
/// impl Default for Owner {
///     fn default() -> Self {
///         Self { values: Values::of::<Self>() }
///     }
/// }
///
/// impl_model!(Owner);
/// ```
#[macro_export]
macro_rules! impl_model {
    ($ty:ident) => {
        impl $crate::Model for $ty {
            fn values(&self) -> &$crate::Values {
                &self.values
            }

            fn into_any(self: ::std::rc::Rc<Self>) -> ::std::rc::Rc<dyn ::std::any::Any> {
                self
            }
        }

        impl $crate::ModelKind for $ty {
            const NAME: &'static str = stringify!($ty);
        }
    };
    ($ty:ident, cast) => {
        impl $crate::Model for $ty {
            fn values(&self) -> &$crate::Values {
                &self.values
            }

            fn into_any(self: ::std::rc::Rc<Self>) -> ::std::rc::Rc<dyn ::std::any::Any> {
                self
            }

            fn caster(&self) -> Option<&dyn $crate::Cast> {
                Some(self)
            }
        }

        impl $crate::ModelKind for $ty {
            const NAME: &'static str = stringify!($ty);
        }
    };
}

/// Downcast a shared object to its concrete model type.
pub fn downcast<T: ModelKind>(object: &ObjectRef) -> Option<Rc<T>> {
    object.clone().into_any().downcast::<T>().ok()
}
