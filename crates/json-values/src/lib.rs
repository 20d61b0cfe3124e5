//! A lazy, hook-extensible hierarchical value store.
//!
//! Model objects keep their state in a plain JSON document. Scalars are read
//! and written through dotted paths, sub-documents become typed child objects
//! on demand, and a child's writes land in its parent's document because the
//! child is a view over the parent's region. Casting, change tracking and
//! root propagation are hooks around the store's primitives.
//!
//! # Example
//!
//! ```
//! use json_values::{impl_model, Store, Values};
//! use serde_json::json;
//!
//! #[derive(Debug)]
//! struct Repository {
//!     values: Values,
//! }
//!
//! impl Default for Repository {
//!     fn default() -> Self {
//!         Self { values: Values::of::<Self>() }
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct Owner {
//!     values: Values,
//! }
//!
//! impl Default for Owner {
//!     fn default() -> Self {
//!         Self { values: Values::of::<Self>() }
//!     }
//! }
//!
//! impl_model!(Repository);
//! impl_model!(Owner);
//!
//! let store = Store::new();
//! let repo = Repository::default();
//! store
//!     .set_values(&repo, json!({"owner": {"id": 143937, "login": "symfony"}}))
//!     .unwrap();
//!
//! let owner = store.get_object_as::<Owner>(&repo, "owner").unwrap().unwrap();
//! assert_eq!(store.get_value(owner.as_ref(), "login").unwrap(), json!("symfony"));
//!
//! store.set_value(owner.as_ref(), "id", 1).unwrap();
//! assert_eq!(store.get_value(&repo, "owner.id").unwrap(), json!(1));
//! ```

pub mod cast;
pub mod changes;
pub mod config;
mod document;
pub mod error;
pub mod hooks;
pub mod model;
pub mod objects;
pub mod root;
pub mod schema;
mod store;

pub use cast::{cast_to, decode_datetime, encode_datetime, register_cast_hooks, Cast, CastTo};
pub use changes::track_changes;
pub use config::StoreOptions;
pub use error::{ValuesError, ValuesResult};
pub use hooks::{Hook, HookEvent, HookId, HookRegistry, Subject};
pub use model::{downcast, Model, ModelKind, ModelType, ObjectRef, OwnerId, Values};
pub use objects::{Class, Members, ObjectsIter, TypedObjectsIter};
pub use root::{propagate_root, register_propagate_root_hooks, RootRef};
pub use schema::SchemaClassMap;
pub use store::Store;

pub use json_values_path::{parse_path, IntoPath, Path, PathPolicy};
