//! Schema-driven class resolution.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

use crate::hooks::{Hook, HookId};
use crate::model::{ModelKind, ModelType};
use crate::store::Store;

/// Maps names to model types for the `get_object_class` hook.
///
/// A sub-document is resolved by the type name the caller asked for, or else
/// by the value of its schema field:
///
/// ```
/// use json_values::{impl_model, SchemaClassMap, Values};
/// use serde_json::json;
///
/// #[derive(Debug)]
/// struct Invoice {
///     values: Values,
/// }
///
/// impl Default for Invoice {
///     fn default() -> Self {
///         Self { values: Values::of::<Self>() }
///     }
/// }
///
/// impl_model!(Invoice);
///
/// let map = SchemaClassMap::default().with_type::<Invoice>("invoice.v1");
/// let resolved = map.resolve(&json!({"schema": "invoice.v1"}), None).unwrap();
/// assert_eq!(resolved.name(), "Invoice");
/// ```
#[derive(Debug, Clone)]
pub struct SchemaClassMap {
    field: String,
    classes: HashMap<String, ModelType>,
}

impl Default for SchemaClassMap {
    fn default() -> Self {
        Self::new("schema")
    }
}

impl SchemaClassMap {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            classes: HashMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, model_type: ModelType) -> Self {
        self.classes.insert(name.into(), model_type);
        self
    }

    pub fn with_type<T: ModelKind>(self, name: impl Into<String>) -> Self {
        self.with(name, ModelType::of::<T>())
    }

    pub fn resolve(&self, values: &Value, requested: Option<&str>) -> Option<ModelType> {
        if let Some(model_type) = requested.and_then(|name| self.classes.get(name)) {
            return Some(*model_type);
        }
        let schema = values.get(&self.field)?.as_str()?;
        self.classes.get(schema).copied()
    }

    /// Install the map as a global `get_object_class` hook.
    pub fn register(self, store: &Store) -> HookId {
        store.hooks().register_global(Hook::get_object_class(move |_, query| {
            let resolved = self.resolve(query.values, query.requested);
            trace!(
                field = %self.field,
                resolved = ?resolved,
                "resolved schema class"
            );
            Ok(resolved)
        }))
    }
}
