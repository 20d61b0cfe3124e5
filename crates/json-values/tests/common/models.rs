use chrono::DateTime;
use json_values::{encode_datetime, impl_model, Cast, Values};
use serde_json::{json, Value};

macro_rules! plain_model {
    ($($ty:ident),* $(,)?) => {
        $(
            #[derive(Debug)]
            pub struct $ty {
                pub values: Values,
            }

            impl Default for $ty {
                fn default() -> Self {
                    Self {
                        values: Values::of::<Self>(),
                    }
                }
            }

            impl_model!($ty);
        )*
    };
}

plain_model!(EmptyObject, Repository, Owner, Gist, GistFile);

/// Carries constructor defaults that materialization fills in.
#[derive(Debug)]
pub struct SubObject {
    pub values: Values,
}

impl Default for SubObject {
    fn default() -> Self {
        Self {
            values: Values::with_defaults::<Self>(json!({"kind": "sub", "enabled": true})),
        }
    }
}

impl_model!(SubObject);

/// Stores RFC 3339 strings as datetime structs.
#[derive(Debug)]
pub struct CastableObject {
    pub values: Values,
}

impl Default for CastableObject {
    fn default() -> Self {
        Self {
            values: Values::of::<Self>(),
        }
    }
}

impl Cast for CastableObject {
    fn cast_value(&self, _path: &[String], value: &Value) -> Option<Value> {
        let datetime = DateTime::parse_from_rfc3339(value.as_str()?).ok()?;
        Some(encode_datetime(&datetime))
    }
}

impl_model!(CastableObject, cast);
