use std::fmt;

use serde_json::Value;

use crate::cast::CastTo;
use crate::model::{Model, ObjectRef};

/// Points around store operations where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before a value is written. May replace the value.
    PreSetValue,
    /// Before a value is appended. May replace the value.
    PreAddValue,
    PostSetValue,
    /// After the whole document was replaced or bound to a parent.
    PostSetValues,
    PostAddValue,
    /// After a value was read. The first non-null result replaces it.
    PostGetValue,
    PostSetObject,
    PostAddObject,
    /// After a top-level object was built.
    PostBuildObject,
    /// After a child was materialized from a parent's sub-document.
    PostBuildSubObject,
    /// Choose the model type for a sub-document. The first non-null result wins.
    GetObjectClass,
}

impl HookEvent {
    pub const ALL: [HookEvent; 11] = [
        HookEvent::PreSetValue,
        HookEvent::PreAddValue,
        HookEvent::PostSetValue,
        HookEvent::PostSetValues,
        HookEvent::PostAddValue,
        HookEvent::PostGetValue,
        HookEvent::PostSetObject,
        HookEvent::PostAddObject,
        HookEvent::PostBuildObject,
        HookEvent::PostBuildSubObject,
        HookEvent::GetObjectClass,
    ];
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreSetValue => write!(f, "pre_set_value"),
            Self::PreAddValue => write!(f, "pre_add_value"),
            Self::PostSetValue => write!(f, "post_set_value"),
            Self::PostSetValues => write!(f, "post_set_values"),
            Self::PostAddValue => write!(f, "post_add_value"),
            Self::PostGetValue => write!(f, "post_get_value"),
            Self::PostSetObject => write!(f, "post_set_object"),
            Self::PostAddObject => write!(f, "post_add_object"),
            Self::PostBuildObject => write!(f, "post_build_object"),
            Self::PostBuildSubObject => write!(f, "post_build_sub_object"),
            Self::GetObjectClass => write!(f, "get_object_class"),
        }
    }
}

/// Payload of [`HookEvent::PreSetValue`] and [`HookEvent::PreAddValue`].
pub struct ValueEvent<'a> {
    pub owner: &'a dyn Model,
    pub path: &'a [String],
    /// The explicit member key of an append, if one was given.
    pub key: Option<&'a str>,
    pub value: &'a Value,
}

/// Payload of [`HookEvent::PostSetValue`] and [`HookEvent::PostAddValue`].
///
/// For appends, `path` includes the assigned key. `value` is null when the
/// write removed the value.
pub struct ValueChanged<'a> {
    pub owner: &'a dyn Model,
    pub path: &'a [String],
    pub value: &'a Value,
    pub modified: bool,
}

/// Payload of [`HookEvent::PostSetValues`].
pub struct ValuesReplaced<'a> {
    pub owner: &'a dyn Model,
    pub values: &'a Value,
    /// True when the owner was bound to a region of a parent's document.
    pub by_reference: bool,
}

/// Payload of [`HookEvent::PostGetValue`].
pub struct ValueRead<'a> {
    pub owner: &'a dyn Model,
    pub path: &'a [String],
    pub value: &'a Value,
    pub default: &'a Value,
    pub cast_to: Option<CastTo>,
}

/// Payload of the object attach and sub-object build events.
pub struct ObjectEvent<'a> {
    pub object: &'a ObjectRef,
    pub owner: &'a dyn Model,
    pub path: &'a [String],
}

/// Payload of [`HookEvent::PostBuildObject`].
pub struct ObjectBuilt<'a> {
    pub object: &'a ObjectRef,
}

/// Payload of [`HookEvent::GetObjectClass`].
pub struct ClassQuery<'a> {
    /// The raw sub-document the object will be built from.
    pub values: &'a Value,
    /// The owner and path for sub-objects, `None` for top-level builds.
    pub owner: Option<&'a dyn Model>,
    pub path: &'a [String],
    /// A type name the caller asked for but which is not registered.
    pub requested: Option<&'a str>,
}
