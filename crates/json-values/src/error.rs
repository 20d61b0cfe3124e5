//! Error types for the value store.

use json_values_path::{format_path, value_kind, PathError};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by store, materializer and interceptor operations.
///
/// All of them are contract violations. The store fails the call instead of
/// silently defaulting, and errors returned by hook callbacks abort the
/// operation that triggered them unchanged.
#[derive(Debug, Error)]
pub enum ValuesError {
    #[error("invalid path {path:?}: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: PathError,
    },

    #[error("cannot {action} at {path:?}: value is a {found}")]
    TypeConflict {
        path: String,
        action: &'static str,
        found: &'static str,
    },

    #[error("cannot build object at {path:?}: no class given and no hook supplied one")]
    Configuration { path: String },

    #[error("unknown model type {name:?}")]
    UnknownType { name: String },

    #[error("cannot build object at {path:?}: value is null")]
    MissingMember { path: String },

    #[error("object at {path:?} is a {found}, expected {expected}")]
    UnexpectedType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot attach object at {path:?}: the object would contain itself")]
    Cycle { path: String },

    #[error("cannot cast to {target}: {message}")]
    Cast {
        target: &'static str,
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ValuesResult<T> = Result<T, ValuesError>;

impl ValuesError {
    pub fn invalid_path(path: &[String], source: PathError) -> Self {
        Self::InvalidPath {
            path: format_path(path),
            source,
        }
    }

    pub fn type_conflict(path: &[String], action: &'static str, found: &Value) -> Self {
        Self::TypeConflict {
            path: format_path(path),
            action,
            found: value_kind(found),
        }
    }

    pub fn configuration(path: &[String]) -> Self {
        Self::Configuration {
            path: format_path(path),
        }
    }

    pub fn missing_member(path: &[String]) -> Self {
        Self::MissingMember {
            path: format_path(path),
        }
    }

    pub fn cycle(path: &[String]) -> Self {
        Self::Cycle {
            path: format_path(path),
        }
    }

    pub fn cast(target: &'static str, message: impl Into<String>) -> Self {
        Self::Cast {
            target,
            message: message.into(),
        }
    }
}
