//! Store configuration.

use json_values_path::{PathPolicy, MAX_PATH_LENGTH};
use serde::{Deserialize, Serialize};

/// Options a [`Store`](crate::Store) is created with.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use json_values::StoreOptions;
///
/// let options: StoreOptions = serde_json::from_str(r#"{"cast_values": true}"#).unwrap();
/// assert!(options.cast_values);
/// assert!(options.track_changes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// How path steps are validated.
    pub path_policy: PathPolicy,
    /// Deepest path accepted by any operation.
    pub max_path_depth: usize,
    /// Install change tracking as a global interceptor.
    pub track_changes: bool,
    /// Install the cast interceptors as global hooks.
    pub cast_values: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            path_policy: PathPolicy::Lenient,
            max_path_depth: MAX_PATH_LENGTH,
            track_changes: true,
            cast_values: false,
        }
    }
}
