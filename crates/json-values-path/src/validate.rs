//! Path validation policies.

use serde::{Deserialize, Serialize};

use crate::PathError;

/// Maximum allowed path depth.
pub const MAX_PATH_LENGTH: usize = 256;

/// How strictly path steps are checked before they reach a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPolicy {
    /// Any string is a valid step. Only the depth is limited.
    #[default]
    Lenient,
    /// Steps must be non-empty and use only ASCII alphanumerics, `_` and `-`.
    Strict,
}

/// Validate a parsed path against a policy and a depth limit.
///
/// # Example
///
/// ```
/// use json_values_path::{parse_path, validate_path, PathPolicy, MAX_PATH_LENGTH};
///
/// validate_path(&parse_path("a.b c"), PathPolicy::Lenient, MAX_PATH_LENGTH).unwrap();
/// validate_path(&parse_path("a.b c"), PathPolicy::Strict, MAX_PATH_LENGTH).unwrap_err();
/// ```
pub fn validate_path(
    path: &[String],
    policy: PathPolicy,
    max_depth: usize,
) -> Result<(), PathError> {
    if path.len() > max_depth {
        return Err(PathError::TooDeep {
            depth: path.len(),
            max: max_depth,
        });
    }
    for step in path {
        validate_step(step, policy)?;
    }
    Ok(())
}

/// Validate a single step.
pub fn validate_step(step: &str, policy: PathPolicy) -> Result<(), PathError> {
    match policy {
        PathPolicy::Lenient => Ok(()),
        PathPolicy::Strict => {
            let allowed = !step.is_empty()
                && step
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
            if allowed {
                Ok(())
            } else {
                Err(PathError::InvalidStep {
                    step: step.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_path;

    #[test]
    fn test_lenient_accepts_anything() {
        for path in ["", "a..b", "a b.c", "files.a-b_c", "ü.ñ"] {
            assert!(validate_path(&parse_path(path), PathPolicy::Lenient, MAX_PATH_LENGTH).is_ok());
        }
    }

    #[test]
    fn test_strict_allow_list() {
        let path = parse_path("a.b_c.d-1.0");
        assert!(validate_path(&path, PathPolicy::Strict, MAX_PATH_LENGTH).is_ok());
        assert_eq!(
            validate_path(&parse_path("a.b c"), PathPolicy::Strict, MAX_PATH_LENGTH),
            Err(PathError::InvalidStep {
                step: "b c".to_string()
            })
        );
        assert!(validate_path(&parse_path("a..b"), PathPolicy::Strict, MAX_PATH_LENGTH).is_err());
        assert!(validate_step("", PathPolicy::Strict).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let path: Vec<String> = (0..MAX_PATH_LENGTH).map(|i| i.to_string()).collect();
        assert!(validate_path(&path, PathPolicy::Lenient, MAX_PATH_LENGTH).is_ok());

        let path: Vec<String> = (0..=MAX_PATH_LENGTH).map(|i| i.to_string()).collect();
        assert_eq!(
            validate_path(&path, PathPolicy::Lenient, MAX_PATH_LENGTH),
            Err(PathError::TooDeep {
                depth: MAX_PATH_LENGTH + 1,
                max: MAX_PATH_LENGTH
            })
        );
    }

    #[test]
    fn test_policy_serde_names() {
        let policy: PathPolicy = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(policy, PathPolicy::Strict);
        assert_eq!(serde_json::to_string(&PathPolicy::Lenient).unwrap(), "\"lenient\"");
    }
}
