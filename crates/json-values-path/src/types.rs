//! Path types.

/// A single step of a dotted path: a mapping key or a list position.
pub type PathStep = String;

/// A parsed dotted path. The empty path addresses the document root.
pub type Path = Vec<PathStep>;

/// Conversion into a [`Path`].
///
/// String forms are split on `.`. Already-split forms are taken literally, so
/// a step may contain a dot (`["files", "a.txt"]` is two steps).
///
/// # Example
///
/// ```
/// use json_values_path::IntoPath;
///
/// assert_eq!("a.b".into_path(), vec!["a", "b"]);
/// assert_eq!(["files", "a.txt"].into_path(), vec!["files", "a.txt"]);
/// ```
pub trait IntoPath {
    fn into_path(self) -> Path;
}

impl IntoPath for &str {
    fn into_path(self) -> Path {
        crate::parse_path(self)
    }
}

impl IntoPath for String {
    fn into_path(self) -> Path {
        crate::parse_path(&self)
    }
}

impl IntoPath for &String {
    fn into_path(self) -> Path {
        crate::parse_path(self)
    }
}

impl IntoPath for Path {
    fn into_path(self) -> Path {
        self
    }
}

impl IntoPath for &Path {
    fn into_path(self) -> Path {
        self.clone()
    }
}

impl IntoPath for &[String] {
    fn into_path(self) -> Path {
        self.to_vec()
    }
}

impl<const N: usize> IntoPath for [&str; N] {
    fn into_path(self) -> Path {
        self.iter().map(|step| step.to_string()).collect()
    }
}
