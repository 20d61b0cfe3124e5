//! Document storage shared between owners.
//!
//! Every owner holds a [`Slot`]. A slot either owns its document or is a view
//! over a region of another slot, addressed by a path. Reads and writes on a
//! view resolve to the owning slot at the end of the chain, so a parent and
//! the children materialized from it always see the same data.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use json_values_path::{get, set, Path};
use serde_json::{Map, Value};

enum Binding {
    Own(Value),
    View { parent: Rc<Slot>, path: Path },
}

pub(crate) struct Slot {
    binding: RefCell<Binding>,
}

impl Slot {
    pub(crate) fn new(document: Value) -> Rc<Self> {
        Rc::new(Self {
            binding: RefCell::new(Binding::Own(document)),
        })
    }

    pub(crate) fn is_view(&self) -> bool {
        matches!(&*self.binding.borrow(), Binding::View { .. })
    }

    fn parent(&self) -> Option<Rc<Slot>> {
        match &*self.binding.borrow() {
            Binding::View { parent, .. } => Some(parent.clone()),
            Binding::Own(_) => None,
        }
    }

    /// Run `f` on the owning document and the full path of `path` inside it.
    pub(crate) fn read<R>(&self, path: &[String], f: impl FnOnce(&Value, &[String]) -> R) -> R {
        match &*self.binding.borrow() {
            Binding::Own(document) => f(document, path),
            Binding::View {
                parent,
                path: prefix,
            } => parent.read(&[prefix.as_slice(), path].concat(), f),
        }
    }

    /// Mutable counterpart of [`Slot::read`].
    pub(crate) fn write<R>(
        &self,
        path: &[String],
        f: impl FnOnce(&mut Value, &[String]) -> R,
    ) -> R {
        match &mut *self.binding.borrow_mut() {
            Binding::Own(document) => f(document, path),
            Binding::View {
                parent,
                path: prefix,
            } => parent.write(&[prefix.as_slice(), path].concat(), f),
        }
    }

    /// Clone of the value at `path`, if present.
    pub(crate) fn get(&self, path: &[String]) -> Option<Value> {
        self.read(path, |document, full| get(document, full).cloned())
    }

    /// Clone of the whole document this slot sees.
    ///
    /// A view whose region has disappeared sees an empty mapping.
    pub(crate) fn snapshot(&self) -> Value {
        self.get(&[])
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Replace the whole document. On a view this writes through to the
    /// region in the owning document.
    pub(crate) fn replace(&self, document: Value) {
        self.write(&[], |root, full| {
            set(root, full, document);
        });
    }

    /// Check if binding this slot below `parent` would make it its own ancestor.
    pub(crate) fn would_cycle(&self, parent: &Rc<Slot>) -> bool {
        let mut current = Some(parent.clone());
        while let Some(slot) = current {
            if std::ptr::eq(Rc::as_ptr(&slot), self) {
                return true;
            }
            current = slot.parent();
        }
        false
    }

    /// Turn this slot into a view over `path` inside `parent`.
    pub(crate) fn bind(&self, parent: &Rc<Slot>, path: Path) {
        *self.binding.borrow_mut() = Binding::View {
            parent: parent.clone(),
            path,
        };
    }

    /// Turn a view back into an owned document holding what it currently sees.
    pub(crate) fn detach(&self) {
        if self.is_view() {
            let snapshot = self.snapshot();
            *self.binding.borrow_mut() = Binding::Own(snapshot);
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.binding.borrow() {
            Binding::Own(document) => f.debug_tuple("Own").field(document).finish(),
            Binding::View { path, .. } => f.debug_struct("View").field("path", path).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use json_values_path::parse_path;
    use serde_json::json;

    #[test]
    fn test_view_reads_and_writes_parent_region() {
        let parent = Slot::new(json!({"k": {"x": 1}}));
        let child = Slot::new(json!({}));
        child.bind(&parent, parse_path("k"));

        assert_eq!(child.snapshot(), json!({"x": 1}));

        child.write(&parse_path("x"), |root, full| set(root, full, json!(2)));
        assert_eq!(parent.snapshot(), json!({"k": {"x": 2}}));

        parent.write(&parse_path("k.y"), |root, full| set(root, full, json!(3)));
        assert_eq!(child.get(&parse_path("y")), Some(json!(3)));
    }

    #[test]
    fn test_nested_views_resolve_to_root() {
        let root = Slot::new(json!({"a": {"b": {"c": 1}}}));
        let a = Slot::new(json!({}));
        let b = Slot::new(json!({}));
        a.bind(&root, parse_path("a"));
        b.bind(&a, parse_path("b"));

        assert_eq!(b.get(&parse_path("c")), Some(json!(1)));
        b.replace(json!({"c": 2}));
        assert_eq!(root.snapshot(), json!({"a": {"b": {"c": 2}}}));
    }

    #[test]
    fn test_detach_keeps_snapshot() {
        let parent = Slot::new(json!({"k": {"x": 1}}));
        let child = Slot::new(json!({}));
        child.bind(&parent, parse_path("k"));
        child.detach();

        assert!(!child.is_view());
        child.replace(json!({"x": 5}));
        assert_eq!(parent.snapshot(), json!({"k": {"x": 1}}));
        assert_eq!(child.snapshot(), json!({"x": 5}));
    }

    #[test]
    fn test_missing_region_reads_as_empty() {
        let parent = Slot::new(json!({}));
        let child = Slot::new(json!({"x": 1}));
        child.bind(&parent, parse_path("gone"));
        assert_eq!(child.snapshot(), json!({}));
    }

    #[test]
    fn test_cycle_detection() {
        let root = Slot::new(json!({}));
        let child = Slot::new(json!({}));
        child.bind(&root, parse_path("a"));

        assert!(root.would_cycle(&child));
        assert!(child.would_cycle(&child));
        assert!(!child.would_cycle(&root));
    }
}
