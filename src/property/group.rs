use std::{
    fmt,
    ops::{Deref, DerefMut},
};

use serde_json::{Map as JsonMap, Value};
use tracing::warn;

use crate::{
    error::Result,
    property::{Property, PropertySet},
    registry::{Registry, Scope},
};

/// A nested set of properties saved as a JSON object under its own key.
///
/// A group behaves like a config root scoped to its sub-tree: it has its own
/// registry, keeps keys no property accepted, and re-emits them on save. It
/// is dirty whenever any property inside it is.
///
/// The wrapped value is reachable through `Deref`/`DerefMut`.
///
/// # Example
///
/// ```rust
/// use propconfig::{Group, NonNull, Property, PropertySet};
///
/// #[derive(PropertySet)]
/// struct Window {
///     width: NonNull<u32>,
///     height: NonNull<u32>,
/// }
///
/// let mut window = Group::new(
///     "window",
///     Window {
///         width: NonNull::new("width", 800),
///         height: NonNull::new("height", 600),
///     },
/// );
///
/// window.load(&serde_json::json!({"width": 1024, "maximized": true}));
/// assert_eq!(*window.width.get(), 1024);
/// assert!(window.unaccepted_keys().contains_key("maximized"));
/// ```
pub struct Group<T> {
    key: String,
    inner: T,
    scope: Scope,
}

impl<T: PropertySet> Group<T> {
    pub fn new(key: impl Into<String>, inner: T) -> Self {
        Self {
            key: key.into(),
            inner,
            scope: Scope::default(),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// The registry of this group's own properties.
    pub fn registry(&self) -> Result<&Registry> {
        self.scope.registry(&self.inner.properties())
    }

    /// Keys found while loading that no property in this group accepted.
    pub fn unaccepted_keys(&self) -> &JsonMap<String, Value> {
        self.scope.unaccepted()
    }

    /// The JSON object this group saves as.
    pub fn save_object(&self) -> JsonMap<String, Value> {
        self.scope.save(&self.inner.properties())
    }
}

impl<T> Deref for Group<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for Group<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: PropertySet> Property for Group<T> {
    fn key(&self) -> &str {
        &self.key
    }

    fn is_dirty(&self) -> bool {
        self.inner
            .properties()
            .iter()
            .any(|property| property.is_dirty())
    }

    fn clear_dirty(&mut self) {
        for property in self.inner.properties_mut() {
            property.clear_dirty();
        }
    }

    fn save(&self) -> Option<Value> {
        Some(Value::Object(self.save_object()))
    }

    fn load(&mut self, node: &Value) {
        let Some(object) = node.as_object() else {
            return;
        };
        if let Err(err) = self.scope.load(self.inner.properties_mut(), object.clone()) {
            warn!(key = %self.key, error = %err, "skipping group with invalid properties");
        }
    }

    fn validate(&self) -> Result<()> {
        self.scope.validate(&self.inner.properties())
    }
}

impl<T: fmt::Debug> fmt::Debug for Group<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("key", &self.key)
            .field("inner", &self.inner)
            .field("unaccepted", self.scope.unaccepted())
            .finish()
    }
}

/// Builds a value from a raw JSON object.
///
/// This is the factory the object serializer uses for elements of lists and
/// maps of groups.
pub trait FromNode: Sized {
    fn from_node(node: &JsonMap<String, Value>) -> Option<Self>;
}

impl<T: PropertySet + Default> FromNode for Group<T> {
    /// Load a fresh group, keyed by the empty string, from `node`.
    fn from_node(node: &JsonMap<String, Value>) -> Option<Self> {
        let mut group = Group::new("", T::default());
        let loaded = group
            .validate()
            .and_then(|()| group.scope.load(group.inner.properties_mut(), node.clone()));

        match loaded {
            Ok(()) => Some(group),
            Err(err) => {
                warn!(error = %err, "failed to build group from object");
                None
            }
        }
    }
}
