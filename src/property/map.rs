use std::{fmt, ops::Deref, sync::Arc};

use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    error::Result,
    property::Property,
    serializer::{Serializable, Serializer, SharedSerializer},
};

/// A string-keyed map saved as a JSON object, keeping insertion order.
///
/// Read access goes through `Deref<Target = IndexMap<String, T>>`. Every
/// mutating method marks the property dirty. Loading merges entries into the
/// current map, skipping values that fail to deserialize.
pub struct Map<T> {
    key: String,
    entries: IndexMap<String, T>,
    serializer: SharedSerializer<T>,
    dirty: bool,
}

impl<T: Serializable> Map<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_serializer(key, T::serializer(), IndexMap::new())
    }

    pub fn with_defaults(
        key: impl Into<String>,
        defaults: impl IntoIterator<Item = (String, T)>,
    ) -> Self {
        Self::with_serializer(key, T::serializer(), defaults)
    }
}

impl<T> Map<T> {
    pub fn with_serializer(
        key: impl Into<String>,
        serializer: impl Serializer<T> + 'static,
        defaults: impl IntoIterator<Item = (String, T)>,
    ) -> Self {
        Self {
            key: key.into(),
            entries: defaults.into_iter().collect(),
            serializer: Arc::new(serializer),
            dirty: false,
        }
    }

    /// Insert a value, returning the one previously stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, mut value: T) -> Option<T> {
        self.serializer.coerce(&mut value);
        self.dirty = true;
        self.entries.insert(key.into(), value)
    }

    /// Remove an entry, keeping the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        let value = self.entries.shift_remove(key);
        self.dirty |= value.is_some();
        value
    }

    /// Mutate the value under `key` in place, returning `None` if there is
    /// none. The value is coerced afterwards and the map marked dirty.
    pub fn update<R>(&mut self, key: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let value = self.entries.get_mut(key)?;
        let result = f(value);
        self.serializer.coerce(value);
        self.dirty = true;
        Some(result)
    }

    pub fn update_all(&mut self, mut f: impl FnMut(&str, &mut T)) {
        for (key, value) in &mut self.entries {
            f(key, value);
            self.serializer.coerce(value);
        }
        self.dirty |= !self.entries.is_empty();
    }

    pub fn clear(&mut self) {
        self.dirty |= !self.entries.is_empty();
        self.entries.clear();
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &T) -> bool) {
        let len = self.entries.len();
        self.entries.retain(|key, value| keep(key, value));
        self.dirty |= self.entries.len() != len;
    }
}

impl<T> Deref for Map<T> {
    type Target = IndexMap<String, T>;

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl<K: Into<String>, T> Extend<(K, T)> for Map<T> {
    fn extend<I: IntoIterator<Item = (K, T)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, T> IntoIterator for &'a Map<T> {
    type Item = (&'a String, &'a T);
    type IntoIter = indexmap::map::Iter<'a, String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<T> Property for Map<T> {
    fn key(&self) -> &str {
        &self.key
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn save(&self) -> Option<Value> {
        Some(Value::Object(
            self.entries
                .iter()
                .map(|(key, value)| (key.clone(), self.serializer.serialize(value)))
                .collect(),
        ))
    }

    fn load(&mut self, node: &Value) {
        let Some(object) = node.as_object() else {
            return;
        };
        for (key, item) in object {
            if let Some(value) = self.serializer.deserialize(item) {
                self.entries.insert(key.clone(), value);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        self.serializer.validate()
    }
}

impl<T: fmt::Debug> fmt::Debug for Map<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("key", &self.key)
            .field("entries", &self.entries)
            .field("dirty", &self.dirty)
            .finish()
    }
}
