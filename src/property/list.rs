use std::{fmt, ops::Deref, sync::Arc};

use serde_json::Value;

use crate::{
    error::Result,
    property::Property,
    serializer::{Serializable, Serializer, SharedSerializer},
};

/// An ordered, mutable list of values saved as a JSON array.
///
/// Read access goes through `Deref<Target = [T]>`, so slicing, indexing and
/// iteration work as they do on a slice. Every mutating method marks the
/// property dirty.
///
/// Loading appends to the current elements rather than replacing them; call
/// [`clear`](List::clear) first for replace semantics. Elements that fail to
/// deserialize are skipped.
///
/// # Example
///
/// ```rust
/// use propconfig::{List, Property};
///
/// let mut list: List<i32> = List::new("ints");
/// list.load(&serde_json::json!([1, "x", 3]));
/// assert_eq!(&list[..], &[1, 3]);
/// ```
pub struct List<T> {
    key: String,
    items: Vec<T>,
    serializer: SharedSerializer<T>,
    dirty: bool,
}

impl<T: Serializable> List<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_serializer(key, T::serializer(), Vec::new())
    }

    pub fn with_defaults(key: impl Into<String>, defaults: impl IntoIterator<Item = T>) -> Self {
        Self::with_serializer(key, T::serializer(), defaults)
    }
}

impl<T> List<T> {
    /// Create a list using `serializer` for each element.
    pub fn with_serializer(
        key: impl Into<String>,
        serializer: impl Serializer<T> + 'static,
        defaults: impl IntoIterator<Item = T>,
    ) -> Self {
        Self {
            key: key.into(),
            items: defaults.into_iter().collect(),
            serializer: Arc::new(serializer),
            dirty: false,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn push(&mut self, mut value: T) {
        self.serializer.coerce(&mut value);
        self.items.push(value);
        self.dirty = true;
    }

    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, mut value: T) {
        self.serializer.coerce(&mut value);
        self.items.insert(index, value);
        self.dirty = true;
    }

    /// Replace the element at `index`, returning the previous one.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn replace(&mut self, index: usize, mut value: T) -> T {
        self.serializer.coerce(&mut value);
        self.dirty = true;
        std::mem::replace(&mut self.items[index], value)
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove(&mut self, index: usize) -> T {
        self.dirty = true;
        self.items.remove(index)
    }

    pub fn pop(&mut self) -> Option<T> {
        let value = self.items.pop();
        self.dirty |= value.is_some();
        value
    }

    /// Mutate the element at `index` in place, returning `None` if it
    /// doesn't exist. The element is coerced afterwards and the list marked
    /// dirty.
    pub fn update<R>(&mut self, index: usize, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let item = self.items.get_mut(index)?;
        let result = f(item);
        self.serializer.coerce(item);
        self.dirty = true;
        Some(result)
    }

    /// Mutate every element in place, coercing each one afterwards.
    pub fn update_all(&mut self, mut f: impl FnMut(&mut T)) {
        for item in &mut self.items {
            f(item);
            self.serializer.coerce(item);
        }
        self.dirty |= !self.items.is_empty();
    }

    pub fn clear(&mut self) {
        self.dirty |= !self.items.is_empty();
        self.items.clear();
    }

    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        let len = self.items.len();
        self.items.retain(keep);
        self.dirty |= self.items.len() != len;
    }

    pub fn truncate(&mut self, len: usize) {
        self.dirty |= len < self.items.len();
        self.items.truncate(len);
    }

    /// Remove the first element equal to `value`, returning whether one was
    /// found.
    pub fn remove_item(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        match self.items.iter().position(|item| item == value) {
            Some(index) => {
                self.remove(index);
                true
            }
            None => false,
        }
    }
}

impl<T> Deref for List<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> Extend<T> for List<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> Property for List<T> {
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
        Some(Value::Array(
            self.items
                .iter()
                .map(|item| self.serializer.serialize(item))
                .collect(),
        ))
    }

    fn load(&mut self, node: &Value) {
        let Some(array) = node.as_array() else {
            return;
        };
        self.items
            .extend(array.iter().filter_map(|item| self.serializer.deserialize(item)));
    }

    fn validate(&self) -> Result<()> {
        self.serializer.validate()
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("key", &self.key)
            .field("items", &self.items)
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer;
    use serde_json::json;

    #[test]
    fn test_load_skips_malformed_elements() {
        let mut list: List<i32> = List::new("ints");
        list.load(&json!([1, "x", 3]));
        assert_eq!(list.as_slice(), &[1, 3]);
        assert!(!list.is_dirty());
    }

    #[test]
    fn test_load_appends_to_existing_elements() {
        let mut list = List::with_defaults("names", ["a".to_string()]);
        list.load(&json!(["b", "c"]));
        assert_eq!(list.len(), 3);
        assert_eq!(list[0], "a");
        assert_eq!(list[2], "c");
    }

    #[test]
    fn test_load_ignores_non_arrays() {
        let mut list = List::with_defaults("ints", [5]);
        list.load(&json!({"0": 1}));
        list.load(&Value::Null);
        assert_eq!(list.as_slice(), &[5]);
    }

    #[test]
    fn test_mutations_mark_dirty() {
        let mut list: List<i32> = List::new("ints");
        assert!(!list.is_dirty());

        list.push(1);
        assert!(list.is_dirty());
        list.clear_dirty();

        list.retain(|_| true);
        assert!(!list.is_dirty());
        list.pop();
        assert!(list.is_dirty());
        list.clear_dirty();

        list.extend([2, 3, 4]);
        list.clear_dirty();
        assert_eq!(list.update(7, |item| *item = 0), None);
        assert!(!list.is_dirty());

        assert_eq!(list.update(0, |item| *item = 20), Some(()));
        assert!(list.is_dirty());
        assert_eq!(&list[..2], &[20, 3]);
    }

    #[test]
    fn test_sequence_operations() {
        let mut list = List::with_defaults("ints", [1, 2, 3]);
        list.insert(1, 9);
        assert_eq!(list.as_slice(), &[1, 9, 2, 3]);
        assert_eq!(list.replace(0, 7), 1);
        assert_eq!(list.remove(3), 3);
        assert!(list.remove_item(&9));
        assert!(!list.remove_item(&9));
        assert_eq!(list.iter().position(|v| *v == 2), Some(1));
        assert!(list.contains(&7));
        assert_eq!(list.iter().sum::<i32>(), 9);
    }

    #[test]
    fn test_bounded_elements_are_clamped() {
        let mut list =
            List::with_serializer("levels", serializer::bounded(Some(1), Some(10)), Vec::new());
        list.push(50);
        list.load(&json!([0, 5]));
        assert_eq!(list.as_slice(), &[10, 1, 5]);
    }

    #[test]
    fn test_in_place_updates_are_clamped() {
        let mut list =
            List::with_serializer("levels", serializer::bounded(Some(1), Some(10)), Vec::new());
        list.push(5);
        list.push(6);

        list.update(0, |item| *item = 500);
        assert_eq!(list.as_slice(), &[10, 6]);

        list.update_all(|item| *item -= 20);
        assert_eq!(list.as_slice(), &[1, 1]);
        assert_eq!(list.save(), Some(json!([1, 1])));
    }

    #[test]
    fn test_save_nested_lists() {
        let mut list: List<Vec<i32>> = List::new("nested");
        list.push(vec![1]);
        list.push(vec![]);
        assert_eq!(list.save(), Some(json!([[1], []])));
    }
}
