use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::{
    error::{Error, Result},
    property::Property,
    serializer::{Number, NumberSerializer, Serializable, Serializer, SharedSerializer},
};

/// A single value which may be unset.
///
/// An unset value is saved as `null`, and loading `null` unsets it. Any other
/// node the serializer can't read is ignored, keeping the current value.
///
/// # Example
///
/// ```rust
/// use propconfig::{Nullable, Property};
///
/// let mut volume = Nullable::bounded("volume", Some(50), Some(0), Some(100));
/// volume.set(Some(150));
/// assert_eq!(volume.get(), Some(&100));
/// assert!(volume.is_dirty());
///
/// volume.set(None);
/// assert_eq!(volume.save(), Some(serde_json::Value::Null));
/// ```
pub struct Nullable<T> {
    key: String,
    value: Option<T>,
    default: Option<T>,
    serializer: SharedSerializer<T>,
    dirty: bool,
}

impl<T: Serializable + Clone> Nullable<T> {
    pub fn new(key: impl Into<String>, default: Option<T>) -> Self {
        Self::with_serializer(key, T::serializer(), default)
    }
}

impl<T: Number> Nullable<T> {
    /// A number clamped into the inclusive range `[min, max]`, both when set
    /// at runtime and when loaded.
    pub fn bounded(
        key: impl Into<String>,
        default: Option<T>,
        min: Option<T>,
        max: Option<T>,
    ) -> Self {
        Self::with_serializer(key, NumberSerializer::range(min, max), default)
    }
}

impl<T: Clone> Nullable<T> {
    pub fn with_serializer(
        key: impl Into<String>,
        serializer: impl Serializer<T> + 'static,
        default: Option<T>,
    ) -> Self {
        let serializer: SharedSerializer<T> = Arc::new(serializer);
        let default = default.map(|mut value| {
            serializer.coerce(&mut value);
            value
        });
        Self {
            key: key.into(),
            value: default.clone(),
            default,
            serializer,
            dirty: false,
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn set(&mut self, value: Option<T>) {
        self.value = value.map(|mut value| {
            self.serializer.coerce(&mut value);
            value
        });
        self.dirty = true;
    }

    /// Replace the current value with the result of `update`.
    pub fn update(&mut self, update: impl FnOnce(Option<T>) -> Option<T>) {
        let value = update(self.value.take());
        self.set(value);
    }

    pub fn default_value(&self) -> Option<&T> {
        self.default.as_ref()
    }

    /// Restore the default value.
    pub fn reset(&mut self) {
        self.set(self.default.clone());
    }

    /// Wrap this property so its value can no longer be unset.
    ///
    /// Fails with [`Error::NullValue`] if either the default or the current
    /// value is missing.
    pub fn non_null(self) -> Result<NonNull<T>> {
        match (self.default, self.value) {
            (Some(default), Some(value)) => Ok(NonNull {
                key: self.key,
                value,
                default,
                serializer: self.serializer,
                dirty: self.dirty,
            }),
            _ => Err(Error::NullValue(self.key)),
        }
    }
}

impl<T> Property for Nullable<T> {
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
        Some(
            self.value
                .as_ref()
                .map_or(Value::Null, |value| self.serializer.serialize(value)),
        )
    }

    fn load(&mut self, node: &Value) {
        if node.is_null() {
            self.value = None;
        } else if let Some(value) = self.serializer.deserialize(node) {
            self.value = Some(value);
        }
    }

    fn validate(&self) -> Result<()> {
        self.serializer.validate()
    }
}

impl<T: fmt::Debug> fmt::Debug for Nullable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nullable")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// A single value which is always present.
///
/// `null` is never saved, and loading `null` keeps the current value.
///
/// # Example
///
/// ```rust
/// use propconfig::{NonNull, Property};
///
/// let mut theme = NonNull::new("theme", "dark".to_string());
/// theme.load(&serde_json::Value::Null);
/// assert_eq!(theme.get(), "dark");
/// ```
pub struct NonNull<T> {
    key: String,
    value: T,
    default: T,
    serializer: SharedSerializer<T>,
    dirty: bool,
}

impl<T: Serializable + Clone> NonNull<T> {
    pub fn new(key: impl Into<String>, default: T) -> Self {
        Self::with_serializer(key, T::serializer(), default)
    }
}

impl<T: Number> NonNull<T> {
    /// A number clamped into the inclusive range `[min, max]`.
    pub fn bounded(key: impl Into<String>, default: T, min: Option<T>, max: Option<T>) -> Self {
        Self::with_serializer(key, NumberSerializer::range(min, max), default)
    }
}

impl<T: Clone> NonNull<T> {
    pub fn with_serializer(
        key: impl Into<String>,
        serializer: impl Serializer<T> + 'static,
        default: T,
    ) -> Self {
        let serializer: SharedSerializer<T> = Arc::new(serializer);
        let mut default = default;
        serializer.coerce(&mut default);
        Self {
            key: key.into(),
            value: default.clone(),
            default,
            serializer,
            dirty: false,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, mut value: T) {
        self.serializer.coerce(&mut value);
        self.value = value;
        self.dirty = true;
    }

    pub fn update(&mut self, update: impl FnOnce(&T) -> T) {
        let value = update(&self.value);
        self.set(value);
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn reset(&mut self) {
        self.set(self.default.clone());
    }
}

impl<T> Property for NonNull<T> {
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
        Some(self.serializer.serialize(&self.value)).filter(|node| !node.is_null())
    }

    fn load(&mut self, node: &Value) {
        if node.is_null() {
            return;
        }
        if let Some(value) = self.serializer.deserialize(node) {
            self.value = value;
        }
    }

    fn validate(&self) -> Result<()> {
        self.serializer.validate()
    }
}

impl<T: fmt::Debug> fmt::Debug for NonNull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonNull")
            .field("key", &self.key)
            .field("value", &self.value)
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
    fn test_load_null_unsets_value() {
        let mut property = Nullable::new("name", Some("abc".to_string()));
        property.load(&Value::Null);
        assert_eq!(property.get(), None);
        assert_eq!(property.save(), Some(Value::Null));
    }

    #[test]
    fn test_load_mismatched_shape_keeps_value() {
        let mut property = Nullable::new("count", Some(4));
        property.load(&json!("four"));
        assert_eq!(property.get(), Some(&4));

        property.load(&json!(7));
        assert_eq!(property.get(), Some(&7));
    }

    #[test]
    fn test_load_does_not_mark_dirty() {
        let mut property = Nullable::new("count", Some(4));
        property.load(&json!(7));
        assert!(!property.is_dirty());

        property.set(Some(8));
        assert!(property.is_dirty());
        property.clear_dirty();
        assert!(!property.is_dirty());
    }

    #[test]
    fn test_bounded_clamps_on_set_and_load() {
        let mut property = Nullable::bounded("percent", Some(10), Some(0), Some(100));

        property.load(&json!(500));
        assert_eq!(property.get(), Some(&100));
        property.load(&json!(-10));
        assert_eq!(property.get(), Some(&0));

        property.set(Some(101));
        assert_eq!(property.get(), Some(&100));
        property.update(|value| value.map(|v| v - 200));
        assert_eq!(property.get(), Some(&0));
    }

    #[test]
    fn test_bounded_clamps_default() {
        let property = NonNull::bounded("ratio", 2.5, Some(0.0), Some(1.0));
        assert_eq!(*property.get(), 1.0);
        assert_eq!(*property.default_value(), 1.0);
    }

    #[test]
    fn test_non_null_requires_values() {
        let err = Nullable::<i32>::new("missing", None).non_null().unwrap_err();
        assert!(matches!(err, Error::NullValue(key) if key == "missing"));

        let mut cleared = Nullable::new("cleared", Some(1));
        cleared.set(None);
        assert!(matches!(cleared.non_null(), Err(Error::NullValue(_))));

        let wrapped = Nullable::new("present", Some(1)).non_null().unwrap();
        assert_eq!(*wrapped.get(), 1);
    }

    #[test]
    fn test_non_null_ignores_null() {
        let mut property = NonNull::new("flag", true);
        property.load(&Value::Null);
        assert!(*property.get());

        property.load(&json!(false));
        assert!(!*property.get());
    }

    #[test]
    fn test_non_null_never_saves_null() {
        let property = NonNull::new("ratio", f64::INFINITY);
        assert_eq!(property.save(), None);

        let property = NonNull::new("ratio", 0.5);
        assert_eq!(property.save(), Some(json!(0.5)));
    }

    #[test]
    fn test_reset_restores_default() {
        let mut property = NonNull::new("name", "abc123".to_string());
        property.set("other".to_string());
        property.reset();
        assert_eq!(property.get(), "abc123");
        assert!(property.is_dirty());
    }

    #[test]
    fn test_custom_serializer() {
        let mut property =
            NonNull::with_serializer("letters", serializer::list(serializer::character()), vec!['a']);
        property.load(&json!(["x", "", "yz"]));
        assert_eq!(property.get(), &vec!['x', 'y']);
        assert_eq!(property.save(), Some(json!(["x", "y"])));
    }
}
