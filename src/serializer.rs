//! Conversions between typed runtime values and JSON nodes.
//!
//! A [`Serializer`] never fails to serialize and reports any node it cannot
//! understand by returning `None` from [`Serializer::deserialize`]. Callers
//! treat `None` as if the key had never been present.
//!
//! Types with an obvious encoding implement [`Serializable`], which is how
//! property constructors such as [`Nullable::new`](crate::Nullable::new)
//! find a serializer without one being passed explicitly.
use std::{fmt, marker::PhantomData, sync::Arc};

use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Number as JsonNumber, Value};
use tracing::warn;

use crate::{
    error::Result,
    property::{FromNode, Group, Property, PropertySet},
};

/// A serializer shared between a property and the composite serializers
/// built on top of it.
pub type SharedSerializer<T> = Arc<dyn Serializer<T>>;

pub trait Serializer<T>: Send + Sync {
    /// Turn a runtime value into a JSON node suitable for saving to disk.
    fn serialize(&self, value: &T) -> Value;

    /// Turn a JSON node from disk into a runtime value, or `None` if the node
    /// has an unexpected shape.
    fn deserialize(&self, node: &Value) -> Option<T>;

    /// Bring a value assigned at runtime into the range this serializer
    /// accepts.
    fn coerce(&self, _value: &mut T) {}

    /// Check the construction-time invariants of the values this serializer
    /// builds, such as the keys of nested groups.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl<T, S: Serializer<T> + ?Sized> Serializer<T> for Arc<S> {
    fn serialize(&self, value: &T) -> Value {
        (**self).serialize(value)
    }

    fn deserialize(&self, node: &Value) -> Option<T> {
        (**self).deserialize(node)
    }

    fn coerce(&self, value: &mut T) {
        (**self).coerce(value)
    }

    fn validate(&self) -> Result<()> {
        (**self).validate()
    }
}

/// Types with a built-in [`Serializer`].
pub trait Serializable: Sized + 'static {
    fn serializer() -> SharedSerializer<Self>;
}

/// Numeric types storable as JSON numbers.
pub trait Number: Copy + PartialOrd + Send + Sync + 'static {
    /// Read a JSON number, saturating at the bounds of `Self`.
    fn from_json(number: &JsonNumber) -> Self;

    fn to_json(self) -> Value;
}

macro_rules! integer {
    ($($ty:ty),*) => {$(
        impl Number for $ty {
            fn from_json(number: &JsonNumber) -> Self {
                if let Some(value) = number.as_i64() {
                    <$ty>::try_from(value).unwrap_or(if value < 0 { <$ty>::MIN } else { <$ty>::MAX })
                } else if number.as_u64().is_some() {
                    <$ty>::MAX
                } else {
                    // `as` truncates toward zero and saturates
                    number.as_f64().map(|value| value as $ty).unwrap_or_default()
                }
            }

            fn to_json(self) -> Value {
                Value::from(self)
            }
        }

        impl Serializable for $ty {
            fn serializer() -> SharedSerializer<Self> {
                Arc::new(NumberSerializer::<$ty>::new())
            }
        }
    )*};
}

macro_rules! float {
    ($($ty:ty),*) => {$(
        impl Number for $ty {
            fn from_json(number: &JsonNumber) -> Self {
                number.as_f64().map(|value| value as $ty).unwrap_or_default()
            }

            fn to_json(self) -> Value {
                // non-finite values become `null`
                Value::from(self)
            }
        }

        impl Serializable for $ty {
            fn serializer() -> SharedSerializer<Self> {
                Arc::new(NumberSerializer::<$ty>::new())
            }
        }
    )*};
}

integer!(i8, i16, i32, i64, u8, u16, u32, u64);
float!(f32, f64);

/// Clamp `value` into the inclusive range described by `min` and `max`.
pub fn clamp<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> T {
    match (min, max) {
        (Some(min), _) if value < min => min,
        (_, Some(max)) if value > max => max,
        _ => value,
    }
}

/// Serializer for numbers, optionally clamping into an inclusive range.
#[derive(Debug, Clone, Copy)]
pub struct NumberSerializer<T> {
    min: Option<T>,
    max: Option<T>,
}

impl<T: Number> NumberSerializer<T> {
    pub fn new() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    pub fn range(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> Option<T> {
        self.min
    }

    pub fn max(&self) -> Option<T> {
        self.max
    }
}

impl<T: Number> Default for NumberSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Number> Serializer<T> for NumberSerializer<T> {
    fn serialize(&self, value: &T) -> Value {
        value.to_json()
    }

    fn deserialize(&self, node: &Value) -> Option<T> {
        node.as_number()
            .map(|number| clamp(T::from_json(number), self.min, self.max))
    }

    fn coerce(&self, value: &mut T) {
        *value = clamp(*value, self.min, self.max);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl Serializer<String> for StringSerializer {
    fn serialize(&self, value: &String) -> Value {
        Value::String(value.clone())
    }

    fn deserialize(&self, node: &Value) -> Option<String> {
        node.as_str().map(str::to_owned)
    }
}

impl Serializable for String {
    fn serializer() -> SharedSerializer<Self> {
        Arc::new(StringSerializer)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoolSerializer;

impl Serializer<bool> for BoolSerializer {
    fn serialize(&self, value: &bool) -> Value {
        Value::Bool(*value)
    }

    fn deserialize(&self, node: &Value) -> Option<bool> {
        node.as_bool()
    }
}

impl Serializable for bool {
    fn serializer() -> SharedSerializer<Self> {
        Arc::new(BoolSerializer)
    }
}

/// Stores a `char` as a one-character string. Loading takes the first
/// character of any non-empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharSerializer;

impl Serializer<char> for CharSerializer {
    fn serialize(&self, value: &char) -> Value {
        Value::String(value.to_string())
    }

    fn deserialize(&self, node: &Value) -> Option<char> {
        node.as_str().and_then(|s| s.chars().next())
    }
}

impl Serializable for char {
    fn serializer() -> SharedSerializer<Self> {
        Arc::new(CharSerializer)
    }
}

/// Fieldless enums storable by variant name or by ordinal.
///
/// Usually derived with `#[derive(ConfigEnum)]`, which also implements
/// [`Serializable`] so the enum can be used directly with property
/// constructors.
pub trait ConfigEnum: Sized + Clone + Send + Sync + 'static {
    /// Every variant, in declaration order.
    const VARIANTS: &'static [Self];

    fn name(&self) -> &'static str;

    fn ordinal(&self) -> usize;
}

/// Serializer for [`ConfigEnum`] types.
///
/// Loading accepts both representations regardless of which one is used to
/// save: names match exactly first and then ignoring ASCII case, and integers
/// match by ordinal.
pub struct EnumSerializer<E> {
    save_as_ordinal: bool,
    _marker: PhantomData<fn() -> E>,
}

impl<E: ConfigEnum> EnumSerializer<E> {
    pub fn new() -> Self {
        Self {
            save_as_ordinal: false,
            _marker: PhantomData,
        }
    }

    /// Save variants by their ordinal instead of their name.
    pub fn ordinal(mut self) -> Self {
        self.save_as_ordinal = true;
        self
    }
}

impl<E: ConfigEnum> Default for EnumSerializer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EnumSerializer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumSerializer")
            .field("save_as_ordinal", &self.save_as_ordinal)
            .finish()
    }
}

impl<E: ConfigEnum> Serializer<E> for EnumSerializer<E> {
    fn serialize(&self, value: &E) -> Value {
        if self.save_as_ordinal {
            Value::from(value.ordinal())
        } else {
            Value::from(value.name())
        }
    }

    fn deserialize(&self, node: &Value) -> Option<E> {
        match node {
            Value::String(name) => E::VARIANTS
                .iter()
                .find(|variant| variant.name() == name)
                .or_else(|| {
                    E::VARIANTS
                        .iter()
                        .find(|variant| variant.name().eq_ignore_ascii_case(name))
                })
                .cloned(),
            Value::Number(number) => number
                .as_u64()
                .and_then(|ordinal| usize::try_from(ordinal).ok())
                .and_then(|ordinal| E::VARIANTS.get(ordinal))
                .cloned(),
            _ => None,
        }
    }
}

/// Serializes a `Vec<T>` as a JSON array, delegating each element.
///
/// Elements that fail to deserialize are dropped.
pub struct ListSerializer<T> {
    inner: SharedSerializer<T>,
}

impl<T> ListSerializer<T> {
    pub fn new(inner: impl Serializer<T> + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl<T> Serializer<Vec<T>> for ListSerializer<T> {
    fn serialize(&self, value: &Vec<T>) -> Value {
        Value::Array(value.iter().map(|item| self.inner.serialize(item)).collect())
    }

    fn deserialize(&self, node: &Value) -> Option<Vec<T>> {
        let array = node.as_array()?;
        Some(
            array
                .iter()
                .filter_map(|item| self.inner.deserialize(item))
                .collect(),
        )
    }

    fn coerce(&self, value: &mut Vec<T>) {
        for item in value {
            self.inner.coerce(item);
        }
    }

    fn validate(&self) -> Result<()> {
        self.inner.validate()
    }
}

impl<T: Serializable> Serializable for Vec<T> {
    fn serializer() -> SharedSerializer<Self> {
        Arc::new(ListSerializer {
            inner: T::serializer(),
        })
    }
}

/// Serializes a string-keyed map as a JSON object, delegating each value.
///
/// Entries whose value fails to deserialize are dropped.
pub struct MapSerializer<T> {
    inner: SharedSerializer<T>,
}

impl<T> MapSerializer<T> {
    pub fn new(inner: impl Serializer<T> + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl<T> Serializer<IndexMap<String, T>> for MapSerializer<T> {
    fn serialize(&self, value: &IndexMap<String, T>) -> Value {
        Value::Object(
            value
                .iter()
                .map(|(key, item)| (key.clone(), self.inner.serialize(item)))
                .collect(),
        )
    }

    fn deserialize(&self, node: &Value) -> Option<IndexMap<String, T>> {
        let object = node.as_object()?;
        Some(
            object
                .iter()
                .filter_map(|(key, item)| Some((key.clone(), self.inner.deserialize(item)?)))
                .collect(),
        )
    }

    fn coerce(&self, value: &mut IndexMap<String, T>) {
        for item in value.values_mut() {
            self.inner.coerce(item);
        }
    }

    fn validate(&self) -> Result<()> {
        self.inner.validate()
    }
}

impl<T: Serializable> Serializable for IndexMap<String, T> {
    fn serializer() -> SharedSerializer<Self> {
        Arc::new(MapSerializer {
            inner: T::serializer(),
        })
    }
}

/// Serializer for nested [`Group`]s, such as the elements of a list of
/// objects.
///
/// Loading builds a fresh group through [`FromNode`], so only JSON objects are
/// accepted.
pub struct ObjectSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> ObjectSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for ObjectSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Serializer<Group<T>> for ObjectSerializer<T>
where
    T: PropertySet + Default,
    Group<T>: FromNode,
{
    fn serialize(&self, value: &Group<T>) -> Value {
        Value::Object(value.save_object())
    }

    fn deserialize(&self, node: &Value) -> Option<Group<T>> {
        Group::from_node(node.as_object()?)
    }

    /// Check the keys of a default element, so a group type that can never
    /// load fails at construction instead of dropping every element.
    fn validate(&self) -> Result<()> {
        Group::new("", T::default()).validate()
    }
}

impl<T: PropertySet + Default + 'static> Serializable for Group<T> {
    fn serializer() -> SharedSerializer<Self> {
        Arc::new(ObjectSerializer::<T>::new())
    }
}

/// Serializer for any plain data type implementing serde's traits.
///
/// Values that fail to deserialize are treated like any other shape
/// mismatch. Serialization failures are logged and saved as `null`.
pub struct SerdeSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> Serializer<T> for SerdeSerializer<T> {
    fn serialize(&self, value: &T) -> Value {
        serde_json::to_value(value).unwrap_or_else(|err| {
            warn!(error = %err, "failed to serialize value, saving null");
            Value::Null
        })
    }

    fn deserialize(&self, node: &Value) -> Option<T> {
        serde_json::from_value(node.clone()).ok()
    }
}

pub fn number<T: Number>() -> NumberSerializer<T> {
    NumberSerializer::new()
}

/// Number serializer clamping into `[min, max]`.
pub fn bounded<T: Number>(min: Option<T>, max: Option<T>) -> NumberSerializer<T> {
    NumberSerializer::range(min, max)
}

pub fn string() -> StringSerializer {
    StringSerializer
}

pub fn boolean() -> BoolSerializer {
    BoolSerializer
}

pub fn character() -> CharSerializer {
    CharSerializer
}

pub fn enumeration<E: ConfigEnum>() -> EnumSerializer<E> {
    EnumSerializer::new()
}

pub fn list<T>(inner: impl Serializer<T> + 'static) -> ListSerializer<T> {
    ListSerializer::new(inner)
}

pub fn map<T>(inner: impl Serializer<T> + 'static) -> MapSerializer<T> {
    MapSerializer::new(inner)
}

pub fn object<T: PropertySet + Default>() -> ObjectSerializer<T> {
    ObjectSerializer::new()
}

pub fn with_serde<T: Serialize + DeserializeOwned>() -> SerdeSerializer<T> {
    SerdeSerializer::new()
}

/// Shorthand for the built-in serializer of `T`.
pub fn of<T: Serializable>() -> SharedSerializer<T> {
    T::serializer()
}
