//! Named, typed, dirty-tracking value cells.
//!
//! Every property knows the key it is stored under and how to save itself to
//! and load itself from a JSON node. The variants are:
//!
//! - [`Nullable`]: a single value that may be unset (saved as `null`),
//!   including bounded numbers built with [`Nullable::bounded`]
//! - [`NonNull`]: a single value that is always present
//! - [`List`] and [`Map`]: mutable collections delegating to an element
//!   serializer
//! - [`Group`]: a nested set of properties saved as a JSON object
//!
//! Types holding properties implement [`PropertySet`], usually through
//! `#[derive(PropertySet)]`.
mod group;
mod list;
mod map;
mod value;

pub use group::{FromNode, Group};
pub use list::List;
pub use map::Map;
pub use value::{NonNull, Nullable};

use serde_json::Value;

use crate::error::Result;

pub trait Property {
    /// The key this property is stored under in the saved JSON object.
    fn key(&self) -> &str;

    /// Whether this property has changes that haven't been saved yet.
    fn is_dirty(&self) -> bool;

    fn clear_dirty(&mut self);

    /// Encode the current value.
    ///
    /// Returning `None` leaves the key out of the saved object entirely;
    /// return `Some(Value::Null)` to save an explicit `null`.
    fn save(&self) -> Option<Value>;

    /// Load a node read from disk. Nodes of an unexpected shape are ignored
    /// and the current value is kept.
    fn load(&mut self, node: &Value);

    /// Check the construction-time invariants of anything this property owns.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// A type declaring a fixed set of properties.
///
/// Both methods must return the same properties in the same order, which is
/// the order they are saved in.
pub trait PropertySet {
    fn properties(&self) -> Vec<&dyn Property>;

    fn properties_mut(&mut self) -> Vec<&mut dyn Property>;
}
