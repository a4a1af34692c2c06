//! Key lookup for the properties of a single owner.
//!
//! A [`Registry`] is built once per owner (a [`Config`](crate::Config) or a
//! [`Group`](crate::Group)) from the properties its
//! [`PropertySet`](crate::PropertySet) declares, and maps every key to the
//! position of the property declaring it.
use std::{collections::HashMap, sync::OnceLock};

use serde_json::{Map as JsonMap, Value};
use tracing::trace;

use crate::{
    error::{Error, Result},
    property::Property,
};

#[derive(Debug, Clone, Default)]
pub struct Registry {
    slots: HashMap<String, usize>,
    keys: Vec<String>,
}

impl Registry {
    /// Index `properties` by key.
    ///
    /// Fails with [`Error::EmptyKey`] or [`Error::DuplicateKey`] if a key is
    /// empty or declared twice.
    pub fn build(properties: &[&dyn Property]) -> Result<Self> {
        let mut registry = Self {
            slots: HashMap::with_capacity(properties.len()),
            keys: Vec::with_capacity(properties.len()),
        };

        for (slot, property) in properties.iter().enumerate() {
            let key = property.key();
            if key.is_empty() {
                return Err(Error::EmptyKey);
            }
            if registry.slots.insert(key.to_owned(), slot).is_some() {
                return Err(Error::DuplicateKey(key.to_owned()));
            }
            registry.keys.push(key.to_owned());
        }

        Ok(registry)
    }

    /// The position of the property stored under `key`.
    pub fn lookup(&self, key: &str) -> Option<usize> {
        self.slots.get(key).copied()
    }

    /// Registered keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check that every slot still holds a property with the key it was
    /// registered under.
    pub fn verify(&self, properties: &[&dyn Property]) -> Result<()> {
        if properties.len() != self.keys.len() {
            let missing = self.keys.get(properties.len()).cloned().unwrap_or_default();
            return Err(Error::ReassignedProperty(missing));
        }

        for (expected, property) in self.keys.iter().zip(properties) {
            if property.key() != expected {
                return Err(Error::ReassignedProperty(expected.clone()));
            }
        }

        Ok(())
    }
}

/// Load and save state shared by config roots and groups: the memoized
/// registry and the keys no property accepted.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    registry: OnceLock<Registry>,
    unaccepted: JsonMap<String, Value>,
}

impl Scope {
    pub(crate) fn registry(&self, properties: &[&dyn Property]) -> Result<&Registry> {
        memoized(&self.registry, properties)
    }

    pub(crate) fn unaccepted(&self) -> &JsonMap<String, Value> {
        &self.unaccepted
    }

    /// Build the registry if needed, check it against the current slots, and
    /// validate every property recursively.
    pub(crate) fn validate(&self, properties: &[&dyn Property]) -> Result<()> {
        self.registry(properties)?.verify(properties)?;
        properties.iter().try_for_each(|property| property.validate())
    }

    /// Hand each entry of `object` to the property registered under its key,
    /// parking the rest as unaccepted keys.
    pub(crate) fn load(
        &mut self,
        mut properties: Vec<&mut dyn Property>,
        object: JsonMap<String, Value>,
    ) -> Result<()> {
        let registry = {
            let shared: Vec<&dyn Property> = properties.iter().map(|p| &**p).collect();
            memoized(&self.registry, &shared)?
        };

        for (key, node) in object {
            let accepted = registry
                .lookup(&key)
                .and_then(|slot| properties.get_mut(slot))
                .filter(|property| property.key() == key);

            match accepted {
                Some(property) => property.load(&node),
                None => {
                    trace!(%key, "no property accepted key");
                    self.unaccepted.insert(key, node);
                }
            }
        }

        Ok(())
    }

    /// Save every property in order, then append unaccepted keys no property
    /// now claims.
    pub(crate) fn save(&self, properties: &[&dyn Property]) -> JsonMap<String, Value> {
        let mut object = JsonMap::new();

        for property in properties {
            if let Some(node) = property.save() {
                object.insert(property.key().to_owned(), node);
            }
        }

        for (key, node) in &self.unaccepted {
            if !object.contains_key(key) {
                object.insert(key.clone(), node.clone());
            }
        }

        object
    }
}

fn memoized<'a>(cell: &'a OnceLock<Registry>, properties: &[&dyn Property]) -> Result<&'a Registry> {
    if let Some(registry) = cell.get() {
        return Ok(registry);
    }
    let registry = Registry::build(properties)?;
    Ok(cell.get_or_init(|| registry))
}
