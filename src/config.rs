//! The config root, which owns a [`PropertySet`] and persists it as a JSON document.
//!
//! # Example
//!
//! ```rust,no_run
//! use propconfig::{Config, ConfigOptions, NonNull, Nullable, PropertySet};
//!
//! #[derive(Debug, PropertySet)]
//! struct AppSettings {
//!     theme: NonNull<String>,
//!     volume: Nullable<i32>,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ConfigOptions::builder()
//!     .path("./settings.json")
//!     .build()?;
//!
//! let mut config = Config::new(
//!     options,
//!     AppSettings {
//!         theme: NonNull::new("theme", "dark".to_string()),
//!         volume: Nullable::bounded("volume", Some(50), Some(0), Some(100)),
//!     },
//! )?;
//!
//! // Reads the file, creating it with the defaults above if it is missing
//! config.load()?;
//!
//! config.volume.set(Some(80));
//! config.save()?;
//! # Ok(())
//! # }
//! ```
use std::{
    fmt, io,
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
    sync::Arc,
};

use derive_builder::Builder;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value, ser::PrettyFormatter};
use tracing::debug;

use crate::{
    error::{Error, Result},
    migration::{Migrations, VERSION_KEY, stored_version},
    property::{NonNull, Property, PropertySet},
    registry::{Registry, Scope},
    storage::{FileStorage, Storage},
};

/// Options for a [`Config`].
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned")]
pub struct ConfigOptions {
    /// Where the document is stored.
    #[builder(setter(into))]
    path: PathBuf,

    /// Save the defaults when loading finds no document.
    #[builder(default = "true")]
    create_if_missing: bool,

    /// Indentation used when pretty-printing the document.
    #[builder(setter(into), default = "String::from(\"\\t\")")]
    indent: String,

    /// Migrations run on the raw document before it is loaded.
    ///
    /// Setting this also stores the schema version under `configVersion`.
    #[builder(setter(into, strip_option), default)]
    migrations: Option<Arc<Migrations>>,
}

impl ConfigOptions {
    pub fn builder() -> ConfigOptionsBuilder {
        ConfigOptionsBuilder::default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create_if_missing(&self) -> bool {
        self.create_if_missing
    }

    pub fn indent(&self) -> &str {
        &self.indent
    }

    pub fn migrations(&self) -> Option<&Migrations> {
        self.migrations.as_deref()
    }
}

/// A set of properties backed by a JSON document.
///
/// `Config` dereferences to the wrapped [`PropertySet`], so properties are
/// reached as fields of the config itself. Keys in the document that no
/// property accepts are kept and written back on [`save`](Config::save).
pub struct Config<T> {
    inner: T,
    version: Option<NonNull<u32>>,
    scope: Scope,
    options: ConfigOptions,
    storage: Box<dyn Storage>,
    dirty: bool,
}

impl<T: PropertySet> Config<T> {
    /// Creates a config stored on the local file system.
    ///
    /// Nothing is read until [`load`](Config::load) is called.
    ///
    /// # Errors
    ///
    /// The property registry is built eagerly, so this fails with
    /// [`Error::EmptyKey`] or [`Error::DuplicateKey`] if any key, including
    /// those inside nested groups, is empty or declared twice on the same
    /// owner.
    pub fn new(options: ConfigOptions, inner: T) -> Result<Self> {
        Self::with_storage(options, inner, FileStorage)
    }

    /// Creates a config that reads and writes through `storage`.
    pub fn with_storage(
        options: ConfigOptions,
        inner: T,
        storage: impl Storage + 'static,
    ) -> Result<Self> {
        let version = options
            .migrations
            .as_ref()
            .map(|migrations| NonNull::new(VERSION_KEY, migrations.current_version()));

        let config = Self {
            inner,
            version,
            scope: Scope::default(),
            options,
            storage: Box::new(storage),
            dirty: false,
        };
        config.validate()?;

        Ok(config)
    }

    /// Loads the document from storage.
    ///
    /// If there is no document, the defaults are saved when
    /// `create_if_missing` is set and kept in memory otherwise.
    ///
    /// When migrations are configured they run on the raw document first.
    /// Every top-level key is then handed to the property registered under
    /// it, or kept as an unaccepted key. Loading never marks properties
    /// dirty.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the document cannot be read
    /// - [`Error::Json`] if it is not valid JSON
    /// - [`Error::InvalidDocument`] if it is not a JSON object
    /// - [`Error::ConfigTooNew`] or [`Error::Migration`] if migrating fails,
    ///   in which case no property is loaded
    /// - [`Error::ReassignedProperty`] if a property field was replaced with
    ///   one using a different key
    pub fn load(&mut self) -> Result<()> {
        self.validate()?;

        let path = self.options.path.as_path();
        if !self.storage.exists(path) {
            if self.options.create_if_missing {
                debug!(path = %path.display(), "creating config with defaults");
                return self.save();
            }
            debug!(path = %path.display(), "no config found, keeping defaults");
            return Ok(());
        }

        let text = self.storage.read_text(path)?;
        let Value::Object(mut document) = serde_json::from_str::<Value>(&text)? else {
            return Err(Error::InvalidDocument(path.display().to_string()));
        };

        if let Some(migrations) = &self.options.migrations {
            migrations.apply(&mut document)?;
            let version = stored_version(&document);
            document.insert(VERSION_KEY.to_owned(), Value::from(version));
        }

        self.scope
            .load(slots_mut(&mut self.version, &mut self.inner), document)?;

        debug!(path = %self.options.path.display(), "loaded config");
        Ok(())
    }

    /// Writes the document to storage, creating parent directories as
    /// needed, and clears every dirty flag.
    ///
    /// Properties are written in registration order, with the version first
    /// when migrations are configured, followed by unaccepted keys no
    /// property now claims.
    pub fn save(&mut self) -> Result<()> {
        self.validate()?;

        let text = self.render()?;
        let path = self.options.path.as_path();
        self.storage.create_parent_dirs(path)?;
        self.storage.write_text(path, &text)?;

        for property in slots_mut(&mut self.version, &mut self.inner) {
            property.clear_dirty();
        }
        self.dirty = false;

        debug!(path = %self.options.path.display(), "saved config");
        Ok(())
    }

    /// Applies `f` to the properties and saves if anything changed.
    ///
    /// ```rust,no_run
    /// # use propconfig::{Config, ConfigOptions, NonNull, PropertySet};
    /// # #[derive(PropertySet)]
    /// # struct AppSettings { theme: NonNull<String> }
    /// # fn main() -> propconfig::Result<()> {
    /// # let options = ConfigOptions::builder().path("settings.json").build()?;
    /// # let mut config = Config::new(options, AppSettings { theme: NonNull::new("theme", "dark".into()) })?;
    /// config.update(|settings| {
    ///     settings.theme.set("light".to_string());
    ///     Ok(())
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn update(&mut self, f: impl FnOnce(&mut T) -> Result<()>) -> Result<()> {
        f(&mut self.inner)?;
        if self.is_dirty() {
            self.save()?;
        }
        Ok(())
    }

    /// Whether any property, including those inside groups, has unsaved
    /// changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty || self.properties().iter().any(|property| property.is_dirty())
    }

    /// Flag the config as changed, for mutations no property can observe.
    /// Cleared by the next successful [`save`](Config::save).
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Every registered property in save order, the version property first.
    pub fn properties(&self) -> Vec<&dyn Property> {
        slots(&self.version, &self.inner)
    }

    pub fn registry(&self) -> Result<&Registry> {
        self.scope.registry(&self.properties())
    }

    /// The schema version of the loaded document, or `None` without
    /// migrations.
    pub fn config_version(&self) -> Option<u32> {
        self.version.as_ref().map(|version| *version.get())
    }

    /// Top-level keys found while loading that no property accepted.
    pub fn unaccepted_keys(&self) -> &JsonMap<String, Value> {
        self.scope.unaccepted()
    }

    pub fn path(&self) -> &Path {
        &self.options.path
    }

    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }

    /// The document [`save`](Config::save) would write.
    pub fn to_value(&self) -> Value {
        Value::Object(self.scope.save(&self.properties()))
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn validate(&self) -> Result<()> {
        self.scope.validate(&self.properties())
    }

    fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(self.options.indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.to_value().serialize(&mut serializer)?;
        buf.push(b'\n');

        String::from_utf8(buf)
            .map_err(|err| Error::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
    }
}

fn slots<'a, T: PropertySet>(
    version: &'a Option<NonNull<u32>>,
    inner: &'a T,
) -> Vec<&'a dyn Property> {
    let mut properties: Vec<&dyn Property> = Vec::new();
    if let Some(version) = version {
        properties.push(version);
    }
    properties.extend(inner.properties());
    properties
}

fn slots_mut<'a, T: PropertySet>(
    version: &'a mut Option<NonNull<u32>>,
    inner: &'a mut T,
) -> Vec<&'a mut dyn Property> {
    let mut properties: Vec<&mut dyn Property> = Vec::new();
    if let Some(version) = version {
        properties.push(version);
    }
    properties.extend(inner.properties_mut());
    properties
}

impl<T> Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for Config<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: PropertySet> fmt::Display for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.render().map_err(|_| fmt::Error)?;
        f.write_str(text.trim_end())
    }
}

impl<T: fmt::Debug> fmt::Debug for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.options.path)
            .field("inner", &self.inner)
            .field("version", &self.version.as_ref().map(|version| *version.get()))
            .field("unaccepted", self.scope.unaccepted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Group, List, Nullable, storage::MemoryStorage};
    use serde_json::json;

    struct Screen {
        brightness: Nullable<i32>,
    }

    impl PropertySet for Screen {
        fn properties(&self) -> Vec<&dyn Property> {
            vec![&self.brightness as &dyn Property]
        }

        fn properties_mut(&mut self) -> Vec<&mut dyn Property> {
            vec![&mut self.brightness as &mut dyn Property]
        }
    }

    struct Settings {
        name: NonNull<String>,
        tags: List<String>,
        display: Group<Screen>,
    }

    impl PropertySet for Settings {
        fn properties(&self) -> Vec<&dyn Property> {
            vec![&self.name as &dyn Property, &self.tags, &self.display]
        }

        fn properties_mut(&mut self) -> Vec<&mut dyn Property> {
            vec![
                &mut self.name as &mut dyn Property,
                &mut self.tags,
                &mut self.display,
            ]
        }
    }

    fn settings() -> Settings {
        Settings {
            name: NonNull::new("name", "default".to_string()),
            tags: List::new("tags"),
            display: Group::new(
                "display",
                Screen {
                    brightness: Nullable::bounded("brightness", Some(50), Some(0), Some(100)),
                },
            ),
        }
    }

    fn options(path: &str) -> ConfigOptions {
        ConfigOptions::builder().path(path).build().unwrap()
    }

    #[test]
    fn test_options_defaults() {
        let options = options("config.json");
        assert_eq!(options.path(), Path::new("config.json"));
        assert!(options.create_if_missing());
        assert_eq!(options.indent(), "\t");
        assert!(options.migrations().is_none());
    }

    #[test]
    fn test_options_require_path() {
        let err = ConfigOptions::builder().build().unwrap_err();
        assert!(matches!(err, ConfigOptionsBuilderError::UninitializedField("path")));
    }

    #[test]
    fn test_load_creates_missing_document() {
        let storage = MemoryStorage::new();
        let mut config = Config::with_storage(options("app.json"), settings(), storage.clone()).unwrap();

        config.load().unwrap();

        let written: Value = serde_json::from_str(&storage.get("app.json").unwrap()).unwrap();
        assert_eq!(
            written,
            json!({"name": "default", "tags": [], "display": {"brightness": 50}})
        );
    }

    #[test]
    fn test_load_without_create_keeps_defaults() {
        let storage = MemoryStorage::new();
        let options = ConfigOptions::builder()
            .path("app.json")
            .create_if_missing(false)
            .build()
            .unwrap();
        let mut config = Config::with_storage(options, settings(), storage.clone()).unwrap();

        config.load().unwrap();
        assert!(storage.get("app.json").is_none());
        assert_eq!(config.name.get(), "default");
    }

    #[test]
    fn test_save_clears_dirty_flags() {
        let mut config =
            Config::with_storage(options("app.json"), settings(), MemoryStorage::new()).unwrap();
        assert!(!config.is_dirty());

        config.display.brightness.set(Some(500));
        assert!(config.is_dirty());
        assert_eq!(config.display.brightness.get(), Some(&100));

        config.save().unwrap();
        assert!(!config.is_dirty());
        assert!(!config.display.is_dirty());
    }

    #[test]
    fn test_load_rejects_non_objects() {
        let storage = MemoryStorage::new();
        storage.insert("app.json", "[1, 2, 3]");
        let mut config = Config::with_storage(options("app.json"), settings(), storage).unwrap();

        assert!(matches!(config.load(), Err(Error::InvalidDocument(_))));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let storage = MemoryStorage::new();
        storage.insert("app.json", "{\"name\": ");
        let mut config = Config::with_storage(options("app.json"), settings(), storage).unwrap();

        assert!(matches!(config.load(), Err(Error::Json(_))));
    }

    #[test]
    fn test_construction_rejects_empty_keys_in_groups() {
        let mut inner = settings();
        inner.display = Group::new(
            "display",
            Screen {
                brightness: Nullable::new("", None),
            },
        );
        let result = Config::with_storage(options("app.json"), inner, MemoryStorage::new());
        assert!(matches!(result, Err(Error::EmptyKey)));
    }

    #[test]
    fn test_reassigned_property_is_detected() {
        let mut config =
            Config::with_storage(options("app.json"), settings(), MemoryStorage::new()).unwrap();
        config.name = NonNull::new("other", "x".to_string());

        assert!(matches!(config.save(), Err(Error::ReassignedProperty(key)) if key == "name"));
    }

    #[test]
    fn test_indent_and_display() {
        let options = ConfigOptions::builder()
            .path("app.json")
            .indent("  ")
            .build()
            .unwrap();
        let config = Config::with_storage(options, settings(), MemoryStorage::new()).unwrap();

        let rendered = config.to_string();
        assert!(rendered.starts_with("{\n  \"name\": \"default\""));
        assert!(rendered.contains("\n    \"brightness\": 50\n"));
    }

    #[test]
    fn test_version_property_is_first() {
        let migrations = Migrations::builder().add_noop().add_noop().build().unwrap();
        let options = ConfigOptions::builder()
            .path("app.json")
            .migrations(migrations)
            .build()
            .unwrap();
        let config = Config::with_storage(options, settings(), MemoryStorage::new()).unwrap();

        assert_eq!(config.config_version(), Some(2));
        let keys: Vec<_> = config.properties().iter().map(|p| p.key().to_owned()).collect();
        assert_eq!(keys, vec!["configVersion", "name", "tags", "display"]);
        assert_eq!(
            config.to_value().as_object().unwrap().keys().next().map(String::as_str),
            Some("configVersion")
        );
    }

    #[test]
    fn test_update_saves_when_dirty() {
        let storage = MemoryStorage::new();
        let mut config = Config::with_storage(options("app.json"), settings(), storage.clone()).unwrap();

        config.update(|_| Ok(())).unwrap();
        assert!(storage.get("app.json").is_none());

        config
            .update(|settings| {
                settings.tags.push("fast".to_string());
                Ok(())
            })
            .unwrap();
        assert!(storage.get("app.json").unwrap().contains("fast"));
        assert!(!config.is_dirty());
    }

    #[test]
    fn test_mark_dirty_forces_save() {
        let storage = MemoryStorage::new();
        let mut config = Config::with_storage(options("app.json"), settings(), storage.clone()).unwrap();

        config.mark_dirty();
        assert!(config.is_dirty());
        assert!(!config.name.is_dirty());

        config.update(|_| Ok(())).unwrap();
        assert!(storage.get("app.json").is_some());
        assert!(!config.is_dirty());
    }
}
