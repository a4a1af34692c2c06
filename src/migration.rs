//! Ordered schema migrations applied to a raw document before loading.
//!
//! Migrations run before any property sees the document and receive the raw
//! JSON object, which they must mutate in place. After each migration runs,
//! its version is written under [`VERSION_KEY`], so a failure partway through
//! leaves the document at the last version that was applied successfully.
//!
//! # Example
//!
//! ```rust
//! use propconfig::Migrations;
//!
//! let migrations = Migrations::builder()
//!     // rename a key
//!     .add(|doc| {
//!         if let Some(value) = doc.remove("old") {
//!             doc.insert("new".into(), value);
//!         }
//!         Ok(())
//!     })
//!     // add a key that previously didn't exist
//!     .add(|doc| {
//!         doc.insert("other".into(), "a new key".into());
//!         Ok(())
//!     })
//!     .build()?;
//!
//! assert_eq!(migrations.current_version(), 2);
//! # Ok::<(), propconfig::Error>(())
//! ```
use std::{any::TypeId, collections::BTreeMap, fmt};

use serde_json::{Map as JsonMap, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The reserved key storing the schema version of a document.
pub const VERSION_KEY: &str = "configVersion";

pub type MigrateFn = Box<dyn Fn(&mut JsonMap<String, Value>) -> Result<()> + Send + Sync>;

/// A migration declared as a type.
pub trait Migration: 'static + Send + Sync {
    /// The version a document is at after this migration runs.
    const VERSION: u32;

    fn migrate(document: &mut JsonMap<String, Value>) -> Result<()>;
}

/// A migration submitted with [`submit_migration!`](crate::submit_migration).
pub struct RegisteredMigration {
    pub owner: fn() -> TypeId,
    pub version: fn() -> u32,
    pub f: fn(&mut JsonMap<String, Value>) -> Result<()>,
}

impl RegisteredMigration {
    pub const fn new<O: 'static, M: Migration>() -> Self {
        Self {
            owner: || TypeId::of::<O>(),
            version: || M::VERSION,
            f: M::migrate,
        }
    }
}

inventory::collect!(RegisteredMigration);

/// Register a [`Migration`] for an owner type, to be picked up by
/// [`Migrations::collect`].
///
/// ```rust
/// use propconfig::{Migration, Migrations, Result, submit_migration};
/// use serde_json::{Map, Value};
///
/// struct AppSettings;
///
/// struct AddTheme;
///
/// impl Migration for AddTheme {
///     const VERSION: u32 = 1;
///
///     fn migrate(document: &mut Map<String, Value>) -> Result<()> {
///         document.insert("theme".into(), "dark".into());
///         Ok(())
///     }
/// }
///
/// submit_migration!(AppSettings, AddTheme);
///
/// let migrations = Migrations::collect::<AppSettings>()?;
/// assert_eq!(migrations.current_version(), 1);
/// # Ok::<(), propconfig::Error>(())
/// ```
#[macro_export]
macro_rules! submit_migration {
    ($owner:ty, $migration:ty) => {
        $crate::inventory::submit! {
            $crate::RegisteredMigration::new::<$owner, $migration>()
        }
    };
}

/// An immutable, ordered set of numbered migrations.
pub struct Migrations {
    steps: BTreeMap<u32, MigrateFn>,
}

impl Migrations {
    pub fn builder() -> MigrationsBuilder {
        MigrationsBuilder::default()
    }

    /// Gather every migration submitted for `O` with
    /// [`submit_migration!`](crate::submit_migration).
    pub fn collect<O: 'static>() -> Result<Self> {
        let owner = TypeId::of::<O>();
        inventory::iter::<RegisteredMigration>
            .into_iter()
            .filter(|registration| (registration.owner)() == owner)
            .fold(Self::builder(), |builder, registration| {
                builder.add_with_version((registration.version)(), registration.f)
            })
            .build()
    }

    /// The highest known version, or `0` when there are no migrations.
    pub fn current_version(&self) -> u32 {
        self.steps.keys().next_back().copied().unwrap_or(0)
    }

    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.steps.keys().copied()
    }

    /// Bring `document` up to [`current_version`](Migrations::current_version).
    ///
    /// Fails with [`Error::ConfigTooNew`] if the document declares a newer
    /// version than any known migration, leaving it untouched.
    pub fn apply(&self, document: &mut JsonMap<String, Value>) -> Result<()> {
        let stored = stored_version(document);
        let current = self.current_version();

        if stored > current {
            return Err(Error::ConfigTooNew {
                found: stored,
                current,
            });
        }
        if stored == current {
            return Ok(());
        }

        for (&version, migrate) in self.steps.range(stored + 1..) {
            migrate(document).map_err(|err| match err {
                Error::Migration { .. } => err,
                other => Error::Migration {
                    version,
                    reason: other.to_string(),
                },
            })?;
            document.insert(VERSION_KEY.to_owned(), Value::from(version));
            debug!(version, "applied migration");
        }

        info!(from = stored, to = current, "migrated config");
        Ok(())
    }
}

impl fmt::Debug for Migrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrations")
            .field("versions", &self.steps.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The version declared by `document`, treating a missing or non-numeric
/// value as `0`.
pub fn stored_version(document: &JsonMap<String, Value>) -> u32 {
    let Some(number) = document.get(VERSION_KEY).and_then(Value::as_number) else {
        return 0;
    };

    if let Some(version) = number.as_u64() {
        u32::try_from(version).unwrap_or(u32::MAX)
    } else if number.is_i64() {
        0
    } else {
        number.as_f64().map(|version| version as u32).unwrap_or_default()
    }
}

/// Collects migrations for [`Migrations`].
///
/// Versions must be unique and start at `1`. Removing a migration that has
/// already shipped desynchronizes documents that recorded passing it; replace
/// it with [`add_noop`](MigrationsBuilder::add_noop) instead.
#[derive(Default)]
pub struct MigrationsBuilder {
    steps: Vec<(u32, MigrateFn)>,
    overflowed: bool,
}

impl MigrationsBuilder {
    /// Add a migration numbered one above the highest version so far.
    pub fn add<F>(self, migrate: F) -> Self
    where
        F: Fn(&mut JsonMap<String, Value>) -> Result<()> + Send + Sync + 'static,
    {
        match self.next_version() {
            Some(version) => self.add_with_version(version, migrate),
            None => Self {
                overflowed: true,
                ..self
            },
        }
    }

    pub fn add_with_version<F>(mut self, version: u32, migrate: F) -> Self
    where
        F: Fn(&mut JsonMap<String, Value>) -> Result<()> + Send + Sync + 'static,
    {
        self.steps.push((version, Box::new(migrate)));
        self
    }

    /// Reserve the next version for a migration that no longer does anything.
    pub fn add_noop(self) -> Self {
        self.add(|_| Ok(()))
    }

    pub fn register<M: Migration>(self) -> Self {
        self.add_with_version(M::VERSION, M::migrate)
    }

    /// # Errors
    ///
    /// Fails with [`Error::InvalidMigrationVersion`] if a version is `0` or
    /// auto-numbering ran past `u32::MAX`, and with
    /// [`Error::DuplicateMigration`] if a version is used twice.
    pub fn build(self) -> Result<Migrations> {
        if self.overflowed {
            return Err(Error::InvalidMigrationVersion);
        }

        let mut steps = BTreeMap::new();
        for (version, migrate) in self.steps {
            if version == 0 {
                return Err(Error::InvalidMigrationVersion);
            }
            if steps.insert(version, migrate).is_some() {
                return Err(Error::DuplicateMigration(version));
            }
        }
        Ok(Migrations { steps })
    }

    fn next_version(&self) -> Option<u32> {
        self.steps
            .iter()
            .map(|(version, _)| *version)
            .max()
            .unwrap_or(0)
            .checked_add(1)
    }
}
