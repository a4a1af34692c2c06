//! Typed, dirty-tracking configuration persisted as JSON.
//!
//! A configuration is a struct of [properties](property), each stored under
//! its own key. [`Config`] loads them from a JSON document, runs
//! [`Migrations`] on the raw document first, keeps keys it doesn't recognize,
//! and writes everything back atomically.
//!
//! ```rust,no_run
//! use propconfig::{Config, ConfigEnum, ConfigOptions, Group, List, NonNull, Nullable, PropertySet};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, ConfigEnum)]
//! enum UserType {
//!     Admin,
//!     User,
//!     Guest,
//! }
//!
//! #[derive(PropertySet)]
//! struct Window {
//!     width: NonNull<u32>,
//!     height: NonNull<u32>,
//! }
//!
//! #[derive(PropertySet)]
//! struct Settings {
//!     user_type: NonNull<UserType>,
//!     volume: Nullable<i32>,
//!     recent: List<String>,
//!     window: Group<Window>,
//! }
//!
//! # fn main() -> propconfig::Result<()> {
//! let mut config = Config::new(
//!     ConfigOptions::builder().path("settings.json").build()?,
//!     Settings {
//!         user_type: NonNull::new("userType", UserType::User),
//!         volume: Nullable::bounded("volume", None, Some(0), Some(100)),
//!         recent: List::new("recent"),
//!         window: Group::new(
//!             "window",
//!             Window {
//!                 width: NonNull::new("width", 800),
//!                 height: NonNull::new("height", 600),
//!             },
//!         ),
//!     },
//! )?;
//!
//! config.load()?;
//! config.recent.push("notes.txt".to_string());
//! config.window.width.set(1024);
//! config.save()?;
//! # Ok(())
//! # }
//! ```

// lets the derive macros refer to `::propconfig` from inside this crate
extern crate self as propconfig;

pub mod config;
pub mod error;
pub mod migration;
pub mod property;
pub mod registry;
pub mod serializer;
pub mod storage;

pub use config::{Config, ConfigOptions, ConfigOptionsBuilder};
pub use error::{Error, Result};
pub use migration::{Migration, Migrations, MigrationsBuilder, RegisteredMigration};
pub use property::{FromNode, Group, List, Map, NonNull, Nullable, Property, PropertySet};
pub use registry::Registry;
pub use serializer::{ConfigEnum, Serializable, Serializer};
pub use storage::{FileStorage, MemoryStorage, Storage};

// re-export derive macros
pub use propconfig_macros::{ConfigEnum, PropertySet};

#[doc(hidden)]
pub use inventory;
