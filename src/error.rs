use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Options: {0}")]
    Options(#[from] crate::config::ConfigOptionsBuilderError),

    /// Two properties (or groups) registered on the same owner share a key.
    ///
    /// Keys are the names properties are stored under in the saved JSON
    /// object, so every property of a [`PropertySet`](crate::PropertySet)
    /// must use a distinct one.
    ///
    /// The contained string is the duplicated key.
    #[error("Duplicate property key: {0}")]
    DuplicateKey(String),

    /// A property was registered with an empty key.
    ///
    /// Groups used only as list or map elements never have their own key
    /// registered anywhere, so an empty key is fine for them.
    #[error("Property key cannot be an empty string")]
    EmptyKey,

    /// A non-null property was built from a value property with no default
    /// or no current value.
    #[error("Non-null property `{0}` has no value")]
    NullValue(String),

    /// A field holding a property was overwritten with a property using a
    /// different key after its owner's registry was built.
    ///
    /// The contained string is the key the registry expected at that slot.
    #[error("Property slot `{0}` was reassigned")]
    ReassignedProperty(String),

    /// The loaded document declares a version newer than every known
    /// migration.
    ///
    /// Such documents come from a newer schema and are never loaded.
    #[error("Config version {found} is newer than the latest known version {current}")]
    ConfigTooNew { found: u32, current: u32 },

    /// A migration transform failed. The document is left at the last
    /// version that was successfully applied.
    #[error("Migration to version {version} failed: {reason}")]
    Migration { version: u32, reason: String },

    #[error("Migration version {0} is registered more than once")]
    DuplicateMigration(u32),

    #[error("Migration versions start at 1")]
    InvalidMigrationVersion,

    /// The document on disk is valid JSON but not a JSON object.
    #[error("Invalid document at {0}: expected a JSON object")]
    InvalidDocument(String),
}
