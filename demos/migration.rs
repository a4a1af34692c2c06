//! Upgrade an old settings document by renaming one key and adding another.
//!
//! Run with `cargo run --example migration`.

use propconfig::{Config, ConfigOptions, Migrations, Nullable, PropertySet};
use std::{fs, sync::Arc};

#[derive(Debug, PropertySet)]
struct Profile {
    display_name: Nullable<String>,
    locale: Nullable<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            display_name: Nullable::new("displayName", None),
            locale: Nullable::new("locale", None),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let migrations = Migrations::builder()
        // version 1: `name` became `displayName`
        .add(|doc| {
            if let Some(value) = doc.remove("name") {
                doc.insert("displayName".into(), value);
            }
            Ok(())
        })
        // version 2: `locale` was introduced
        .add(|doc| {
            doc.entry("locale").or_insert_with(|| "en-US".into());
            Ok(())
        })
        .build()?;
    let migrations = Arc::new(migrations);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("profile.json");
    fs::write(&path, r#"{"name": "Ada"}"#)?;
    println!("before:\n{}\n", fs::read_to_string(&path)?);

    let options = ConfigOptions::builder()
        .path(&path)
        .indent("  ")
        .migrations(migrations.clone())
        .build()?;
    let mut config = Config::new(options, Profile::default())?;
    config.load()?;
    config.save()?;

    println!("migrated to version {:?}", config.config_version());
    println!("display name: {:?}", config.display_name.get());
    println!("locale: {:?}", config.locale.get());
    println!("\nafter:\n{}", fs::read_to_string(&path)?);

    // a second load finds the document current and runs nothing
    let options = ConfigOptions::builder()
        .path(&path)
        .migrations(migrations)
        .build()?;
    let mut reloaded = Config::new(options, Profile::default())?;
    reloaded.load()?;
    assert_eq!(reloaded.display_name.get().map(String::as_str), Some("Ada"));

    Ok(())
}
