//! Load a settings file, change a few properties and save them back.
//!
//! Run with `cargo run --example basic_usage`.

use propconfig::{Config, ConfigEnum, ConfigOptions, Group, List, NonNull, Nullable, PropertySet};
use std::fs;

#[derive(Debug, Clone, Copy, PartialEq, ConfigEnum)]
enum Theme {
    Light,
    Dark,
    System,
}

#[derive(Debug, PropertySet)]
struct Window {
    width: NonNull<u32>,
    height: NonNull<u32>,
}

#[derive(Debug, PropertySet)]
struct Settings {
    theme: NonNull<Theme>,
    volume: Nullable<i32>,
    recent: List<String>,
    window: Group<Window>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: NonNull::new("theme", Theme::System),
            volume: Nullable::bounded("volume", Some(40), Some(0), Some(100)),
            recent: List::new("recent"),
            window: Group::new(
                "window",
                Window {
                    width: NonNull::new("width", 800),
                    height: NonNull::new("height", 600),
                },
            ),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("settings.json");
    fs::write(
        &path,
        r#"{"theme": "dark", "volume": 250, "window": {"width": 1280}, "lastSession": "2024-05-01"}"#,
    )?;

    let options = ConfigOptions::builder().path(&path).indent("  ").build()?;
    let mut config = Config::new(options, Settings::default())?;
    config.load()?;

    println!("theme: {:?}", config.theme.get());
    println!("volume: {:?}", config.volume.get());
    println!("window: {}x{}", config.window.width.get(), config.window.height.get());
    println!("kept keys: {:?}", config.unaccepted_keys().keys().collect::<Vec<_>>());

    config.update(|settings| {
        settings.theme.set(Theme::Light);
        settings.recent.push("notes.txt".to_string());
        settings.window.height.set(720);
        Ok(())
    })?;

    println!("\n{}", fs::read_to_string(&path)?);
    Ok(())
}
