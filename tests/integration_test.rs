use propconfig::{
    Config, ConfigEnum, ConfigOptions, Group, List, Map, MemoryStorage, NonNull, Nullable,
    PropertySet, serializer,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fs;
use tempfile::tempdir;

#[derive(Debug, Clone, Copy, PartialEq, ConfigEnum)]
enum Theme {
    Light,
    Dark,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Point {
    x: i32,
    y: i32,
}

#[derive(Debug, PropertySet)]
struct Server {
    host: NonNull<String>,
    port: NonNull<u16>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: NonNull::new("host", "localhost".to_string()),
            port: NonNull::new("port", 8080),
        }
    }
}

#[derive(Debug, PropertySet)]
struct Preferences {
    theme: NonNull<Theme>,
    auto_save: NonNull<bool>,
    max_items: Nullable<u32>,
    origin: Nullable<Point>,
    servers: List<Group<Server>>,
    shortcuts: Map<char>,
    appearance: Group<Appearance>,
}

#[derive(Debug, PropertySet)]
struct Appearance {
    font_size: NonNull<f32>,
    accent: Nullable<String>,
}

fn preferences() -> Preferences {
    Preferences {
        theme: NonNull::with_serializer("theme", serializer::enumeration::<Theme>().ordinal(), Theme::System),
        auto_save: NonNull::new("autoSave", true),
        max_items: Nullable::bounded("maxItems", Some(50), Some(1), Some(500)),
        origin: Nullable::with_serializer("origin", serializer::with_serde::<Point>(), None),
        servers: List::new("servers"),
        shortcuts: Map::new("shortcuts"),
        appearance: Group::new(
            "appearance",
            Appearance {
                font_size: NonNull::bounded("fontSize", 12.0, Some(6.0), Some(72.0)),
                accent: Nullable::new("accent", None),
            },
        ),
    }
}

#[test]
fn test_load_and_save_preferences() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = tempdir()?;
    let path = config_dir.path().join("preferences.json");
    fs::write(
        &path,
        r#"{
            "theme": "dark",
            "maxItems": 9000,
            "origin": {"x": 3, "y": -4},
            "servers": [
                {"host": "example.org", "port": 443, "tls": true},
                "not a server",
                {"port": 99999}
            ],
            "shortcuts": {"save": "s", "quit": "", "open": "o"},
            "appearance": {"fontSize": 2.5, "accent": "teal"},
            "pluginData": {"enabled": ["spell"]}
        }"#,
    )?;

    let options = ConfigOptions::builder().path(&path).build()?;
    let mut config = Config::new(options, preferences())?;
    config.load()?;

    assert_eq!(*config.theme.get(), Theme::Dark);
    assert_eq!(config.max_items.get(), Some(&500));
    assert_eq!(config.origin.get(), Some(&Point { x: 3, y: -4 }));

    assert_eq!(config.servers.len(), 2);
    assert_eq!(config.servers[0].host.get(), "example.org");
    assert_eq!(*config.servers[0].port.get(), 443);
    assert!(config.servers[0].unaccepted_keys().contains_key("tls"));
    assert_eq!(config.servers[1].host.get(), "localhost");
    assert_eq!(*config.servers[1].port.get(), u16::MAX);

    assert_eq!(config.shortcuts.keys().collect::<Vec<_>>(), vec!["save", "open"]);
    assert_eq!(*config.appearance.font_size.get(), 6.0);
    assert_eq!(config.appearance.accent.get().map(String::as_str), Some("teal"));
    assert!(!config.is_dirty());

    config.update(|prefs| {
        prefs.theme.set(Theme::Light);
        prefs.servers.push(Group::new("", Server::default()));
        prefs.shortcuts.insert("find", 'f');
        Ok(())
    })?;
    assert!(!config.is_dirty());

    let saved: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(
        saved,
        json!({
            "theme": 0,
            "autoSave": true,
            "maxItems": 500,
            "origin": {"x": 3, "y": -4},
            "servers": [
                {"host": "example.org", "port": 443, "tls": true},
                {"host": "localhost", "port": 65535},
                {"host": "localhost", "port": 8080},
            ],
            "shortcuts": {"save": "s", "open": "o", "find": "f"},
            "appearance": {"fontSize": 6.0, "accent": "teal"},
            "pluginData": {"enabled": ["spell"]},
        })
    );

    Ok(())
}

#[test]
fn test_preferences_to_json_string() -> Result<(), Box<dyn std::error::Error>> {
    let options = ConfigOptions::builder()
        .path("preferences.json")
        .indent("  ")
        .build()?;
    let mut config = Config::with_storage(options, preferences(), MemoryStorage::new())?;
    config.origin.set(Some(Point { x: 1, y: 2 }));

    let rendered = config.to_string();
    assert!(rendered.contains("\"theme\": 2"));
    assert!(rendered.contains("\"origin\": {\n    \"x\": 1,\n    \"y\": 2\n  }"));
    assert!(rendered.contains("\"accent\": null"));

    assert_eq!(config.to_value()["maxItems"], json!(50));
    assert_eq!(config.to_value()["servers"], json!([]));

    Ok(())
}

#[test]
fn test_registry_lists_keys_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let options = ConfigOptions::builder().path("preferences.json").build()?;
    let config = Config::with_storage(options, preferences(), MemoryStorage::new())?;

    let keys: Vec<_> = config.registry()?.keys().collect();
    assert_eq!(
        keys,
        vec!["theme", "autoSave", "maxItems", "origin", "servers", "shortcuts", "appearance"]
    );

    Ok(())
}
