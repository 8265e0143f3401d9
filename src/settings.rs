use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::loader::Encoding;

/// Maximum nesting of `$Include` directives unless configured otherwise.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

/// Interpreter configuration. Everything here is fixed for the duration of a
/// load; options a route can change itself live in the route model instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    /// Base folder for structure objects. None = the route file's folder.
    pub object_folder: Option<PathBuf>,
    /// Base folder for sounds. None = the route file's folder.
    pub sound_folder: Option<PathBuf>,
    /// Folder containing train folders referenced by `Train.Folder`.
    pub train_folder: Option<PathBuf>,
    pub encoding: Encoding,
    /// Only interpret what a route summary needs and skip resource loading.
    pub preview_only: bool,
    /// Seed for `$Rnd` and weighted `$Include`.
    pub random_seed: u64,
    pub max_include_depth: usize,
    /// Initial value of `Options.EnableBveTsHacks`.
    pub enable_hacks: bool,
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            object_folder: None,
            sound_folder: None,
            train_folder: None,
            encoding: Encoding::Utf8,
            preview_only: false,
            random_seed: 0,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            enable_hacks: false,
        }
    }
}

impl RouteSettings {
    /// Folder used for structure objects, falling back to the route folder.
    pub fn object_folder<'a>(&'a self, route_folder: &'a Path) -> &'a Path {
        self.object_folder.as_deref().unwrap_or(route_folder)
    }

    pub fn sound_folder<'a>(&'a self, route_folder: &'a Path) -> &'a Path {
        self.sound_folder.as_deref().unwrap_or(route_folder)
    }

    pub fn train_folder<'a>(&'a self, route_folder: &'a Path) -> &'a Path {
        self.train_folder.as_deref().unwrap_or(route_folder)
    }
}

/// Load settings from a JSON file. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<RouteSettings, RouteError> {
    if !path.exists() {
        return Ok(RouteSettings::default());
    }
    let text = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str(&text)?;
    Ok(settings)
}

/// Save settings as pretty-printed JSON.
pub fn save_settings(path: &Path, settings: &RouteSettings) -> Result<(), RouteError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip() {
        let dir = std::env::temp_dir().join("route_dsl_test_settings");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("settings.json");

        let settings = RouteSettings {
            object_folder: Some(PathBuf::from("/routes/Object")),
            encoding: Encoding::Latin1,
            random_seed: 42,
            ..RouteSettings::default()
        };
        save_settings(&path, &settings).unwrap();

        let loaded = load_settings(&path).expect("should load");
        assert_eq!(loaded.object_folder, Some(PathBuf::from("/routes/Object")));
        assert_eq!(loaded.encoding, Encoding::Latin1);
        assert_eq!(loaded.random_seed, 42);
        assert!(!loaded.preview_only);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: RouteSettings = serde_json::from_str(r#"{ "preview_only": true }"#).unwrap();
        assert!(settings.preview_only);
        assert_eq!(settings.max_include_depth, DEFAULT_MAX_INCLUDE_DEPTH);
    }

    #[test]
    fn test_load_missing_returns_defaults() {
        let path = std::env::temp_dir().join("route_dsl_no_settings/settings.json");
        let loaded = load_settings(&path).unwrap();
        assert!(loaded.object_folder.is_none());
    }

    #[test]
    fn test_folder_fallback() {
        let settings = RouteSettings::default();
        assert_eq!(settings.object_folder(Path::new("/r")), Path::new("/r"));
    }
}
