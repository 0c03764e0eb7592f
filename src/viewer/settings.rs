//! Persistent application settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::editor::{DEFAULT_BOUNCES, MAX_BOUNCES, MIN_BOUNCES};
use crate::scene::DEFAULT_SCENES_DIR;

/// Application settings that persist between sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Window
    pub window_width: f32,
    pub window_height: f32,
    pub window_x: Option<f32>,
    pub window_y: Option<f32>,
    pub side_panel_width: f32,

    // Camera
    pub camera_distance: f32,
    pub camera_yaw: f32,
    pub camera_pitch: f32,

    // Rendering
    pub max_bounces: u32,
    pub path_tracing: bool,
    pub show_wireframe: bool,
    /// Raster preview clear color
    pub background_color: [f32; 4],

    // Editing
    pub uniform_scale: bool,

    // Files
    pub scenes_dir: PathBuf,
    /// Screenshot directory
    pub output_dir: PathBuf,
    pub last_scene: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_width: 1280.0,
            window_height: 720.0,
            window_x: None,
            window_y: None,
            side_panel_width: 280.0,
            camera_distance: 10.0,
            camera_yaw: 0.0,
            camera_pitch: 0.0,
            max_bounces: DEFAULT_BOUNCES,
            path_tracing: false,
            show_wireframe: false,
            background_color: [0.1, 0.1, 0.12, 1.0],
            uniform_scale: true,
            scenes_dir: PathBuf::from(DEFAULT_SCENES_DIR),
            output_dir: PathBuf::from("data/output"),
            last_scene: None,
        }
    }
}

impl Settings {
    /// Get settings file path
    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("raystudio");
            std::fs::create_dir_all(&p).ok();
            p.push("settings.json");
            p
        })
    }

    /// Load settings from file
    pub fn load() -> Self {
        let mut settings: Self = Self::path()
            .and_then(|p| std::fs::read_to_string(&p).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        settings.max_bounces = settings.max_bounces.clamp(MIN_BOUNCES, MAX_BOUNCES);
        settings
    }

    /// Save settings to file
    pub fn save(&self) {
        let Some(path) = Self::path() else {
            return;
        };
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    tracing::warn!("could not write {}: {}", path.display(), e);
                }
            }
            Err(e) => tracing::warn!("could not serialize settings: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let s: Settings = serde_json::from_str(r#"{"max_bounces": 12}"#).unwrap();
        assert_eq!(s.max_bounces, 12);
        assert_eq!(s.scenes_dir, PathBuf::from(DEFAULT_SCENES_DIR));
        assert!(s.uniform_scale);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut s = Settings::default();
        s.last_scene = Some("cornell.scene".into());
        s.path_tracing = true;
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.last_scene.as_deref(), Some("cornell.scene"));
        assert!(back.path_tracing);
    }
}
