//! Application configuration

use crate::mapping::MappingStore;
use crate::Result;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "WAYBILL_DATA_DIR";
/// Environment variable overriding the output directory
pub const OUTPUT_DIR_ENV: &str = "WAYBILL_OUTPUT_DIR";
/// Environment variable naming a font tried before the built-in candidates
pub const FONT_ENV: &str = "WAYBILL_FONT";

/// Well-known TrueType fonts with Cyrillic coverage, tried in order
const SYSTEM_FONTS: &[&str] = &[
    "C:/Windows/Fonts/arial.ttf",
    "C:/Windows/Fonts/times.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// Sizes and offsets used while filling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillOptions {
    /// Font size for text drawn into discovered form fields
    pub discovery_font_size: f32,
    /// Horizontal inset from the left edge of a widget rectangle
    pub widget_inset: f64,
    /// Font size for placements that store 0
    pub default_font_size: u32,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            discovery_font_size: 12.0,
            widget_inset: 2.0,
            default_font_size: 10,
        }
    }
}

/// Where data lives and how fills are performed
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Holds `drivers.json` and the `templates` directory
    pub data_dir: PathBuf,
    /// Generated waybills are written here
    pub output_dir: PathBuf,
    /// Fonts tried in order before falling back to Helvetica
    pub font_candidates: Vec<PathBuf>,
    pub fill: FillOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    /// Create new configuration with defaults (no environment lookups)
    pub fn new() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("generated"),
            font_candidates: default_font_candidates(None),
            fill: FillOptions::default(),
        }
    }

    /// Configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut config = Self::new();
        config.font_candidates = default_font_candidates(get("WINDIR").as_deref());
        if let Some(dir) = get(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(OUTPUT_DIR_ENV) {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(font) = get(FONT_ENV) {
            config = config.with_font(font);
        }
        config
    }

    pub fn with_data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Try this font before every other candidate
    pub fn with_font<P: Into<PathBuf>>(mut self, font: P) -> Self {
        self.font_candidates.insert(0, font.into());
        self
    }

    /// Replace the whole candidate list
    pub fn with_font_candidates(mut self, candidates: Vec<PathBuf>) -> Self {
        self.font_candidates = candidates;
        self
    }

    pub fn with_fill_options(mut self, fill: FillOptions) -> Self {
        self.fill = fill;
        self
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.data_dir.join("templates")
    }

    pub fn drivers_file(&self) -> PathBuf {
        self.data_dir.join("drivers.json")
    }

    pub fn mapping_store(&self) -> MappingStore {
        MappingStore::new(self.templates_dir())
    }

    /// Create the data, templates and output directories if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.templates_dir(), &self.output_dir] {
            create_dir(dir)?;
        }
        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        log::debug!("Creating {}", dir.display());
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Candidate fonts: the Windows font directory first, then system paths
fn default_font_candidates(windir: Option<&str>) -> Vec<PathBuf> {
    windir
        .map(|windir| Path::new(windir).join("Fonts").join("arial.ttf"))
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::new();
        assert_eq!(config.templates_dir(), Path::new("data").join("templates"));
        assert_eq!(config.drivers_file(), Path::new("data").join("drivers.json"));
        assert_eq!(config.output_dir, PathBuf::from("generated"));
        assert_eq!(
            config.font_candidates[0],
            PathBuf::from("C:/Windows/Fonts/arial.ttf")
        );
        assert_eq!(config.fill.discovery_font_size, 12.0);
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("WINDIR", "D:\\Win"),
            (DATA_DIR_ENV, "/srv/waybill"),
            (OUTPUT_DIR_ENV, ""),
            (FONT_ENV, "/opt/fonts/PTSans.ttf"),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_dir, PathBuf::from("/srv/waybill"));
        // Blank values are ignored
        assert_eq!(config.output_dir, PathBuf::from("generated"));
        assert_eq!(config.font_candidates[0], PathBuf::from("/opt/fonts/PTSans.ttf"));
        assert_eq!(
            config.font_candidates[1],
            Path::new("D:\\Win").join("Fonts").join("arial.ttf")
        );
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::new()
            .with_data_dir(dir.path().join("data"))
            .with_output_dir(dir.path().join("out"));
        config.ensure_dirs().unwrap();

        assert!(config.templates_dir().is_dir());
        assert!(config.output_dir.is_dir());
    }
}
