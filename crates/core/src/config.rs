//! Editor configuration
//!
//! Zoom and stroke-width bounds, the swatch palette and erase behavior.
//! Configuration can be created programmatically, loaded from a TOML file,
//! or read from environment variables on top of the defaults.

use crate::annotation::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// How a pointer move in erase mode selects strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraseStrategy {
    /// Only the current pointer position is tested. Fast gestures can skip
    /// strokes lying between two samples.
    #[default]
    Point,
    /// The whole segment from the previous pointer position is tested.
    SweptPath,
}

impl FromStr for EraseStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point" => Ok(Self::Point),
            "swept_path" | "swept-path" | "swept" => Ok(Self::SweptPath),
            other => Err(ConfigError::InvalidValue {
                key: "erase_strategy".to_owned(),
                value: other.to_owned(),
            }),
        }
    }
}

/// Tunables for an annotation editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub zoom_step: f32,
    /// Zoom used when a document is opened
    pub initial_zoom: f32,
    pub width_min: f32,
    pub width_max: f32,
    pub width_step: f32,
    pub default_width: f32,
    pub default_color: Color,
    /// Fixed swatches selectable by index
    pub palette: Vec<Color>,
    /// Erase radius as a multiple of the active stroke width
    pub erase_radius_factor: f32,
    pub erase_strategy: EraseStrategy,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            zoom_min: 0.5,
            zoom_max: 3.0,
            zoom_step: 0.1,
            initial_zoom: 1.0,
            width_min: 4.0,
            width_max: 20.0,
            width_step: 2.0,
            default_width: 4.0,
            default_color: Color::WHITE,
            palette: vec![
                Color::rgb(0x7D, 0xDA, 0x58),
                Color::rgb(0xD2, 0x01, 0x03),
                Color::BLACK,
                Color::WHITE,
            ],
            erase_radius_factor: 2.0,
            erase_strategy: EraseStrategy::Point,
        }
    }
}

impl EditorConfig {
    pub fn with_zoom_range(mut self, min: f32, max: f32) -> Self {
        self.zoom_min = min;
        self.zoom_max = max;
        self
    }

    pub fn with_default_color(mut self, color: Color) -> Self {
        self.default_color = color;
        self
    }

    pub fn with_erase_strategy(mut self, strategy: EraseStrategy) -> Self {
        self.erase_strategy = strategy;
        self
    }

    /// Loads configuration from environment variables over the defaults.
    ///
    /// Environment variables:
    /// - `PDF_ANNOTATE_ZOOM_MIN`: lower zoom bound (default: 0.5)
    /// - `PDF_ANNOTATE_ZOOM_MAX`: upper zoom bound (default: 3.0)
    /// - `PDF_ANNOTATE_DEFAULT_WIDTH`: initial stroke width (default: 4)
    /// - `PDF_ANNOTATE_DEFAULT_COLOR`: initial color as `#RRGGBB` (default: #FFFFFF)
    /// - `PDF_ANNOTATE_ERASE_STRATEGY`: `point` or `swept_path` (default: point)
    ///
    /// # Errors
    /// Returns an error if any variable holds an unparsable value or the
    /// resulting configuration is inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Applies the `PDF_ANNOTATE_*` environment variables to `self`.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(value) = env_value::<f32>("PDF_ANNOTATE_ZOOM_MIN")? {
            self.zoom_min = value;
        }
        if let Some(value) = env_value::<f32>("PDF_ANNOTATE_ZOOM_MAX")? {
            self.zoom_max = value;
        }
        if let Some(value) = env_value::<f32>("PDF_ANNOTATE_DEFAULT_WIDTH")? {
            self.default_width = value;
        }
        if let Some(value) = env_value::<Color>("PDF_ANNOTATE_DEFAULT_COLOR")? {
            self.default_color = value;
        }
        if let Some(value) = env_value::<EraseStrategy>("PDF_ANNOTATE_ERASE_STRATEGY")? {
            self.erase_strategy = value;
        }

        self.validate()?;
        Ok(self)
    }

    /// Loads configuration from a TOML file. Missing keys keep their
    /// defaults.
    ///
    /// ```toml
    /// zoom_min = 0.5
    /// zoom_max = 3.0
    /// default_color = "#D20103"
    /// palette = ["#7DDA58", "#D20103", "#000000", "#FFFFFF"]
    /// erase_strategy = "swept_path"
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    /// Checks bounds are ordered, steps positive, and defaults in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |name: &str, value: f32| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")))
            }
        };

        positive("zoom_min", self.zoom_min)?;
        positive("zoom_step", self.zoom_step)?;
        positive("width_min", self.width_min)?;
        positive("width_step", self.width_step)?;
        positive("erase_radius_factor", self.erase_radius_factor)?;

        if !(self.zoom_min <= self.zoom_max) {
            return Err(ConfigError::Invalid(format!(
                "zoom_min {} exceeds zoom_max {}",
                self.zoom_min, self.zoom_max
            )));
        }
        if !(self.width_min <= self.width_max) {
            return Err(ConfigError::Invalid(format!(
                "width_min {} exceeds width_max {}",
                self.width_min, self.width_max
            )));
        }
        if !(self.zoom_min..=self.zoom_max).contains(&self.initial_zoom) {
            return Err(ConfigError::Invalid(format!(
                "initial_zoom {} outside [{}, {}]",
                self.initial_zoom, self.zoom_min, self.zoom_max
            )));
        }
        if !(self.width_min..=self.width_max).contains(&self.default_width) {
            return Err(ConfigError::Invalid(format!(
                "default_width {} outside [{}, {}]",
                self.default_width, self.width_min, self.width_max
            )));
        }
        Ok(())
    }
}

fn env_value<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| ConfigError::InvalidValue {
            key: name.to_owned(),
            value: raw,
        }),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for configuration key {key}")]
    InvalidValue { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_VARS: [&str; 5] = [
        "PDF_ANNOTATE_ZOOM_MIN",
        "PDF_ANNOTATE_ZOOM_MAX",
        "PDF_ANNOTATE_DEFAULT_WIDTH",
        "PDF_ANNOTATE_DEFAULT_COLOR",
        "PDF_ANNOTATE_ERASE_STRATEGY",
    ];

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!((config.zoom_min, config.zoom_max), (0.5, 3.0));
        assert_eq!((config.width_min, config.width_max, config.width_step), (4.0, 20.0, 2.0));
        assert_eq!(config.default_color, Color::WHITE);
        assert_eq!(config.palette.len(), 4);
        assert_eq!(config.palette[1].to_hex(), "#D20103");
        assert_eq!(config.erase_radius_factor, 2.0);
        assert_eq!(config.erase_strategy, EraseStrategy::Point);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = EditorConfig::from_toml(
            r##"
            zoom_max = 2.0
            default_color = "#000000"
            erase_strategy = "swept_path"
            "##,
        )
        .unwrap();

        assert_eq!(config.zoom_max, 2.0);
        assert_eq!(config.zoom_min, 0.5); // default
        assert_eq!(config.default_color, Color::BLACK);
        assert_eq!(config.erase_strategy, EraseStrategy::SweptPath);
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(matches!(
            EditorConfig::from_toml("default_color = \"red\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EditorConfig::from_toml("zoom_min = 2.0\nzoom_max = 1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EditorConfig::from_toml("width_step = 0.0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = EditorConfig::default()
            .with_zoom_range(0.25, 4.0)
            .with_default_color(Color::RED)
            .with_erase_strategy(EraseStrategy::SweptPath);
        let toml = config.to_toml().unwrap();
        assert_eq!(EditorConfig::from_toml(&toml).unwrap(), config);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.toml");
        let config = EditorConfig::default().with_default_color(Color::BLACK);

        config.save_to_file(&path).unwrap();
        assert_eq!(EditorConfig::from_file(&path).unwrap(), config);
        assert!(matches!(
            EditorConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&ENV_VARS);

        env::set_var("PDF_ANNOTATE_ZOOM_MIN", "0.25");
        env::set_var("PDF_ANNOTATE_ZOOM_MAX", "4");
        env::set_var("PDF_ANNOTATE_DEFAULT_WIDTH", "8");
        env::set_var("PDF_ANNOTATE_DEFAULT_COLOR", "#7DDA58");
        env::set_var("PDF_ANNOTATE_ERASE_STRATEGY", "swept_path");

        let config = EditorConfig::from_env().unwrap();
        assert_eq!(config.zoom_min, 0.25);
        assert_eq!(config.zoom_max, 4.0);
        assert_eq!(config.default_width, 8.0);
        assert_eq!(config.default_color, Color::rgb(0x7D, 0xDA, 0x58));
        assert_eq!(config.erase_strategy, EraseStrategy::SweptPath);
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(&ENV_VARS);
        for name in ENV_VARS {
            env::remove_var(name);
        }
        env::set_var("PDF_ANNOTATE_DEFAULT_COLOR", "#000");

        let config = EditorConfig::from_env().unwrap();
        assert_eq!(config.default_color, Color::BLACK);
        assert_eq!(config.zoom_max, 3.0); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&ENV_VARS);
        for name in ENV_VARS {
            env::remove_var(name);
        }

        env::set_var("PDF_ANNOTATE_ZOOM_MIN", "not_a_number");
        assert!(matches!(EditorConfig::from_env(), Err(ConfigError::InvalidValue { .. })));

        env::remove_var("PDF_ANNOTATE_ZOOM_MIN");
        env::set_var("PDF_ANNOTATE_ERASE_STRATEGY", "lasso");
        assert!(EditorConfig::from_env().is_err());
    }

    // Saves and restores environment variables around a test
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }
}
