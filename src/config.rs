use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::{validate_name, ArtifactRef};
use crate::cleaning::dates::DatePolicy;
use crate::cleaning::geo::BoundingBox;
use crate::cleaning::price::PriceRange;
use crate::cleaning::CleaningOptions;
use crate::constants::{
    DEFAULT_LOG_DIR, DEFAULT_REGISTRY_ROOT, DEFAULT_SETTINGS_FILE, REGISTRY_ENV, SETTINGS_ENV,
};
use crate::error::{CleaningError, Result};

/// Process settings read from a TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub registry_root: PathBuf,
    pub log_dir: PathBuf,
    pub date_policy: DatePolicy,
    /// Treat `min_price > max_price` as a configuration error instead of
    /// producing an empty dataset.
    pub reject_inverted_price_range: bool,
    pub bounding_box: BoundingBox,
    pub metrics_textfile: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry_root: PathBuf::from(DEFAULT_REGISTRY_ROOT),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            date_policy: DatePolicy::default(),
            reject_inverted_price_range: false,
            bounding_box: BoundingBox::default(),
            metrics_textfile: None,
        }
    }
}

impl Settings {
    /// Load settings from `explicit`, else `$BASIC_CLEANING_SETTINGS`, else
    /// `basic_cleaning.toml` if it exists, else defaults. `$BASIC_CLEANING_REGISTRY`
    /// overrides the registry root.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(SETTINGS_ENV).map(PathBuf::from));

        let mut settings = match path {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_SETTINGS_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_SETTINGS_FILE))?
            }
            None => Self::default(),
        };

        if let Some(root) = std::env::var_os(REGISTRY_ENV) {
            settings.registry_root = PathBuf::from(root);
        }
        settings.bounding_box.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CleaningError::Config(format!(
                "Failed to read settings file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.bounding_box.validate()?;
        Ok(settings)
    }
}

/// Run parameters exactly as supplied on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRunArgs {
    pub input_artifact: String,
    pub output_artifact: String,
    pub output_type: String,
    pub output_description: String,
    pub min_price: String,
    pub max_price: String,
}

/// Validated run parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input: ArtifactRef,
    pub output_artifact: String,
    pub output_type: String,
    pub output_description: String,
    pub options: CleaningOptions,
}

impl RunConfig {
    pub fn from_raw(raw: &RawRunArgs, settings: &Settings) -> Result<Self> {
        let input: ArtifactRef = raw.input_artifact.parse()?;
        validate_name(&raw.output_artifact)?;
        if raw.output_type.trim().is_empty() {
            return Err(CleaningError::Config("output_type must not be empty".to_string()));
        }

        let min = parse_price_param("min_price", &raw.min_price)?;
        let max = parse_price_param("max_price", &raw.max_price)?;
        let price_range = PriceRange::new(min, max);
        if settings.reject_inverted_price_range && price_range.is_inverted() {
            return Err(CleaningError::Config(format!(
                "min_price ({}) is greater than max_price ({})",
                min, max
            )));
        }

        Ok(Self {
            input,
            output_artifact: raw.output_artifact.clone(),
            output_type: raw.output_type.clone(),
            output_description: raw.output_description.clone(),
            options: CleaningOptions {
                price_range,
                date_policy: settings.date_policy,
                bounding_box: settings.bounding_box,
            },
        })
    }

    /// Configuration recorded on the run session.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "input_artifact": self.input.to_string(),
            "output_artifact": self.output_artifact,
            "output_type": self.output_type,
            "output_description": self.output_description,
            "min_price": self.options.price_range.min,
            "max_price": self.options.price_range.max,
            "date_policy": self.options.date_policy,
            "bounding_box": self.options.bounding_box,
        })
    }
}

/// Accept any numeric-looking string, including `inf`.
pub fn parse_price_param(name: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        CleaningError::Config(format!("{} must be numeric, got '{}'", name, raw))
    })?;
    if value.is_nan() {
        return Err(CleaningError::Config(format!("{} must not be NaN", name)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(min: &str, max: &str) -> RawRunArgs {
        RawRunArgs {
            input_artifact: "sample.csv".to_string(),
            output_artifact: "clean_sample.csv".to_string(),
            output_type: "clean_sample".to_string(),
            output_description: "Data with outliers and null values removed".to_string(),
            min_price: min.to_string(),
            max_price: max.to_string(),
        }
    }

    #[test]
    fn numeric_strings_are_converted_once() {
        let config = RunConfig::from_raw(&raw(" 10 ", "350.5"), &Settings::default()).unwrap();
        assert_eq!(config.options.price_range, PriceRange::new(10.0, 350.5));
        assert_eq!(config.input.to_string(), "sample.csv:latest");
    }

    #[test]
    fn non_numeric_bounds_are_config_errors() {
        for (min, max) in [("ten", "350"), ("10", ""), ("10", "NaN")] {
            let err = RunConfig::from_raw(&raw(min, max), &Settings::default()).unwrap_err();
            assert!(matches!(err, CleaningError::Config(_)), "{min} {max}");
        }
    }

    #[test]
    fn inverted_bounds_pass_unless_rejected() {
        let lenient = RunConfig::from_raw(&raw("1000", "100"), &Settings::default()).unwrap();
        assert!(lenient.options.price_range.is_inverted());

        let strict = Settings {
            reject_inverted_price_range: true,
            ..Settings::default()
        };
        let err = RunConfig::from_raw(&raw("1000", "100"), &strict).unwrap_err();
        assert!(matches!(err, CleaningError::Config(_)));
    }

    #[test]
    fn settings_file_overrides_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            registry_root = "/data/registry"
            date_policy = "coerce"

            [bounding_box]
            min_longitude = -74.0
            max_longitude = -73.7
            min_latitude = 40.6
            max_latitude = 40.9
            "#,
        )
        .unwrap();
        assert_eq!(settings.registry_root, PathBuf::from("/data/registry"));
        assert_eq!(settings.date_policy, DatePolicy::Coerce);
        assert_eq!(settings.bounding_box.min_longitude, -74.0);
        assert_eq!(settings.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn unknown_settings_keys_are_rejected() {
        let err = Settings::from_toml_str("min_price = 3").unwrap_err();
        assert!(matches!(err, CleaningError::Toml(_)));
    }

    #[test]
    fn session_config_captures_parameters() {
        let config = RunConfig::from_raw(&raw("10", "350"), &Settings::default()).unwrap();
        let json = config.to_json();
        assert_eq!(json["min_price"], 10.0);
        assert_eq!(json["date_policy"], "fail_fast");
        assert_eq!(json["input_artifact"], "sample.csv:latest");
    }
}
