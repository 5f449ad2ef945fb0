#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::{ConfigProvider, RowFormat};
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::{
    validate_lat_lon, validate_non_empty_string, validate_path, validate_positive_number,
    validate_single_byte_char, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Everything one ingest run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Destination name; defaults to the input file stem.
    #[serde(default)]
    pub name: Option<String>,
    /// Explicit schema spec; inferred from the sample row when absent.
    #[serde(default)]
    pub spec: Option<String>,
    #[serde(default)]
    pub lat_field: Option<String>,
    #[serde(default)]
    pub lon_field: Option<String>,
    #[serde(default)]
    pub format: RowFormat,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub monitor: bool,
}

impl IngestConfig {
    pub fn new(input_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            name: None,
            spec: None,
            lat_field: None,
            lon_field: None,
            format: RowFormat::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            monitor: false,
        }
    }

    pub fn with_lat_lon(mut self, lat: &str, lon: &str) -> Self {
        self.lat_field = Some(lat.to_string());
        self.lon_field = Some(lon.to_string());
        self
    }
}

impl ConfigProvider for IngestConfig {
    fn input_path(&self) -> &Path {
        &self.input_path
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn destination_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.input_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "features".to_string())
        })
    }

    fn schema_spec(&self) -> Option<&str> {
        self.spec.as_deref()
    }

    fn lat_lon(&self) -> Option<(&str, &str)> {
        match (&self.lat_field, &self.lon_field) {
            (Some(lat), Some(lon)) => Some((lat.as_str(), lon.as_str())),
            _ => None,
        }
    }

    fn row_format(&self) -> &RowFormat {
        &self.format
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Validate for IngestConfig {
    fn validate(&self) -> Result<()> {
        validate_path("input_path", &self.input_path.to_string_lossy())?;
        validate_path("output_dir", &self.output_dir.to_string_lossy())?;
        validate_positive_number("batch_size", self.batch_size, 1)?;
        validate_lat_lon(self.lat_field.as_deref(), self.lon_field.as_deref())?;

        validate_single_byte_char("delimiter", self.format.delimiter)?;
        validate_single_byte_char("quote", self.format.quote)?;
        if let Some(separator) = self.format.record_separator {
            validate_single_byte_char("record_separator", separator)?;
        }
        if self.format.delimiter == self.format.quote {
            return Err(IngestError::config("delimiter and quote must differ"));
        }

        let name = self.destination_name();
        validate_non_empty_string("name", &name)?;
        if name.contains(['/', '\\']) {
            return Err(IngestError::config(format!(
                "name '{}' must not contain path separators",
                name
            )));
        }

        if let Some(spec) = &self.spec {
            validate_non_empty_string("spec", spec)?;
        }
        Ok(())
    }
}
