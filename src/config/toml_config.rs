use crate::config::{IngestConfig, DEFAULT_BATCH_SIZE};
use crate::core::RowFormat;
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    #[serde(flatten)]
    pub format: RowFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub name: Option<String>,
    pub spec: Option<String>,
    pub lat_field: Option<String>,
    pub lon_field: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        toml::from_str(&processed)
            .map_err(|e| IngestError::config(format!("TOML parsing error: {}", e)))
    }

    /// 替換環境變數 (例如 ${DATA_DIR})，未定義的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| IngestError::config(format!("invalid env pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn to_ingest_config(&self) -> IngestConfig {
        IngestConfig {
            input_path: self.source.path.clone(),
            output_dir: self.output.dir.clone(),
            name: self.schema.name.clone(),
            spec: self.schema.spec.clone(),
            lat_field: self.schema.lat_field.clone(),
            lon_field: self.schema.lon_field.clone(),
            format: self.source.format.clone(),
            batch_size: self.output.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            monitor: self.monitoring_enabled(),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.to_ingest_config().validate()
    }
}
