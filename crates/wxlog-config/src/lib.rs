use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wxlog_core::Schema;
use wxlog_ingest::IngestOptions;

const DEFAULT_DIRECTORY: &str = "weather_files";
const DEFAULT_DISPLAY_TIME_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceConfig {
    pub directory: Option<PathBuf>,
    pub extensions: Option<Vec<String>>,
    pub delimiter: Option<String>,
    pub sentinel: Option<String>,
    /// Fixed timestamp format; disables detection
    pub time_format: Option<String>,
    /// Candidate formats for detection, tried in order
    pub time_formats: Option<Vec<String>>,
    /// Custom column layout
    pub fields: Option<Vec<String>>,
    pub sort: Option<bool>,
    pub dedupe: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub time_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub source: Option<SourceConfig>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load configuration from WXLOG_CONFIG path (TOML) if present, with reasonable defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("WXLOG_CONFIG").unwrap_or_else(|_| "wxlog.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from an explicit path; a missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let cfg = if path.exists() {
            let s = fs::read_to_string(path)?;
            toml::from_str::<AppConfig>(&s)?
        } else {
            AppConfig::default()
        };
        Ok(cfg)
    }

    fn source(&self) -> SourceConfig {
        self.source.clone().unwrap_or_default()
    }

    /// Source directory (default "weather_files")
    pub fn directory(&self) -> PathBuf {
        self.source()
            .directory
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DIRECTORY))
    }

    /// Format for printing timestamps (default "%d.%m.%Y %H:%M")
    pub fn display_time_format(&self) -> String {
        self.display
            .as_ref()
            .and_then(|d| d.time_format.clone())
            .unwrap_or_else(|| DEFAULT_DISPLAY_TIME_FORMAT.to_string())
    }

    /// Ingestion settings, optionally reading a different directory
    pub fn ingest_options(&self, directory: Option<&Path>) -> Result<IngestOptions, ConfigError> {
        let source = self.source();
        let directory = directory
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.directory());
        let mut options = IngestOptions::new(directory);

        if let Some(extensions) = source.extensions {
            options.extensions = extensions;
        }
        if let Some(delimiter) = source.delimiter {
            let mut chars = delimiter.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => options.delimiter = c,
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "delimiter must be a single character, got '{}'",
                        delimiter
                    )))
                }
            }
        }
        if let Some(sentinel) = source.sentinel {
            options.sentinel = sentinel;
        }
        options.time_format = source.time_format;
        if let Some(formats) = source.time_formats {
            options.time_formats = formats;
        }
        if let Some(fields) = source.fields {
            let schema = Schema::from_names(&fields)
                .map_err(|e| ConfigError::Invalid(format!("fields: {}", e)))?;
            options = options.with_schema(schema);
        }
        options.sort = source.sort.unwrap_or(true);
        options.dedupe = source.dedupe.unwrap_or(true);

        Ok(options)
    }
}
