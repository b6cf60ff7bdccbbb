use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from pi-report.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ReportConfig {
    pub source: SourceConfig,
    pub report: OutputConfig,
    pub plot: PlotConfig,
}

/// Where the job manager keeps its state.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// SbatchMan SQLite database.
    pub db_path: PathBuf,
    /// File name of the captured stdout inside each job directory.
    pub stdout_file: String,
    /// Job statuses to include (case-insensitive).
    pub statuses: Vec<String>,
    pub include_archived: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Cluster name; when unset it is read from the job database.
    pub cluster: Option<String>,
    pub output_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
}

// --- Default implementations ---

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("SbatchMan/sbatchman.db"),
            stdout_file: "stdout.log".to_string(),
            statuses: vec!["COMPLETED".to_string()],
            include_archived: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            cluster: None,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        // 6x4 inches at 100 dpi
        Self {
            width: 600,
            height: 400,
        }
    }
}

/// Load the config file at `path`.
///
/// A missing file is not an error: the built-in defaults are returned so the
/// tool runs with no setup at all. A file that exists but fails to parse is.
pub fn load_config(path: &Path) -> Result<ReportConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(ReportConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}
