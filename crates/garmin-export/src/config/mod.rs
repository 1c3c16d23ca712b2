//! Configuration: directories, credentials and the export settings.
//!
//! Settings are layered. CLI flags win over the optional JSON file at
//! `<config_dir>/garmin/export.json`, which wins over built-in defaults.

mod credentials;

pub use credentials::CredentialStore;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{GarminError, Result};
use crate::sync::RetryPolicy;

/// Default configuration directory name
const CONFIG_DIR_NAME: &str = "garmin";

const CONFIG_FILE_NAME: &str = "export.json";
const ACTIVITIES_FILE: &str = "garmin_stats.csv";
const DAILY_FILE: &str = "garmin_daily_health.csv";
const TRACKS_DIR: &str = "gps_tracks";
const SYNC_DB_FILE: &str = "sync.db";

/// Minimum delay between two requests to Garmin Connect
const DEFAULT_MIN_REQUEST_DELAY: Duration = Duration::from_millis(1000);
/// Enrichment merges between two table checkpoints
const DEFAULT_CHECKPOINT_EVERY: usize = 25;

/// Get the configuration directory path
/// Returns ~/.config/garmin on Unix, ~/Library/Application Support/garmin on macOS
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join(CONFIG_DIR_NAME))
        .ok_or_else(|| GarminError::config("Could not determine config directory"))
}

/// Get the data directory path where the login tool stores tokens
/// Returns ~/.local/share/garmin on Unix, ~/Library/Application Support/garmin on macOS
pub fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|p| p.join(CONFIG_DIR_NAME))
        .ok_or_else(|| GarminError::config("Could not determine data directory"))
}

/// Default directory for exported tables, tracks and `sync.db`
pub fn default_export_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join("export")
}

/// First calendar date covered when no start date is given
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Retry section of the config file
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub backoff_secs: Option<Vec<u64>>,
}

/// On-disk shape of `export.json`; every key is optional
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub data_dir: Option<PathBuf>,
    pub activities_file: Option<PathBuf>,
    pub daily_file: Option<PathBuf>,
    pub tracks_dir: Option<PathBuf>,
    pub start_date: Option<NaiveDate>,
    pub retry: Option<RetrySettings>,
    pub min_request_delay_ms: Option<u64>,
    pub checkpoint_every: Option<usize>,
}

impl ConfigFile {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Read a config file; a missing file is not an error
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|e| {
            GarminError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file = serde_json::from_str(&content).map_err(|e| {
            GarminError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(Some(file))
    }
}

/// Values given on the command line
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub start_date: Option<NaiveDate>,
}

/// Fully resolved export settings
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub data_dir: PathBuf,
    pub activities_file: PathBuf,
    pub daily_file: PathBuf,
    pub tracks_dir: PathBuf,
    pub start_date: NaiveDate,
    pub retry: RetryPolicy,
    pub min_request_delay: Duration,
    pub checkpoint_every: usize,
}

impl ExportConfig {
    /// Defaults rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            activities_file: data_dir.join(ACTIVITIES_FILE),
            daily_file: data_dir.join(DAILY_FILE),
            tracks_dir: data_dir.join(TRACKS_DIR),
            data_dir,
            start_date: default_start_date(),
            retry: RetryPolicy::default(),
            min_request_delay: DEFAULT_MIN_REQUEST_DELAY,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
        }
    }

    /// Merge defaults, the config file and CLI overrides
    pub fn resolve(file: Option<ConfigFile>, overrides: ConfigOverrides) -> Result<Self> {
        let file = file.unwrap_or_default();

        let data_dir = overrides
            .data_dir
            .or(file.data_dir)
            .unwrap_or_else(default_export_dir);
        let mut config = Self::with_data_dir(data_dir);

        // Relative paths in the file are relative to the data directory
        if let Some(p) = file.activities_file {
            config.activities_file = config.data_dir.join(p);
        }
        if let Some(p) = file.daily_file {
            config.daily_file = config.data_dir.join(p);
        }
        if let Some(p) = file.tracks_dir {
            config.tracks_dir = config.data_dir.join(p);
        }
        if let Some(date) = overrides.start_date.or(file.start_date) {
            config.start_date = date;
        }
        if let Some(retry) = file.retry {
            if let Some(max) = retry.max_attempts {
                if max == 0 {
                    return Err(GarminError::config("retry.max_attempts must be at least 1"));
                }
                config.retry.max_attempts = max;
            }
            if let Some(backoff) = retry.backoff_secs {
                config.retry.backoff = backoff.into_iter().map(Duration::from_secs).collect();
            }
        }
        if let Some(ms) = file.min_request_delay_ms {
            config.min_request_delay = Duration::from_millis(ms);
        }
        if let Some(every) = file.checkpoint_every {
            config.checkpoint_every = every.max(1);
        }

        Ok(config)
    }

    /// SQLite side database holding unavailable markers and run history
    pub fn sync_db_path(&self) -> PathBuf {
        self.data_dir.join(SYNC_DB_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_dir_exists() {
        let path = config_dir().unwrap();
        assert!(path.ends_with("garmin"));
    }

    #[test]
    fn test_defaults_are_rooted_at_data_dir() {
        let config = ExportConfig::with_data_dir("/tmp/export");
        assert_eq!(config.activities_file, PathBuf::from("/tmp/export/garmin_stats.csv"));
        assert_eq!(config.daily_file, PathBuf::from("/tmp/export/garmin_daily_health.csv"));
        assert_eq!(config.tracks_dir, PathBuf::from("/tmp/export/gps_tracks"));
        assert_eq!(config.sync_db_path(), PathBuf::from("/tmp/export/sync.db"));
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
    }

    #[test]
    fn test_file_values_apply_and_cli_wins() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("export.json");
        fs::write(
            &path,
            r#"{
                "data_dir": "/data/garmin",
                "daily_file": "daily.csv",
                "start_date": "2023-06-01",
                "retry": { "max_attempts": 5, "backoff_secs": [1, 2] },
                "checkpoint_every": 10
            }"#,
        )
        .unwrap();

        let file = ConfigFile::load(&path).unwrap();
        assert!(file.is_some());

        let overrides = ConfigOverrides {
            data_dir: Some(PathBuf::from("/override")),
            start_date: None,
        };
        let config = ExportConfig::resolve(file, overrides).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/override"));
        assert_eq!(config.daily_file, PathBuf::from("/override/daily.csv"));
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2023, 6, 1).unwrap());
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.retry.backoff,
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert_eq!(config.checkpoint_every, 10);
    }

    #[test]
    fn test_missing_file_is_none_and_unknown_keys_rejected() {
        let temp = TempDir::new().unwrap();
        assert!(ConfigFile::load(&temp.path().join("absent.json"))
            .unwrap()
            .is_none());

        let path = temp.path().join("bad.json");
        fs::write(&path, r#"{ "colour": "blue" }"#).unwrap();
        assert!(matches!(
            ConfigFile::load(&path),
            Err(GarminError::Config(_))
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let file = ConfigFile {
            retry: Some(RetrySettings {
                max_attempts: Some(0),
                backoff_secs: None,
            }),
            ..Default::default()
        };
        assert!(ExportConfig::resolve(Some(file), ConfigOverrides::default()).is_err());
    }
}
