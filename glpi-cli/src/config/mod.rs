//! Layered configuration
//!
//! Precedence: environment (including a `.env` file) over the TOML config
//! file over built-in defaults. The TOML file lives at
//! `<config_dir>/glpi-cli/config.toml` unless `--config` points elsewhere.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{Credentials, RetryPolicy};

/// Profile id for Self-Service, the default for provisioned users.
const DEFAULT_PROFILE_ID: i64 = 1;

/// Shape of the TOML config file; every key optional so the environment
/// can fill the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub url: Option<String>,
    pub app_token: Option<String>,
    pub user_token: Option<String>,
    pub group_id: Option<i64>,
    pub profile_id: Option<i64>,
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub retry: RetryFile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetryFile {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// Group every provisioned user is attached to
    pub group_id: i64,
    pub profile_id: i64,
    /// Default input workbook when the CLI gives none
    pub file: Option<PathBuf>,
    pub retry: RetryPolicy,
}

impl Config {
    /// Load from the config file (explicit path, or the default location
    /// when present) and the process environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = explicit.map(Path::to_path_buf).or_else(default_config_path);
        let file = match &path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?
            }
            Some(path) if explicit.is_some() => {
                bail!("config file does not exist: {}", path.display())
            }
            _ => FileConfig::default(),
        };

        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_parts(file, &env)
    }

    /// Merge the file layer with an environment map. Split out from
    /// [`Config::load`] so it can be exercised without touching the
    /// process environment.
    fn from_parts(file: FileConfig, env: &HashMap<String, String>) -> Result<Self> {
        let pick = |key: &str, from_file: Option<String>| {
            env.get(key).map(String::to_owned).or(from_file)
        };

        let url = pick("GLPI_URL", file.url).context("GLPI_URL is not configured")?;
        let app_token = pick("APP_TOKEN", file.app_token).context("APP_TOKEN is not configured")?;
        let user_token =
            pick("USER_TOKEN", file.user_token).context("USER_TOKEN is not configured")?;

        let group_id = match env.get("GROUP_ID") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("GROUP_ID '{raw}' is not an integer"))?,
            None => file.group_id.context("GROUP_ID is not configured")?,
        };
        let profile_id = match env.get("PROFILE_ID") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PROFILE_ID '{raw}' is not an integer"))?,
            None => file.profile_id.unwrap_or(DEFAULT_PROFILE_ID),
        };

        let input_file = env
            .get("FILE_PATH")
            .map(PathBuf::from)
            .or(file.file);

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: file.retry.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay: file
                .retry
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_delay: file
                .retry
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            backoff_multiplier: defaults.backoff_multiplier,
        };

        Ok(Self {
            credentials: Credentials {
                url,
                app_token,
                user_token,
            },
            group_id,
            profile_id,
            file: input_file,
            retry,
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("glpi-cli").join("config.toml"))
}
