use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::DashboardError;
use crate::motion::DEFAULT_BASE_URL;

/// File-level configuration (`~/.taskdash/config.toml`).
///
/// The API key is deliberately absent: it only comes from the command line or
/// the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiSection,
    pub server: ServerSection,
    pub refresh: RefreshSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Upper bound on pages per fetch; guards against a cursor chain that never ends.
    pub max_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: u16,
    pub templates_dir: PathBuf,
    /// IANA name used when rendering times into the HTML page.
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSection {
    /// humantime syntax, e.g. "60s" or "2m".
    pub interval: String,
    pub cache_ttl: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            max_pages: 100,
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: 8080,
            templates_dir: PathBuf::from("templates"),
            timezone: "UTC".to_string(),
        }
    }
}

impl Default for RefreshSection {
    fn default() -> Self {
        Self {
            interval: "60s".to_string(),
            cache_ttl: "60s".to_string(),
        }
    }
}

/// Values given on the command line or through the environment. Each one,
/// when present, wins over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub port: Option<u16>,
    pub templates_dir: Option<PathBuf>,
    pub timezone: Option<String>,
    pub refresh_interval: Option<Duration>,
}

/// Validated, ready-to-use settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_pages: usize,
    pub port: u16,
    pub templates_dir: PathBuf,
    pub timezone: Tz,
    pub refresh_interval: Duration,
    pub cache_ttl: Duration,
}

impl Config {
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.base_url {
            self.api.base_url = v;
        }
        if let Some(v) = overrides.port {
            self.server.port = v;
        }
        if let Some(v) = overrides.templates_dir {
            self.server.templates_dir = v;
        }
        if let Some(v) = overrides.timezone {
            self.server.timezone = v;
        }
        if let Some(v) = overrides.refresh_interval {
            self.refresh.interval = humantime::format_duration(v).to_string();
        }
    }

    pub fn settings(&self, api_key: Option<&str>) -> Result<Settings, DashboardError> {
        let api_key = api_key.map(str::trim).filter(|k| !k.is_empty()).ok_or_else(|| {
            DashboardError::Configuration(
                "API key is required. Set it with --api-key or the MOTION_API_KEY environment variable"
                    .to_string(),
            )
        })?;

        let timezone = taskdash_core::parse_timezone(&self.server.timezone)
            .map_err(|e| DashboardError::Configuration(e.to_string()))?;

        let refresh_interval = parse_nonzero_duration("refresh.interval", &self.refresh.interval)?;
        let cache_ttl = parse_nonzero_duration("refresh.cache_ttl", &self.refresh.cache_ttl)?;

        if self.api.timeout_secs == 0 {
            return Err(DashboardError::Configuration(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(Settings {
            api_key: api_key.to_string(),
            base_url: self.api.base_url.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            max_pages: self.api.max_pages.max(1),
            port: self.server.port,
            templates_dir: self.server.templates_dir.clone(),
            timezone,
            refresh_interval,
            cache_ttl,
        })
    }
}

fn parse_nonzero_duration(key: &str, raw: &str) -> Result<Duration, DashboardError> {
    let d = humantime::parse_duration(raw).map_err(|e| {
        DashboardError::Configuration(format!("{key}: invalid duration '{raw}': {e}"))
    })?;
    if d.is_zero() {
        return Err(DashboardError::Configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(d)
}

pub fn taskdash_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".taskdash"))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(taskdash_home()?.join("config.toml"))
}

/// Load the config file, or defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn save_config(path: &Path, cfg: &Config) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }
    save_config(path, &Config::default())?;
    println!("Wrote {}", path.display());
    Ok(())
}
