//! Configuration file management for autopilot.
//!
//! Provides a TOML-based config file at `~/.config/autopilot/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use autopilot_core::plan::SubscriptionLimit;
use autopilot_core::run::RunConfig;

/// Backend used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

/// Request timeout used when nothing else is configured. Runs execute
/// synchronously on the server, so this is generous.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub subscription: SubscriptionSection,
    #[serde(default)]
    pub run: RunSection,
}

/// Missing keys in any section fall back to that section's `Default`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionSection {
    pub plan: String,
    pub max_tasks: usize,
}

impl Default for SubscriptionSection {
    fn default() -> Self {
        Self {
            plan: SubscriptionLimit::DEFAULT_PLAN.to_owned(),
            max_tasks: SubscriptionLimit::DEFAULT_MAX_TASKS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub success_settle_ms: u64,
    pub failure_settle_ms: u64,
}

impl Default for RunSection {
    fn default() -> Self {
        let defaults = RunConfig::default();
        Self {
            success_settle_ms: millis(defaults.success_settle),
            failure_settle_ms: millis(defaults.failure_settle),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the autopilot config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/autopilot` or
/// `~/.config/autopilot`, never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("autopilot");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("autopilot")
}

/// Return the path to the autopilot config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct AutopilotConfig {
    pub backend_url: String,
    pub timeout: Duration,
    pub limit: SubscriptionLimit,
    pub run: RunConfig,
}

impl AutopilotConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Backend URL: `cli_backend_url` > `AUTOPILOT_BACKEND_URL` > `backend.url` > [`DEFAULT_BACKEND_URL`]
    /// - Max tasks: `AUTOPILOT_MAX_TASKS` > `subscription.max_tasks` > 5
    /// - Plan name: `AUTOPILOT_PLAN` > `subscription.plan` > `basic`
    pub fn resolve(cli_backend_url: Option<&str>) -> Result<Self> {
        let file_config = match load_config() {
            Ok(cfg) => cfg,
            Err(e) if config_path().exists() => return Err(e),
            Err(_) => ConfigFile::default(),
        };

        let backend_url = if let Some(url) = cli_backend_url {
            url.to_owned()
        } else if let Ok(url) = std::env::var("AUTOPILOT_BACKEND_URL") {
            url
        } else {
            file_config.backend.url
        };

        let max_tasks = match std::env::var("AUTOPILOT_MAX_TASKS") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("AUTOPILOT_MAX_TASKS is not a number: {raw:?}"))?,
            Err(_) => file_config.subscription.max_tasks,
        };

        let plan = std::env::var("AUTOPILOT_PLAN").unwrap_or(file_config.subscription.plan);

        if file_config.backend.timeout_secs == 0 {
            bail!("backend.timeout_secs must be at least 1 second");
        }

        Ok(Self {
            backend_url,
            timeout: Duration::from_secs(file_config.backend.timeout_secs),
            limit: SubscriptionLimit::new(plan, max_tasks),
            run: RunConfig {
                success_settle: Duration::from_millis(file_config.run.success_settle_ms),
                failure_settle: Duration::from_millis(file_config.run.failure_settle_ms),
            },
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
