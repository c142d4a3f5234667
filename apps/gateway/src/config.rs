//! Gateway configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/gantry/gateway.toml`
//! - Windows: `%APPDATA%/gantry/gateway.toml`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket server port (0 = auto-assign).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding chunk directories and merged artifacts.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Seconds between stale-chunk sweeps (0 disables the sweeper).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Age in seconds after which an unfinished chunk directory counts
    /// as abandoned and is eligible for sweeping.
    #[serde(default = "default_stale_ttl")]
    pub stale_ttl_secs: u64,
}

fn default_port() -> u16 {
    9044
}

fn default_temp_root() -> String {
    std::env::temp_dir()
        .join("gantry-uploads")
        .to_string_lossy()
        .into_owned()
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_stale_ttl() -> u64 {
    86_400
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            temp_root: default_temp_root(),
            sweep_interval_secs: default_sweep_interval(),
            stale_ttl_secs: default_stale_ttl(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Saves the current configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("gantry")
            .join("gateway.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("gantry").join("gateway.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/gantry/gateway.toml"))
    }
}
