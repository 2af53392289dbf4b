//! # Sync Configuration
//!
//! TOML-backed configuration for the sync engine.
//!
//! ## File Layout
//! ```toml
//! [business]
//! slug = "BIZ1"
//!
//! [device]
//! name = "counter-1"
//!
//! [settings]
//! batch_size = 100
//! auto_sync_interval_secs = 300
//! ```
//!
//! Every field has a default, so a partial file (or none at all) still
//! produces a working config. Environment variables override file values,
//! which is how packaged builds point a device at a different business
//! without editing files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Sections
// =============================================================================

/// Identifies the business whose rows this device pushes and pulls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// Slug of the business this device belongs to.
    #[serde(default)]
    pub slug: String,
}

/// Identifies this device to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Human-readable device name, shown in the server's device list.
    #[serde(default = "default_device_name")]
    pub name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            name: default_device_name(),
        }
    }
}

fn default_device_name() -> String {
    "bahi-device".to_string()
}

/// Tunable sync behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Maximum rows per push batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds between automatic sync runs (0 disables auto sync).
    #[serde(default = "default_auto_sync_interval")]
    pub auto_sync_interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            batch_size: default_batch_size(),
            auto_sync_interval_secs: default_auto_sync_interval(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_auto_sync_interval() -> u64 {
    300
}

// =============================================================================
// SyncConfig
// =============================================================================

/// Complete sync engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Business identity.
    #[serde(default)]
    pub business: BusinessConfig,

    /// Device identity.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Sync behavior settings.
    #[serde(default)]
    pub settings: SyncSettings,
}

impl SyncConfig {
    /// Creates a config for the given business with default settings.
    pub fn for_business(business_slug: impl Into<String>) -> Self {
        SyncConfig {
            business: BusinessConfig {
                slug: business_slug.into(),
            },
            ..Default::default()
        }
    }

    /// Loads configuration from a TOML file, then applies environment
    /// variable overrides.
    ///
    /// A missing file yields defaults (still subject to env overrides).
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            debug!(path = %path.display(), "Loading sync config");
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            SyncConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> SyncResult<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;

        info!(path = %path.display(), "Sync config saved");
        Ok(())
    }

    /// Applies `BAHI_SYNC_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(slug) = std::env::var("BAHI_SYNC_BUSINESS_SLUG") {
            self.business.slug = slug;
        }
        if let Ok(name) = std::env::var("BAHI_SYNC_DEVICE_NAME") {
            self.device.name = name;
        }
        if let Ok(size) = std::env::var("BAHI_SYNC_BATCH_SIZE") {
            if let Ok(size) = size.parse() {
                self.settings.batch_size = size;
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.business.slug.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "business.slug must be set".to_string(),
            ));
        }
        if self.settings.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "settings.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
