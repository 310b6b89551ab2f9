//! Node configuration: the persisted record and its GUI credentials.
//!
//! Stored as TOML in `config.toml`:
//!
//! ```toml
//! version = 1
//!
//! [gui]
//! address = "127.0.0.1:8384"
//! user = "admin"
//! password = "$2b$12$..."   # bcrypt hash, never plain text
//!
//! [options]
//! listen_addresses = ["tcp://0.0.0.0:22000"]
//!
//! [[device]]
//! id = "XXXXXXX-XXXXXXX-..."
//! name = "laptop"
//!
//! [[folder]]
//! id = "default"
//! path = "~/Sync"
//! devices = ["XXXXXXX-XXXXXXX-..."]
//! ```
//!
//! - **load**: load-from-file and default-configuration primitives.
//! - **service**: the single-owner actor that mutates and saves it.

pub mod load;
pub mod service;

use serde::{Deserialize, Serialize};

use crate::device_id::DeviceId;
use crate::error::AppError;

/// Newest configuration version this build reads and writes.
pub const CURRENT_VERSION: u32 = 1;

/// bcrypt work factor for GUI passwords.
pub const PASSWORD_HASH_COST: u32 = bcrypt::DEFAULT_COST;

pub const DEFAULT_GUI_ADDRESS: &str = "127.0.0.1:8384";
pub const DEFAULT_LISTEN_ADDRESS: &str = "tcp://0.0.0.0:22000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub version: u32,
    #[serde(default)]
    pub gui: GuiConfiguration,
    #[serde(default)]
    pub options: OptionsConfiguration,
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfiguration>,
    #[serde(default, rename = "folder")]
    pub folders: Vec<FolderConfiguration>,
}

impl Configuration {
    pub fn device(&self, id: &DeviceId) -> Option<&DeviceConfiguration> {
        self.devices.iter().find(|d| d.id == *id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    pub id: DeviceId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "dynamic_addresses")]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderConfiguration {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub path: String,
    /// Devices this folder is shared with.
    #[serde(default)]
    pub devices: Vec<DeviceId>,
}

/// GUI listener and its authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiConfiguration {
    pub enabled: bool,
    pub address: String,
    pub user: String,
    /// bcrypt hash of the password; empty when none is set.
    pub password: String,
    pub use_tls: bool,
}

impl Default for GuiConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            address: DEFAULT_GUI_ADDRESS.to_string(),
            user: String::new(),
            password: String::new(),
            use_tls: false,
        }
    }
}

impl GuiConfiguration {
    /// Hash `password` at [`PASSWORD_HASH_COST`] and store the hash.
    pub fn hash_and_set_password(&mut self, password: &str) -> Result<(), AppError> {
        self.hash_and_set_password_with_cost(password, PASSWORD_HASH_COST)
    }

    /// Hash `password` at the given bcrypt cost (4 to 31) and store the hash.
    ///
    /// On failure the stored value is left as it was.
    pub fn hash_and_set_password_with_cost(&mut self, password: &str, cost: u32) -> Result<(), AppError> {
        let hash = bcrypt::hash(password, cost).map_err(|e| AppError::Hashing(e.to_string()))?;
        self.password = hash;
        Ok(())
    }

    /// Whether the stored hash matches `password`. A missing or non-bcrypt
    /// stored value never matches.
    pub fn compare_hashed_password(&self, password: &str) -> bool {
        if self.password.is_empty() {
            return false;
        }
        bcrypt::verify(password, &self.password).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsConfiguration {
    pub listen_addresses: Vec<String>,
    pub global_discovery: bool,
    pub relays_enabled: bool,
}

impl Default for OptionsConfiguration {
    fn default() -> Self {
        Self {
            listen_addresses: vec![DEFAULT_LISTEN_ADDRESS.to_string()],
            global_discovery: true,
            relays_enabled: true,
        }
    }
}

pub(crate) fn dynamic_addresses() -> Vec<String> {
    vec!["dynamic".to_string()]
}
