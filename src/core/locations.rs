//! Base directory and the files resolved under it.
//!
//! Layout:
//! ```text
//! <base_dir>/          (mode 0700)
//! ├── cert.pem         (certificate chain, mode 0644)
//! ├── key.pem          (PKCS#8 private key, mode 0600)
//! └── config.toml      (configuration, mode 0600)
//! ```
//!
//! A [`Locations`] value is passed explicitly to every component that needs a
//! path; nothing here is process-global.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::AppError;

pub const CERT_FILE: &str = "cert.pem";
pub const KEY_FILE: &str = "key.pem";
pub const CONFIG_FILE: &str = "config.toml";

/// Resolved on-disk locations for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locations {
    base_dir: PathBuf,
}

impl Locations {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn cert_file(&self) -> PathBuf {
        self.base_dir.join(CERT_FILE)
    }

    pub fn key_file(&self) -> PathBuf {
        self.base_dir.join(KEY_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE)
    }
}

/// Create `dir` (and parents) with owner-only permissions.
///
/// An existing directory is kept, but its mode is tightened to 0700 when it
/// is more permissive.
pub fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    if !dir.exists() {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(dir)
            .map_err(|e| AppError::Config(format!("cannot create {}: {e}", dir.display())))?;
        debug!(dir = %dir.display(), "created base directory");
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(dir)?.permissions().mode() & 0o777;
        if mode != 0o700 {
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(|e| {
                AppError::Config(format!("cannot set permissions on {}: {e}", dir.display()))
            })?;
            debug!(dir = %dir.display(), old_mode = %format!("{mode:o}"), "tightened directory mode");
        }
    }

    Ok(())
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Platform default base directory, e.g. `~/.config/nodegen` on Linux.
pub fn default_base_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("nodegen"))
        .unwrap_or_else(|| expand_home("~/.nodegen"))
}
