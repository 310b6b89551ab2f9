//! Resolved options for one `generate` run.
//!
//! The base directory comes from, in order: `--home`, `--config`,
//! `NODEGEN_HOME`, then the platform default. `--home` and `--config` name the
//! same thing and may not both be given.

use std::env;
use std::path::PathBuf;

use crate::config::PASSWORD_HASH_COST;
use crate::error::AppError;
use crate::locations::{Locations, default_base_dir, expand_home};

/// Everything `generate` needs, with no hidden global state.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub locations: Locations,
    /// New GUI user name; `None` or empty leaves the current one.
    pub gui_user: Option<String>,
    /// New GUI password in plain text; hashed before it is stored.
    pub gui_password: Option<String>,
    /// Do not create the default shared folder in a fresh configuration.
    pub no_default_folder: bool,
    /// Do not probe for free ports when building a fresh configuration.
    pub skip_port_probing: bool,
    /// bcrypt cost used when a new GUI password is hashed.
    pub password_hash_cost: u32,
}

impl GenerateOptions {
    /// Options for `base_dir` with no GUI changes and all defaults enabled.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            locations: Locations::new(base_dir),
            gui_user: None,
            gui_password: None,
            no_default_folder: false,
            skip_port_probing: false,
            password_hash_cost: PASSWORD_HASH_COST,
        }
    }
}

/// Resolve the base directory, reading `NODEGEN_HOME` from the environment.
pub fn resolve_base_dir(home: Option<&str>, config: Option<&str>) -> Result<PathBuf, AppError> {
    let env_home = env::var("NODEGEN_HOME").ok();
    resolve_base_dir_from(home, config, env_home.as_deref())
}

/// Internal resolver; takes the env override as a parameter.
/// Tests pass it explicitly instead of mutating env vars.
pub fn resolve_base_dir_from(
    home: Option<&str>,
    config: Option<&str>,
    env_home: Option<&str>,
) -> Result<PathBuf, AppError> {
    let home = home.filter(|s| !s.is_empty());
    let config = config.filter(|s| !s.is_empty());

    let chosen = match (home, config) {
        (Some(_), Some(_)) => {
            return Err(AppError::ConflictingArguments(
                "--home must not be used together with --config".into(),
            ));
        }
        (Some(dir), None) | (None, Some(dir)) => Some(dir),
        (None, None) => env_home.filter(|s| !s.is_empty()),
    };

    Ok(match chosen {
        Some(dir) => expand_home(dir),
        None => default_base_dir(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_and_config_conflict() {
        let err = resolve_base_dir_from(Some("/a"), Some("/b"), None).unwrap_err();
        assert!(matches!(err, AppError::ConflictingArguments(_)));
    }

    #[test]
    fn empty_flag_counts_as_absent() {
        let dir = resolve_base_dir_from(Some(""), Some("/b"), None).unwrap();
        assert_eq!(dir, PathBuf::from("/b"));
    }

    #[test]
    fn home_is_used_as_config_dir() {
        let dir = resolve_base_dir_from(Some("/srv/node"), None, Some("/ignored")).unwrap();
        assert_eq!(dir, PathBuf::from("/srv/node"));
    }

    #[test]
    fn env_override_applies_without_flags() {
        let dir = resolve_base_dir_from(None, None, Some("/tmp/nodegen-env")).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/nodegen-env"));
    }

    #[test]
    fn falls_back_to_platform_default() {
        let dir = resolve_base_dir_from(None, None, None).unwrap();
        assert_eq!(dir, default_base_dir());
    }

    #[test]
    fn tilde_in_flag_is_expanded() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let dir = resolve_base_dir_from(None, Some("~/node"), None).unwrap();
        assert_eq!(dir, home.join("node"));
    }
}
