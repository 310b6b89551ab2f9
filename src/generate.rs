//! One-shot bootstrap: identity, configuration, GUI credentials.
//!
//! Sequence:
//!   1. Expand and create the base directory (0700)
//!   2. Load or generate the certificate; derive the device ID
//!   3. Load `config.toml`, or build a default bound to the device ID
//!   4. Start the config service
//!   5. Queue the GUI credential update and wait for it
//!   6. Save, then stop the service
//!
//! Each failure is labelled with the [`Stage`] it came from.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::service::run_blocking;
use crate::config::{GuiConfiguration, PASSWORD_HASH_COST, load, service};
use crate::device_id::DeviceId;
use crate::error::{AppError, Stage};
use crate::identity;
use crate::locations::ensure_dir;
use crate::options::GenerateOptions;

/// Run the bootstrap and return the node's device ID.
pub async fn generate(opts: &GenerateOptions) -> Result<DeviceId, AppError> {
    let locations = opts.locations.clone();
    ensure_dir(locations.base_dir())?;

    let identity = run_blocking(move || identity::setup(&locations))
        .await
        .map_err(|e| e.in_stage(Stage::CreateCertificate))?;
    let my_id = identity.device_id;

    let cfg_path = opts.locations.config_file();
    let path = cfg_path.clone();
    let loaded = run_blocking(move || load::load(&path, &my_id))
        .await
        .map_err(|e| e.in_stage(Stage::LoadConfig))?;
    let cfg = match loaded {
        Some(cfg) => cfg,
        None => {
            let path = cfg_path.clone();
            let (no_default_folder, skip_port_probing) = (opts.no_default_folder, opts.skip_port_probing);
            run_blocking(move || load::default_config(&path, &my_id, no_default_folder, skip_port_probing))
                .await
                .map_err(|e| e.in_stage(Stage::CreateConfig))?
        }
    };

    let shutdown = CancellationToken::new();
    // Stops the service on every return path below.
    let _stop = shutdown.clone().drop_guard();
    let (handle, task) = service::spawn(cfg_path, cfg, shutdown.clone());

    let user = opts.gui_user.clone();
    let password = opts.gui_password.clone();
    let cost = opts.password_hash_cost;
    let waiter = handle
        .modify(move |cfg| {
            update_gui_authentication_with_cost(&mut cfg.gui, user.as_deref(), password.as_deref(), cost)
                .map(|_| ())
        })
        .await
        .map_err(|e| e.in_stage(Stage::ModifyConfig))?;
    waiter.wait().await.map_err(|e| e.in_stage(Stage::ModifyConfig))?;

    handle.save().await.map_err(|e| e.in_stage(Stage::SaveConfig))?;

    shutdown.cancel();
    if let Err(e) = task.await {
        warn!(error = %e, "config service task did not exit cleanly");
    }

    Ok(my_id)
}

/// Apply a new GUI user name and/or password. Returns whether anything changed.
///
/// `None` and empty strings leave the field alone. A password is only
/// re-hashed when the stored hash does not already match it.
pub fn update_gui_authentication(
    gui: &mut GuiConfiguration,
    user: Option<&str>,
    password: Option<&str>,
) -> Result<bool, AppError> {
    update_gui_authentication_with_cost(gui, user, password, PASSWORD_HASH_COST)
}

/// [`update_gui_authentication`] with an explicit bcrypt cost.
pub fn update_gui_authentication_with_cost(
    gui: &mut GuiConfiguration,
    user: Option<&str>,
    password: Option<&str>,
    cost: u32,
) -> Result<bool, AppError> {
    let mut changed = false;

    if let Some(user) = user.filter(|u| !u.is_empty()) {
        if gui.user != user {
            gui.user = user.to_string();
            info!(user, "updated GUI authentication user name");
            changed = true;
        }
    }

    if let Some(password) = password.filter(|p| !p.is_empty()) {
        if !gui.compare_hashed_password(password) {
            gui.hash_and_set_password_with_cost(password, cost)?;
            info!("updated GUI authentication password");
            changed = true;
        }
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_user_and_hashes_password() {
        let mut gui = GuiConfiguration::default();
        let changed = update_gui_authentication(&mut gui, Some("admin"), Some("abc123")).unwrap();

        assert!(changed);
        assert_eq!(gui.user, "admin");
        assert_ne!(gui.password, "abc123");
        assert!(gui.compare_hashed_password("abc123"));
        assert!(!gui.compare_hashed_password("abc1234"));
    }

    #[test]
    fn identical_user_and_no_password_is_noop() {
        let mut gui = GuiConfiguration {
            user: "admin".into(),
            ..GuiConfiguration::default()
        };
        let before = gui.clone();

        let changed = update_gui_authentication(&mut gui, Some("admin"), None).unwrap();
        assert!(!changed);
        assert_eq!(gui, before);
    }

    #[test]
    fn empty_values_are_ignored() {
        let mut gui = GuiConfiguration::default();
        let before = gui.clone();
        assert!(!update_gui_authentication(&mut gui, Some(""), Some("")).unwrap());
        assert!(!update_gui_authentication(&mut gui, None, None).unwrap());
        assert_eq!(gui, before);
    }

    #[test]
    fn same_password_is_not_rehashed() {
        let mut gui = GuiConfiguration::default();
        gui.hash_and_set_password("abc123").unwrap();
        let hash = gui.password.clone();

        assert!(!update_gui_authentication(&mut gui, None, Some("abc123")).unwrap());
        assert_eq!(gui.password, hash);
    }

    #[test]
    fn new_password_replaces_hash() {
        let mut gui = GuiConfiguration::default();
        gui.hash_and_set_password("old").unwrap();

        assert!(update_gui_authentication(&mut gui, None, Some("new")).unwrap());
        assert!(gui.compare_hashed_password("new"));
        assert!(!gui.compare_hashed_password("old"));
    }

    #[test]
    fn hashing_failure_is_reported() {
        let mut gui = GuiConfiguration::default();
        let err = update_gui_authentication_with_cost(&mut gui, Some("admin"), Some("pw"), 99).unwrap_err();
        assert!(matches!(err, AppError::Hashing(_)));
        assert!(gui.password.is_empty());
    }

    #[test]
    fn plaintext_password_at_rest_gets_hashed() {
        let mut gui = GuiConfiguration {
            password: "abc123".into(),
            ..GuiConfiguration::default()
        };
        assert!(update_gui_authentication(&mut gui, None, Some("abc123")).unwrap());
        assert_ne!(gui.password, "abc123");
        assert!(gui.compare_hashed_password("abc123"));
    }
}
