//! End-to-end tests for the generate sequence against a scratch directory.

use std::fs;
use std::path::Path;

use nodegen::config::{Configuration, GuiConfiguration};
use nodegen::error::{AppError, Stage};
use nodegen::generate;
use nodegen::options::GenerateOptions;
use tempfile::TempDir;

fn options(dir: &Path) -> GenerateOptions {
    let mut opts = GenerateOptions::new(dir);
    opts.skip_port_probing = true;
    // Lowest cost bcrypt accepts.
    opts.password_hash_cost = 4;
    opts
}

fn read_config(opts: &GenerateOptions) -> Configuration {
    let text = fs::read_to_string(opts.locations.config_file()).unwrap();
    toml::from_str(&text).unwrap()
}

#[tokio::test]
async fn fresh_directory_gets_identity_and_default_config() {
    let tmp = TempDir::new().unwrap();
    let opts = options(&tmp.path().join("node"));

    let id = generate(&opts).await.unwrap();

    assert!(opts.locations.cert_file().exists());
    assert!(opts.locations.key_file().exists());
    let cfg = read_config(&opts);
    assert_eq!(cfg.devices.len(), 1);
    assert_eq!(cfg.devices[0].id, id);
    assert_eq!(cfg.folders.len(), 1);
    assert_eq!(cfg.folders[0].devices, vec![id]);
}

#[tokio::test]
async fn second_run_keeps_identity_and_key_material() {
    let tmp = TempDir::new().unwrap();
    let opts = options(tmp.path());

    let first = generate(&opts).await.unwrap();
    let cert = fs::read(opts.locations.cert_file()).unwrap();
    let key = fs::read(opts.locations.key_file()).unwrap();
    let cert_mtime = fs::metadata(opts.locations.cert_file()).unwrap().modified().unwrap();
    let key_mtime = fs::metadata(opts.locations.key_file()).unwrap().modified().unwrap();

    let second = generate(&opts).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read(opts.locations.cert_file()).unwrap(), cert);
    assert_eq!(fs::read(opts.locations.key_file()).unwrap(), key);
    assert_eq!(fs::metadata(opts.locations.cert_file()).unwrap().modified().unwrap(), cert_mtime);
    assert_eq!(fs::metadata(opts.locations.key_file()).unwrap().modified().unwrap(), key_mtime);
}

#[tokio::test]
async fn gui_credentials_are_persisted_hashed() {
    let tmp = TempDir::new().unwrap();
    let mut opts = options(tmp.path());
    opts.gui_user = Some("admin".into());
    opts.gui_password = Some("abc123".into());

    generate(&opts).await.unwrap();

    let cfg = read_config(&opts);
    assert_eq!(cfg.gui.user, "admin");
    assert_ne!(cfg.gui.password, "abc123");
    assert!(cfg.gui.compare_hashed_password("abc123"));
    assert!(!cfg.gui.compare_hashed_password("abc12"));
}

#[tokio::test]
async fn rerun_with_same_user_leaves_gui_unchanged() {
    let tmp = TempDir::new().unwrap();
    let mut opts = options(tmp.path());
    opts.gui_user = Some("admin".into());
    opts.gui_password = Some("abc123".into());
    generate(&opts).await.unwrap();
    let before: GuiConfiguration = read_config(&opts).gui;

    opts.gui_password = None;
    generate(&opts).await.unwrap();

    assert_eq!(read_config(&opts).gui, before);
}

#[tokio::test]
async fn existing_config_is_loaded_not_replaced() {
    let tmp = TempDir::new().unwrap();
    let mut opts = options(tmp.path());
    opts.no_default_folder = true;
    generate(&opts).await.unwrap();

    // Hand edit: add a folder the defaults would never create.
    let mut cfg = read_config(&opts);
    cfg.folders.push(nodegen::config::FolderConfiguration {
        id: "photos".into(),
        label: "Photos".into(),
        path: "/data/photos".into(),
        devices: vec![cfg.devices[0].id],
    });
    fs::write(opts.locations.config_file(), toml::to_string_pretty(&cfg).unwrap()).unwrap();

    opts.gui_user = Some("operator".into());
    opts.no_default_folder = false;
    generate(&opts).await.unwrap();

    let after = read_config(&opts);
    assert_eq!(after.gui.user, "operator");
    assert_eq!(after.folders.len(), 1);
    assert_eq!(after.folders[0].id, "photos");
}

#[tokio::test]
async fn malformed_config_is_fatal_and_untouched() {
    let tmp = TempDir::new().unwrap();
    let opts = options(tmp.path());
    fs::write(opts.locations.config_file(), "version = [broken").unwrap();

    let err = generate(&opts).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::LoadConfig));
    assert!(err.to_string().starts_with("load config:"));
    assert_eq!(
        fs::read_to_string(opts.locations.config_file()).unwrap(),
        "version = [broken"
    );
}

#[tokio::test]
async fn lone_private_key_aborts_before_config() {
    let tmp = TempDir::new().unwrap();
    let opts = options(tmp.path());
    fs::write(opts.locations.key_file(), "keep me").unwrap();

    let err = generate(&opts).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::CreateCertificate));
    assert!(matches!(
        err,
        AppError::Stage { ref source, .. } if matches!(**source, AppError::Identity(_))
    ));
    assert_eq!(fs::read_to_string(opts.locations.key_file()).unwrap(), "keep me");
    assert!(!opts.locations.config_file().exists());
}

#[tokio::test]
async fn identity_survives_config_loss() {
    let tmp = TempDir::new().unwrap();
    let opts = options(tmp.path());
    let id = generate(&opts).await.unwrap();

    fs::remove_file(opts.locations.config_file()).unwrap();
    let again = generate(&opts).await.unwrap();

    assert_eq!(again, id);
    assert_eq!(read_config(&opts).devices[0].id, id);
}

#[tokio::test]
async fn hashing_failure_aborts_without_touching_config() {
    let tmp = TempDir::new().unwrap();
    let mut opts = options(tmp.path());
    opts.gui_user = Some("admin".into());
    opts.gui_password = Some("abc123".into());
    generate(&opts).await.unwrap();
    let before = fs::read(opts.locations.config_file()).unwrap();

    opts.gui_user = Some("operator".into());
    opts.gui_password = Some("changed".into());
    opts.password_hash_cost = 3;
    let err = generate(&opts).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::ModifyConfig));
    assert!(err.to_string().starts_with("modify config:"));
    assert!(matches!(
        err,
        AppError::Stage { ref source, .. } if matches!(**source, AppError::Hashing(_))
    ));
    assert_eq!(fs::read(opts.locations.config_file()).unwrap(), before);
}

#[tokio::test]
async fn hashing_failure_on_fresh_directory_writes_no_config() {
    let tmp = TempDir::new().unwrap();
    let mut opts = options(tmp.path());
    opts.gui_password = Some("abc123".into());
    opts.password_hash_cost = 3;

    let err = generate(&opts).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::ModifyConfig));
    assert!(opts.locations.key_file().exists());
    assert!(!opts.locations.config_file().exists());
}
