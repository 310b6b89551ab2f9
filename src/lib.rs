//! Node identity and configuration bootstrap.
//!
//! Loads or generates the node certificate, derives its device ID, then loads
//! or creates `config.toml` and applies GUI credential changes through the
//! single-owner config service before saving. Safe to run repeatedly: an
//! existing key is never replaced.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod core;
pub mod generate;

pub use bootstrap::{credential, device_id, identity, logger};
pub use self::core::{error, locations, options};
pub use generate::{generate, update_gui_authentication, update_gui_authentication_with_cost};
