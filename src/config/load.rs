//! Configuration load-or-default primitives.
//!
//! [`load`] reads an existing `config.toml` and reports a missing file as
//! `Ok(None)`, so the caller can fall back to [`default_config`]. Every other
//! failure (unreadable, unparsable, too new) is an error.

use std::fs;
use std::io;
use std::net::TcpListener;
use std::path::Path;

use tracing::{debug, info};

use crate::device_id::DeviceId;
use crate::error::AppError;

use super::{
    CURRENT_VERSION, Configuration, DeviceConfiguration, FolderConfiguration, GuiConfiguration,
    OptionsConfiguration,
};

const GUI_HOST: &str = "127.0.0.1";
const GUI_PORT: u16 = 8384;
const LISTEN_HOST: &str = "0.0.0.0";
const LISTEN_PORT: u16 = 22000;

pub const DEFAULT_FOLDER_ID: &str = "default";
pub const DEFAULT_FOLDER_LABEL: &str = "Default Folder";
pub const DEFAULT_FOLDER_PATH: &str = "~/Sync";

/// Load the configuration at `path` for the node `my_id`.
///
/// The local device is added to `devices` when the file does not list it.
pub fn load(path: &Path, my_id: &DeviceId) -> Result<Option<Configuration>, AppError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AppError::Config(format!("cannot read {}: {e}", path.display())));
        }
    };

    let mut cfg: Configuration = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if cfg.version > CURRENT_VERSION {
        return Err(AppError::Config(format!(
            "{} has version {}, newer than supported version {CURRENT_VERSION}",
            path.display(),
            cfg.version
        )));
    }

    if cfg.device(my_id).is_none() {
        debug!(device_id = %my_id, "local device missing from config; adding it");
        cfg.devices.push(local_device(my_id));
    }

    info!(path = %path.display(), devices = cfg.devices.len(), folders = cfg.folders.len(), "config loaded");
    Ok(Some(cfg))
}

/// Build a fresh configuration bound to `my_id`.
///
/// Unless `skip_port_probing` is set, the GUI and listen ports are checked
/// and swapped for a free OS-assigned port when already taken.
pub fn default_config(
    path: &Path,
    my_id: &DeviceId,
    no_default_folder: bool,
    skip_port_probing: bool,
) -> Result<Configuration, AppError> {
    let mut gui = GuiConfiguration::default();
    let mut options = OptionsConfiguration::default();

    if !skip_port_probing {
        let gui_port = free_port_near(GUI_HOST, GUI_PORT)?;
        gui.address = format!("{GUI_HOST}:{gui_port}");
        let listen_port = free_port_near(LISTEN_HOST, LISTEN_PORT)?;
        options.listen_addresses = vec![format!("tcp://{LISTEN_HOST}:{listen_port}")];
    }

    let folders = if no_default_folder {
        Vec::new()
    } else {
        vec![FolderConfiguration {
            id: DEFAULT_FOLDER_ID.to_string(),
            label: DEFAULT_FOLDER_LABEL.to_string(),
            path: DEFAULT_FOLDER_PATH.to_string(),
            devices: vec![*my_id],
        }]
    };

    info!(
        path = %path.display(),
        gui_address = %gui.address,
        default_folder = !no_default_folder,
        "creating default config"
    );

    Ok(Configuration {
        version: CURRENT_VERSION,
        gui,
        options,
        devices: vec![local_device(my_id)],
        folders,
    })
}

// ── internals ────────────────────────────────────────────────────────────────

fn local_device(id: &DeviceId) -> DeviceConfiguration {
    DeviceConfiguration {
        id: *id,
        name: local_device_name(),
        addresses: super::dynamic_addresses(),
    }
}

fn local_device_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().trim().to_string())
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// `preferred` if it can be bound on `host`, otherwise a port the OS picks.
fn free_port_near(host: &str, preferred: u16) -> Result<u16, AppError> {
    if TcpListener::bind((host, preferred)).is_ok() {
        return Ok(preferred);
    }
    let listener = TcpListener::bind((host, 0))
        .map_err(|e| AppError::Config(format!("cannot probe for a free port on {host}: {e}")))?;
    let port = listener.local_addr()?.port();
    debug!(%host, preferred, port, "preferred port taken; using a free one");
    Ok(port)
}
