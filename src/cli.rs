//! Command-line surface of the `nodegen` binary.

use std::io::BufRead;

use clap::{ArgAction, Parser};

use crate::credential::resolve_secret;
use crate::error::AppError;
use crate::options::{GenerateOptions, resolve_base_dir};

#[derive(Debug, Parser)]
#[command(
    name = "nodegen",
    version,
    about = "Generate node keys and configuration, then exit"
)]
pub struct Cli {
    /// Set configuration and data directory
    #[arg(long, value_name = "PATH")]
    pub home: Option<String>,

    /// Set configuration directory (same as --home; the two are exclusive)
    #[arg(long = "config", value_name = "PATH")]
    pub config_dir: Option<String>,

    /// Specify new GUI authentication user name
    #[arg(long, value_name = "STRING")]
    pub gui_user: Option<String>,

    /// Specify new GUI authentication password (use - to read from standard input)
    #[arg(long, value_name = "STRING")]
    pub gui_password: Option<String>,

    /// Don't create the "default" folder on first startup
    #[arg(long)]
    pub no_default_folder: bool,

    /// Don't try to find free ports for GUI and listen addresses on first startup
    #[arg(long)]
    pub skip_port_probing: bool,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Resolve flags into [`GenerateOptions`], reading the password from
    /// `stdin` when it was given as `-`.
    pub fn into_options<R: BufRead>(self, stdin: R) -> Result<GenerateOptions, AppError> {
        let base_dir = resolve_base_dir(self.home.as_deref(), self.config_dir.as_deref())?;
        let gui_password = resolve_secret(self.gui_password, stdin)?;

        let mut opts = GenerateOptions::new(base_dir);
        opts.gui_user = self.gui_user;
        opts.gui_password = gui_password;
        opts.no_default_folder = self.no_default_folder;
        opts.skip_port_probing = self.skip_port_probing;
        Ok(opts)
    }
}
