//! Application-wide error types.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("failed to set GUI authentication password: {0}")]
    Hashing(String),

    #[error("conflicting arguments: {0}")]
    ConflictingArguments(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure wrapped with the bootstrap stage it occurred in.
    #[error("{stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Wrap `self` with the stage label reported to the caller.
    pub fn in_stage(self, stage: Stage) -> Self {
        AppError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Stage label, if this error was produced by a bootstrap stage.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AppError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Bootstrap stages that label a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CreateCertificate,
    CreateConfig,
    LoadConfig,
    ModifyConfig,
    SaveConfig,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::CreateCertificate => "create certificate",
            Stage::CreateConfig => "create config",
            Stage::LoadConfig => "load config",
            Stage::ModifyConfig => "modify config",
            Stage::SaveConfig => "save config",
        };
        f.write_str(label)
    }
}
