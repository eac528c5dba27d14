use std::{io, path::PathBuf};

use crate::workflow::Step;

/// Process exit code used when the configuration cannot be loaded or validated.
pub const CONFIG_EXIT_CODE: u8 = 6;

/// Every way a rotation run can fail.
///
/// All variants are logged and then abort the remaining steps. There is no
/// rollback beyond the `.backup` copy taken before the keystore is touched.
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("must be run as root (effective uid is {uid})")]
    Privilege { uid: u32 },

    #[error("unable to use certificate material at {}: {reason}", path.display())]
    Input { path: PathBuf, reason: String },

    #[error("unable to read alias '{alias}' from keystore {}: {reason}", path.display())]
    StoreAccess {
        path: PathBuf,
        alias: String,
        reason: String,
    },

    #[error("`{command}` failed: {reason}")]
    ExternalTool { command: String, reason: String },

    #[error("unable to back up keystore {} to {}: {source}", path.display(), backup.display())]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("step '{step}' failed after applying {applied:?}: {source}")]
    Aborted {
        step: Step,
        applied: Vec<Step>,
        #[source]
        source: Box<RotationError>,
    },
}

impl RotationError {
    pub fn input(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        RotationError::Input {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn external(command: impl Into<String>, reason: impl ToString) -> Self {
        RotationError::ExternalTool {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    /// The process exit code reported for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            RotationError::Privilege { .. } => 1,
            RotationError::Input { .. } => 2,
            RotationError::StoreAccess { .. } => 3,
            RotationError::ExternalTool { .. } => 4,
            RotationError::Backup { .. } => 5,
            RotationError::Aborted { source, .. } => source.exit_code(),
        }
    }
}
