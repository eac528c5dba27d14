use std::{path::PathBuf, process::Command};

use crate::{errors::RotationError, tools};

use super::Scheduler;

/// The invoking user's crontab.
#[derive(Debug, Clone)]
pub struct Crontab {
    binary: PathBuf,
}

impl Crontab {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Crontab {
            binary: binary.into(),
        }
    }
}

impl Scheduler for Crontab {
    fn entries(&self) -> Result<Vec<String>, RotationError> {
        let output = match tools::run_command(Command::new(&self.binary).arg("-l")) {
            Ok(output) => output,
            // a user without a crontab yet
            Err(RotationError::ExternalTool { reason, .. }) if reason.contains("no crontab for") => {
                return Ok(vec![]);
            }
            Err(err) => return Err(err),
        };

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(ToString::to_string)
            .collect())
    }

    fn install(&self, entries: &[String]) -> Result<(), RotationError> {
        let mut table = entries.join("\n");
        table.push('\n');

        tools::run_command_with_input(Command::new(&self.binary).arg("-"), Some(table.as_bytes()))?;
        Ok(())
    }
}
