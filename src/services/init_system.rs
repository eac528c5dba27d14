use std::{path::PathBuf, process::Command};

use crate::{config::ServiceManager, errors::RotationError, tools};

use super::ServiceControl;

/// Controls a system service through the host's init system.
#[derive(Debug, Clone)]
pub struct InitSystem {
    manager: ServiceManager,
    command: PathBuf,
}

impl InitSystem {
    pub fn new(manager: ServiceManager, command: Option<PathBuf>) -> Self {
        let command = command.unwrap_or_else(|| match manager {
            ServiceManager::Systemd => PathBuf::from("systemctl"),
            ServiceManager::Sysv => PathBuf::from("service"),
        });

        InitSystem { manager, command }
    }

    /// `systemctl <verb> <service>` or `service <service> <verb>`
    fn args<'a>(&self, verb: &'a str, service: &'a str) -> [&'a str; 2] {
        match self.manager {
            ServiceManager::Systemd => [verb, service],
            ServiceManager::Sysv => [service, verb],
        }
    }

    fn run(&self, verb: &str, service: &str) -> Result<(), RotationError> {
        tools::run_command(Command::new(&self.command).args(self.args(verb, service)))?;
        Ok(())
    }
}

impl ServiceControl for InitSystem {
    fn stop(&self, service: &str) -> Result<(), RotationError> {
        self.run("stop", service)
    }

    fn start(&self, service: &str) -> Result<(), RotationError> {
        self.run("start", service)
    }
}
