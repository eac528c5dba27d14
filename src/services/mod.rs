use crate::errors::RotationError;

pub mod crontab;
pub mod init_system;
pub mod logger;

pub use crontab::Crontab;
pub use init_system::InitSystem;

/// Stops and starts the controller so it re-reads its keystore.
pub trait ServiceControl {
    fn stop(&self, service: &str) -> Result<(), RotationError>;
    fn start(&self, service: &str) -> Result<(), RotationError>;
}

/// The host task scheduler, seen as a list of entries.
pub trait Scheduler {
    /// Current entries, one per line.
    fn entries(&self) -> Result<Vec<String>, RotationError>;

    /// Replaces all entries.
    fn install(&self, entries: &[String]) -> Result<(), RotationError>;
}
