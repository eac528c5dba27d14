use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    certificates::{CertificateMaterial, Fingerprint},
    config::Config,
    errors::RotationError,
    services::ServiceControl,
    stores::Keystore,
    tools,
};

pub mod schedule;

/// Everything a rotation run needs to know, resolved once from the configuration.
#[derive(Debug, Clone)]
pub struct RotationSettings {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub store_dir: PathBuf,
    pub store_file_name: String,
    pub alias: String,
    pub password: String,
    /// Account the keystore is handed back to, `None` keeps the current owner.
    pub owner: Option<String>,
    pub service_name: String,
    /// Test mode: every mutating step is logged and skipped.
    pub dry_run: bool,
}

impl RotationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            certificate: config.certificate.path.clone(),
            private_key: config.certificate.key_path.clone(),
            store_dir: config.keystore.directory.clone(),
            store_file_name: config.keystore.file_name.clone(),
            alias: config.keystore.alias.clone(),
            password: config.keystore.password.clone(),
            owner: config
                .keystore
                .owner
                .clone()
                .filter(|owner| !owner.trim().is_empty()),
            service_name: config.service.name.clone(),
            dry_run: config.test,
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_dir.join(&self.store_file_name)
    }

    /// `<store>.backup`, overwritten on every update.
    pub fn backup_path(&self) -> PathBuf {
        self.store_dir.join(format!("{}.backup", self.store_file_name))
    }

    /// The transient PKCS#12 bundle, never left behind after a run.
    pub fn bundle_path(&self) -> PathBuf {
        self.store_dir.join(format!("{}.p12", self.alias))
    }
}

/// The steps of an update, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    StopService,
    BackupKeystore,
    ConvertBundle,
    ImportBundle,
    FixPermissions,
    StartService,
    RemoveBundle,
}

impl Step {
    pub const SEQUENCE: [Step; 7] = [
        Step::StopService,
        Step::BackupKeystore,
        Step::ConvertBundle,
        Step::ImportBundle,
        Step::FixPermissions,
        Step::StartService,
        Step::RemoveBundle,
    ];

    /// Steps that touch the service or the keystore. They are skipped in test mode.
    pub fn mutates(self) -> bool {
        !matches!(self, Step::ConvertBundle | Step::RemoveBundle)
    }

    pub fn name(self) -> &'static str {
        match self {
            Step::StopService => "stop-service",
            Step::BackupKeystore => "backup-keystore",
            Step::ConvertBundle => "convert-bundle",
            Step::ImportBundle => "import-bundle",
            Step::FixPermissions => "fix-permissions",
            Step::StartService => "start-service",
            Step::RemoveBundle => "remove-bundle",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The keystore already holds the candidate certificate, nothing was touched.
    UpToDate { fingerprint: Fingerprint },

    /// The candidate was installed (or, in test mode, would have been).
    Updated {
        previous: Option<Fingerprint>,
        current: Fingerprint,
        applied: Vec<Step>,
        dry_run: bool,
    },
}

/// Idempotent certificate rotation.
///
/// Two instances must not run at the same time: the only exclusion on the
/// keystore is the controller being stopped while it is rewritten.
pub struct Workflow<'a> {
    settings: &'a RotationSettings,
    keystore: &'a dyn Keystore,
    service: &'a dyn ServiceControl,
}

impl<'a> Workflow<'a> {
    pub fn new(
        settings: &'a RotationSettings,
        keystore: &'a dyn Keystore,
        service: &'a dyn ServiceControl,
    ) -> Self {
        Self {
            settings,
            keystore,
            service,
        }
    }

    /// Installs the candidate certificate unless the keystore already holds it.
    pub fn run(&self) -> Result<Outcome, RotationError> {
        let settings = self.settings;

        let current = CertificateMaterial::fingerprint(&settings.certificate)?;
        tracing::info!(
            "candidate certificate {} has fingerprint {current}",
            settings.certificate.display()
        );

        let store = settings.store_path();
        let previous = if store.exists() {
            let installed =
                self.keystore
                    .fingerprint(&store, &settings.password, &settings.alias)?;
            tracing::info!("installed certificate '{}' has fingerprint {installed}", settings.alias);

            if installed == current {
                tracing::info!("installed and candidate fingerprints are equal, nothing to do");
                return Ok(Outcome::UpToDate {
                    fingerprint: current,
                });
            }

            tracing::info!("installed and candidate fingerprints differ");
            Some(installed)
        } else {
            tracing::info!("no keystore at {}, first install", store.display());
            None
        };

        // bad input must surface before the controller is stopped
        let material = CertificateMaterial::load(&settings.certificate, &settings.private_key)?;

        tracing::info!("Proceeding with certificate installation");
        let applied = self.apply(&material)?;

        if settings.dry_run {
            tracing::info!("Test mode: installation of certificate {current} was simulated");
        } else {
            tracing::info!(
                "installation of certificate {current} into {} is complete",
                store.display()
            );
        }

        Ok(Outcome::Updated {
            previous,
            current,
            applied,
            dry_run: settings.dry_run,
        })
    }

    /// Runs the update steps in order, stopping at the first failure.
    /// The bundle is removed whatever happened before.
    fn apply(&self, material: &CertificateMaterial) -> Result<Vec<Step>, RotationError> {
        let mut applied = Vec::new();
        let mut failure = None;

        for step in Step::SEQUENCE {
            if step == Step::RemoveBundle {
                break;
            }

            if self.settings.dry_run && step.mutates() {
                tracing::info!(step = %step, "Test mode: skipping: {}", self.describe(step));
                continue;
            }

            tracing::info!(step = %step, "{}", self.describe(step));
            if let Err(err) = self.execute(step, material) {
                failure = Some((step, err));
                break;
            }
            applied.push(step);
        }

        tracing::info!(step = %Step::RemoveBundle, "{}", self.describe(Step::RemoveBundle));
        let cleanup = self.execute(Step::RemoveBundle, material);

        match (failure, cleanup) {
            (Some((step, source)), cleanup) => {
                if let Err(err) = cleanup {
                    tracing::error!("{err}");
                }
                Err(RotationError::Aborted {
                    step,
                    applied,
                    source: Box::new(source),
                })
            }
            (None, Err(source)) => Err(RotationError::Aborted {
                step: Step::RemoveBundle,
                applied,
                source: Box::new(source),
            }),
            (None, Ok(())) => {
                applied.push(Step::RemoveBundle);
                Ok(applied)
            }
        }
    }

    fn describe(&self, step: Step) -> String {
        let settings = self.settings;
        match step {
            Step::StopService => format!("stopping service {}", settings.service_name),
            Step::BackupKeystore => format!(
                "backing up {} to {}",
                settings.store_path().display(),
                settings.backup_path().display()
            ),
            Step::ConvertBundle => format!(
                "converting certificate and key into {}",
                settings.bundle_path().display()
            ),
            Step::ImportBundle => format!(
                "importing {} into {} as '{}'",
                settings.bundle_path().display(),
                settings.store_path().display(),
                settings.alias
            ),
            Step::FixPermissions => match &settings.owner {
                Some(owner) => format!(
                    "restricting {} to {owner} (mode 0600)",
                    settings.store_path().display()
                ),
                None => format!("restricting {} to mode 0600", settings.store_path().display()),
            },
            Step::StartService => format!("starting service {}", settings.service_name),
            Step::RemoveBundle => format!("removing {}", settings.bundle_path().display()),
        }
    }

    fn execute(&self, step: Step, material: &CertificateMaterial) -> Result<(), RotationError> {
        let settings = self.settings;
        match step {
            Step::StopService => self.service.stop(&settings.service_name),
            Step::BackupKeystore => backup_keystore(&settings.store_path(), &settings.backup_path()),
            Step::ConvertBundle => material.write_bundle(
                &settings.bundle_path(),
                &settings.alias,
                &settings.password,
            ),
            Step::ImportBundle => self.keystore.import(
                &settings.bundle_path(),
                &settings.store_path(),
                &settings.password,
                &settings.alias,
            ),
            Step::FixPermissions => {
                restrict_to_owner(&settings.store_path(), settings.owner.as_deref())
            }
            Step::StartService => self.service.start(&settings.service_name),
            Step::RemoveBundle => tools::remove_if_exists(&settings.bundle_path()).map_err(|err| {
                RotationError::external(
                    "remove bundle",
                    format!("{}: {err}", settings.bundle_path().display()),
                )
            }),
        }
    }
}

/// Copies the keystore next to itself. A missing keystore (first install) has nothing to save.
fn backup_keystore(store: &Path, backup: &Path) -> Result<(), RotationError> {
    if !store.exists() {
        tracing::info!("no existing keystore to back up");
        return Ok(());
    }

    std::fs::copy(store, backup).map_err(|source| RotationError::Backup {
        path: store.to_path_buf(),
        backup: backup.to_path_buf(),
        source,
    })?;

    Ok(())
}

/// Owner read/write only, handed to `owner` (and its primary group) when given.
fn restrict_to_owner(store: &Path, owner: Option<&str>) -> Result<(), RotationError> {
    tools::set_private_mode(store)
        .map_err(|err| RotationError::external("chmod", format!("{}: {err}", store.display())))?;

    let Some(owner) = owner else {
        return Ok(());
    };

    let user = nix::unistd::User::from_name(owner)
        .map_err(|err| RotationError::external("chown", err))?
        .ok_or_else(|| RotationError::external("chown", format!("unknown user '{owner}'")))?;

    nix::unistd::chown(store, Some(user.uid), Some(user.gid))
        .map_err(|err| RotationError::external("chown", format!("{}: {err}", store.display())))
}
