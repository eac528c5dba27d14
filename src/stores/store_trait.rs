use std::path::Path;

use crate::{certificates::Fingerprint, errors::RotationError};

/// The password protected credential store read by the controller at startup.
pub trait Keystore {
    /// Fingerprint of the certificate stored under `alias`.
    ///
    /// Fails with `RotationError::StoreAccess` when the alias cannot be read
    /// with the given password.
    fn fingerprint(&self, store: &Path, password: &str, alias: &str)
        -> Result<Fingerprint, RotationError>;

    /// Imports a PKCS#12 bundle into `store`, replacing any entry under `alias`.
    /// The same password protects the bundle and the store.
    fn import(
        &self,
        bundle: &Path,
        store: &Path,
        password: &str,
        alias: &str,
    ) -> Result<(), RotationError>;
}
