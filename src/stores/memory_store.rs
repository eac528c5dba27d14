use std::{cell::RefCell, path::Path};

use openssl::pkcs12::Pkcs12;

use crate::{certificates::Fingerprint, errors::RotationError};

use super::store_trait::Keystore;

/// In-process keystore used by tests.
///
/// The store file on disk only holds the fingerprint of the imported
/// certificate, which is enough to observe whether it changed.
#[derive(Default)]
pub struct MemoryStore {
    pub calls: RefCell<Vec<&'static str>>,
    pub fail_read: bool,
    pub fail_import: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| **c == call).count()
    }

    /// Seeds a store file as if `fingerprint` had been imported before.
    pub fn seed(store: &Path, fingerprint: &Fingerprint) {
        std::fs::write(store, fingerprint.as_str()).unwrap();
    }
}

impl Keystore for MemoryStore {
    fn fingerprint(
        &self,
        store: &Path,
        _password: &str,
        alias: &str,
    ) -> Result<Fingerprint, RotationError> {
        self.calls.borrow_mut().push("fingerprint");

        let contents = std::fs::read_to_string(store).unwrap_or_default();
        match Fingerprint::parse(&contents) {
            Some(fingerprint) if !self.fail_read => Ok(fingerprint),
            _ => Err(RotationError::StoreAccess {
                path: store.to_path_buf(),
                alias: alias.to_string(),
                reason: "keystore was tampered with, or password was incorrect".into(),
            }),
        }
    }

    fn import(
        &self,
        bundle: &Path,
        store: &Path,
        password: &str,
        _alias: &str,
    ) -> Result<(), RotationError> {
        self.calls.borrow_mut().push("import");

        if self.fail_import {
            return Err(RotationError::external("keytool -importkeystore", "exit status: 1"));
        }

        let der = std::fs::read(bundle).map_err(|err| RotationError::external("import", err))?;
        let parsed = Pkcs12::from_der(&der)
            .and_then(|pkcs12| pkcs12.parse2(password))
            .map_err(|err| RotationError::external("import", err))?;
        let cert = parsed
            .cert
            .ok_or_else(|| RotationError::external("import", "bundle without certificate"))?;
        let fingerprint =
            Fingerprint::of(&cert).map_err(|err| RotationError::external("import", err))?;

        std::fs::write(store, fingerprint.as_str()).map_err(|err| RotationError::external("import", err))
    }
}
