use std::{fmt, path::Path};

use openssl::{
    hash::MessageDigest,
    pkcs12::Pkcs12,
    pkey::{PKey, Private},
    stack::Stack,
    x509::X509,
};

use crate::{errors::RotationError, tools};

/// Normalized SHA-256 fingerprint of a certificate: upper-case hex, no separators.
///
/// Fingerprints are only ever compared for equality. Whatever produced them
/// (an in-process digest or the text printed by the keystore tool) they end
/// up in the same representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    const HEX_LEN: usize = 64;

    /// Computes the SHA-256 fingerprint of a certificate.
    pub fn of(cert: &X509) -> Result<Self, openssl::error::ErrorStack> {
        let digest = cert.digest(MessageDigest::sha256())?;
        Ok(Fingerprint(hex::encode_upper(&*digest)))
    }

    /// Parses a fingerprint printed by an external tool
    /// (e.g. `3A:4B:...` or `3a4b...\n`).
    pub fn parse(text: &str) -> Option<Self> {
        let normalized: String = text
            .chars()
            .filter(|c| *c != ':' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.len() != Self::HEX_LEN || !normalized.chars().all(|c| c.is_ascii_hexdigit())
        {
            return None;
        }

        Some(Fingerprint(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A certificate chain and its private key, as read from the PEM inputs.
pub struct CertificateMaterial {
    pub leaf: X509,
    pub chain: Vec<X509>,
    pub key: PKey<Private>,
}

impl CertificateMaterial {
    /// Reads the candidate certificate only, for fingerprinting.
    ///
    /// The file may hold a full chain, the first certificate is the leaf.
    pub fn read_leaf(cert_path: &Path) -> Result<X509, RotationError> {
        Self::read_chain(cert_path)?
            .into_iter()
            .next()
            .ok_or_else(|| RotationError::input(cert_path, "no certificate found in PEM file"))
    }

    /// Fingerprint of the leaf certificate found at `cert_path`.
    pub fn fingerprint(cert_path: &Path) -> Result<Fingerprint, RotationError> {
        let leaf = Self::read_leaf(cert_path)?;
        Fingerprint::of(&leaf).map_err(|err| RotationError::input(cert_path, err))
    }

    /// Loads the chain and the private key, checking that the key belongs to the leaf.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self, RotationError> {
        let mut certs = Self::read_chain(cert_path)?.into_iter();
        let Some(leaf) = certs.next() else {
            return Err(RotationError::input(
                cert_path,
                "no certificate found in PEM file",
            ));
        };

        let key_pem = std::fs::read(key_path).map_err(|err| RotationError::input(key_path, err))?;
        let key = PKey::private_key_from_pem(&key_pem)
            .map_err(|err| RotationError::input(key_path, err))?;

        let public = leaf
            .public_key()
            .map_err(|err| RotationError::input(cert_path, err))?;
        if !public.public_eq(&key) {
            return Err(RotationError::input(
                key_path,
                "private key does not match the certificate",
            ));
        }

        Ok(Self {
            leaf,
            chain: certs.collect(),
            key,
        })
    }

    /// Writes a password protected PKCS#12 bundle holding the key, the leaf
    /// and its chain under `alias`. The file is only readable by its owner.
    pub fn write_bundle(&self, path: &Path, alias: &str, password: &str) -> Result<(), RotationError> {
        let der = self
            .to_pkcs12(alias, password)
            .map_err(|err| RotationError::external("pkcs12 export", err))?;

        tools::write_private_file(path, &der)
            .map_err(|err| RotationError::external("pkcs12 export", format!("{}: {err}", path.display())))
    }

    fn to_pkcs12(&self, alias: &str, password: &str) -> Result<Vec<u8>, openssl::error::ErrorStack> {
        let mut builder = Pkcs12::builder();
        builder.name(alias).pkey(&self.key).cert(&self.leaf);

        if !self.chain.is_empty() {
            let mut ca = Stack::new()?;
            for cert in &self.chain {
                ca.push(cert.clone())?;
            }
            builder.ca(ca);
        }

        builder.build2(password)?.to_der()
    }

    fn read_chain(cert_path: &Path) -> Result<Vec<X509>, RotationError> {
        let pem = std::fs::read(cert_path).map_err(|err| RotationError::input(cert_path, err))?;
        X509::stack_from_pem(&pem).map_err(|err| RotationError::input(cert_path, err))
    }
}
