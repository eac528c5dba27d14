use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
};

use crate::{certificates::Fingerprint, errors::RotationError, tools};

use super::store_trait::Keystore;

/// A Java keystore managed through the JDK `keytool` binary.
#[derive(Debug, Clone)]
pub struct KeytoolStore {
    binary: PathBuf,
}

impl KeytoolStore {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        KeytoolStore {
            binary: binary.into(),
        }
    }

    fn list_args(store: &Path, password: &str, alias: &str) -> Vec<OsString> {
        vec![
            "-list".into(),
            "-keystore".into(),
            store.into(),
            "-storepass".into(),
            password.into(),
            "-alias".into(),
            alias.into(),
        ]
    }

    fn import_args(bundle: &Path, store: &Path, password: &str, alias: &str) -> Vec<OsString> {
        vec![
            "-importkeystore".into(),
            "-noprompt".into(),
            "-srckeystore".into(),
            bundle.into(),
            "-srcstoretype".into(),
            "PKCS12".into(),
            "-srcstorepass".into(),
            password.into(),
            "-destkeystore".into(),
            store.into(),
            "-deststorepass".into(),
            password.into(),
            "-destkeypass".into(),
            password.into(),
            "-alias".into(),
            alias.into(),
        ]
    }
}

impl Keystore for KeytoolStore {
    fn fingerprint(
        &self,
        store: &Path,
        password: &str,
        alias: &str,
    ) -> Result<Fingerprint, RotationError> {
        let store_access = |reason: String| RotationError::StoreAccess {
            path: store.to_path_buf(),
            alias: alias.to_string(),
            reason,
        };

        let output = tools::run_command(
            Command::new(&self.binary).args(Self::list_args(store, password, alias)),
        )
        .map_err(|err| match err {
            RotationError::ExternalTool { reason, .. } => store_access(reason),
            other => other,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_sha256_fingerprint(&stdout)
            .ok_or_else(|| store_access("no SHA-256 fingerprint in keytool output".to_string()))
    }

    fn import(
        &self,
        bundle: &Path,
        store: &Path,
        password: &str,
        alias: &str,
    ) -> Result<(), RotationError> {
        tools::run_command(
            Command::new(&self.binary).args(Self::import_args(bundle, store, password, alias)),
        )?;
        Ok(())
    }
}

/// Extracts the SHA-256 fingerprint from `keytool -list` output.
///
/// Short listings print `Certificate fingerprint (SHA-256): AB:CD:...`,
/// verbose ones `SHA256: AB:CD:...`. The first match is the entry's leaf.
pub(crate) fn parse_sha256_fingerprint(output: &str) -> Option<Fingerprint> {
    output.lines().find_map(|line| {
        let line = line.trim();
        let value = line
            .strip_prefix("SHA256:")
            .or_else(|| line.split_once("(SHA-256):").map(|(_, value)| value))?;
        Fingerprint::parse(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::fake_tool;

    /// A `keytool` whose "keystore" is a text file holding the fingerprint.
    /// `-list` checks the store password, `-importkeystore` copies the bundle over the store.
    const FAKE_KEYTOOL: &str = r#"case "$1" in
  -list)
    if [ "$5" != "aircontrolenterprise" ]; then
      echo "keytool error: java.io.IOException: keystore password was incorrect"
      exit 1
    fi
    echo "Keystore type: JKS"
    echo ""
    echo "unifi, Oct 19, 2026, PrivateKeyEntry, "
    echo "Certificate fingerprint (SHA-256): $(cat "$3")"
    ;;
  -importkeystore)
    [ "$8" = "aircontrolenterprise" ] || exit 1
    cp "$4" "${10}"
    ;;
  *)
    exit 2
    ;;
esac"#;

    const FINGERPRINT: &str = "3A:4B:5C:6D:7E:8F:90:A1:B2:C3:D4:E5:F6:07:18:29:3A:4B:5C:6D:7E:8F:90:A1:B2:C3:D4:E5:F6:07:18:29";

    #[test]
    fn test_parse_short_listing() {
        let output = format!(
            "unifi, Oct 19, 2026, PrivateKeyEntry, \nCertificate fingerprint (SHA-256): {FINGERPRINT}\n"
        );

        let fingerprint = parse_sha256_fingerprint(&output).unwrap();
        assert_eq!(fingerprint, Fingerprint::parse(FINGERPRINT).unwrap());
        assert!(!fingerprint.as_str().contains(':'));
    }

    #[test]
    fn test_parse_verbose_listing_takes_first_certificate() {
        let other = FINGERPRINT.replace("3A", "00");
        let output = format!(
            "Alias name: unifi\nCertificate chain length: 2\nCertificate[1]:\n\
             Certificate fingerprints:\n\t SHA1: 01:02\n\t SHA256: {FINGERPRINT}\n\
             Certificate[2]:\n\t SHA256: {other}\n"
        );

        assert_eq!(
            parse_sha256_fingerprint(&output),
            Fingerprint::parse(FINGERPRINT)
        );
    }

    #[test]
    fn test_parse_without_fingerprint() {
        assert!(parse_sha256_fingerprint("keytool error: java.lang.Exception: Alias <unifi> does not exist").is_none());
        assert!(parse_sha256_fingerprint("").is_none());
    }

    #[test]
    fn test_import_overwrites_alias_with_single_password() {
        let args = KeytoolStore::import_args(
            Path::new("/var/lib/unifi/unifi.p12"),
            Path::new("/var/lib/unifi/keystore"),
            "aircontrolenterprise",
            "unifi",
        );

        assert!(args.contains(&OsString::from("-noprompt")));
        let passwords = args
            .iter()
            .filter(|arg| *arg == "aircontrolenterprise")
            .count();
        assert_eq!(passwords, 3);

        let alias_at = args.iter().position(|arg| arg == "-alias").unwrap();
        assert_eq!(args[alias_at + 1], "unifi");
    }

    #[test]
    fn test_list_queries_the_alias() {
        let args = KeytoolStore::list_args(Path::new("/var/lib/unifi/keystore"), "secret", "unifi");
        assert_eq!(args[0], "-list");
        assert_eq!(args.last().unwrap(), "unifi");
    }

    #[test]
    fn test_missing_keytool_is_store_access_error() {
        let store = KeytoolStore::new("/nonexistent/keytool");
        let err = store
            .fingerprint(Path::new("/var/lib/unifi/keystore"), "secret", "unifi")
            .unwrap_err();

        assert!(matches!(err, RotationError::StoreAccess { .. }));
    }

    #[test]
    fn test_fingerprint_is_read_from_keytool_output() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("keystore");
        std::fs::write(&store_path, FINGERPRINT).unwrap();
        let store = KeytoolStore::new(fake_tool(dir.path(), "keytool", FAKE_KEYTOOL));

        let fingerprint = store
            .fingerprint(&store_path, "aircontrolenterprise", "unifi")
            .unwrap();

        assert_eq!(fingerprint, Fingerprint::parse(FINGERPRINT).unwrap());
    }

    #[test]
    fn test_wrong_password_is_store_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("keystore");
        std::fs::write(&store_path, FINGERPRINT).unwrap();
        let store = KeytoolStore::new(fake_tool(dir.path(), "keytool", FAKE_KEYTOOL));

        let err = store
            .fingerprint(&store_path, "wrongpassword", "unifi")
            .unwrap_err();

        match err {
            RotationError::StoreAccess { alias, reason, .. } => {
                assert_eq!(alias, "unifi");
                assert!(reason.contains("password was incorrect"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_listing_without_fingerprint_is_store_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeytoolStore::new(fake_tool(dir.path(), "keytool", "echo 'Keystore type: JKS'"));

        let err = store
            .fingerprint(&dir.path().join("keystore"), "aircontrolenterprise", "unifi")
            .unwrap_err();

        assert!(matches!(err, RotationError::StoreAccess { .. }));
    }

    #[test]
    fn test_import_hands_bundle_and_store_to_keytool() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("unifi.p12");
        let store_path = dir.path().join("keystore");
        std::fs::write(&bundle, b"pkcs12 bytes").unwrap();
        std::fs::write(&store_path, b"old keystore").unwrap();
        let store = KeytoolStore::new(fake_tool(dir.path(), "keytool", FAKE_KEYTOOL));

        store
            .import(&bundle, &store_path, "aircontrolenterprise", "unifi")
            .unwrap();

        assert_eq!(std::fs::read(&store_path).unwrap(), b"pkcs12 bytes");
    }

    #[test]
    fn test_failed_import_is_external_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("keystore");
        std::fs::write(&store_path, b"old keystore").unwrap();
        let store = KeytoolStore::new(fake_tool(dir.path(), "keytool", FAKE_KEYTOOL));

        let err = store
            .import(&dir.path().join("unifi.p12"), &store_path, "wrongpassword", "unifi")
            .unwrap_err();

        assert!(matches!(err, RotationError::ExternalTool { .. }));
        assert_eq!(std::fs::read(&store_path).unwrap(), b"old keystore");
    }
}
