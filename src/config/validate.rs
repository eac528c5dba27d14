use anyhow::anyhow;

use super::Config;

/// The keystore tool refuses shorter store passwords.
const MIN_PASSWORD_LEN: usize = 6;

/// given a Config struct, validate the values to ensure
/// that the rotation won't fail half-way because of them
pub fn check_config(config: &Config) -> Result<(), anyhow::Error> {
    if config.certificate.path.as_os_str().is_empty() {
        return Err(anyhow!("certificate.path cannot be empty"));
    }

    if config.certificate.key_path.as_os_str().is_empty() {
        return Err(anyhow!("certificate.key_path cannot be empty"));
    }

    if config.keystore.directory.as_os_str().is_empty() {
        return Err(anyhow!("keystore.directory cannot be empty"));
    }

    if config.keystore.file_name.is_empty() || config.keystore.file_name.contains('/') {
        return Err(anyhow!(
            "keystore.file_name must be a plain file name (got '{}')",
            config.keystore.file_name
        ));
    }

    if config.keystore.alias.trim().is_empty() {
        return Err(anyhow!("keystore.alias cannot be empty"));
    }

    // the alias also names the transient `<alias>.p12` bundle
    if config.keystore.alias.contains('/') {
        return Err(anyhow!(
            "keystore.alias cannot contain a path separator (got '{}')",
            config.keystore.alias
        ));
    }

    if config.keystore.password.len() < MIN_PASSWORD_LEN {
        return Err(anyhow!(
            "keystore.password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }

    if config.service.name.trim().is_empty() {
        return Err(anyhow!("service.name cannot be empty"));
    }

    if config.schedule.enabled {
        let fields = config.schedule.expression.split_whitespace().count();
        if fields != 5 {
            return Err(anyhow!(
                "schedule.expression must have 5 cron fields, found {fields} in '{}'",
                config.schedule.expression
            ));
        }
    }

    Ok(())
}
