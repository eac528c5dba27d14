use std::path::{Path, PathBuf};

use time::macros::format_description;

use crate::config::LogRotation;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Rotation(pub LogRotation);

impl Rotation {
    /// Provides a daily rotation
    pub const DAILY: Self = Self(LogRotation::Daily);
    /// Provides a monthly rotation
    pub const MONTHLY: Self = Self(LogRotation::Monthly);
    /// Provides a rotation that never rotates.
    pub const NEVER: Self = Self(LogRotation::Never);

    /// The log file to append to at `date`.
    ///
    /// The date is inserted before the extension:
    /// `/var/log/cert.log` becomes `/var/log/cert.2026-10-19.log` for a daily rotation.
    pub(super) fn file_name(
        &self,
        path: &Path,
        date: time::OffsetDateTime,
    ) -> Result<PathBuf, time::error::Format> {
        let suffix = match *self {
            Rotation::DAILY => date.format(format_description!("[year]-[month]-[day]"))?,
            Rotation::MONTHLY => date.format(format_description!("[year]-[month]"))?,
            _ => return Ok(path.to_path_buf()),
        };

        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let name = match path.extension() {
            Some(ext) => format!("{stem}.{suffix}.{}", ext.to_string_lossy()),
            None => format!("{stem}.{suffix}"),
        };

        Ok(path.with_file_name(name))
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn test_never_keeps_the_configured_path() {
        let path = Path::new("/var/log/unifi-cert-rotate.log");
        let date = datetime!(2026-10-19 03:00 UTC);

        assert_eq!(Rotation::NEVER.file_name(path, date).unwrap(), path);
    }

    #[test]
    fn test_daily_and_monthly_insert_the_date_before_the_extension() {
        let path = Path::new("/var/log/unifi-cert-rotate.log");
        let date = datetime!(2026-10-19 03:00 UTC);

        assert_eq!(
            Rotation::DAILY.file_name(path, date).unwrap(),
            PathBuf::from("/var/log/unifi-cert-rotate.2026-10-19.log")
        );
        assert_eq!(
            Rotation::MONTHLY.file_name(path, date).unwrap(),
            PathBuf::from("/var/log/unifi-cert-rotate.2026-10.log")
        );
    }

    #[test]
    fn test_daily_without_extension() {
        let date = datetime!(2026-01-02 00:00 UTC);

        assert_eq!(
            Rotation::DAILY
                .file_name(Path::new("/tmp/rotate"), date)
                .unwrap(),
            PathBuf::from("/tmp/rotate.2026-01-02")
        );
    }
}
