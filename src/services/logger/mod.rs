use std::{
    fs::File,
    io::{self, Write},
    path::Path,
    sync::Mutex,
};

use rotation::Rotation;
use tracing_subscriber::fmt::MakeWriter;

use crate::config::Logging;

mod rotation;

/// A `io::Write` implementation that copies every log line to stdout and to the log file.
///
/// Write errors are swallowed: losing a log line must never abort a rotation.
#[derive(Debug)]
pub struct TeeWriter<'a> {
    file: Option<&'a Mutex<File>>,
}

impl io::Write for TeeWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf).ok();

        if let Some(file) = self.file {
            if let Ok(mut file) = file.lock() {
                file.write_all(buf).ok();
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush().ok();

        if let Some(file) = self.file {
            if let Ok(mut file) = file.lock() {
                file.flush().ok();
            }
        }

        Ok(())
    }
}

/// Console plus append-only file logger handed to `tracing_subscriber`.
#[derive(Debug)]
pub struct RotationLog {
    file: Option<Mutex<File>>,
}

impl RotationLog {
    pub fn new(logging: &Logging) -> Self {
        let path = logging
            .path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty());

        let file = path.and_then(|path| {
            match Self::open(path, &Rotation(logging.rotation.clone())) {
                Ok(file) => Some(Mutex::new(file)),
                Err(err) => {
                    // tracing is not initialized yet
                    eprintln!(
                        "Warning: unable to open log file {}: {err}. Logging to console only.",
                        path.display()
                    );
                    None
                }
            }
        });

        RotationLog { file }
    }

    /// Whether log lines also reach a file.
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    fn open(path: &Path, rotation: &Rotation) -> io::Result<File> {
        let path = rotation
            .file_name(path, time::OffsetDateTime::now_utc())
            .map_err(io::Error::other)?;

        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
    }
}

/// impl from `tracing_subscriber::fmt::MakeWriter`
impl<'a> MakeWriter<'a> for RotationLog {
    type Writer = TeeWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        TeeWriter {
            file: self.file.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::{LogFormat, LogLevel, LogRotation};

    fn logging(path: Option<PathBuf>) -> Logging {
        Logging {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            path,
            rotation: LogRotation::Never,
        }
    }

    #[test]
    fn test_lines_are_appended_to_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotate.log");
        std::fs::write(&path, "previous run\n").unwrap();

        let log = RotationLog::new(&logging(Some(path.clone())));
        assert!(log.has_file());

        let mut writer = log.make_writer();
        writer.write_all(b"Proceeding with certificate installation\n").unwrap();
        writer.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "previous run\nProceeding with certificate installation\n"
        );
    }

    #[test]
    fn test_unwritable_log_file_does_not_fail_writes() {
        let log = RotationLog::new(&logging(Some(PathBuf::from(
            "/nonexistent/directory/rotate.log",
        ))));
        assert!(!log.has_file());

        let mut writer = log.make_writer();
        assert_eq!(writer.write(b"still logged to console\n").unwrap(), 24);
        assert!(writer.flush().is_ok());
    }

    #[test]
    fn test_empty_path_logs_to_console_only() {
        let log = RotationLog::new(&logging(Some(PathBuf::new())));
        assert!(!log.has_file());
    }

    #[test]
    fn test_every_line_reaches_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotate.log");

        let log = RotationLog::new(&logging(Some(path.clone())));
        for line in ["stopping service unifi\n", "starting service unifi\n"] {
            log.make_writer().write_all(line.as_bytes()).unwrap();
        }

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "stopping service unifi\nstarting service unifi\n"
        );
    }
}
