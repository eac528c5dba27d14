use std::path::Path;

use crate::{errors::RotationError, services::Scheduler};

/// Formats the crontab line running `executable` with `args` at `expression`.
pub fn schedule_entry(expression: &str, executable: &Path, args: &[String]) -> String {
    let mut entry = format!("{} {}", expression.trim(), command_word(&executable.to_string_lossy()));
    for arg in args {
        entry.push(' ');
        entry.push_str(&command_word(arg));
    }
    entry
}

/// Registers the recurring run unless an active entry already points at `executable`.
///
/// Returns whether a new entry was installed. Existing entries are kept as they are.
pub fn ensure_scheduled(
    scheduler: &dyn Scheduler,
    executable: &Path,
    expression: &str,
    args: &[String],
) -> Result<bool, RotationError> {
    let mut entries = scheduler.entries()?;
    let raw = executable.to_string_lossy();
    let written = command_word(&raw);

    let registered = entries.iter().any(|entry| {
        let entry = entry.trim();
        !entry.starts_with('#') && (entry.contains(written.as_str()) || entry.contains(raw.as_ref()))
    });

    if registered {
        tracing::debug!("{} is already scheduled", executable.display());
        return Ok(false);
    }

    let entry = schedule_entry(expression, executable, args);
    entries.push(entry.clone());
    scheduler.install(&entries)?;

    tracing::info!("scheduled recurring run: {entry}");
    Ok(true)
}

/// A shell word as cron hands it to `sh`: quoted when needed, `%` escaped.
fn command_word(value: &str) -> String {
    quote(value).replace('%', r"\%")
}

fn quote(value: &str) -> String {
    if value.is_empty() || value.contains(char::is_whitespace) {
        format!("'{}'", value.replace('\'', r"'\''"))
    } else {
        value.to_string()
    }
}
