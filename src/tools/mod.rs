use std::{
    fs,
    io::{self, Write},
    os::unix::fs::{OpenOptionsExt, PermissionsExt},
    path::Path,
    process::{Command, Output, Stdio},
};

use crate::errors::RotationError;

/// Owner read/write only.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Runs an external command to completion and returns its output.
///
/// The call blocks without a timeout. Arguments are never logged since
/// they carry keystore passwords.
pub fn run_command(command: &mut Command) -> Result<Output, RotationError> {
    run_command_with_input(command, None)
}

/// Same as [`run_command`] but feeds `input` to the process' stdin.
pub fn run_command_with_input(
    command: &mut Command,
    input: Option<&[u8]>,
) -> Result<Output, RotationError> {
    let program = describe(command);
    tracing::debug!(command = %program, "running external command");

    let stdin = if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    };

    let mut child = command
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| RotationError::external(&program, err))?;

    if let (Some(input), Some(mut child_stdin)) = (input, child.stdin.take()) {
        child_stdin
            .write_all(input)
            .map_err(|err| RotationError::external(&program, err))?;
        // stdin is closed when dropped so the child sees EOF
    }

    let output = child
        .wait_with_output()
        .map_err(|err| RotationError::external(&program, err))?;

    if !output.status.success() {
        return Err(RotationError::external(&program, failure_reason(&output)));
    }

    Ok(output)
}

/// Program name and sub-command, e.g. `systemctl stop`.
fn describe(command: &Command) -> String {
    let program = command.get_program().to_string_lossy().into_owned();
    match command.get_args().next() {
        Some(first) => format!("{program} {}", first.to_string_lossy()),
        None => program,
    }
}

/// Human readable failure of a finished process: stderr, else stdout, else the status.
pub fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else if !stdout.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        output.status.to_string()
    }
}

/// Creates (or replaces) `path` with `contents`, readable by its owner only.
pub fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    // a stale file keeps its old mode when opened, start from scratch
    remove_if_exists(path)?;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(PRIVATE_FILE_MODE)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Removes a file, treating a missing file as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

pub fn set_private_mode(path: &Path) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(PRIVATE_FILE_MODE))
}
