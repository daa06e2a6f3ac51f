use std::path::{Path, PathBuf};
use std::process::Command;

use super::EngineError;
use crate::config::AppConfig;

#[cfg(target_os = "windows")]
pub const BINARY_NAME: &str = "ffmpeg.exe";
#[cfg(not(target_os = "windows"))]
pub const BINARY_NAME: &str = "ffmpeg";

/// Find the ffmpeg binary. A copy placed in the app's bin directory wins,
/// then whatever is on PATH.
pub fn resolve_binary(config: &AppConfig) -> Result<PathBuf, EngineError> {
    let local = config.engine_binary_path();
    if local.is_file() {
        log::info!("Using bundled ffmpeg at {:?}", local);
        return Ok(local);
    }
    search_path().ok_or(EngineError::BinaryNotFound)
}

fn search_path() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(BINARY_NAME))
        .find(|candidate| candidate.is_file())
}

/// Run `ffmpeg -version` and return the first line of its output.
pub fn verify_binary(path: &Path) -> Result<String, EngineError> {
    let mut command = Command::new(path);
    command.arg("-version");

    // Hide console window on Windows
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let output = command.output().map_err(|e| {
        EngineError::Verification(format!("failed to run {}: {}", path.display(), e))
    })?;

    if !output.status.success() {
        return Err(EngineError::Verification(format!(
            "{} exited with {}",
            path.display(),
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or("").to_string();
    if !first_line.contains("ffmpeg version") {
        return Err(EngineError::Verification(format!(
            "unexpected -version output from {}",
            path.display()
        )));
    }
    Ok(first_line)
}
