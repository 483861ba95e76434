//! Endpoint identifiers and configuration paths
//!
//! Unix/macOS: endpoints are Unix domain socket paths under $XDG_RUNTIME_DIR or /tmp
//! Windows: endpoints are named pipe names (the interprocess crate adds the `\\.\pipe\` prefix)

use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Name used for the endpoint directory and config directory
const APP_NAME: &str = "attach-harness";

/// Unique-per-run suffix: process id plus wall-clock nanoseconds
fn run_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!("{}-{:08x}", std::process::id(), nanos)
}

/// Directory holding endpoint sockets
///
/// `$XDG_RUNTIME_DIR/attach-harness` or `/tmp/attach-harness-<uid>`
#[cfg(unix)]
pub fn endpoint_dir() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_NAME);
    }

    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/{}-{}", APP_NAME, uid))
}

/// Generate a fresh endpoint identifier for this run
#[cfg(unix)]
pub fn new_endpoint() -> String {
    endpoint_dir()
        .join(format!("{}.sock", run_suffix()))
        .to_string_lossy()
        .into_owned()
}

#[cfg(windows)]
pub fn new_endpoint() -> String {
    format!("{}-{}", APP_NAME, run_suffix())
}

/// Ensure the directory that will contain `endpoint` exists
///
/// On Unix, creates the directory with mode 0700
#[cfg(unix)]
pub fn ensure_endpoint_dir(endpoint: &str) -> io::Result<()> {
    let dir = std::path::Path::new(endpoint).parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "Invalid endpoint path")
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}

#[cfg(windows)]
pub fn ensure_endpoint_dir(_endpoint: &str) -> io::Result<()> {
    Ok(())
}

/// Remove a stale endpoint socket file if one exists
#[cfg(unix)]
pub fn remove_endpoint(endpoint: &str) -> io::Result<()> {
    let path = std::path::Path::new(endpoint);
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(windows)]
pub fn remove_endpoint(_endpoint: &str) -> io::Result<()> {
    // Named pipes vanish with their last handle
    Ok(())
}

/// Get the configuration directory path
///
/// - Linux: `~/.config/attach-harness/`
/// - macOS: `~/Library/Application Support/attach-harness/`
/// - Windows: `%APPDATA%\attach-harness\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
