// Daemon startup plumbing: PID file, Unix socket creation, readiness signaling.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::net::UnixListener;
use tracing::info;

/// Default socket path: ~/.anggar/daemon.sock
const SOCKET_NAME: &str = "daemon.sock";
/// PID file: ~/.anggar/daemon.pid (diagnostics only)
const PID_FILE_NAME: &str = "daemon.pid";
/// SQLite database file: ~/.anggar/anggar.db
const DB_FILE_NAME: &str = "anggar.db";

/// Resolved paths for daemon runtime files.
pub struct DaemonPaths {
    pub base_dir: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    pub db_path: PathBuf,
}

impl DaemonPaths {
    /// Resolve paths under `~/.anggar/`.
    pub fn resolve() -> Result<Self> {
        let base = base_dir()?;
        Ok(Self::in_dir(base))
    }

    /// Place all runtime files under an explicit directory.
    pub fn in_dir(base_dir: PathBuf) -> Self {
        Self {
            socket_path: base_dir.join(SOCKET_NAME),
            pid_path: base_dir.join(PID_FILE_NAME),
            db_path: base_dir.join(DB_FILE_NAME),
            base_dir,
        }
    }
}

/// Write the current process PID to `~/.anggar/daemon.pid`.
pub fn write_pid_file(path: &Path) -> Result<()> {
    let pid = std::process::id();
    let mut file = fs::File::create(path).context("failed to create PID file")?;
    write!(file, "{pid}").context("failed to write PID")?;
    info!(pid, path = %path.display(), "wrote PID file");
    Ok(())
}

/// Remove the PID file on shutdown.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %e, "failed to remove PID file");
        }
    }
}

/// Remove stale socket file and bind a new Unix listener.
/// The daemon signals readiness by accepting connections on this socket.
pub async fn bind_socket(path: &Path) -> Result<UnixListener> {
    // Remove stale socket if it exists
    if path.exists() {
        fs::remove_file(path).context("failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(path).context("failed to bind Unix socket")?;
    info!(path = %path.display(), "daemon socket ready");
    Ok(listener)
}

/// Ensure the `~/.anggar/` directory exists.
fn base_dir() -> Result<PathBuf> {
    let home = home_dir().context("could not determine home directory")?;
    let anggar_dir = home.join(".anggar");
    fs::create_dir_all(&anggar_dir).context("failed to create ~/.anggar/")?;
    Ok(anggar_dir)
}

fn home_dir() -> Option<PathBuf> {
    // Prefer $HOME, fallback to the platform lookup
    std::env::var_os("HOME").map(PathBuf::from).or_else(dirs::home_dir)
}

/// Check if a daemon is already running by connecting to the socket.
/// Returns true if connection succeeds (daemon is alive).
pub async fn is_daemon_running(socket_path: &Path) -> bool {
    tokio::net::UnixStream::connect(socket_path).await.is_ok()
}
