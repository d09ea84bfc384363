//! ydotool-based typing backend
//!
//! Most compatible with Chromium/Electron apps, but requires the ydotoold
//! daemon. Availability probes the daemon socket before any attempt.

use super::{binary_in_path, Backend};
use crate::error::InjectError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::process::Command;

const SOCKET_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

pub struct YdotoolBackend;

impl YdotoolBackend {
    pub fn new() -> Self {
        Self
    }

    /// Locate the ydotoold socket, honoring YDOTOOL_SOCKET first
    fn socket_path() -> Option<PathBuf> {
        if let Some(sock) = std::env::var_os("YDOTOOL_SOCKET") {
            let path = PathBuf::from(sock);
            if path.exists() {
                return Some(path);
            }
        }

        let mut candidates = Vec::new();
        if let Some(runtime_dir) = std::env::var_os("XDG_RUNTIME_DIR") {
            candidates.push(PathBuf::from(runtime_dir).join(".ydotool_socket"));
        }
        let uid = unsafe { libc::getuid() };
        candidates.push(PathBuf::from(format!("/run/user/{}/.ydotool_socket", uid)));
        candidates.push(PathBuf::from("/tmp/.ydotool_socket"));

        candidates.into_iter().find(|p| p.exists())
    }
}

impl Default for YdotoolBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Backend for YdotoolBackend {
    fn name(&self) -> &'static str {
        "ydotool"
    }

    async fn available(&self) -> Result<(), InjectError> {
        if !binary_in_path("ydotool").await {
            return Err(InjectError::BinaryNotFound {
                binary: "ydotool",
                package: "ydotool",
            });
        }

        let Some(socket) = Self::socket_path() else {
            return Err(InjectError::YdotooldNotRunning(
                "socket not found".to_string(),
            ));
        };

        // Connect to verify the daemon is actually responsive
        match tokio::time::timeout(SOCKET_PROBE_TIMEOUT, UnixStream::connect(&socket)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(InjectError::YdotooldNotRunning(format!(
                "{}: {}",
                socket.display(),
                e
            ))),
            Err(_) => Err(InjectError::YdotooldNotRunning(format!(
                "{}: connect timed out",
                socket.display()
            ))),
        }
    }

    async fn inject(&self, text: &str, timeout: Duration) -> Result<(), InjectError> {
        let run = Command::new("ydotool")
            .args(["type", "--", text])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| InjectError::Timeout {
                backend: "ydotool",
                timeout,
            })?
            .map_err(|e| InjectError::Backend {
                backend: "ydotool",
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InjectError::Backend {
                backend: "ydotool",
                reason: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
