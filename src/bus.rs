//! Control bus: the Unix-socket rendezvous between the CLI and the daemon.
//!
//! The wire protocol is one command byte followed by a newline, one
//! request/response exchange per connection:
//!
//! | Byte | Meaning          | Reply                    |
//! |------|------------------|--------------------------|
//! | `t`  | Toggle           | `OK toggled`             |
//! | `c`  | Cancel           | `OK cancelled`           |
//! | `s`  | Status query     | `STATUS status=<name>`   |
//! | `v`  | Protocol version | `STATUS proto=<version>` |
//! | `q`  | Quit daemon      | `OK quitting`            |
//!
//! A PID file next to the socket guards against a second daemon instance.

use crate::error::BusError;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Control protocol version reported by the `v` command
pub const PROTO_VERSION: &str = "1";

/// Default control socket path: `$XDG_RUNTIME_DIR/hyprvoice.sock`, with a
/// uid-scoped `/tmp` fallback when the runtime directory is unavailable.
pub fn socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("hyprvoice.sock")
    } else {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/hyprvoice-{}.sock", uid))
    }
}

/// PID file path alongside the control socket
pub fn pid_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("hyprvoice.pid")
    } else {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/hyprvoice-{}.pid", uid))
    }
}

/// Refuse to start when the PID file names a live process.
/// Stale PID files (dead process, unparseable content) are removed.
pub fn check_existing_daemon(pid_file: &Path) -> Result<(), BusError> {
    let raw = match std::fs::read_to_string(pid_file) {
        Ok(raw) => raw,
        Err(_) => return Ok(()),
    };

    match raw.trim().parse::<u32>() {
        Ok(pid) if process_alive(pid) => Err(BusError::AlreadyRunning(pid)),
        Ok(pid) => {
            tracing::warn!("removing stale PID file (pid {} is gone)", pid);
            let _ = std::fs::remove_file(pid_file);
            Ok(())
        }
        Err(_) => {
            tracing::warn!("removing unreadable PID file {}", pid_file.display());
            let _ = std::fs::remove_file(pid_file);
            Ok(())
        }
    }
}

fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

/// Write the current process id to the PID file
pub fn write_pid_file(pid_file: &Path) -> Result<(), BusError> {
    if let Some(parent) = pid_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    std::fs::write(pid_file, std::process::id().to_string())?;
    tracing::debug!("PID file written: {}", pid_file.display());
    Ok(())
}

/// Remove the PID file; failures are logged, not fatal
pub fn remove_pid_file(pid_file: &Path) {
    if pid_file.exists() {
        if let Err(e) = std::fs::remove_file(pid_file) {
            tracing::warn!("failed to remove PID file: {}", e);
        }
    }
}

/// Bind the control socket, replacing any stale socket file
pub fn listen(socket: &Path) -> Result<UnixListener, BusError> {
    if socket.exists() {
        std::fs::remove_file(socket).map_err(|e| BusError::Bind {
            path: socket.display().to_string(),
            source: e,
        })?;
    }
    UnixListener::bind(socket).map_err(|e| BusError::Bind {
        path: socket.display().to_string(),
        source: e,
    })
}

/// Remove the socket file; failures are logged, not fatal
pub fn remove_socket_file(socket: &Path) {
    if socket.exists() {
        if let Err(e) = std::fs::remove_file(socket) {
            tracing::warn!("failed to remove socket file: {}", e);
        }
    }
}

/// Send a single command byte to the daemon and return its reply line.
///
/// `ERR …` replies come back as [`BusError::Rejected`] so CLI subcommands
/// exit nonzero on them.
pub async fn send_command(cmd: u8) -> Result<String, BusError> {
    send_command_at(&socket_path(), cmd).await
}

/// Send a command to a daemon listening at an explicit socket path
pub async fn send_command_at(socket: &Path, cmd: u8) -> Result<String, BusError> {
    let stream = UnixStream::connect(socket)
        .await
        .map_err(|e| BusError::Connect {
            path: socket.display().to_string(),
            source: e,
        })?;

    let (reader, mut writer) = stream.into_split();
    writer.write_all(&[cmd, b'\n']).await?;
    writer.flush().await?;

    let mut reply = String::new();
    BufReader::new(reader).read_line(&mut reply).await?;
    let reply = reply.trim_end().to_string();

    if reply.starts_with("ERR") {
        return Err(BusError::Rejected(reply));
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_socket_path_uses_runtime_dir() {
        if std::env::var("XDG_RUNTIME_DIR").is_ok() {
            assert!(socket_path().ends_with("hyprvoice.sock"));
            assert!(pid_path().ends_with("hyprvoice.pid"));
        } else {
            let uid = unsafe { libc::getuid() };
            assert_eq!(
                socket_path(),
                PathBuf::from(format!("/tmp/hyprvoice-{}.sock", uid))
            );
        }
    }

    #[test]
    fn test_check_existing_daemon_no_pid_file() {
        let dir = TempDir::new().unwrap();
        assert!(check_existing_daemon(&dir.path().join("hyprvoice.pid")).is_ok());
    }

    #[test]
    fn test_check_existing_daemon_live_process() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("hyprvoice.pid");
        // Our own pid is certainly alive
        std::fs::write(&pid_file, std::process::id().to_string()).unwrap();

        match check_existing_daemon(&pid_file) {
            Err(BusError::AlreadyRunning(pid)) => assert_eq!(pid, std::process::id()),
            other => panic!("expected AlreadyRunning, got {:?}", other),
        }
    }

    #[test]
    fn test_check_existing_daemon_removes_stale_pid() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("hyprvoice.pid");
        // PIDs are capped well below this on Linux
        std::fs::write(&pid_file, "999999999").unwrap();

        assert!(check_existing_daemon(&pid_file).is_ok());
        assert!(!pid_file.exists());
    }

    #[test]
    fn test_check_existing_daemon_removes_garbage_pid() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("hyprvoice.pid");
        std::fs::write(&pid_file, "not-a-pid").unwrap();

        assert!(check_existing_daemon(&pid_file).is_ok());
        assert!(!pid_file.exists());
    }

    #[test]
    fn test_pid_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("hyprvoice.pid");

        write_pid_file(&pid_file).unwrap();
        let raw = std::fs::read_to_string(&pid_file).unwrap();
        assert_eq!(raw.parse::<u32>().unwrap(), std::process::id());

        remove_pid_file(&pid_file);
        assert!(!pid_file.exists());
    }

    #[tokio::test]
    async fn test_listen_replaces_stale_socket() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("hyprvoice.sock");
        std::fs::write(&socket, "stale").unwrap();

        let listener = listen(&socket).unwrap();
        drop(listener);
        remove_socket_file(&socket);
        assert!(!socket.exists());
    }

    #[tokio::test]
    async fn test_send_command_round_trip() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("hyprvoice.sock");
        let listener = listen(&socket).unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut line = String::new();
            BufReader::new(reader).read_line(&mut line).await.unwrap();
            assert_eq!(line, "t\n");
            writer.write_all(b"OK toggled\n").await.unwrap();
        });

        let reply = send_command_at(&socket, b't').await.unwrap();
        assert_eq!(reply, "OK toggled");
    }

    #[tokio::test]
    async fn test_send_command_err_reply_is_rejected() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("hyprvoice.sock");
        let listener = listen(&socket).unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut line = String::new();
            BufReader::new(reader).read_line(&mut line).await.unwrap();
            writer.write_all(b"ERR unknown='x'\n").await.unwrap();
        });

        match send_command_at(&socket, b'x').await {
            Err(BusError::Rejected(reply)) => assert!(reply.contains("unknown")),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_command_connect_failure() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("missing.sock");

        match send_command_at(&socket, b's').await {
            Err(BusError::Connect { .. }) => {}
            other => panic!("expected Connect error, got {:?}", other),
        }
    }
}
