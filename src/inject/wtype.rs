//! wtype-based typing backend
//!
//! Wayland-native synthetic typing with no helper daemon. Some
//! Chromium-based apps ignore it, which is why ydotool sits ahead of it in
//! the default chain.

use super::{binary_in_path, wayland_session_ready, Backend};
use crate::error::InjectError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub struct WtypeBackend;

impl WtypeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WtypeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Backend for WtypeBackend {
    fn name(&self) -> &'static str {
        "wtype"
    }

    async fn available(&self) -> Result<(), InjectError> {
        if !binary_in_path("wtype").await {
            return Err(InjectError::BinaryNotFound {
                binary: "wtype",
                package: "wtype",
            });
        }
        wayland_session_ready()
    }

    async fn inject(&self, text: &str, timeout: Duration) -> Result<(), InjectError> {
        let run = Command::new("wtype")
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| InjectError::Timeout {
                backend: "wtype",
                timeout,
            })?
            .map_err(|e| InjectError::Backend {
                backend: "wtype",
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InjectError::Backend {
                backend: "wtype",
                reason: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
