//! VPN status collaborator: `<command> get <field>` for region, connection
//! state and public IP. Any failure degrades that field to a sentinel.

use crate::config::STATUS_COMMAND_TIMEOUT_MS;
use crate::error::{MonitorError, Result};
use serde::Serialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

pub const UNAVAILABLE: &str = "n/a";
const EMPTY_FIELD: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VpnStatus {
    pub region: String,
    pub state: String,
    pub ip: String,
}

impl VpnStatus {
    /// Shown before the first poll completes.
    pub fn pending() -> Self {
        Self {
            region: "unknown".to_string(),
            state: EMPTY_FIELD.to_string(),
            ip: EMPTY_FIELD.to_string(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            region: UNAVAILABLE.to_string(),
            state: UNAVAILABLE.to_string(),
            ip: UNAVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusProbe {
    command: String,
    timeout: Duration,
}

impl StatusProbe {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: Duration::from_millis(STATUS_COMMAND_TIMEOUT_MS),
        }
    }

    pub async fn poll(&self) -> VpnStatus {
        let (region, state, ip) = tokio::join!(
            self.field_or_sentinel("region"),
            self.field_or_sentinel("connectionstate"),
            self.field_or_sentinel("vpnip"),
        );
        VpnStatus { region, state, ip }
    }

    async fn field_or_sentinel(&self, field: &str) -> String {
        match self.read_field(field).await {
            Ok(value) if value.is_empty() => EMPTY_FIELD.to_string(),
            Ok(value) => value,
            Err(err) => {
                debug!(event = "status_probe_failed", command = %self.command, error = %err);
                UNAVAILABLE.to_string()
            }
        }
    }

    async fn read_field(&self, field: &str) -> Result<String> {
        let probe_error = |reason: String| MonitorError::StatusProbe {
            field: field.to_string(),
            reason,
        };
        let child = Command::new(&self.command)
            .arg("get")
            .arg(field)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| probe_error(format!("timed out after {:?}", self.timeout)))??;
        if !output.status.success() {
            return Err(probe_error(format!("exited with {}", output.status)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_command_degrades_every_field() {
        let probe = StatusProbe::new("secmon-no-such-status-command");
        assert_eq!(probe.poll().await, VpnStatus::unavailable());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_output_is_trimmed_per_field() {
        let status = StatusProbe::new("echo").poll().await;
        assert_eq!(status.region, "get region");
        assert_eq!(status.state, "get connectionstate");
        assert_eq!(status.ip, "get vpnip");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_degrades_to_sentinel() {
        let status = StatusProbe::new("false").poll().await;
        assert_eq!(status, VpnStatus::unavailable());
    }
}
