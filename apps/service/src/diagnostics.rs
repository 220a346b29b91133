//! On-demand `ping` / `traceroute` against a host.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::DiagnosticsSection;
use crate::validation::validate_host;

/// Textual outcome of a diagnostic run. Failures are reported here rather
/// than as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    pub host: String,
    pub success: bool,
    pub output: String,
}

impl DiagnosticReport {
    fn failed(host: &str, tool: &str, detail: impl std::fmt::Display) -> Self {
        Self { host: host.to_string(), success: false, output: format!("{tool} failed: {detail}") }
    }
}

#[async_trait]
pub trait Diagnostics: Send + Sync {
    async fn ping(&self, host: &str) -> DiagnosticReport;

    async fn traceroute(&self, host: &str) -> DiagnosticReport;
}

/// Runs the system `ping` and `traceroute` binaries
pub struct SystemDiagnostics {
    ping_count: u32,
    timeout: Duration,
}

impl SystemDiagnostics {
    pub fn new(settings: &DiagnosticsSection) -> Self {
        Self {
            ping_count: settings.ping_count.max(1),
            timeout: Duration::from_secs(settings.timeout_seconds.max(1)),
        }
    }

    async fn run(&self, tool: &str, program: &str, args: &[String], host: &str) -> DiagnosticReport {
        if let Some(reason) = validate_host(host).error {
            warn!(host, "Refusing {}: {}", tool, reason);
            return DiagnosticReport::failed(host, tool, reason);
        }

        info!(host, "Running {}", tool);
        let mut command = Command::new(program);
        command.args(args).arg(host).kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Err(_) => {
                return DiagnosticReport::failed(
                    host,
                    tool,
                    format!("timed out after {} seconds", self.timeout.as_secs()),
                );
            }
            Ok(Err(e)) => return DiagnosticReport::failed(host, tool, e),
            Ok(Ok(output)) => output,
        };

        if output.status.success() {
            DiagnosticReport {
                host: host.to_string(),
                success: true,
                output: String::from_utf8_lossy(&output.stdout).into_owned(),
            }
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                output.status.to_string()
            } else {
                stderr.trim().to_string()
            };
            DiagnosticReport::failed(host, tool, detail)
        }
    }
}

#[async_trait]
impl Diagnostics for SystemDiagnostics {
    async fn ping(&self, host: &str) -> DiagnosticReport {
        let args = ["-c".to_string(), self.ping_count.to_string()];
        self.run("Ping", "ping", &args, host).await
    }

    async fn traceroute(&self, host: &str) -> DiagnosticReport {
        self.run("Traceroute", "traceroute", &[], host).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_host_is_refused_without_spawning() {
        let diagnostics = SystemDiagnostics::new(&DiagnosticsSection::default());

        let report = diagnostics.ping("-f 10.0.0.1").await;
        assert!(!report.success);
        assert!(report.output.starts_with("Ping failed"));

        let report = diagnostics.traceroute("").await;
        assert!(!report.success);
        assert!(report.output.starts_with("Traceroute failed"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_failed_report() {
        let diagnostics = SystemDiagnostics::new(&DiagnosticsSection::default());
        let report = diagnostics
            .run("Probe", "linkwatch-definitely-not-installed", &[], "127.0.0.1")
            .await;
        assert!(!report.success);
        assert_eq!(report.host, "127.0.0.1");
    }
}
