//! Resource sampling for publishers.
//!
//! `LocalMonitor` reads this host's CPU and memory usage. `RemoteMonitor`
//! runs two fixed one-line probes on the broker host through a
//! [`RemoteExecutor`]; output that does not parse as a percentage is dropped
//! without an error, as is a failed command.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sysinfo::System;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::utils::BenchError;

pub const REMOTE_CPU_PROBE: &str = "top -bn1 | awk '/Cpu/ {print 100 - $8}'";
pub const REMOTE_MEMORY_PROBE: &str = "free | awk '/Mem/ {print $3/ $2 * 100}'";

#[async_trait]
pub trait ResourceMonitor: Send + Sync + 'static {
    /// Remote monitors are sampled from background tasks.
    fn is_remote(&self) -> bool;

    async fn cpu_usage(&self) -> Option<f64>;

    async fn memory_usage(&self) -> Option<f64>;
}

/// Builds one monitor per publisher.
pub type MonitorFactory = Arc<dyn Fn() -> Arc<dyn ResourceMonitor> + Send + Sync>;

pub struct LocalMonitor {
    system: Mutex<System>,
}

impl LocalMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes; take the first reading now
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for LocalMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceMonitor for LocalMonitor {
    fn is_remote(&self) -> bool {
        false
    }

    async fn cpu_usage(&self) -> Option<f64> {
        let mut system = self.system.lock().ok()?;
        system.refresh_cpu_usage();
        Some(system.global_cpu_usage() as f64)
    }

    async fn memory_usage(&self) -> Option<f64> {
        let mut system = self.system.lock().ok()?;
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return None;
        }
        Some(system.used_memory() as f64 / total as f64 * 100.0)
    }
}

/// Runs a shell command on another host and returns its stdout.
#[async_trait]
pub trait RemoteExecutor: Send + Sync + 'static {
    async fn run(&self, command: &str) -> Result<String, BenchError>;
}

/// `ssh` with password authentication through `sshpass -e`.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, command: &str) -> Result<String, BenchError> {
        let output = Command::new("sshpass")
            .arg("-e")
            .arg("ssh")
            .args(["-o", "StrictHostKeyChecking=no", "-o", "BatchMode=no"])
            .arg("-p")
            .arg(self.port.to_string())
            .arg(format!("{}@{}", self.user, self.host))
            .arg(command)
            .env("SSHPASS", &self.password)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(BenchError::Remote(format!(
                "'{command}' on {} exited with {}",
                self.host, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct RemoteMonitor<E> {
    executor: E,
    failed: AtomicBool,
}

impl<E: RemoteExecutor> RemoteMonitor<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            failed: AtomicBool::new(false),
        }
    }

    /// Whether any probe command has failed to run.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    async fn probe(&self, command: &str) -> Option<f64> {
        match self.executor.run(command).await {
            Ok(out) => parse_percentage(&out),
            Err(e) => {
                if self.failed.swap(true, Ordering::Relaxed) {
                    debug!(error = %e, "remote probe failed, sample dropped");
                } else {
                    warn!(error = %e, "remote probe failed, remote samples will be missing");
                }
                None
            }
        }
    }
}

#[async_trait]
impl<E: RemoteExecutor> ResourceMonitor for RemoteMonitor<E> {
    fn is_remote(&self) -> bool {
        true
    }

    async fn cpu_usage(&self) -> Option<f64> {
        self.probe(REMOTE_CPU_PROBE).await
    }

    async fn memory_usage(&self) -> Option<f64> {
        self.probe(REMOTE_MEMORY_PROBE).await
    }
}

pub fn parse_percentage(output: &str) -> Option<f64> {
    output.trim().parse::<f64>().ok()
}

/// Hosts that count as "this machine" for sampling purposes.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]" | "")
}

/// Sample the broker host over ssh when it is remote and a remote user is
/// configured; otherwise sample this host.
pub fn factory_from_settings(settings: &Settings) -> MonitorFactory {
    let host = url::Url::parse(&settings.broker.url)
        .ok()
        .filter(|u| u.scheme() != "memory")
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    if is_local_host(&host) || settings.remote.user.is_empty() {
        return Arc::new(|| Arc::new(LocalMonitor::new()) as Arc<dyn ResourceMonitor>);
    }

    let executor = SshExecutor {
        host,
        port: settings.remote.port,
        user: settings.remote.user.clone(),
        password: settings.remote.password.clone(),
    };
    Arc::new(move || Arc::new(RemoteMonitor::new(executor.clone())) as Arc<dyn ResourceMonitor>)
}
