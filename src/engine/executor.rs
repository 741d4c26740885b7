// Connection executor: one unit of work against exactly one host

use std::sync::Arc;

use super::{ExecutionOutcome, ExecutionTask};
use crate::output::errors::FleetError;
use crate::registry::Host;
use crate::transport::{Connector, Transport, TransportSettings};

/// Performs one task against one host and converts every failure to data.
///
/// Nothing raised by the transport crosses this boundary: the final result
/// is always an [`ExecutionOutcome`], with `output == "Error"` on failure.
pub struct ConnectionExecutor {
    connector: Arc<dyn Connector>,
    settings: TransportSettings,
}

impl ConnectionExecutor {
    pub fn new(connector: Arc<dyn Connector>, settings: TransportSettings) -> Self {
        ConnectionExecutor {
            connector,
            settings,
        }
    }

    pub async fn execute(&self, host: &Host, task: &ExecutionTask) -> ExecutionOutcome {
        let attempts = self.settings.connection_attempts.max(1);

        for attempt in 1..=attempts {
            match self.try_execute(host, task).await {
                Ok(output) => return ExecutionOutcome::success(host.clone(), output),
                Err(e) => {
                    tracing::debug!(
                        host = %host.target(),
                        attempt,
                        attempts,
                        error = %e,
                        "execution attempt failed"
                    );
                }
            }
        }

        ExecutionOutcome::failure(host.clone())
    }

    async fn try_execute(&self, host: &Host, task: &ExecutionTask) -> Result<String, FleetError> {
        let session = self.connector.connect(host).await?;

        match task {
            ExecutionTask::RunCommand(command) => {
                // Purely textual classification, applied before the
                // command reaches the transport
                match strip_sudo(command) {
                    Some(rest) => session.run_privileged(rest).await,
                    None => session.run(command).await,
                }
            }

            ExecutionTask::UploadFile {
                local,
                remote,
                mode,
            } => {
                ensure_parent_dir(session.as_ref(), remote).await?;
                session.upload(local.as_path(), remote, *mode).await?;
                Ok(format!("Uploaded {} -> {}", local.display(), remote))
            }

            ExecutionTask::DownloadFile { remote, local } => {
                session.download(remote, local.as_path()).await?;
                Ok(format!("Downloaded {} -> {}", remote, local.display()))
            }

            ExecutionTask::LaunchDetached(command) => {
                // nohup + backgrounding + no pty: the process survives the
                // session; only the launch request is reported on
                let wrapped = format!("nohup {} &> /dev/null &", command);
                session.spawn(&wrapped).await?;
                Ok(format!("Launched: {}", command))
            }
        }
    }
}

/// If the trimmed command starts with the `sudo` word, return the rest
fn strip_sudo(command: &str) -> Option<&str> {
    let trimmed = command.trim_start();
    let rest = trimmed.strip_prefix("sudo")?;
    // "sudoedit foo" is not a sudo invocation
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

async fn ensure_parent_dir(session: &dyn Transport, remote: &str) -> Result<(), FleetError> {
    if let Some((dir, _)) = remote.rsplit_once('/') {
        if !dir.is_empty() {
            session
                .run(&format!(
                    "mkdir -p {}",
                    crate::transport::ssh::shell_quote(dir)
                ))
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{FakeConnector, HostBehavior};

    fn executor(connector: Arc<FakeConnector>) -> ConnectionExecutor {
        ConnectionExecutor::new(connector, TransportSettings::default())
    }

    #[test]
    fn test_strip_sudo() {
        assert_eq!(strip_sudo("sudo ls /root"), Some("ls /root"));
        assert_eq!(strip_sudo("  sudo  whoami"), Some("whoami"));
        assert_eq!(strip_sudo("ls /root"), None);
        assert_eq!(strip_sudo("sudoedit /etc/hosts"), None);
    }

    #[tokio::test]
    async fn test_sudo_command_takes_privileged_path() {
        let connector = Arc::new(FakeConnector::new());
        connector.behave("h:22", HostBehavior::Respond("ok".into()));
        let exec = executor(connector.clone());
        let host = Host::new("h");

        exec.execute(&host, &ExecutionTask::RunCommand("sudo ls /root".into()))
            .await;
        exec.execute(&host, &ExecutionTask::RunCommand("ls /root".into()))
            .await;

        let calls = connector.calls_for("h:22");
        assert_eq!(calls[0].path, "run_privileged");
        assert_eq!(calls[0].detail, "ls /root");
        assert_eq!(calls[1].path, "run");
        assert_eq!(calls[1].detail, "ls /root");
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_error_outcome() {
        let connector = Arc::new(FakeConnector::new());
        connector.behave("down:22", HostBehavior::Unreachable);
        let exec = executor(connector);

        let outcome = exec
            .execute(
                &Host::new("down"),
                &ExecutionTask::RunCommand("echo hi".into()),
            )
            .await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.output, "Error");
    }

    #[tokio::test]
    async fn test_detached_launch_wraps_with_nohup() {
        let connector = Arc::new(FakeConnector::new());
        let exec = executor(connector.clone());

        let outcome = exec
            .execute(
                &Host::new("h"),
                &ExecutionTask::LaunchDetached("/tmp/job.sh".into()),
            )
            .await;

        assert!(outcome.succeeded);
        let calls = connector.calls_for("h:22");
        assert_eq!(calls[0].path, "spawn");
        assert_eq!(calls[0].detail, "nohup /tmp/job.sh &> /dev/null &");
    }

    #[tokio::test]
    async fn test_upload_creates_parent_dir_and_applies_mode() {
        let connector = Arc::new(FakeConnector::new());
        let exec = executor(connector.clone());

        let local = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(local.path(), b"payload").unwrap();

        let outcome = exec
            .execute(
                &Host::new("h"),
                &ExecutionTask::UploadFile {
                    local: local.path().to_path_buf(),
                    remote: "/opt/stage/file.bin".into(),
                    mode: 0o755,
                },
            )
            .await;

        assert!(outcome.succeeded);
        let calls = connector.calls_for("h:22");
        assert_eq!(calls[0].path, "run");
        assert_eq!(calls[0].detail, "mkdir -p '/opt/stage'");
        assert_eq!(calls[1].path, "upload");
        assert_eq!(calls[1].detail, "/opt/stage/file.bin mode=755");
    }

    #[tokio::test]
    async fn test_upload_download_roundtrip() {
        let connector = Arc::new(FakeConnector::new());
        let exec = executor(connector);
        let host = Host::new("h");

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        std::fs::write(&src, b"\x00\x01fleet payload\xff").unwrap();

        let up = exec
            .execute(
                &host,
                &ExecutionTask::UploadFile {
                    local: src.clone(),
                    remote: "/tmp/payload".into(),
                    mode: 0o644,
                },
            )
            .await;
        assert!(up.succeeded);

        let down = exec
            .execute(
                &host,
                &ExecutionTask::DownloadFile {
                    remote: "/tmp/payload".into(),
                    local: dst.clone(),
                },
            )
            .await;
        assert!(down.succeeded);

        assert_eq!(std::fs::read(&src).unwrap(), std::fs::read(&dst).unwrap());
    }
}
