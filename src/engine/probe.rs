// Liveness prober: the only writer of host status

use super::{ExecutionTask, FleetDispatcher};
use crate::registry::{Host, HostRegistry, HostStatus};

const PROBE_COMMAND: &str = "uname -s -n || echo 'Unknown'";
const UPTIME_COMMAND: &str = "uptime -p 2>/dev/null || echo 'Unknown'";

/// One row of the uptime summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UptimeEntry {
    pub index: usize,
    pub host: Host,
    pub uptime: String,
}

/// Refreshes cached host liveness by probing the whole fleet
pub struct LivenessProber<'a> {
    dispatcher: &'a FleetDispatcher,
}

impl<'a> LivenessProber<'a> {
    pub fn new(dispatcher: &'a FleetDispatcher) -> Self {
        LivenessProber { dispatcher }
    }

    /// Probe every registered host and update its status in place.
    /// Never fails; every host ends up either `Alive` or `Down`.
    pub async fn probe(&self, registry: &HostRegistry) {
        let hosts = registry.hosts().to_vec();
        let batch = self
            .dispatcher
            .dispatch(&hosts, &ExecutionTask::RunCommand(PROBE_COMMAND.into()))
            .await;

        for outcome in batch.iter() {
            let status = if outcome.succeeded {
                HostStatus::Alive(strip_prompt_artifact(&outcome.output))
            } else {
                HostStatus::Down
            };
            // Targets came straight from the registry
            let _ = registry.set_status(&outcome.host.target(), status);
        }
    }

    /// Uptime rows for the hosts whose cached status is not `Down`.
    /// Down hosts are skipped entirely rather than shown with stale data.
    pub async fn summarize_uptime(&self, registry: &HostRegistry) -> Vec<UptimeEntry> {
        let hosts = registry.hosts().to_vec();
        let batch = self
            .dispatcher
            .dispatch(&hosts, &ExecutionTask::RunCommand(UPTIME_COMMAND.into()))
            .await;

        let mut entries = Vec::new();
        for (index, host) in registry.hosts().iter().enumerate() {
            let target = host.target();
            if registry.status(&target).is_down() {
                continue;
            }
            let uptime = batch
                .get(&target)
                .map(|o| o.output.trim().to_string())
                .unwrap_or_default();
            entries.push(UptimeEntry {
                index,
                host: host.clone(),
                uptime,
            });
        }
        entries
    }
}

/// Truncate probe output at the first `#`, a shell-prompt suffix artifact.
///
/// Known limitation: a legitimate `#` in the summary also truncates; kept
/// as-is rather than generalized.
fn strip_prompt_artifact(output: &str) -> String {
    let cut = output.split('#').next().unwrap_or(output);
    cut.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{FakeConnector, HostBehavior};
    use crate::engine::ConnectionExecutor;
    use crate::transport::TransportSettings;
    use std::sync::Arc;

    fn registry_of(names: &[&str]) -> HostRegistry {
        let mut registry = HostRegistry::new();
        for name in names {
            registry.add_host(Host::new(*name)).unwrap();
        }
        registry
    }

    fn dispatcher(connector: Arc<FakeConnector>) -> FleetDispatcher {
        FleetDispatcher::new(Arc::new(ConnectionExecutor::new(
            connector,
            TransportSettings::default(),
        )))
    }

    #[test]
    fn test_strip_prompt_artifact() {
        assert_eq!(strip_prompt_artifact("Linux web1 # \n"), "Linux web1");
        assert_eq!(strip_prompt_artifact("Linux web1\n"), "Linux web1");
        assert_eq!(strip_prompt_artifact(""), "");
    }

    #[tokio::test]
    async fn test_probe_marks_alive_and_down() {
        let connector = Arc::new(FakeConnector::new());
        connector.behave("up:22", HostBehavior::Respond("Linux up # ".into()));
        connector.behave("down:22", HostBehavior::Unreachable);
        let dispatcher = dispatcher(connector);
        let prober = LivenessProber::new(&dispatcher);

        let registry = registry_of(&["up", "down"]);
        prober.probe(&registry).await;

        assert_eq!(
            registry.status("up:22"),
            HostStatus::Alive("Linux up".to_string())
        );
        assert_eq!(registry.status("down:22"), HostStatus::Down);
    }

    #[tokio::test]
    async fn test_probe_leaves_no_host_unknown() {
        let connector = Arc::new(FakeConnector::new());
        connector.behave("a:22", HostBehavior::Respond("Linux a".into()));
        connector.behave("b:22", HostBehavior::Unreachable);
        connector.behave("c:22", HostBehavior::Respond("Linux c".into()));
        let dispatcher = dispatcher(connector);
        let prober = LivenessProber::new(&dispatcher);

        let registry = registry_of(&["a", "b", "c"]);
        prober.probe(&registry).await;

        for host in registry.hosts() {
            assert_ne!(registry.status(&host.target()), HostStatus::Unknown);
        }
    }

    #[tokio::test]
    async fn test_uptime_summary_skips_down_hosts() {
        let connector = Arc::new(FakeConnector::new());
        connector.behave("a:22", HostBehavior::Respond("up 2 days".into()));
        connector.behave("b:22", HostBehavior::Unreachable);
        connector.behave("c:22", HostBehavior::Respond("up 1 hour".into()));
        let dispatcher = dispatcher(connector);
        let prober = LivenessProber::new(&dispatcher);

        let registry = registry_of(&["a", "b", "c"]);
        prober.probe(&registry).await;

        let entries = prober.summarize_uptime(&registry).await;
        let shown: Vec<&str> = entries.iter().map(|e| e.host.address.as_str()).collect();
        assert_eq!(shown, vec!["a", "c"]);
        assert_eq!(entries[0].index, 0);
        assert_eq!(entries[1].index, 2);
        assert_eq!(entries[1].uptime, "up 1 hour");
    }
}
