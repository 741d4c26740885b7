// Host registry: the known fleet and its cached liveness

mod creds;

pub use creds::load_credentials;

use dashmap::DashMap;
use thiserror::Error;

/// Default SSH port applied when a credential line carries no explicit port
pub const DEFAULT_PORT: u16 = 22;

/// Registry-level input-validation failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("host '{0}' is already registered")]
    DuplicateHost(String),

    #[error("no host registered at '{0}'")]
    UnknownHost(String),

    #[error("host index {index} is out of range (registry holds {count} hosts)")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Cached reachability of a host, refreshed only by an explicit probe
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostStatus {
    #[default]
    Unknown,
    /// Reachable; carries the system summary reported by the probe
    Alive(String),
    Down,
}

impl HostStatus {
    pub fn is_down(&self) -> bool {
        matches!(self, HostStatus::Down)
    }
}

/// A single remote target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub address: String,
    pub port: u16,
    /// Per-host password; absence means key or agent auth is expected
    pub password: Option<String>,
}

impl Host {
    pub fn new(address: impl Into<String>) -> Self {
        Host {
            address: address.into(),
            port: DEFAULT_PORT,
            password: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// The connection target string; this is the host's identity
    pub fn target(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Insertion-ordered host store with per-host liveness.
///
/// The host list is fixed after startup; statuses live in a map keyed by
/// target so concurrent probe workers write disjoint entries. Only the
/// liveness prober mutates status.
#[derive(Debug, Default)]
pub struct HostRegistry {
    hosts: Vec<Host>,
    statuses: DashMap<String, HostStatus>,
}

impl HostRegistry {
    pub fn new() -> Self {
        HostRegistry::default()
    }

    /// Register a host. The registry holds no duplicate targets.
    pub fn add_host(&mut self, host: Host) -> Result<(), RegistryError> {
        let target = host.target();
        if self.statuses.contains_key(&target) {
            return Err(RegistryError::DuplicateHost(target));
        }
        self.statuses.insert(target, HostStatus::Unknown);
        self.hosts.push(host);
        Ok(())
    }

    /// Hosts in insertion order; the index operators use to select hosts
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn host_at(&self, index: usize) -> Result<&Host, RegistryError> {
        self.hosts.get(index).ok_or(RegistryError::IndexOutOfRange {
            index,
            count: self.hosts.len(),
        })
    }

    /// Registry position of a target, if registered
    pub fn index_of(&self, target: &str) -> Option<usize> {
        self.hosts.iter().position(|h| h.target() == target)
    }

    pub fn status(&self, target: &str) -> HostStatus {
        self.statuses
            .get(target)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn set_status(&self, target: &str, status: HostStatus) -> Result<(), RegistryError> {
        match self.statuses.get_mut(target) {
            Some(mut entry) => {
                *entry = status;
                Ok(())
            }
            None => Err(RegistryError::UnknownHost(target.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_target() {
        let host = Host::new("192.168.1.10").with_port(2222);
        assert_eq!(host.target(), "192.168.1.10:2222");
        assert_eq!(Host::new("web1").target(), "web1:22");
    }

    #[test]
    fn test_duplicate_host_rejected() {
        let mut registry = HostRegistry::new();
        registry.add_host(Host::new("10.0.0.1")).unwrap();

        let err = registry.add_host(Host::new("10.0.0.1")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateHost("10.0.0.1:22".to_string()));

        // No partial mutation
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_address_different_port_allowed() {
        let mut registry = HostRegistry::new();
        registry.add_host(Host::new("10.0.0.1")).unwrap();
        registry
            .add_host(Host::new("10.0.0.1").with_port(2222))
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_insertion_order_and_indexing() {
        let mut registry = HostRegistry::new();
        registry.add_host(Host::new("a")).unwrap();
        registry.add_host(Host::new("b")).unwrap();
        registry.add_host(Host::new("c")).unwrap();

        assert_eq!(registry.host_at(1).unwrap().address, "b");
        assert_eq!(registry.index_of("c:22"), Some(2));
        assert_eq!(
            registry.host_at(3).unwrap_err(),
            RegistryError::IndexOutOfRange { index: 3, count: 3 }
        );
    }

    #[test]
    fn test_status_defaults_to_unknown() {
        let mut registry = HostRegistry::new();
        registry.add_host(Host::new("a")).unwrap();
        assert_eq!(registry.status("a:22"), HostStatus::Unknown);
    }

    #[test]
    fn test_set_status_unknown_host() {
        let registry = HostRegistry::new();
        let err = registry
            .set_status("ghost:22", HostStatus::Down)
            .unwrap_err();
        assert_eq!(err, RegistryError::UnknownHost("ghost:22".to_string()));
    }

    #[test]
    fn test_set_status_roundtrip() {
        let mut registry = HostRegistry::new();
        registry.add_host(Host::new("a")).unwrap();
        registry
            .set_status("a:22", HostStatus::Alive("Linux a".to_string()))
            .unwrap();
        assert_eq!(
            registry.status("a:22"),
            HostStatus::Alive("Linux a".to_string())
        );
    }
}
