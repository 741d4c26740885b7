// Credential file loader
//
// Line-oriented format, one host per line:
//   host[:port]
//   host[:port] password
// Hosts without an explicit port are normalized to port 22.

use std::path::Path;

use super::{Host, HostRegistry};
use crate::output::errors::FleetError;

/// Load the host list from a credential file into a fresh registry
pub fn load_credentials(path: &Path) -> Result<HostRegistry, FleetError> {
    let content = std::fs::read_to_string(path).map_err(|e| FleetError::Io {
        message: format!("Failed to read credential file: {}", e),
        path: Some(path.to_path_buf()),
    })?;

    let mut registry = HostRegistry::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let target = fields.next().unwrap_or_default();
        let password = fields.next();

        if fields.next().is_some() {
            return Err(FleetError::Credentials {
                message: "expected 'host' or 'host password'".to_string(),
                path: path.to_path_buf(),
                line: Some(idx + 1),
            });
        }

        let mut host = parse_target(target).map_err(|message| FleetError::Credentials {
            message,
            path: path.to_path_buf(),
            line: Some(idx + 1),
        })?;

        if let Some(password) = password {
            host = host.with_password(password);
        }

        registry.add_host(host).map_err(|e| FleetError::Credentials {
            message: e.to_string(),
            path: path.to_path_buf(),
            line: Some(idx + 1),
        })?;
    }

    Ok(registry)
}

fn parse_target(target: &str) -> Result<Host, String> {
    match target.split_once(':') {
        Some((address, port)) => {
            if address.is_empty() {
                return Err(format!("missing host name in '{}'", target));
            }
            let port: u16 = port
                .parse()
                .map_err(|_| format!("invalid port in '{}'", target))?;
            Ok(Host::new(address).with_port(port))
        }
        None => Ok(Host::new(target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HostStatus;
    use std::io::Write;

    fn write_creds(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_hosts_and_passwords() {
        let file = write_creds("10.0.0.1 hunter2\n10.0.0.2:2222\n\nweb1.example.com\n");
        let registry = load_credentials(file.path()).unwrap();

        let hosts = registry.hosts();
        assert_eq!(hosts.len(), 3);

        assert_eq!(hosts[0].target(), "10.0.0.1:22");
        assert_eq!(hosts[0].password.as_deref(), Some("hunter2"));

        assert_eq!(hosts[1].target(), "10.0.0.2:2222");
        assert_eq!(hosts[1].password, None);

        assert_eq!(hosts[2].target(), "web1.example.com:22");
        assert_eq!(registry.status("web1.example.com:22"), HostStatus::Unknown);
    }

    #[test]
    fn test_port_defaults_to_22() {
        let file = write_creds("somewhere\n");
        let registry = load_credentials(file.path()).unwrap();
        assert_eq!(registry.hosts()[0].port, 22);
    }

    #[test]
    fn test_invalid_port_reports_line() {
        let file = write_creds("ok.example.com\nbad.example.com:notaport\n");
        let err = load_credentials(file.path()).unwrap_err();
        match err {
            FleetError::Credentials { line, .. } => assert_eq!(line, Some(2)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_too_many_fields_rejected() {
        let file = write_creds("host secret extra\n");
        assert!(load_credentials(file.path()).is_err());
    }

    #[test]
    fn test_duplicate_line_rejected() {
        let file = write_creds("10.0.0.1\n10.0.0.1:22\n");
        let err = load_credentials(file.path()).unwrap_err();
        match err {
            FleetError::Credentials { line, .. } => assert_eq!(line, Some(2)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_credentials(Path::new("/nonexistent/creds.txt")).unwrap_err();
        assert!(matches!(err, FleetError::Io { .. }));
    }
}
