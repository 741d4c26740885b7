// Human-readable error messages for Flotilla

use std::fmt;
use std::io::IsTerminal;
use std::path::PathBuf;

use colored::*;

use crate::registry::RegistryError;

/// Initialize color output based on TTY detection and NO_COLOR environment variable
fn should_use_colors() -> bool {
    // Check NO_COLOR environment variable first (https://no-color.org/)
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    // Check if stderr is a TTY (errors are typically written to stderr)
    std::io::stderr().is_terminal()
}

/// All error types in Flotilla
#[derive(Debug)]
pub enum FleetError {
    /// Transport failures: unreachable host, handshake, auth, session errors
    Transport {
        host: String,
        message: String,
        suggestion: Option<String>,
    },

    /// I/O errors on the local side
    Io {
        message: String,
        path: Option<PathBuf>,
    },

    /// Host registry input-validation failures
    Registry(RegistryError),

    /// Operator supplied an invalid host selection
    Selection { input: String, message: String },

    /// Credential file problems
    Credentials {
        message: String,
        path: PathBuf,
        line: Option<usize>,
    },
}

impl std::error::Error for FleetError {}

impl From<RegistryError> for FleetError {
    fn from(err: RegistryError) -> Self {
        FleetError::Registry(err)
    }
}

impl fmt::Display for FleetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Set color mode based on TTY detection and NO_COLOR
        if !should_use_colors() {
            colored::control::set_override(false);
        }

        match self {
            FleetError::Transport {
                host,
                message,
                suggestion,
            } => {
                writeln!(f, "{}: {}", "TRANSPORT ERROR".red().bold(), message)?;
                writeln!(f, "  {} {}", "Host:".dimmed(), host)?;

                if let Some(suggestion) = suggestion {
                    writeln!(f)?;
                    writeln!(f, "{}: {}", "Hint".yellow().bold(), suggestion)?;
                }

                Ok(())
            }

            FleetError::Io { message, path } => {
                writeln!(f, "{}: {}", "I/O ERROR".red().bold(), message)?;
                if let Some(path) = path {
                    writeln!(f, "  {} {}", "Path:".dimmed(), path.display())?;
                }
                Ok(())
            }

            FleetError::Registry(err) => {
                writeln!(f, "{}: {}", "REGISTRY ERROR".red().bold(), err)
            }

            FleetError::Selection { input, message } => {
                writeln!(f, "{}: {}", "INVALID SELECTION".red().bold(), message)?;
                writeln!(f, "  {} {:?}", "Input:".dimmed(), input)?;
                Ok(())
            }

            FleetError::Credentials {
                message,
                path,
                line,
            } => {
                writeln!(f, "{}: {}", "CREDENTIALS ERROR".red().bold(), message)?;
                write!(f, "  {} {}", "File:".dimmed(), path.display())?;
                if let Some(line) = line {
                    write!(f, ":{}", line)?;
                }
                writeln!(f)?;
                Ok(())
            }
        }
    }
}

/// Suggest common fixes for transport failures
pub fn transport_suggestion(e: &std::io::Error) -> Option<String> {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            Some("Ensure SSH service is running on the target host".to_string())
        }
        std::io::ErrorKind::TimedOut => {
            Some("Check network connectivity and firewall rules".to_string())
        }
        std::io::ErrorKind::PermissionDenied => {
            Some("Check SSH key permissions and authentication".to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = FleetError::Transport {
            host: "10.0.0.5:22".to_string(),
            message: "Connection failed: connection refused".to_string(),
            suggestion: Some("Ensure SSH service is running on the target host".to_string()),
        };

        let output = format!("{}", err);
        // Strip ANSI codes for comparison
        let clean_output = console::strip_ansi_codes(&output);

        assert!(clean_output.contains("Connection failed"));
        assert!(clean_output.contains("10.0.0.5:22"));
        assert!(clean_output.contains("Hint"));
    }

    #[test]
    fn test_credentials_error_carries_location() {
        let err = FleetError::Credentials {
            message: "too many fields".to_string(),
            path: PathBuf::from("creds.txt"),
            line: Some(3),
        };

        let output = format!("{}", err);
        let clean_output = console::strip_ansi_codes(&output);
        assert!(clean_output.contains("creds.txt:3"));
    }
}
