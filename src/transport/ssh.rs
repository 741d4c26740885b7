// ssh2-backed transport

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use ssh2::{KeyboardInteractivePrompt, OpenFlags, OpenType, Session};

use super::{Connector, Transport, TransportSettings};
use crate::output::errors::{transport_suggestion, FleetError};
use crate::registry::Host;

/// Opens SSH sessions with the engine-wide transport settings
#[derive(Clone)]
pub struct SshConnector {
    settings: TransportSettings,
    default_user: Option<String>,
    private_key_path: Option<String>,
    fallback_password: Option<String>,
}

impl SshConnector {
    pub fn new(settings: TransportSettings) -> Self {
        SshConnector {
            settings,
            default_user: None,
            private_key_path: None,
            fallback_password: None,
        }
    }

    pub fn with_default_user(mut self, user: String) -> Self {
        self.default_user = Some(user);
        self
    }

    pub fn with_private_key(mut self, path: String) -> Self {
        self.private_key_path = Some(path);
        self
    }

    /// Password applied to hosts that carry no per-host credential
    pub fn with_fallback_password(mut self, password: String) -> Self {
        self.fallback_password = Some(password);
        self
    }

    fn establish(&self, host: &Host) -> Result<Session, FleetError> {
        let target = host.target();

        let addr = (host.address.as_str(), host.port)
            .to_socket_addrs()
            .map_err(|e| FleetError::Transport {
                host: target.clone(),
                message: format!("Failed to resolve address: {}", e),
                suggestion: Some("Check the host address format".to_string()),
            })?
            .next()
            .ok_or_else(|| FleetError::Transport {
                host: target.clone(),
                message: "Address resolved to nothing".to_string(),
                suggestion: None,
            })?;

        // TCP connection with timeout
        let tcp = TcpStream::connect_timeout(&addr, self.settings.connect_timeout).map_err(
            |e| FleetError::Transport {
                host: target.clone(),
                message: format!("Connection failed: {}", e),
                suggestion: transport_suggestion(&e),
            },
        )?;

        let mut session = Session::new().map_err(|e| FleetError::Transport {
            host: target.clone(),
            message: format!("Failed to create SSH session: {}", e),
            suggestion: None,
        })?;

        session.set_tcp_stream(tcp);
        session.set_timeout(self.settings.connect_timeout.as_millis() as u32);

        session.handshake().map_err(|e| FleetError::Transport {
            host: target.clone(),
            message: format!("SSH handshake failed: {}", e),
            suggestion: Some("Check SSH service is running on the target".to_string()),
        })?;

        let user = self
            .default_user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "root".to_string());

        self.authenticate(&session, host, &user)?;

        tracing::debug!(host = %target, user = %user, "ssh session established");
        Ok(session)
    }

    fn authenticate(&self, session: &Session, host: &Host, user: &str) -> Result<(), FleetError> {
        let mut authenticated = false;

        // The credential file supplies per-host passwords, so try those first
        if let Some(ref password) = host.password {
            authenticated = try_password(session, user, password);
        }

        // Then SSH agent
        if !authenticated {
            if let Ok(mut agent) = session.agent() {
                if agent.connect().is_ok() {
                    agent.list_identities().ok();
                    for identity in agent.identities().unwrap_or_default() {
                        if agent.userauth(user, &identity).is_ok() {
                            authenticated = true;
                            break;
                        }
                    }
                }
            }
        }

        // Then private key files
        if !authenticated {
            let key_paths = self
                .private_key_path
                .iter()
                .map(|p| p.to_string())
                .chain(
                    [
                        dirs::home_dir()
                            .map(|h| h.join(".ssh/id_ed25519").to_string_lossy().to_string()),
                        dirs::home_dir()
                            .map(|h| h.join(".ssh/id_rsa").to_string_lossy().to_string()),
                    ]
                    .into_iter()
                    .flatten(),
                )
                .collect::<Vec<_>>();

            for key_path in key_paths {
                if Path::new(&key_path).exists()
                    && session
                        .userauth_pubkey_file(user, None, Path::new(&key_path), None)
                        .is_ok()
                {
                    authenticated = true;
                    break;
                }
            }
        }

        // Finally the operator-supplied fallback password
        if !authenticated {
            if let Some(ref password) = self.fallback_password {
                authenticated = try_password(session, user, password);
            }
        }

        if !authenticated {
            return Err(FleetError::Transport {
                host: host.target(),
                message: "Authentication failed".to_string(),
                suggestion: Some(
                    "Add a password to the credential line, load a key into the agent, or use --ask-pass"
                        .to_string(),
                ),
            });
        }

        Ok(())
    }
}

fn try_password(session: &Session, user: &str, password: &str) -> bool {
    // Standard password auth, then keyboard-interactive for PAM setups
    if session.userauth_password(user, password).is_ok() {
        return true;
    }
    let mut prompter = PasswordPrompter(password.to_string());
    session
        .userauth_keyboard_interactive(user, &mut prompter)
        .is_ok()
}

/// Run blocking ssh2 work on the blocking thread pool; the async workers
/// stay free for sibling hosts.
async fn offload<T, F>(target: &str, work: F) -> Result<T, FleetError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, FleetError> + Send + 'static,
{
    let target = target.to_string();
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) => Err(FleetError::Transport {
            host: target,
            message: format!("Transport worker failed: {}", e),
            suggestion: None,
        }),
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, host: &Host) -> Result<Box<dyn Transport>, FleetError> {
        let connector = self.clone();
        let owned = host.clone();
        let session = offload(&host.target(), move || connector.establish(&owned)).await?;
        Ok(Box::new(SshSession {
            session,
            target: host.target(),
            sudo_password: host
                .password
                .clone()
                .or_else(|| self.fallback_password.clone()),
        }))
    }

    async fn open_shell(&self, host: &Host) -> Result<(), FleetError> {
        let connector = self.clone();
        let owned = host.clone();
        offload(&host.target(), move || {
            let session = connector.establish(&owned)?;
            // Interactive waits must not hit the 2s session timeout
            session.set_timeout(0);
            run_interactive_shell(&session, &owned.target())
        })
        .await
    }
}

/// One established SSH session. Cloning shares the underlying session,
/// which keeps the blocking-pool handoff cheap.
#[derive(Clone)]
pub struct SshSession {
    session: Session,
    target: String,
    /// Fed to `sudo -S` on the privileged path; without one the host
    /// needs passwordless sudo
    sudo_password: Option<String>,
}

impl SshSession {
    fn exec(&self, command: &str) -> Result<String, FleetError> {
        tracing::debug!(host = %self.target, command, "exec");

        let mut channel =
            self.session
                .channel_session()
                .map_err(|e| FleetError::Transport {
                    host: self.target.clone(),
                    message: format!("Failed to open channel: {}", e),
                    suggestion: None,
                })?;

        channel.exec(command).map_err(|e| FleetError::Transport {
            host: self.target.clone(),
            message: format!("Failed to execute command: {}", e),
            suggestion: None,
        })?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        channel.read_to_string(&mut stdout).ok();
        channel.stderr().read_to_string(&mut stderr).ok();
        channel.wait_close().ok();

        // Warn-only semantics: exit status is not checked. Keep stderr
        // visible after stdout so `2>/dev/null ||` fallbacks still show.
        if !stderr.is_empty() {
            if !stdout.is_empty() && !stdout.ends_with('\n') {
                stdout.push('\n');
            }
            stdout.push_str(&stderr);
        }

        Ok(stdout)
    }

    fn sftp(&self) -> Result<ssh2::Sftp, FleetError> {
        self.session.sftp().map_err(|e| FleetError::Transport {
            host: self.target.clone(),
            message: format!("Failed to open SFTP: {}", e),
            suggestion: None,
        })
    }

    fn exec_privileged(&self, command: &str) -> Result<String, FleetError> {
        // Feed the known password on stdin; otherwise require passwordless sudo
        let wrapped = format!("sudo -S -p '' sh -c {}", shell_quote(command));

        let mut channel =
            self.session
                .channel_session()
                .map_err(|e| FleetError::Transport {
                    host: self.target.clone(),
                    message: format!("Failed to open channel: {}", e),
                    suggestion: None,
                })?;

        channel.exec(&wrapped).map_err(|e| FleetError::Transport {
            host: self.target.clone(),
            message: format!("Failed to execute command: {}", e),
            suggestion: None,
        })?;

        if let Some(ref password) = self.sudo_password {
            channel.write_all(password.as_bytes()).ok();
            channel.write_all(b"\n").ok();
        }
        channel.send_eof().ok();

        let mut stdout = String::new();
        let mut stderr = String::new();
        channel.read_to_string(&mut stdout).ok();
        channel.stderr().read_to_string(&mut stderr).ok();
        channel.wait_close().ok();

        if !stderr.is_empty() {
            if !stdout.is_empty() && !stdout.ends_with('\n') {
                stdout.push('\n');
            }
            stdout.push_str(&stderr);
        }

        Ok(stdout)
    }

    fn put_file(&self, local: &Path, remote: &str, mode: i32) -> Result<(), FleetError> {
        let content = std::fs::read(local).map_err(|e| FleetError::Io {
            message: format!("Failed to read local file: {}", e),
            path: Some(local.to_path_buf()),
        })?;

        let sftp = self.sftp()?;

        let mut remote_file = sftp
            .open_mode(
                Path::new(remote),
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                mode,
                OpenType::File,
            )
            .map_err(|e| FleetError::Transport {
                host: self.target.clone(),
                message: format!("Failed to create remote file: {}", e),
                suggestion: None,
            })?;

        remote_file
            .write_all(&content)
            .map_err(|e| FleetError::Transport {
                host: self.target.clone(),
                message: format!("Failed to write remote file: {}", e),
                suggestion: None,
            })?;

        Ok(())
    }

    fn get_file(&self, remote: &str, local: &Path) -> Result<(), FleetError> {
        let sftp = self.sftp()?;

        let mut remote_file = sftp
            .open(Path::new(remote))
            .map_err(|e| FleetError::Transport {
                host: self.target.clone(),
                message: format!("Failed to open remote file: {}", e),
                suggestion: None,
            })?;

        let mut content = Vec::new();
        remote_file
            .read_to_end(&mut content)
            .map_err(|e| FleetError::Transport {
                host: self.target.clone(),
                message: format!("Failed to read remote file: {}", e),
                suggestion: None,
            })?;

        std::fs::write(local, content).map_err(|e| FleetError::Io {
            message: format!("Failed to write local file: {}", e),
            path: Some(local.to_path_buf()),
        })
    }

    fn launch(&self, command: &str) -> Result<(), FleetError> {
        tracing::debug!(host = %self.target, command, "spawn");

        let mut channel =
            self.session
                .channel_session()
                .map_err(|e| FleetError::Transport {
                    host: self.target.clone(),
                    message: format!("Failed to open channel: {}", e),
                    suggestion: None,
                })?;

        // No pty, and no wait: the remote process must survive this session
        channel.exec(command).map_err(|e| FleetError::Transport {
            host: self.target.clone(),
            message: format!("Failed to launch command: {}", e),
            suggestion: None,
        })?;

        channel.send_eof().ok();
        channel.close().ok();
        Ok(())
    }
}

#[async_trait]
impl Transport for SshSession {
    async fn run(&self, command: &str) -> Result<String, FleetError> {
        let session = self.clone();
        let command = command.to_string();
        offload(&self.target, move || session.exec(&command)).await
    }

    async fn run_privileged(&self, command: &str) -> Result<String, FleetError> {
        let session = self.clone();
        let command = command.to_string();
        offload(&self.target, move || session.exec_privileged(&command)).await
    }

    async fn upload(&self, local: &Path, remote: &str, mode: i32) -> Result<(), FleetError> {
        let session = self.clone();
        let local = local.to_path_buf();
        let remote = remote.to_string();
        offload(&self.target, move || session.put_file(&local, &remote, mode)).await
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), FleetError> {
        let session = self.clone();
        let remote = remote.to_string();
        let local = local.to_path_buf();
        offload(&self.target, move || session.get_file(&remote, &local)).await
    }

    async fn spawn(&self, command: &str) -> Result<(), FleetError> {
        let session = self.clone();
        let command = command.to_string();
        offload(&self.target, move || session.launch(&command)).await
    }
}

/// Quote a string for safe use as a single shell word
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Bridge the local terminal to a remote shell until it closes.
///
/// Line-buffered: stdin is read by a helper thread and forwarded whole
/// lines; no local raw mode, no terminal emulation.
fn run_interactive_shell(session: &Session, target: &str) -> Result<(), FleetError> {
    let mut channel = session.channel_session().map_err(|e| FleetError::Transport {
        host: target.to_string(),
        message: format!("Failed to open channel: {}", e),
        suggestion: None,
    })?;

    channel
        .request_pty("xterm", None, None)
        .map_err(|e| FleetError::Transport {
            host: target.to_string(),
            message: format!("Failed to request pty: {}", e),
            suggestion: None,
        })?;

    channel.shell().map_err(|e| FleetError::Transport {
        host: target.to_string(),
        message: format!("Failed to open shell: {}", e),
        suggestion: None,
    })?;

    let (tx, rx) = std::sync::mpsc::channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.clone()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    session.set_blocking(false);

    let mut buf = [0u8; 4096];
    let mut stdout = std::io::stdout();

    loop {
        let mut activity = false;

        match channel.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                stdout.write_all(&buf[..n]).ok();
                stdout.flush().ok();
                activity = true;
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(_) => break,
        }

        match rx.try_recv() {
            Ok(line) => {
                channel.write_all(line.as_bytes()).ok();
                activity = true;
            }
            Err(std::sync::mpsc::TryRecvError::Empty) => {}
            // stdin closed: ask the remote shell to exit
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                channel.send_eof().ok();
            }
        }

        if channel.eof() {
            break;
        }

        if !activity {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    session.set_blocking(true);
    channel.wait_close().ok();
    Ok(())
}

/// Simple home directory lookup
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

/// Helper for keyboard-interactive authentication
struct PasswordPrompter(String);

impl KeyboardInteractivePrompt for PasswordPrompter {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        // Return the password for each prompt (typically just one "Password:" prompt)
        prompts.iter().map(|_| self.0.clone()).collect()
    }
}
