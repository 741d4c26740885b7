// Flotilla CLI - Parallel SSH Fleet Command Console

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use flotilla::console::Console;
use flotilla::engine::{ConnectionExecutor, FleetDispatcher};
use flotilla::output::{FleetError, TerminalOutput};
use flotilla::registry::load_credentials;
use flotilla::transport::{SshConnector, TransportSettings};

#[derive(Parser)]
#[command(
    name = "flotilla",
    about = "Parallel SSH fleet command console",
    version,
    disable_colored_help = true,
    term_width = 0,
)]
struct Cli {
    /// Credential file: one 'host[:port] [password]' per line
    #[arg(default_value = "creds.txt")]
    creds: PathBuf,

    /// SSH user for all hosts (defaults to $USER)
    #[arg(short, long)]
    user: Option<String>,

    /// Path to an SSH private key
    #[arg(long)]
    private_key: Option<PathBuf>,

    /// Prompt for a fallback SSH password
    #[arg(short = 'k', long)]
    ask_pass: bool,

    /// Connection timeout in seconds
    #[arg(long, default_value = "2")]
    timeout: u64,

    /// Connection attempts per host
    #[arg(long, default_value = "1")]
    connection_attempts: u32,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only show errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "flotilla=debug"
    } else {
        "flotilla=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), FleetError> {
    let registry = load_credentials(&cli.creds)?;

    let output = Arc::new(Mutex::new(TerminalOutput::new(cli.verbose, cli.quiet)));

    if registry.is_empty() {
        output.lock().error("No hosts in the credential file");
        return Ok(());
    }

    let settings = TransportSettings {
        connect_timeout: Duration::from_secs(cli.timeout),
        connection_attempts: cli.connection_attempts,
    };

    let mut connector = SshConnector::new(settings.clone());
    if let Some(user) = cli.user {
        connector = connector.with_default_user(user);
    }
    if let Some(key) = cli.private_key {
        connector = connector.with_private_key(key.to_string_lossy().into_owned());
    }
    if cli.ask_pass {
        let password = prompt_password()?;
        connector = connector.with_fallback_password(password);
    }

    let connector = Arc::new(connector);
    let executor = Arc::new(ConnectionExecutor::new(connector.clone(), settings));
    let dispatcher = FleetDispatcher::new(executor);

    let console = Console::new(registry, dispatcher, connector, output);
    console.run().await
}

fn prompt_password() -> Result<String, FleetError> {
    eprint!("SSH password: ");
    rpassword::read_password().map_err(|e| FleetError::Io {
        message: format!("Failed to read password: {}", e),
        path: None,
    })
}
