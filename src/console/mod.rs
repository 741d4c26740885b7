// Interactive operator console
//
// Presentation layer over the fleet engine: menu, host selection, result
// rendering. Engine failures arrive here as data; only operator input
// errors are reported and skipped.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use colored::*;
use parking_lot::Mutex;
use rustyline::completion::FilenameCompleter;
use rustyline::history::DefaultHistory;
use rustyline::{Completer, Editor, Helper, Highlighter, Hinter, Validator};

use crate::engine::{
    present, Batch, ExecutionTask, FleetDispatcher, LivenessProber, PresentedOutcome,
};
use crate::output::errors::FleetError;
use crate::output::terminal::TerminalOutput;
use crate::registry::{Host, HostRegistry};
use crate::transport::Connector;

/// Remote staging path for Script Exec
const SCRIPT_STAGE_PATH: &str = "/tmp/.flotilla_script";

const MENU_ITEMS: [&str; 9] = [
    "List Hosts",
    "Active Hosts",
    "Update Hosts",
    "Run Command",
    "Open Shell",
    "File Upload",
    "File Download",
    "Script Exec",
    "Exit",
];

/// Tab completion of filesystem paths for the local-path prompts
#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct PathCompletion {
    #[rustyline(Completer)]
    completer: FilenameCompleter,
}

pub struct Console {
    registry: HostRegistry,
    dispatcher: FleetDispatcher,
    connector: Arc<dyn Connector>,
    output: Arc<Mutex<TerminalOutput>>,
}

impl Console {
    pub fn new(
        registry: HostRegistry,
        dispatcher: FleetDispatcher,
        connector: Arc<dyn Connector>,
        output: Arc<Mutex<TerminalOutput>>,
    ) -> Self {
        Console {
            registry,
            dispatcher,
            connector,
            output,
        }
    }

    /// Probe the fleet once at startup, then run the menu loop until the
    /// operator exits
    pub async fn run(&self) -> Result<(), FleetError> {
        {
            let out = self.output.lock();
            out.info("Loading hosts...");
        }
        let prober = LivenessProber::new(&self.dispatcher);
        prober.probe(&self.registry).await;

        loop {
            let choice = match self.read_menu_choice() {
                Some(choice) => choice,
                // EOF or interrupt at the menu: leave cleanly
                None => break,
            };

            match choice {
                0 => self.list_hosts(),
                1 => self.active_hosts().await,
                2 => self.update_hosts().await,
                3 => self.mass_command().await,
                4 => self.interactive_shell().await,
                5 => self.upload().await,
                6 => self.download().await,
                7 => self.script_exec().await,
                8 => break,
                _ => {}
            }
        }

        Ok(())
    }

    fn read_menu_choice(&self) -> Option<usize> {
        println!();
        for (num, desc) in MENU_ITEMS.iter().enumerate() {
            println!(
                "{} {}",
                num.to_string().yellow().bold(),
                desc.green().bold()
            );
        }
        println!();
        print!(
            "{}{}{} {}{}{} ",
            "fleet".red().bold(),
            "@".yellow().bold(),
            "flotilla".green().bold(),
            "~".magenta().bold(),
            ":".normal(),
            "#".cyan().bold()
        );
        io::stdout().flush().ok();

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            // Anything unparseable falls back to listing hosts
            Ok(_) => Some(line.trim().parse().unwrap_or(0)),
        }
    }

    fn prompt(&self, label: &str) -> Option<String> {
        print!("{} {}: ", "[+]".green().bold(), label.green().bold());
        io::stdout().flush().ok();

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    /// Prompt for a local path with tab completion. Falls back to the
    /// plain prompt when no line editor can be set up.
    fn prompt_path(&self, label: &str) -> Option<String> {
        let mut editor = match Editor::<PathCompletion, DefaultHistory>::new() {
            Ok(editor) => editor,
            Err(_) => return self.prompt(label),
        };
        editor.set_helper(Some(PathCompletion {
            completer: FilenameCompleter::new(),
        }));

        match editor.readline(&format!("[+] {}: ", label)) {
            Ok(line) => Some(line.trim().to_string()),
            Err(_) => None,
        }
    }

    /// Ask for a host subset; empty input or "all" selects every host
    fn select_hosts(&self) -> Option<Vec<Host>> {
        let input = self.prompt("Hosts id (0 1 2... / all) [default is all]")?;
        match parse_selection(&input, &self.registry) {
            Ok(hosts) => Some(hosts),
            Err(e) => {
                self.output.lock().error(&format!("Invalid host id: {}", e));
                None
            }
        }
    }

    fn list_hosts(&self) {
        self.output.lock().print_host_table(&self.registry);
    }

    async fn active_hosts(&self) {
        let prober = LivenessProber::new(&self.dispatcher);
        let spinner = self.output.lock().start_wait("Please wait...");
        let entries = prober.summarize_uptime(&self.registry).await;
        spinner.finish_and_clear();

        self.output.lock().print_uptime_table(&entries);
    }

    async fn update_hosts(&self) {
        let prober = LivenessProber::new(&self.dispatcher);
        let spinner = self.output.lock().start_wait("Probing hosts...");
        prober.probe(&self.registry).await;
        spinner.finish_and_clear();

        self.output.lock().success("Host List Updated");
    }

    async fn mass_command(&self) {
        let Some(command) = self.prompt("Command to execute") else {
            return;
        };
        if command.is_empty() {
            return;
        }
        let Some(hosts) = self.select_hosts() else {
            return;
        };

        let spinner = self.output.lock().start_wait("Running...");
        let batch = self
            .dispatcher
            .dispatch(&hosts, &ExecutionTask::RunCommand(command.clone()))
            .await;
        spinner.finish_and_clear();

        let out = self.output.lock();
        if batch.all_failed() {
            out.error("No active hosts");
        } else {
            out.print_batch(&present(&batch, &self.registry), &command);
        }
    }

    async fn interactive_shell(&self) {
        let Some(input) = self.prompt("Host id") else {
            return;
        };

        let host = match input
            .parse::<usize>()
            .map_err(|_| FleetError::Selection {
                input: input.clone(),
                message: "expected a single host index".to_string(),
            })
            .and_then(|idx| Ok(self.registry.host_at(idx)?.clone()))
        {
            Ok(host) => host,
            Err(e) => {
                self.output.lock().error(&format!("Invalid host id: {}", e));
                return;
            }
        };

        if let Err(e) = self.connector.open_shell(&host).await {
            self.output.lock().error(&e.to_string());
        }
    }

    async fn upload(&self) {
        let Some(hosts) = self.select_hosts() else {
            return;
        };
        let Some(local) = self.prompt_path("Local path") else {
            return;
        };
        let Some(remote) = self.prompt("Remote path") else {
            return;
        };
        let Some(mode_input) = self.prompt("Mode (octal) [644]") else {
            return;
        };

        let mode = if mode_input.is_empty() {
            0o644
        } else {
            match i32::from_str_radix(&mode_input, 8) {
                Ok(mode) => mode,
                Err(_) => {
                    self.output
                        .lock()
                        .error(&format!("Invalid mode: {}", mode_input));
                    return;
                }
            }
        };

        let task = ExecutionTask::UploadFile {
            local: PathBuf::from(local),
            remote: remote.clone(),
            mode,
        };

        let spinner = self.output.lock().start_wait("Uploading...");
        let batch = self.dispatcher.dispatch(&hosts, &task).await;
        spinner.finish_and_clear();

        self.report_transfer(&batch, &format!("put {}", remote), "Upload Completed");
    }

    async fn download(&self) {
        let Some(hosts) = self.select_hosts() else {
            return;
        };
        let Some(remote) = self.prompt("Remote path") else {
            return;
        };
        let Some(local) = self.prompt_path("Local path") else {
            return;
        };

        let spinner = self.output.lock().start_wait("Downloading...");
        // One local file per host so parallel pulls don't clobber each other
        let pulls = hosts.iter().map(|host| {
            let local_path = if hosts.len() > 1 {
                PathBuf::from(format!("{}.{}", local, host.address))
            } else {
                PathBuf::from(&local)
            };
            let task = ExecutionTask::DownloadFile {
                remote: remote.clone(),
                local: local_path,
            };
            async move {
                self.dispatcher
                    .dispatch(std::slice::from_ref(host), &task)
                    .await
            }
        });
        let outcomes = futures::future::join_all(pulls)
            .await
            .into_iter()
            .flat_map(|batch| batch.iter().cloned().collect::<Vec<_>>())
            .collect();
        spinner.finish_and_clear();

        let batch = Batch::new(outcomes);
        self.report_transfer(&batch, &format!("get {}", remote), "Download Completed");
    }

    /// Render a transfer batch: hosts the transfer missed are always
    /// reported, full per-host output only with -v
    fn report_transfer(&self, batch: &Batch, header: &str, done: &str) {
        let out = self.output.lock();
        if batch.all_failed() {
            out.error("No active hosts");
            return;
        }

        let rows = present(batch, &self.registry);
        if out.verbose() {
            out.print_batch(&rows, header);
        } else {
            for row in failed_rows(&rows) {
                out.error(&format!(
                    "[{}] {}: {}",
                    row.index,
                    row.host.target(),
                    row.outcome.output
                ));
            }
        }
        out.success(done);
    }

    /// Upload a local script to the staging path, then launch it detached
    async fn script_exec(&self) {
        let Some(hosts) = self.select_hosts() else {
            return;
        };
        let Some(local) = self.prompt_path("Local path") else {
            return;
        };

        let spinner = self.output.lock().start_wait("Executing...");
        let upload = self
            .dispatcher
            .dispatch(
                &hosts,
                &ExecutionTask::UploadFile {
                    local: PathBuf::from(local),
                    remote: SCRIPT_STAGE_PATH.to_string(),
                    mode: 0o755,
                },
            )
            .await;

        // Launch only where the script actually landed
        let staged: Vec<Host> = upload
            .iter()
            .filter(|o| o.succeeded)
            .map(|o| o.host.clone())
            .collect();

        if staged.is_empty() {
            spinner.finish_and_clear();
            self.output.lock().error("No active hosts");
            return;
        }

        let launch = self
            .dispatcher
            .dispatch(
                &staged,
                &ExecutionTask::LaunchDetached(SCRIPT_STAGE_PATH.to_string()),
            )
            .await;
        spinner.finish_and_clear();

        let out = self.output.lock();
        for row in failed_rows(&present(&upload, &self.registry)) {
            out.error(&format!("[{}] {}: staging failed", row.index, row.host.target()));
        }
        for row in failed_rows(&present(&launch, &self.registry)) {
            out.error(&format!("[{}] {}: launch failed", row.index, row.host.target()));
        }
        out.success("Execution Completed");
    }
}

/// The rows a batch missed; shown to the operator even without -v
fn failed_rows(rows: &[PresentedOutcome]) -> Vec<&PresentedOutcome> {
    rows.iter().filter(|row| !row.outcome.succeeded).collect()
}

/// Parse a host subset selection: space-separated registry indices, or
/// `all`/empty for the whole fleet
pub fn parse_selection(input: &str, registry: &HostRegistry) -> Result<Vec<Host>, FleetError> {
    let input = input.trim();
    if input.is_empty() || input == "all" {
        return Ok(registry.hosts().to_vec());
    }

    let mut hosts = Vec::new();
    for token in input.split_whitespace() {
        let index: usize = token.parse().map_err(|_| FleetError::Selection {
            input: input.to_string(),
            message: format!("'{}' is not a host index", token),
        })?;
        let host = registry
            .host_at(index)
            .map_err(|e| FleetError::Selection {
                input: input.to_string(),
                message: e.to_string(),
            })?;
        hosts.push(host.clone());
    }
    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_of(names: &[&str]) -> HostRegistry {
        let mut registry = HostRegistry::new();
        for name in names {
            registry.add_host(Host::new(*name)).unwrap();
        }
        registry
    }

    #[test]
    fn test_parse_selection_all() {
        let registry = registry_of(&["a", "b", "c"]);
        assert_eq!(parse_selection("all", &registry).unwrap().len(), 3);
        assert_eq!(parse_selection("", &registry).unwrap().len(), 3);
        assert_eq!(parse_selection("  ", &registry).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_selection_indices() {
        let registry = registry_of(&["a", "b", "c"]);
        let hosts = parse_selection("2 0", &registry).unwrap();
        let addrs: Vec<&str> = hosts.iter().map(|h| h.address.as_str()).collect();
        assert_eq!(addrs, vec!["c", "a"]);
    }

    #[test]
    fn test_parse_selection_out_of_range() {
        let registry = registry_of(&["a"]);
        let err = parse_selection("0 5", &registry).unwrap_err();
        assert!(matches!(err, FleetError::Selection { .. }));
    }

    #[test]
    fn test_parse_selection_garbage_token() {
        let registry = registry_of(&["a"]);
        assert!(parse_selection("zero", &registry).is_err());
    }

    // A transfer that only partly succeeds is not "all failed", and the
    // hosts it missed must surface exactly, in registry order.
    #[test]
    fn test_partial_transfer_failures_are_surfaced() {
        use crate::engine::ExecutionOutcome;

        let registry = registry_of(&["a", "b", "c"]);
        let batch = Batch::new(vec![
            ExecutionOutcome::success(Host::new("a"), "ok"),
            ExecutionOutcome::failure(Host::new("c")),
            ExecutionOutcome::failure(Host::new("b")),
        ]);

        assert!(!batch.all_failed());

        let rows = present(&batch, &registry);
        let missed: Vec<String> = failed_rows(&rows)
            .iter()
            .map(|row| row.host.target())
            .collect();
        assert_eq!(missed, vec!["b:22", "c:22"]);
    }

    #[test]
    fn test_path_prompt_completes_local_paths() {
        use rustyline::completion::Completer as _;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("payload.bin"), b"x").unwrap();

        let completer = FilenameCompleter::new();
        let history = DefaultHistory::new();
        let ctx = rustyline::Context::new(&history);

        let line = format!("{}/pay", dir.path().display());
        let (_, candidates) = completer.complete(&line, line.len(), &ctx).unwrap();

        assert!(candidates
            .iter()
            .any(|c| c.replacement.contains("payload.bin")));
    }
}
