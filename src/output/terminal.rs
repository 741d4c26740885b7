// Operator-facing terminal output

use std::io::IsTerminal;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::{PresentedOutcome, UptimeEntry};
use crate::registry::{HostRegistry, HostStatus};

/// Terminal output manager
pub struct TerminalOutput {
    verbose: bool,
    quiet: bool,
    is_tty: bool,
}

impl TerminalOutput {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        let is_tty = std::io::stdout().is_terminal();

        // Respect NO_COLOR environment variable (https://no-color.org/)
        // Also disable colors if not a TTY
        if std::env::var("NO_COLOR").is_ok() || !is_tty {
            colored::control::set_override(false);
        }

        TerminalOutput {
            verbose,
            quiet,
            is_tty,
        }
    }

    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        println!("{} {}", "[!]".yellow().bold(), message.yellow().bold());
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        println!("{} {}", "[+]".green().bold(), message.green().bold());
    }

    pub fn error(&self, message: &str) {
        println!("{} {}", "[X]".red().bold(), message.red().bold());
    }

    /// Spinner shown while a dispatch is in flight
    pub fn start_wait(&self, message: &str) -> ProgressBar {
        if self.quiet || !self.is_tty {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Host table: ID | Host | SysInfo (cached statuses)
    pub fn print_host_table(&self, registry: &HostRegistry) {
        let rows: Vec<[String; 3]> = registry
            .hosts()
            .iter()
            .enumerate()
            .map(|(idx, host)| {
                let status = match registry.status(&host.target()) {
                    HostStatus::Alive(summary) => summary,
                    HostStatus::Down => "Host Down".to_string(),
                    HostStatus::Unknown => "Unknown".to_string(),
                };
                [idx.to_string(), host.target(), status]
            })
            .collect();

        println!();
        println!("Hosts:");
        println!();
        print_table(&["ID", "Host", "SysInfo"], &rows);
        println!();
    }

    /// Uptime table for the hosts that are not down
    pub fn print_uptime_table(&self, entries: &[UptimeEntry]) {
        if entries.is_empty() {
            self.error("No active hosts");
            println!();
            return;
        }

        self.success("Active Hosts:");
        println!();
        let rows: Vec<[String; 3]> = entries
            .iter()
            .map(|e| [e.index.to_string(), e.host.target(), e.uptime.clone()])
            .collect();
        print_table(&["ID", "Host", "Uptime"], &rows);
        println!();
    }

    /// Per-host output blocks for a command batch
    pub fn print_batch(&self, rows: &[PresentedOutcome], command: &str) {
        for row in rows {
            println!();
            println!(
                "{}",
                format!("[{}] {}: {}", row.index, row.host.target(), command)
                    .green()
                    .bold()
            );
            println!("{}", "-".repeat(80).yellow().bold());

            if row.outcome.succeeded {
                println!("{}", row.outcome.output.magenta().bold());
            } else {
                println!("{}", row.outcome.output.red().bold());
            }
        }
        println!();
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

/// Render an ASCII box table; column widths fit the widest cell
fn print_table(headers: &[&str; 3], rows: &[[String; 3]]) {
    let mut widths = headers.map(str::len);
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .chain(std::iter::once("+".to_string()))
        .collect();

    println!("{}", separator);
    let header_line: String = headers
        .iter()
        .zip(widths.iter())
        .map(|(h, w)| format!("| {:<width$} ", h, width = w))
        .chain(std::iter::once("|".to_string()))
        .collect();
    println!("{}", header_line);
    println!("{}", separator);

    for row in rows {
        // Pad before coloring so ANSI codes don't break alignment
        let id = format!("{:<width$}", row[0], width = widths[0]);
        let host = format!("{:<width$}", row[1], width = widths[1]);
        let rest = format!("{:<width$}", row[2], width = widths[2]);
        println!(
            "| {} | {} | {} |",
            id.yellow().bold(),
            host.green().bold(),
            rest.magenta().bold()
        );
    }
    println!("{}", separator);
}
