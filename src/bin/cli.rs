//! pagewatch CLI
//!
//! One invocation per scheduler tick. Exit code 0 on success, 1 when the run
//! failed, 2 when escalation itself failed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Local;
use clap::{Parser, Subcommand};
use pagewatch::{
    error::{AppError, Result},
    models::{Config, SearchSpec},
    notify::{Notifier, PushoverCredentials, PushoverNotifier, SmtpMailer},
    pipeline::{self, ErrorEscalationTracker, EscalationSchedule, Watcher},
    services::{HttpSession, build_extractor},
};
use regex::Regex;

/// pagewatch - page change poller
#[derive(Parser, Debug)]
#[command(
    name = "pagewatch",
    version,
    about = "Polls pages, reports new results, and escalates failures with backoff"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one monitored pass (default)
    Run,

    /// Validate configuration and searches without touching the network
    Validate,

    /// Show the error escalation ledger
    Ledger,

    /// Remove old files
    Prune {
        /// Directory to prune (default: retention.dir)
        dir: Option<PathBuf>,

        /// Maximum file age in days (default: retention.max_age_days)
        #[arg(long)]
        days: Option<u64>,

        /// Only remove files whose name matches this regex
        #[arg(long)]
        pattern: Option<String>,
    },
}

/// Writes log lines to stderr and to the log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn open_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize logging based on verbosity flag, teeing to `log_file` if set.
fn init_logging(verbose: bool, log_file: Option<&Path>) {
    let level = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {:<5} {}:{} {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("-"),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    let mut file_error = None;
    if let Some(path) = log_file {
        match open_log(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
            }
            Err(e) => file_error = Some((path.to_path_buf(), e)),
        }
    }
    builder.init();

    if let Some((path, e)) = file_error {
        log::warn!("Cannot open log file {}: {e}", path.display());
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let log_file = loaded
        .as_ref()
        .ok()
        .and_then(|config| config.paths.log_file.clone());
    init_logging(cli.verbose, log_file.as_deref());

    let config = loaded.unwrap_or_else(|e| {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        );
        Config::default()
    });

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => return run(&config),
        Command::Validate => validate(&config),
        Command::Ledger => show_ledger(&config),
        Command::Prune { dir, days, pattern } => prune(&config, dir, days, pattern),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e.report());
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> ExitCode {
    log::info!("Starting {} watcher", config.site.name);

    let mailer = SmtpMailer::new(&config.notify.smtp, &config.notify.email);
    if let Err(e) = &mailer {
        log::warn!("Mailer unavailable: {}", e.report());
    }
    let mailer: Option<&dyn Notifier> = mailer.as_ref().ok().map(|m| m as &dyn Notifier);

    let outcome = pipeline::run_with_escalation(config, mailer, || {
        config.validate()?;
        if config.notify.email_notifications && mailer.is_none() {
            return Err(AppError::config(
                "email notifications are on but the mailer could not be built",
            ));
        }

        let session = HttpSession::new(&config.http)?;
        let push = if config.notify.push_notifications {
            let credentials = PushoverCredentials::resolve(&config.notify.pushover)?;
            Some(PushoverNotifier::new(session.client().clone(), credentials))
        } else {
            None
        };

        let mut watcher = Watcher::new(config, &session);
        if let Some(mailer) = mailer {
            watcher = watcher.with_mailer(mailer);
        }
        if let Some(push) = &push {
            watcher = watcher.with_push(push);
        }
        watcher.run_once()
    });

    let code = outcome.exit_code();
    log::info!("Done (exit code {code})");
    ExitCode::from(code as u8)
}

fn validate(config: &Config) -> Result<()> {
    log::info!("Validating configuration...");
    config.validate()?;
    EscalationSchedule::new(config.escalation.schedule.clone())?;
    build_extractor(&config.site)?;
    log::info!("✓ Config OK ({:?} extractor)", config.site.kind);

    let searches = SearchSpec::load_all(&config.paths.searches_file)?;
    log::info!(
        "✓ {} search(es) in {}",
        searches.len(),
        config.paths.searches_file.display()
    );
    for search in &searches {
        log::info!("    {} -> {}", search.title, search.search_url);
    }

    log::info!("All validations passed!");
    Ok(())
}

fn show_ledger(config: &Config) -> Result<()> {
    let schedule = EscalationSchedule::new(config.escalation.schedule.clone())?;
    let tracker = ErrorEscalationTracker::new(&config.paths.ledger_file, schedule.clone());
    let ledger = tracker.load()?;

    log::info!("Ledger: {}", tracker.path().display());
    if ledger.is_empty() {
        log::info!("No failures since the last successful run.");
        return Ok(());
    }

    log::info!("Failures this streak: {}", ledger.error.len());
    if let Some(first) = ledger.error.first() {
        log::info!("First failure: {}", first.to_rfc3339());
    }
    log::info!("Error emails sent: {}", ledger.error_sent.len());
    if let Some(last) = ledger.error_sent.last() {
        log::info!("Last error email: {}", last.to_rfc3339());
    }
    log::info!(
        "Next error email due after {} day(s) ({} elapsed)",
        schedule.threshold(ledger.error_sent.len()),
        ledger.days_since_last_send(Local::now())
    );
    Ok(())
}

fn prune(
    config: &Config,
    dir: Option<PathBuf>,
    days: Option<u64>,
    pattern: Option<String>,
) -> Result<()> {
    let retention = &config.retention;
    let dir = dir
        .or_else(|| retention.dir.clone())
        .ok_or_else(|| AppError::config("no directory given and retention.dir unset"))?;
    let days = days.unwrap_or(retention.max_age_days);
    let pattern = pattern
        .or_else(|| retention.pattern.clone())
        .map(|p| Regex::new(&p))
        .transpose()?;

    let removed = pipeline::prune(&dir, days, pattern.as_ref())?;
    log::info!("Removed {removed} file(s) from {}", dir.display());
    Ok(())
}
