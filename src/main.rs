use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tailpage::config::{self, ViewerConfig};
use tailpage::discovery;
use tailpage::filter::string_filter::{ContainsExact, ContainsIgnoreCase};
use tailpage::filter::LinePredicate;
use tailpage::{logging, CollectionEvent, LogViewController};

/// How long to wait for background work before giving up
const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "tailpage", version)]
#[command(about = "Page through large and live application logs", long_about = None)]
struct Args {
    /// Config file to use instead of discovering tailpage.yaml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the log files
    #[arg(long, value_name = "DIR")]
    logs_dir: Option<PathBuf>,

    /// Application name; log files are named <APP>_Logs_*.txt
    #[arg(long, value_name = "NAME")]
    app: Option<String>,

    /// Log file currently being written (read with streaming)
    #[arg(long, value_name = "FILE")]
    active: Option<PathBuf>,

    /// Show this file instead of the newest discovered one
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Only show lines containing this text
    #[arg(long, value_name = "TEXT")]
    filter: Option<String>,

    /// Match --filter case-sensitively
    #[arg(long)]
    case_sensitive: bool,

    /// Number of pages to print
    #[arg(long, default_value_t = 1, value_name = "N")]
    pages: usize,

    /// Lines per page
    #[arg(long, value_name = "N")]
    page_size: Option<usize>,

    /// List discovered log files, newest first, and exit
    #[arg(long)]
    list: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn load_config(args: &Args) -> Result<ViewerConfig> {
    let mut config = match &args.config {
        Some(path) => config::load_single_file(path)?,
        None => config::load(&config::discover())?,
    };

    if let Some(dir) = &args.logs_dir {
        config.logs_dir = Some(config::loader::expand_path(dir));
    }
    if let Some(app) = &args.app {
        config.app_name = Some(app.clone());
    }
    if let Some(active) = &args.active {
        config.active_log = Some(active.clone());
    }
    if let Some(page_size) = args.page_size {
        if page_size == 0 {
            bail!("--page-size must be greater than 0");
        }
        config.page_size = page_size;
    }
    // One-shot output: nothing to refresh
    config.watch = false;
    Ok(config)
}

fn list_files(config: &ViewerConfig) -> Result<()> {
    let dir = config
        .logs_dir
        .as_deref()
        .context("--list needs --logs-dir or logs_dir in the config")?;
    let app = config
        .app_name
        .as_deref()
        .context("--list needs --app or app_name in the config")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for file in discovery::find_log_files(dir, app)? {
        writeln!(out, "{}\t{}", file.size, file.path.display())?;
    }
    out.flush()?;
    Ok(())
}

/// Print reported failures; returns how many there were
fn report(events: &[CollectionEvent]) -> usize {
    let mut failures = 0;
    for event in events {
        if let CollectionEvent::Error(e) = event {
            eprintln!("error: {}", e);
            failures += 1;
        }
    }
    failures
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            if let Some(config_err) = e.downcast_ref::<config::ConfigError>() {
                eprint!("{}", config_err);
            } else {
                eprintln!("error: {:#}", e);
            }
            std::process::exit(1);
        }
    };

    logging::init(args.debug, config.log_level.as_deref());

    if args.list {
        return list_files(&config);
    }

    let predicate: Arc<dyn LinePredicate> = if args.case_sensitive {
        Arc::new(ContainsExact)
    } else {
        Arc::new(ContainsIgnoreCase)
    };
    let mut controller = LogViewController::with_predicate(&config, predicate);
    if let Some(file) = &args.file {
        controller.select_file(Some(file.clone()));
    } else if controller.load_log_files()? == 0 {
        bail!("No log files found");
    }

    let mut failures = report(&controller.wait_settled(SETTLE_TIMEOUT));

    if let Some(filter) = &args.filter {
        let now = Instant::now();
        controller.set_search_text(filter, now);
        failures += report(&controller.pump(now + config.debounce));
        failures += report(&controller.wait_settled(SETTLE_TIMEOUT));
    }

    for _ in 1..args.pages {
        if !controller.load_more() {
            break;
        }
        failures += report(&controller.wait_settled(SETTLE_TIMEOUT));
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for line in controller.lines() {
        writeln!(out, "{}", line.text())?;
    }
    out.flush()?;

    controller.dispose();
    if failures > 0 {
        bail!("{} error(s) while reading logs", failures);
    }
    Ok(())
}
