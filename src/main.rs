//! ftpgrep: search the files of a remote FTP tree for terms, live.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ftpgrep::{Config, CrawlRequest, JobStore, JobUpdate, JobWatcher};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "ftpgrep")]
#[command(about = "Search the files of a remote FTP tree for terms")]
#[command(version)]
struct Cli {
    /// FTP host, optionally with :port
    host: String,

    /// Remote directory to start from
    path: String,

    /// Comma-separated search terms (case-insensitive regular expressions)
    terms: String,

    /// FTP user
    #[arg(short, long, default_value = "anonymous")]
    user: String,

    /// FTP password
    #[arg(short, long, env = "FTPGREP_PASSWORD", hide_env_values = true, default_value = "anonymous")]
    password: String,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File extension to search (repeatable); overrides the configured set
    #[arg(short, long = "ext")]
    ext: Vec<String>,

    /// Directory levels below the path to descend
    #[arg(long)]
    max_depth: Option<usize>,

    /// Print every update as one JSON line
    #[arg(long)]
    json: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if !cli.ext.is_empty() {
        config.crawl.extensions = cli.ext.clone();
    }
    if cli.max_depth.is_some() {
        config.crawl.max_depth = cli.max_depth;
    }
    config.validate()?;

    ftpgrep::logging::init(&config.logging, cli.verbose)
        .map_err(|e| anyhow::anyhow!("cannot initialise logging: {e}"))?;

    let store = Arc::new(JobStore::new(config.jobs.clone()));
    store.spawn_sweeper();

    let request = CrawlRequest::new(&cli.host, &cli.user, &cli.password, &cli.path, &cli.terms);
    let options = config.crawl.options()?;
    let id = store
        .start(Arc::new(config.crawl.connector()), request, options)
        .context("cannot start crawl")?;
    let job = store.lookup(&id).context("job vanished right after start")?;
    info!("job {} running", id);

    {
        let job = Arc::clone(&job);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received, cancelling job {}", job.id());
                job.cancel();
            }
        });
    }

    let mut watcher = JobWatcher::new(job, config.jobs.heartbeat());
    let mut failed = false;
    let stdout = std::io::stdout();
    while let Some(update) = watcher.next().await {
        failed |= matches!(update, JobUpdate::Failed { .. });
        let mut out = stdout.lock();
        if cli.json {
            writeln!(out, r#"{{"event":"{}","data":{}}}"#, update.event_name(), update.to_json()?)?;
        } else {
            print_human(&mut out, &update)?;
        }
        out.flush()?;
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn print_human(out: &mut impl Write, update: &JobUpdate) -> std::io::Result<()> {
    match update {
        JobUpdate::Connected { job_id } => eprintln!("job {job_id}"),
        JobUpdate::Progress { scanned_files, matched_files } => {
            eprint!("\rscanned {scanned_files}, matched {matched_files}");
        }
        JobUpdate::MatchFound(file) => {
            let terms: Vec<String> = file.terms.iter().map(ToString::to_string).collect();
            eprint!("\r");
            writeln!(out, "{}: {}", file.path, terms.join(", "))?;
        }
        JobUpdate::Complete(results) => {
            eprintln!();
            eprintln!(
                "{} of {} files matched, {} terms, {:.2}s",
                results.total_files, results.files_scanned, results.total_terms, results.duration_secs
            );
        }
        JobUpdate::Failed { message } => {
            eprintln!();
            eprintln!("error: {message}");
        }
    }
    Ok(())
}
