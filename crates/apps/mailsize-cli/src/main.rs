//! mailsize - Per-label storage statistics for a Gmail mailbox
//!
//! Lists every message of the mailbox page by page, fetches the size
//! estimate and labels of each message and prints how much space each
//! user label takes. Progress is checkpointed after every page; rerunning
//! with the same snapshot resumes where the previous run stopped.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use mailsize::{
    AggregationState, CancelFlag, CredentialProvider, FileCheckpointStore, GmailAuth,
    GmailClient, GmailCredentials, ScanError, ScanOptions, ScanOutcome, Scanner, Termination,
    load_or_create_state, stat_line, summary_lines,
};

#[derive(Debug, Parser)]
#[command(
    name = "mailsize",
    version,
    about = "Per-label storage statistics for a Gmail mailbox"
)]
struct Cli {
    /// Checkpoint file; created on the first run and resumed from afterwards
    #[arg(short = 's', long)]
    snapshot: PathBuf,

    /// Message ids requested per listing page; a checkpoint is written after each page
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u32).range(1..=500))]
    messages_per_page: Option<u32>,

    /// Messages fetched in parallel
    #[arg(short = 'c', long, alias = "message-fetching-concurrency")]
    concurrency: Option<usize>,

    /// OAuth client credentials file (Google Cloud Console JSON)
    #[arg(short = 'C', long)]
    credentials: Option<PathBuf>,

    /// OAuth token cache
    #[arg(short = 'T', long)]
    token: Option<PathBuf>,

    /// OAuth scope to request; repeat for several (default: gmail.readonly)
    #[arg(short = 'S', long = "scopes")]
    scopes: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = config::Settings::load().context("Failed to load settings")?;
    let options = ScanOptions {
        page_size: cli.messages_per_page.unwrap_or(settings.page_size),
        concurrency: cli.concurrency.unwrap_or(settings.concurrency).max(1),
    };

    let store = FileCheckpointStore::new(&cli.snapshot);
    let mut state = load_or_create_state(&store, options.page_size)?;

    // A finished checkpoint is replayed without touching the network
    if state.completed {
        info!("Stat loaded (done):");
        print_summary(&state);
        return Ok(());
    }

    let credentials_file = cli.credentials.or(settings.credentials_file.clone());
    let credentials = GmailCredentials::load(credentials_file.as_deref()).map_err(|e| {
        if let Some(path) = GmailCredentials::default_credentials_path() {
            warn!(
                "To configure Gmail access, either:\n\
                 1. Place your Google OAuth credentials at: {}\n\
                 2. Or set environment variables: GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                path.display()
            );
        }
        ScanError::Credential(e)
    })?;

    let token_path = cli
        .token
        .or_else(|| settings.token_path())
        .context("Could not determine where to cache the OAuth token")?;
    let mut auth = GmailAuth::new(credentials, token_path);
    if !cli.scopes.is_empty() {
        auth = auth.with_scopes(cli.scopes);
    }
    let auth = Arc::new(auth);

    // Authorize before any scanning so a bad setup fails fast
    auth.acquire().map_err(ScanError::Credential)?;
    info!("Gmail client initialized successfully");

    let client = GmailClient::new(auth, Duration::from_secs(settings.request_timeout_secs));

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current chunk");
        handler_flag.cancel();
    })
    .context("Failed to install interrupt handler")?;

    if state.processed_count > 0 {
        info!("Stat loaded:");
        print_summary(&state);
    }

    let scanner = Scanner::new(&client, &store, options).with_cancel_flag(cancel);
    match scanner.run(&mut state) {
        Ok(ScanOutcome::AlreadyComplete) => info!("Stat loaded (done):"),
        Ok(ScanOutcome::Completed(Termination::EndOfList)) => info!("Processing done:"),
        Ok(ScanOutcome::Completed(Termination::CursorStalled)) => {
            warn!("Listing stopped on a stalled cursor, totals may be incomplete:")
        }
        Ok(ScanOutcome::Interrupted) => info!("Processing interrupted, stat so far:"),
        Err(e) => {
            info!("Stat so far:");
            print_summary(&state);
            return Err(anyhow::Error::new(e).context(format!(
                "Scan failed; rerun with --snapshot {} to resume",
                cli.snapshot.display()
            )));
        }
    }

    print_summary(&state);
    Ok(())
}

fn print_summary(state: &AggregationState) {
    for line in summary_lines(state) {
        println!("{}", line);
    }
    info!("{}", stat_line(state));
}
