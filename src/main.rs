//! Sente - GTP console for Go engines.
//!
//! Spawns a GTP engine subprocess and routes every command through the
//! dispatch core, the same path a full client would use.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sente::{
    CommandProcessor, Config, EngineCommand, EngineProfile, GtpClient, ProgressIndicator,
    Submission,
};

/// GTP console for Go engines
#[derive(Parser)]
#[command(name = "sente")]
#[command(author, version, long_about = None)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine command line, e.g. "gnugo --mode gtp" (overrides config)
    #[arg(short, long, global = true, env = "SENTE_ENGINE")]
    engine: Option<String>,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open an interactive GTP console (default)
    Console,

    /// Run a single GTP command and exit
    Exec {
        /// The GTP command, e.g. `genmove b`
        command: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    if let Some(engine) = &cli.engine {
        config.engine = parse_engine_override(engine)?;
    }

    match cli.command.unwrap_or(Commands::Console) {
        Commands::Console => run_console(&config),
        Commands::Exec { command } => run_exec(&config, &command.join(" ")),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sente=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sente=warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Split an `--engine` override into a launch profile.
fn parse_engine_override(engine: &str) -> Result<EngineProfile> {
    let mut parts = engine.split_whitespace();
    let program = parts.next().context("--engine must name an executable")?;
    Ok(EngineProfile::new(program).with_args(parts.map(str::to_string).collect()))
}

fn run_console(config: &Config) -> Result<()> {
    let client = Arc::new(GtpClient::spawn(&config.engine)?);
    let processor = CommandProcessor::new()?;
    spawn_display_thread(&processor);

    let stdin = io::stdin();
    loop {
        print!("gtp> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }

        match run_engine_command(&processor, &client, line) {
            Some(output) => println!("{output}"),
            None => println!("? engine unavailable"),
        }
    }

    client.quit();
    processor.shutdown();
    Ok(())
}

fn run_exec(config: &Config, command: &str) -> Result<()> {
    anyhow::ensure!(!command.trim().is_empty(), "no GTP command given");

    let client = Arc::new(GtpClient::spawn(&config.engine)?);
    let processor = CommandProcessor::new()?;
    spawn_display_thread(&processor);

    let result = run_engine_command(&processor, &client, command);
    client.quit();
    processor.shutdown();

    match result {
        Some(output) => {
            println!("{output}");
            if output.starts_with('?') {
                std::process::exit(1);
            }
            Ok(())
        }
        None => anyhow::bail!("engine did not answer"),
    }
}

/// Route one GTP command through the dispatch core and wait for its outcome.
fn run_engine_command(
    processor: &CommandProcessor,
    client: &Arc<GtpClient>,
    line: &str,
) -> Option<String> {
    let command = EngineCommand::new(Arc::clone(client), line).with_progress_display();
    let slot = command.response_slot();

    let (done_tx, done_rx) = mpsc::channel();
    let submission =
        Submission::new(command).on_completion(move |_, success| {
            let _ = done_tx.send(success);
        });

    if let Err(fault) = processor.submit(submission) {
        eprintln!("error: {fault}");
        return None;
    }

    done_rx.recv().ok()?;
    let response = slot.lock().take()?;
    let status = if response.success { '=' } else { '?' };
    Some(format!("{status} {}", response.content))
}

/// Drain progress events on a dedicated thread; the indicator model is only
/// ever touched here.
fn spawn_display_thread(processor: &CommandProcessor) {
    if let Some(events) = processor.take_progress_events() {
        thread::spawn(move || {
            let mut indicator = ProgressIndicator::new();
            let mut last_message = None;
            while let Ok(event) = events.recv() {
                indicator.apply(event);
                let message = indicator.message().map(str::to_string);
                if indicator.visible() && message != last_message {
                    if let Some(message) = &message {
                        tracing::debug!(progress = indicator.progress(), "{message}");
                    }
                    last_message = message;
                }
            }
        });
    }
}
