#![forbid(unsafe_code)]

mod cli;

use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use runboard::config::{BoardConfiguration, OutputFormat};
use runboard::constants::{EXIT_TESTS_FAILED, EXIT_USAGE_ERROR};
use runboard::events::EventStream;
use runboard::output::{HumanRenderer, JsonRenderer};
use runboard::store::{drive, RunStore, StateListener};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(EXIT_USAGE_ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let args = cli::parse_args()?;
    let config = BoardConfiguration::load(args.config.as_deref())?;
    let settings = cli::resolve(&args, &config)?;

    init_logging(&settings.log_level);
    info!("Configuration loaded (format: {:?})", settings.format);

    // First Ctrl+C stops after the current event, a second one exits at once
    let interrupted = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(signal, 1, Arc::clone(&interrupted))
            .context("Failed to install signal handler")?;
        signal_hook::flag::register(signal, Arc::clone(&interrupted))
            .context("Failed to install signal handler")?;
    }

    let reader: Box<dyn BufRead> = match settings.input {
        Some(ref path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open event stream {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    };

    let renderer: Box<dyn StateListener> = match settings.format {
        OutputFormat::Human => Box::new(HumanRenderer::new(
            io::stdout(),
            settings.projection.clone(),
            settings.show_progress,
        )),
        OutputFormat::Json => Box::new(JsonRenderer::new(
            io::stdout(),
            settings.projection.clone(),
            settings.emit,
        )),
    };

    let mut store = RunStore::new();
    store.subscribe(renderer);

    let mut stream = EventStream::new(reader);
    let outcome = drive(&mut store, &mut stream, &interrupted)?;
    store.finish(outcome.interrupted)?;

    info!(
        "Processed {} lines across {} run(s), {} failure(s)",
        stream.line(),
        outcome.runs,
        outcome.failures
    );

    Ok(if outcome.failures > 0 { EXIT_TESTS_FAILED } else { 0 })
}

/// Log to stderr through env_logger; RUST_LOG wins over the configured level
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .try_init();
}
