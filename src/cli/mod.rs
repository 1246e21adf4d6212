//! CLI argument parsing and validation module
//!
//! Handles command-line interface using clap, including:
//! - Event stream input (file or stdin)
//! - Visibility toggles for passed/failed/pending/skipped tests
//! - Output format selection (human/JSON) and JSON emit mode
//! - Config file, grep link base and logging level overrides

use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use runboard::config::{BoardConfiguration, EmitMode, OutputFormat};
use runboard::models::TestState;
use runboard::view::ProjectionOptions;

/// Arguments exactly as given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub input: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub json: bool,
    pub emit: Option<EmitMode>,
    pub hide: Vec<TestState>,
    pub quiet: bool,
    pub no_progress: bool,
    pub base_url: Option<String>,
    pub log_level: Option<String>,
}

/// Effective settings after layering CLI flags over the config file
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub input: Option<PathBuf>,
    pub projection: ProjectionOptions,
    pub format: OutputFormat,
    pub emit: EmitMode,
    pub show_progress: bool,
    pub log_level: String,
}

fn build_command() -> Command {
    Command::new("runboard")
        .version(env!("RUNBOARD_VERSION"))
        .long_version(concat!(env!("RUNBOARD_VERSION"), " (", env!("GIT_HASH"), ")"))
        .about("Live dashboard for test-runner event streams")
        .long_about("Reads a newline-delimited JSON stream of test-runner lifecycle events and renders pass/fail/pending state per test, grouped by suite path.\n\nThe first Ctrl+C stops at the next event and renders the partial run; a second one exits immediately.")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Read events from FILE instead of stdin")
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a TOML config file")
        )
        .arg(
            Arg::new("json")
                .short('j')
                .long("json")
                .help("Output in JSON format")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("emit")
                .long("emit")
                .value_name("WHEN")
                .value_parser(["final", "every"])
                .help("With --json, emit only the final view or one view per change")
        )
        .arg(
            Arg::new("hide")
                .long("hide")
                .value_name("STATE")
                .help("Hide tests in STATE (passed, failed, pending, skipped)")
                .action(ArgAction::Append)
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress the live progress line and informational logs")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .help("Do not draw the live progress line")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .value_name("URL")
                .help("Prefix for suite grep links")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["off", "error", "warn", "info", "debug", "trace"])
                .help("Log level for diagnostics on stderr (RUST_LOG overrides)")
        )
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an explicit iterator
pub fn parse_args_from<I, T>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command().get_matches_from(args);
    from_matches(&matches)
}

fn from_matches(matches: &ArgMatches) -> Result<CliArgs> {
    // Validate the input path if provided
    let input = match matches.get_one::<String>("input") {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.is_file() {
                return Err(anyhow!("Input file does not exist: {}", path_str));
            }
            Some(path.to_path_buf())
        }
        None => None,
    };

    let hide = matches
        .get_many::<String>("hide")
        .map(|values| {
            values
                .map(|value| value.parse::<TestState>().map_err(|e| anyhow!(e)))
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?
        .unwrap_or_default();

    let emit = matches.get_one::<String>("emit").map(|value| match value.as_str() {
        "every" => EmitMode::Every,
        _ => EmitMode::Final,
    });

    Ok(CliArgs {
        input,
        config: matches.get_one::<String>("config").map(PathBuf::from),
        json: matches.get_flag("json"),
        emit,
        hide,
        quiet: matches.get_flag("quiet"),
        no_progress: matches.get_flag("no-progress"),
        base_url: matches.get_one::<String>("base-url").cloned(),
        log_level: matches.get_one::<String>("log-level").cloned(),
    })
}

/// Layer CLI flags over the loaded configuration
pub fn resolve(args: &CliArgs, config: &BoardConfiguration) -> Result<RunSettings> {
    let mut projection = config.projection_options();
    for state in &args.hide {
        projection.visibility.hide(*state);
    }
    if projection.visibility.is_empty() {
        return Err(anyhow!("Every test state is hidden; nothing would be shown"));
    }
    if let Some(ref base_url) = args.base_url {
        projection.base_url = base_url.clone();
    }

    let format = if args.json {
        OutputFormat::Json
    } else {
        config.output.format
    };

    // The progress line only makes sense for humans watching a terminal
    let show_progress = format == OutputFormat::Human
        && config.display.progress
        && !args.no_progress
        && !args.quiet
        && std::io::stderr().is_terminal();

    let log_level = match (&args.log_level, args.quiet) {
        (Some(level), _) => level.clone(),
        (None, true) => "error".to_string(),
        (None, false) => config.logging.level.clone(),
    };

    Ok(RunSettings {
        input: args.input.clone(),
        projection,
        format,
        emit: args.emit.unwrap_or(config.output.emit),
        show_progress,
        log_level,
    })
}
