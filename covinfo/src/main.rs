//! # covinfo
//!
//! A CLI tool that collects compiler coverage data from a build tree into an
//! LCOV tracefile.
//!
//! ## Overview
//!
//! covinfo is built on top of covinfolib. It searches the given directories
//! for raw coverage data files (`.da`), runs `gcov` on each of them and writes
//! the per-line and per-function results as LCOV records.
//!
//! ## Usage
//!
//! ```bash
//! # One <file>.da.info per data file
//! covinfo build/
//!
//! # A single tracefile for several directories
//! covinfo build/lib build/app -o app.info -t unit_tests
//!
//! # Write to stdout (progress messages are suppressed)
//! covinfo build/ -o - | genhtml -o html -
//!
//! # Use a cross toolchain's gcov
//! covinfo build/ --gcov-tool arm-none-eabi-gcov
//! ```

use std::env;
use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use covinfolib::{
    install_interrupt_handler, CovinfoError, Driver, ExtractOptions, FilterConfig, GcovAnnotator,
    OutputTarget, RunSummary, DEFAULT_GCOV_TOOL,
};
use tracing_subscriber::EnvFilter;

/// Exit status for usage and input errors.
const EXIT_USAGE: u8 = 1;
/// Exit status for errors while processing coverage data.
const EXIT_FATAL: u8 = 2;

/// Build the clap Command structure
fn build_command() -> Command {
    Command::new("covinfo")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Arthur Debert")
        .about("Collect compiler coverage data into an LCOV tracefile")
        .arg(
            Arg::new("directory")
                .help("Directories to search for .da files")
                .value_name("DIRECTORY")
                .required(true)
                .num_args(1..),
        )
        .arg(
            Arg::new("test-name")
                .short('t')
                .long("test-name")
                .value_name("NAME")
                .default_value("")
                .hide_default_value(true)
                .help("Test name written to the TN: line of every record"),
        )
        .arg(
            Arg::new("output-filename")
                .short('o')
                .long("output-filename")
                .value_name("FILE")
                .help("Write all records to FILE ('-' for stdout) instead of one .info per data file"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Do not print progress messages"),
        )
        .arg(
            Arg::new("gcov-tool")
                .long("gcov-tool")
                .value_name("TOOL")
                .default_value(DEFAULT_GCOV_TOOL)
                .help("Annotation tool to invoke"),
        )
        .arg(
            Arg::new("include")
                .short('i')
                .long("include")
                .value_name("GLOB")
                .action(ArgAction::Append)
                .help("Only process data files matching glob pattern"),
        )
        .arg(
            Arg::new("exclude")
                .short('e')
                .long("exclude")
                .value_name("GLOB")
                .action(ArgAction::Append)
                .help("Skip data files matching glob pattern"),
        )
}

/// Build filter config from matches
fn build_filter(matches: &ArgMatches) -> covinfolib::Result<FilterConfig> {
    let mut filter = FilterConfig::new();

    if let Some(includes) = matches.get_many::<String>("include") {
        for pattern in includes {
            filter = filter.include(pattern)?;
        }
    }

    if let Some(excludes) = matches.get_many::<String>("exclude") {
        for pattern in excludes {
            filter = filter.exclude(pattern)?;
        }
    }

    Ok(filter)
}

/// Build extraction options from matches
fn build_options(matches: &ArgMatches) -> covinfolib::Result<ExtractOptions> {
    let output = matches
        .get_one::<String>("output-filename")
        .map(|value| OutputTarget::from_arg(value))
        .unwrap_or_default();
    let test_name = matches
        .get_one::<String>("test-name")
        .cloned()
        .unwrap_or_default();

    Ok(ExtractOptions::new()
        .test_name(test_name)
        .output(output)
        .filter(build_filter(matches)?)
        .quiet(matches.get_flag("quiet")))
}

/// Route library events to stderr. Progress is dropped in quiet mode or when
/// the report itself goes to stdout; `RUST_LOG` overrides either way.
fn init_logging(options: &ExtractOptions) {
    let default_level = if options.quiet || options.output.is_stdout() {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .init();
}

fn run(matches: &ArgMatches, options: ExtractOptions) -> anyhow::Result<RunSummary> {
    let directories: Vec<&String> = matches
        .get_many::<String>("directory")
        .map(|values| values.collect())
        .unwrap_or_default();
    let tool = matches
        .get_one::<String>("gcov-tool")
        .map(String::as_str)
        .unwrap_or(DEFAULT_GCOV_TOOL);

    install_interrupt_handler()?;

    let annotator = GcovAnnotator::new(tool).anchored_at(env::current_dir()?);
    let driver = Driver::new(annotator, options);
    let summary = driver
        .run(&directories)
        .with_context(|| "coverage extraction aborted")?;
    Ok(summary)
}

/// Exit status for an error: usage problems are 1, everything else 2.
fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    let usage = error
        .downcast_ref::<CovinfoError>()
        .is_some_and(CovinfoError::is_usage);
    ExitCode::from(if usage { EXIT_USAGE } else { EXIT_FATAL })
}

fn main() -> ExitCode {
    let matches = match build_command().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let options = match build_options(&matches) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    init_logging(&options);

    match run(&matches, options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code_for(&e)
        }
    }
}
