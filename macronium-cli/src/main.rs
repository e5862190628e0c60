#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Macronium CLI
//!
//! A command-line interface for the macronium C preprocessor library.

use anyhow::{Context, Result, bail};
use clap::Parser;
use macronium::{Config, MacroValue, Predefines};
use std::path::PathBuf;

/// Exit codes for different error conditions
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const IO_ERROR: i32 = 2;
    pub const PREPROCESS_ERROR: i32 = 3;
}

/// Command-line interface for the macronium C preprocessor
#[derive(Parser)]
#[command(
    name = "macronium",
    version,
    author,
    about = "A C preprocessor engine for FFI header ingestion",
    long_about = "macronium preprocesses C headers with macros, conditional compilation, \
                  and includes, producing output suitable for declaration parsers.",
    after_help = "EXAMPLES:
  # Preprocess a single header
  $ macronium input.h -o output.i

  # Predefine macros and add include directories
  $ macronium input.h -D DEBUG -D OS=linux -I include -I /usr/include

  # Read from stdin and write to stdout
  $ cat input.h | macronium -"
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Input header to preprocess (use '-' for stdin)
    input: PathBuf,

    /// Output file (use '-' for stdout, default: stdout)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Predefine a macro: NAME defines a flag, NAME=VALUE defines text
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Add directory to include search path
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Enable verbose output with diagnostic information
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            determine_exit_code(&e)
        }
    });
}

/// Determine the appropriate exit code based on the error
fn determine_exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<macronium::PreprocessError>().is_some() {
        exit_code::PREPROCESS_ERROR
    } else if error.downcast_ref::<std::io::Error>().is_some() {
        exit_code::IO_ERROR
    } else {
        exit_code::GENERAL_ERROR
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::new().with_search_dirs(cli.include_dirs.clone());
    let predefines = parse_defines(&cli.defines)?;

    let start_time = std::time::Instant::now();
    let (output, state) = if cli.input == PathBuf::from("-") {
        let input = read_stdin()?;
        macronium::compile(&input, &config, &predefines).map_err(anyhow::Error::new)?
    } else {
        let path = cli.input.to_string_lossy();
        macronium::compile_file(&path, &config, &predefines).map_err(anyhow::Error::new)?
    };
    let processing_time = start_time.elapsed();

    write_output(&cli, &output)?;

    if cli.verbose && !cli.quiet {
        eprintln!(
            "✓ {} logical lines, {} macros defined, {processing_time:?}",
            state.lineno(),
            state.defines().len()
        );
    }

    Ok(())
}

/// Turn `-D NAME[=VALUE]` arguments into predefines
fn parse_defines(args: &[String]) -> Result<Predefines> {
    let mut predefines = Predefines::new();
    for arg in args {
        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name, MacroValue::Text(value.to_string())),
            None => (arg.as_str(), MacroValue::Flag),
        };
        if name.is_empty() {
            bail!("empty macro name in -D {arg:?}");
        }
        predefines.insert(name.to_string(), value);
    }
    Ok(predefines)
}

/// Read all of stdin
fn read_stdin() -> Result<String> {
    use std::io::Read;
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer).context("Failed to read from stdin")?;
    Ok(buffer)
}

/// Write output to file or stdout
fn write_output(cli: &Cli, content: &str) -> Result<()> {
    match &cli.output {
        Some(path) if path != &PathBuf::from("-") => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        }
        _ => {
            println!("{content}");
        }
    }
    Ok(())
}
