//! Assembly to JSON trace CLI.
//!
//! Parses an assembly source file, executes it, and writes one JSON snapshot
//! per executed instruction.
//!
//! # Usage
//! ```text
//! asm2json <input.asm> [output.json] [OPTIONS]
//! ```
//!
//! # Arguments
//! - `input.asm`: Assembly source file to trace
//! - `output.json`: Trace destination (defaults to stdout)
//!
//! # Options
//! - `-o, --output <file>`: Trace destination, same as the positional output
//! - `-q, --quiet`: Only log errors
//! - `--no-timestamp`: Omit timestamps from log lines
//!
//! # Examples
//! ```text
//! asm2json program.asm
//! asm2json program.asm trace.json
//! asm2json program.asm -o trace.json -q
//! ```

use asmtrace::utils::log::{Level, SHOW_TIMESTAMP, set_min_level};
use asmtrace::virtual_machine::trace_file;
use asmtrace::{error, info};
use std::env;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use std::process;
use std::sync::atomic::Ordering;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut input_path: Option<String> = None;
    let mut output_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                output_path = Some(args[i].clone());
            }
            "--quiet" | "-q" => set_min_level(Level::Error),
            "--no-timestamp" => SHOW_TIMESTAMP.store(false, Ordering::Relaxed),
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                error!("Unknown option: {}\n", flag);
                print_usage(&args[0]);
                process::exit(1);
            }
            positional if input_path.is_none() => input_path = Some(positional.to_string()),
            positional if output_path.is_none() => output_path = Some(positional.to_string()),
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let Some(input_path) = input_path else {
        error!("Missing input file\n");
        print_usage(&args[0]);
        process::exit(1);
    };

    if !Path::new(&input_path).exists() {
        error!("Input file does not exist: {}", input_path);
        process::exit(1);
    }

    let result = match &output_path {
        Some(output_path) => {
            if let Some(parent) = Path::new(output_path).parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                error!("Output directory does not exist: {}", parent.display());
                process::exit(1);
            }

            let file = File::create(output_path).unwrap_or_else(|e| {
                error!("Failed to create output file {}: {}", output_path, e);
                process::exit(1)
            });
            trace_file(&input_path, BufWriter::new(file))
        }
        None => trace_file(&input_path, io::stdout().lock()),
    };

    // fatal errors were logged by trace_file
    let Ok(summary) = result else {
        process::exit(1);
    };

    if let Some(output_path) = output_path {
        info!(
            "Traced {} -> {} ({} steps, {} diagnostics)",
            input_path, output_path, summary.steps, summary.diagnostics
        );
    }
}

const USAGE: &str = "\
Assembly Trace Generator

USAGE:
    {program} <input.asm> [output.json] [OPTIONS]

ARGS:
    <input.asm>      Assembly source file to trace
    [output.json]    Trace destination (defaults to stdout)

OPTIONS:
    -o, --output <file>     Trace destination, same as the positional output
    -q, --quiet             Only log errors
        --no-timestamp      Omit timestamps from log lines
    -h, --help              Print this help message

EXAMPLES:
    # Print the trace to stdout
    {program} program.asm

    # Write the trace to a file
    {program} program.asm trace.json

    # Write to a file, logging only fatal errors
    {program} program.asm -o trace.json -q
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
