//! Assembly instruction simulator with a JSON step trace.
//!
//! A source file is parsed in full before anything runs, then executed by a
//! small register/stack machine. Every instruction that completes produces one
//! snapshot of the machine, streamed into a JSON array for a visualizer.
//!
//! # Architecture
//!
//! - **Registers**: 16 named signed 64-bit registers (`rax` ... `r15`), zeroed at start
//! - **Stack**: bounded LIFO of 1024 entries, each with a never-reused id
//! - **Flag**: a single zero flag set by `cmp` and read by `je`
//! - **Errors**: label and I/O failures abort the run; operand, register,
//!   stack and arithmetic failures are reported and the instruction is skipped
//!
//! # Modules
//!
//! - [`assembler`]: Line normalization, tokenization and the parse pass
//! - [`errors`]: Parse and execution error type
//! - [`isa`]: Opcodes, syntax constants and operation decoding
//! - [`program`]: Parsed instructions and the label table
//! - [`trace`]: Snapshots and the streaming JSON writer
//! - [`vm`]: Execution engine, register file and operand stack

pub mod assembler;
pub mod errors;
pub mod isa;
pub mod program;
pub mod trace;
pub mod vm;

use crate::error;
use assembler::{assemble_source_with_name, read_source};
use errors::VMError;
use std::io::Write;
use std::path::Path;
use trace::JsonTrace;
use vm::{Diagnostics, LogDiagnostics, VM};

/// Parses and executes `source`, streaming the trace to `out`.
///
/// `source_name` labels parse diagnostics. Returns the number of handled
/// instructions. A parse error is returned before anything is written.
pub fn run_source<W: Write, D: Diagnostics>(
    source: &str,
    source_name: &str,
    out: W,
    diagnostics: &mut D,
) -> Result<usize, VMError> {
    let program = assemble_source_with_name(source, source_name)?;

    let mut trace = JsonTrace::new(out, "trace output");
    let steps = VM::new(&program).run(&mut trace, diagnostics)?;
    trace.finish()?;

    Ok(steps)
}

/// Totals for one traced file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TraceSummary {
    /// Handled instructions, one trace element each.
    pub steps: usize,
    /// Recoverable errors logged while running.
    pub diagnostics: usize,
}

/// Traces the program at `source_path` into `out`, logging diagnostics.
///
/// Fatal errors are logged before being returned.
pub fn trace_file<P: AsRef<Path>, W: Write>(
    source_path: P,
    out: W,
) -> Result<TraceSummary, VMError> {
    let path = source_path.as_ref();
    let name = path.display().to_string();
    let mut diagnostics = LogDiagnostics::default();

    let result = read_source(path)
        .and_then(|source| run_source(&source, &name, out, &mut diagnostics))
        .map(|steps| TraceSummary {
            steps,
            diagnostics: diagnostics.count,
        });

    // parse errors carrying a line were already rendered by the assembler
    if let Err(err) = &result
        && err.line().is_none()
    {
        error!("{err}");
    }

    result
}

/// Traces `source_path` into `out`. Returns 0 on success, 1 on a fatal error.
pub fn run<P: AsRef<Path>, W: Write>(source_path: P, out: W) -> i32 {
    match trace_file(source_path, out) {
        Ok(_) => 0,
        Err(_) => 1,
    }
}
