//! JSON step trace.
//!
//! Each handled instruction produces one [`Snapshot`] of the whole machine.
//! [`JsonTrace`] streams snapshots into a JSON array as they arrive:
//!
//! ```text
//! [
//!   {"step":1,"instr":"push 2","line":1,"stack":[...],"registers":[...]},
//!   {"step":2,...}
//! ]
//! ```

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::program::Instruction;
use crate::virtual_machine::vm::registers::Registers;
use crate::virtual_machine::vm::stack::{SLOT_SIZE, Stack};
use serde::Serialize;
use std::io::Write;

/// One stack entry as rendered in the trace.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct StackSlot {
    pub id: u64,
    /// Distance from the bottom of the stack.
    pub pos: usize,
    pub size: usize,
    pub value: i64,
}

/// One register as rendered in the trace.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RegisterSlot {
    pub name: &'static str,
    pub pos: usize,
    pub size: usize,
    pub value: i64,
}

/// Machine state captured right after a handled instruction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Snapshot<'a> {
    pub step: usize,
    pub instr: &'a str,
    pub line: usize,
    pub stack: Vec<StackSlot>,
    pub registers: Vec<RegisterSlot>,
}

impl<'a> Snapshot<'a> {
    pub fn capture(
        step: usize,
        instruction: &'a Instruction,
        stack: &Stack,
        registers: &Registers,
    ) -> Self {
        Self {
            step,
            instr: &instruction.source,
            line: instruction.line,
            stack: stack
                .entries()
                .iter()
                .enumerate()
                .map(|(pos, entry)| StackSlot {
                    id: entry.id,
                    pos,
                    size: entry.size,
                    value: entry.value,
                })
                .collect(),
            registers: registers
                .iter()
                .enumerate()
                .map(|(pos, (name, value))| RegisterSlot {
                    name,
                    pos,
                    size: SLOT_SIZE,
                    value,
                })
                .collect(),
        }
    }
}

/// Receives snapshots from the VM, one per handled instruction.
pub trait StepSink {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> Result<(), VMError>;
}

/// Collects snapshots as JSON values.
impl StepSink for Vec<serde_json::Value> {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> Result<(), VMError> {
        let value = serde_json::to_value(snapshot).map_err(|e| VMError::IoError {
            path: "<memory>".to_string(),
            source: e.to_string(),
        })?;
        self.push(value);
        Ok(())
    }
}

/// Streams snapshots into a JSON array on `out`.
///
/// The opening bracket is written lazily, so [`JsonTrace::finish`] must be
/// called to produce a complete array (an empty one if nothing was recorded).
pub struct JsonTrace<W: Write> {
    out: W,
    name: String,
    count: usize,
}

impl<W: Write> JsonTrace<W> {
    /// `name` identifies the destination in error messages.
    pub fn new(out: W, name: impl Into<String>) -> Self {
        Self {
            out,
            name: name.into(),
            count: 0,
        }
    }

    /// Number of snapshots written so far.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn io_error(&self, err: impl ToString) -> VMError {
        VMError::IoError {
            path: self.name.clone(),
            source: err.to_string(),
        }
    }

    /// Closes the array, flushes, and returns the writer.
    pub fn finish(mut self) -> Result<W, VMError> {
        let closing: &[u8] = if self.count == 0 { b"[\n\n]\n" } else { b"\n]\n" };
        self.out
            .write_all(closing)
            .and_then(|_| self.out.flush())
            .map_err(|e| self.io_error(e))?;
        Ok(self.out)
    }
}

impl<W: Write> StepSink for JsonTrace<W> {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> Result<(), VMError> {
        let separator: &[u8] = if self.count == 0 { b"[\n  " } else { b",\n  " };
        self.out
            .write_all(separator)
            .map_err(|e| self.io_error(e))?;
        serde_json::to_writer(&mut self.out, snapshot).map_err(|e| self.io_error(e))?;
        self.count += 1;
        Ok(())
    }
}
