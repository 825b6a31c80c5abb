//! Parsed program representation.
//!
//! A [`Program`] is the output of the assembler's parse pass: the ordered
//! instruction list plus the label table. It is built once and only read by
//! the VM afterwards.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Operation;
use std::collections::HashMap;

/// One source line that produced an instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    /// Normalized source text (comment stripped, trimmed), labels included.
    pub source: String,
    /// 1-based line number in the source file.
    pub line: usize,
    /// Opcode token as written.
    pub opcode: String,
    /// Operand tokens following the opcode.
    pub operands: Vec<String>,
    /// Decoded form used for dispatch.
    pub operation: Operation,
}

impl Instruction {
    /// Builds an instruction from its opcode and operand tokens, decoding it once.
    pub fn new(source: String, line: usize, opcode: String, operands: Vec<String>) -> Self {
        let operation = Operation::decode(&opcode, &operands);
        Self {
            source,
            line,
            opcode,
            operands,
            operation,
        }
    }
}

/// Instruction list and label table produced by the parse pass.
#[derive(Clone, Debug, Default)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next pushed instruction will occupy.
    pub fn next_index(&self) -> usize {
        self.instructions.len()
    }

    /// Appends an instruction.
    ///
    /// Returns [`VMError::OutOfMemory`] if the instruction list cannot grow.
    pub(crate) fn push(&mut self, instruction: Instruction) -> Result<(), VMError> {
        self.instructions
            .try_reserve(1)
            .map_err(|_| VMError::OutOfMemory {
                what: "instructions",
            })?;
        self.instructions.push(instruction);
        Ok(())
    }

    /// Binds `name` to the index of the next instruction.
    ///
    /// Returns [`VMError::InvalidLabel`] for an empty name and
    /// [`VMError::DuplicateLabel`] if the name is already bound.
    pub(crate) fn define_label(&mut self, name: &str, line: usize) -> Result<(), VMError> {
        if name.is_empty() {
            return Err(VMError::InvalidLabel { line });
        }
        if self.labels.contains_key(name) {
            return Err(VMError::DuplicateLabel {
                line,
                label: name.to_string(),
            });
        }
        self.labels
            .try_reserve(1)
            .map_err(|_| VMError::OutOfMemory { what: "labels" })?;
        self.labels.insert(name.to_string(), self.next_index());
        Ok(())
    }

    /// Resolves a label to its instruction index.
    pub fn resolve_label(&self, name: &str) -> Result<usize, VMError> {
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| VMError::UndefinedLabel {
                label: name.to_string(),
            })
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}
