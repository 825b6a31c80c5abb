//! Execution engine.
//!
//! The VM walks a [`Program`] with a signed program counter, mutating a
//! sixteen-register file, a bounded operand stack and a single zero flag.
//! Execution stops as soon as the program counter leaves the program.
//!
//! Every instruction either completes ("handled"), in which case a snapshot is
//! sent to the [`StepSink`], or it is skipped: unknown opcodes and untaken `je`
//! are skipped silently, while recoverable [`VMError`]s are passed to the
//! [`Diagnostics`] sink. Skipped instructions still advance the program
//! counter. Only sink failures abort a run.
//!
//! All arithmetic uses wrapping semantics to prevent overflow panics.

pub mod registers;
pub mod stack;


use crate::virtual_machine::assembler::parse_i64;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{ArithOp, Operation};
use crate::virtual_machine::program::{Instruction, Program};
use crate::virtual_machine::trace::{Snapshot, StepSink};
use crate::warn;
use registers::Registers;
use stack::Stack;

/// Register implicitly decremented by `loop`.
const LOOP_COUNTER: &str = "rcx";

/// A recoverable error tied to the instruction that raised it.
#[derive(Debug)]
pub struct Diagnostic {
    /// Source line of the instruction.
    pub line: usize,
    /// Normalized source text of the instruction.
    pub instr: String,
    pub error: VMError,
}

/// Receives recoverable errors raised during execution.
pub trait Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Collects diagnostics in memory.
impl Diagnostics for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Logs each diagnostic as a warning on stderr.
#[derive(Debug, Default)]
pub struct LogDiagnostics {
    /// Number of diagnostics reported so far.
    pub count: usize,
}

impl Diagnostics for LogDiagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.count += 1;
        warn!(
            "line {}: {}: {}",
            diagnostic.line, diagnostic.instr, diagnostic.error
        );
    }
}

/// Outcome of dispatching one instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Flow {
    /// Completed; fall through to the next instruction.
    Next,
    /// Completed; continue at the given index.
    Jump(usize),
    /// Not handled, without error (unknown opcode, untaken branch).
    Skip,
}

/// Interpreter for a parsed [`Program`].
pub struct VM<'p> {
    program: &'p Program,
    /// Index of the next instruction; may leave the program to halt.
    pc: i64,
    registers: Registers,
    stack: Stack,
    zero_flag: bool,
    /// Handled instructions so far.
    steps: usize,
}

impl<'p> VM<'p> {
    /// Creates a VM at pc 0 with zeroed registers, an empty stack and a clear flag.
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            pc: 0,
            registers: Registers::new(),
            stack: Stack::new(),
            zero_flag: false,
            steps: 0,
        }
    }

    pub fn pc(&self) -> i64 {
        self.pc
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn zero_flag(&self) -> bool {
        self.zero_flag
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Returns the instruction at the program counter, or `None` once halted.
    fn current(&self) -> Option<&'p Instruction> {
        let program = self.program;
        usize::try_from(self.pc).ok().and_then(|pc| program.get(pc))
    }

    pub fn is_halted(&self) -> bool {
        self.current().is_none()
    }

    /// Runs until the program counter leaves the program.
    ///
    /// Returns the number of handled instructions. Does not terminate for
    /// programs that loop forever.
    pub fn run<S: StepSink, D: Diagnostics>(
        &mut self,
        sink: &mut S,
        diagnostics: &mut D,
    ) -> Result<usize, VMError> {
        while self.step(sink, diagnostics)? {}
        Ok(self.steps)
    }

    /// Executes a single instruction.
    ///
    /// Returns `false` without doing anything when the VM has halted.
    pub fn step<S: StepSink, D: Diagnostics>(
        &mut self,
        sink: &mut S,
        diagnostics: &mut D,
    ) -> Result<bool, VMError> {
        let Some(instruction) = self.current() else {
            return Ok(false);
        };

        let flow = match self.exec(instruction, diagnostics) {
            Ok(flow) => flow,
            Err(error) => {
                diagnostics.report(Diagnostic {
                    line: instruction.line,
                    instr: instruction.source.clone(),
                    error,
                });
                Flow::Skip
            }
        };

        match flow {
            Flow::Jump(target) => self.pc = target as i64,
            Flow::Next | Flow::Skip => self.pc += 1,
        }

        if flow != Flow::Skip {
            self.steps += 1;
            sink.record(&Snapshot::capture(
                self.steps,
                instruction,
                &self.stack,
                &self.registers,
            ))?;
        }

        Ok(true)
    }

    /// Resolves a token as a register value, falling back to an integer literal.
    fn resolve(&self, token: &str) -> Result<i64, VMError> {
        self.registers
            .get(token)
            .or_else(|_| parse_i64(token))
    }

    /// Executes a single decoded instruction.
    fn exec<D: Diagnostics>(
        &mut self,
        instruction: &Instruction,
        diagnostics: &mut D,
    ) -> Result<Flow, VMError> {
        match &instruction.operation {
            Operation::Mov { dst, src } => self.op_mov(dst, src),
            Operation::Push { src } => self.op_push(src),
            Operation::Pop { dst } => self.op_pop(instruction, dst.as_deref(), diagnostics),
            Operation::StackArith(op) => self.op_stack_arith(*op),
            Operation::RegArith { op, dst, src } => self.op_reg_arith(*op, dst, src),
            Operation::Jmp { label } => self.op_jmp(label),
            Operation::Loop { label } => self.op_loop(instruction, label, diagnostics),
            Operation::Cmp { lhs, rhs } => self.op_cmp(lhs, rhs),
            Operation::Je { label } => self.op_je(label),
            Operation::Nop => Ok(Flow::Skip),
        }
    }

    fn op_mov(&mut self, dst: &str, src: &str) -> Result<Flow, VMError> {
        let value = self.resolve(src)?;
        self.registers.set(dst, value)?;
        Ok(Flow::Next)
    }

    fn op_push(&mut self, src: &str) -> Result<Flow, VMError> {
        let value = self.resolve(src)?;
        self.stack.push(value)?;
        Ok(Flow::Next)
    }

    /// The pop itself decides the outcome; a bad destination is only reported.
    fn op_pop<D: Diagnostics>(
        &mut self,
        instruction: &Instruction,
        dst: Option<&str>,
        diagnostics: &mut D,
    ) -> Result<Flow, VMError> {
        let value = self.stack.pop()?;
        if let Some(dst) = dst
            && let Err(error) = self.registers.set(dst, value)
        {
            diagnostics.report(Diagnostic {
                line: instruction.line,
                instr: instruction.source.clone(),
                error,
            });
        }
        Ok(Flow::Next)
    }

    /// Pops `b` then `a` and pushes `a OP b`.
    ///
    /// Operands popped before a failure (underflow, division by zero) are lost.
    fn op_stack_arith(&mut self, op: ArithOp) -> Result<Flow, VMError> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        let result = op.apply(a, b)?;
        self.stack.push(result)?;
        Ok(Flow::Next)
    }

    fn op_reg_arith(&mut self, op: ArithOp, dst: &str, src: &str) -> Result<Flow, VMError> {
        let a = self.registers.get(dst)?;
        let b = self.resolve(src)?;
        let result = op.apply(a, b)?;
        self.registers.set(dst, result)?;
        Ok(Flow::Next)
    }

    fn op_jmp(&mut self, label: &str) -> Result<Flow, VMError> {
        Ok(Flow::Jump(self.program.resolve_label(label)?))
    }

    /// Decrements `rcx` and branches while it is non-zero.
    ///
    /// Always handled: an undefined label is reported but the decrement stands.
    fn op_loop<D: Diagnostics>(
        &mut self,
        instruction: &Instruction,
        label: &str,
        diagnostics: &mut D,
    ) -> Result<Flow, VMError> {
        let counter = self.registers.get(LOOP_COUNTER)?.wrapping_sub(1);
        self.registers.set(LOOP_COUNTER, counter)?;

        match self.program.resolve_label(label) {
            Ok(target) if counter != 0 => Ok(Flow::Jump(target)),
            Ok(_) => Ok(Flow::Next),
            Err(error) => {
                diagnostics.report(Diagnostic {
                    line: instruction.line,
                    instr: instruction.source.clone(),
                    error,
                });
                Ok(Flow::Next)
            }
        }
    }

    fn op_cmp(&mut self, lhs: &str, rhs: &str) -> Result<Flow, VMError> {
        let a = self.resolve(lhs)?;
        let b = self.resolve(rhs)?;
        self.zero_flag = a == b;
        Ok(Flow::Next)
    }

    /// Only a taken branch counts as handled.
    fn op_je(&mut self, label: &str) -> Result<Flow, VMError> {
        if !self.zero_flag {
            return Ok(Flow::Skip);
        }
        Ok(Flow::Jump(self.program.resolve_label(label)?))
    }
}
