use asmtrace_derive::Error;

/// Errors raised while assembling or executing a program.
///
/// Parse-pass and I/O failures abort the run (see [`VMError::is_fatal`]).
/// Everything else is reported for the offending instruction, which is then
/// skipped without producing a trace step.
#[derive(Debug, Error)]
pub enum VMError {
    /// A label token with nothing before the `:`.
    #[error("line {line}: invalid label")]
    InvalidLabel { line: usize },
    /// Label defined more than once.
    #[error("line {line}: duplicate label '{label}'")]
    DuplicateLabel { line: usize, label: String },
    /// Program or label storage could not grow.
    #[error("out of memory while storing {what}")]
    OutOfMemory { what: &'static str },
    /// Source file could not be read or trace could not be written.
    #[error("io error on {path}: {source}")]
    IoError { path: String, source: String },
    /// Token is neither a register name nor an integer literal.
    #[error("invalid operand '{token}'")]
    InvalidOperand { token: String },
    /// Token is not one of the sixteen register names.
    #[error("unknown register '{name}'")]
    UnknownRegister { name: String },
    /// Jump target not present in the label table.
    #[error("undefined label '{label}'")]
    UndefinedLabel { label: String },
    /// Push onto a full operand stack.
    #[error("stack overflow (capacity {capacity})")]
    StackOverflow { capacity: usize },
    /// Pop from an empty operand stack.
    #[error("stack underflow")]
    StackUnderflow,
    /// Division with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,
}

impl VMError {
    /// Returns true for errors that abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VMError::InvalidLabel { .. }
                | VMError::DuplicateLabel { .. }
                | VMError::OutOfMemory { .. }
                | VMError::IoError { .. }
        )
    }

    /// Source line attached to parse-pass errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            VMError::InvalidLabel { line } | VMError::DuplicateLabel { line, .. } => Some(*line),
            _ => None,
        }
    }
}
