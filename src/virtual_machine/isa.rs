//! Instruction set definitions.
//!
//! Source lines are decoded once, at assembly time, into an [`Operation`].
//! The opcode together with its operand count selects the variant; a line
//! whose shape matches no row below decodes to [`Operation::Nop`] and is
//! carried through execution without ever producing a trace step.
//!
//! | Source form             | Variant                  |
//! |-------------------------|--------------------------|
//! | `mov dst, src`          | [`Operation::Mov`]       |
//! | `push src`              | [`Operation::Push`]      |
//! | `pop [dst]`             | [`Operation::Pop`]       |
//! | `add` / `sub` / `mul` / `div`  | [`Operation::StackArith`] |
//! | `add dst, src` (and friends)   | [`Operation::RegArith`]   |
//! | `jmp label`             | [`Operation::Jmp`]       |
//! | `loop label`            | [`Operation::Loop`]      |
//! | `cmp a, b`              | [`Operation::Cmp`]       |
//! | `je label`              | [`Operation::Je`]        |
//!
//! Operands beyond the ones a form reads are accepted and ignored.

use crate::virtual_machine::errors::VMError;

/// Starts a comment that runs to the end of the line.
pub const COMMENT_CHAR: char = ';';
/// Trailing character marking a label declaration.
pub const LABEL_SUFFIX: char = ':';
/// Maximum number of tokens kept per line, labels and opcode included.
pub const MAX_TOKENS: usize = 8;
/// Tokens longer than this many characters are truncated.
pub const MAX_TOKEN_LEN: usize = 31;

/// Binary integer operator shared by the stack and register arithmetic forms.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn from_mnemonic(name: &str) -> Option<Self> {
        match name {
            "add" => Some(ArithOp::Add),
            "sub" => Some(ArithOp::Sub),
            "mul" => Some(ArithOp::Mul),
            "div" => Some(ArithOp::Div),
            _ => None,
        }
    }

    /// Computes `a OP b` with wrapping semantics.
    ///
    /// Returns [`VMError::DivisionByZero`] for `div` with `b == 0`.
    pub fn apply(&self, a: i64, b: i64) -> Result<i64, VMError> {
        Ok(match self {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div => {
                if b == 0 {
                    return Err(VMError::DivisionByZero);
                }
                a.wrapping_div(b)
            }
        })
    }
}

/// A decoded instruction, ready for dispatch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    /// `dst := src`
    Mov { dst: String, src: String },
    /// Push a resolved operand.
    Push { src: String },
    /// Pop into `dst`, or discard when no destination is given.
    Pop { dst: Option<String> },
    /// Pop `b`, pop `a`, push `a OP b`.
    StackArith(ArithOp),
    /// `dst := dst OP src`
    RegArith { op: ArithOp, dst: String, src: String },
    /// Unconditional jump.
    Jmp { label: String },
    /// Decrement `rcx`, jump while it is non-zero.
    Loop { label: String },
    /// Latch `a == b` into the zero flag.
    Cmp { lhs: String, rhs: String },
    /// Jump when the zero flag is set.
    Je { label: String },
    /// Unrecognised opcode or unsupported operand count.
    Nop,
}

impl Operation {
    /// Decodes an opcode and its operand tokens.
    pub fn decode(opcode: &str, operands: &[String]) -> Self {
        let arg = |i: usize| operands[i].clone();

        match (opcode, operands.len()) {
            ("mov", n) if n >= 2 => Operation::Mov {
                dst: arg(0),
                src: arg(1),
            },
            ("push", n) if n >= 1 => Operation::Push { src: arg(0) },
            ("pop", _) => Operation::Pop {
                dst: operands.first().cloned(),
            },
            ("jmp", n) if n >= 1 => Operation::Jmp { label: arg(0) },
            ("loop", n) if n >= 1 => Operation::Loop { label: arg(0) },
            ("cmp", n) if n >= 2 => Operation::Cmp {
                lhs: arg(0),
                rhs: arg(1),
            },
            ("je", n) if n >= 1 => Operation::Je { label: arg(0) },
            (name, n) => match ArithOp::from_mnemonic(name) {
                Some(op) if n == 0 => Operation::StackArith(op),
                Some(op) if n >= 2 => Operation::RegArith {
                    op,
                    dst: arg(0),
                    src: arg(1),
                },
                _ => Operation::Nop,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn decode_arithmetic_by_arity() {
        assert_eq!(
            Operation::decode("add", &[]),
            Operation::StackArith(ArithOp::Add)
        );
        assert_eq!(
            Operation::decode("div", &ops(&["rax", "rbx"])),
            Operation::RegArith {
                op: ArithOp::Div,
                dst: "rax".into(),
                src: "rbx".into()
            }
        );
        // a single operand matches neither form
        assert_eq!(Operation::decode("sub", &ops(&["rax"])), Operation::Nop);
    }

    #[test]
    fn decode_requires_operands() {
        assert_eq!(Operation::decode("mov", &ops(&["rax"])), Operation::Nop);
        assert_eq!(Operation::decode("push", &[]), Operation::Nop);
        assert_eq!(Operation::decode("jmp", &[]), Operation::Nop);
        assert_eq!(Operation::decode("cmp", &ops(&["rax"])), Operation::Nop);
        assert_eq!(Operation::decode("pop", &[]), Operation::Pop { dst: None });
    }

    #[test]
    fn decode_is_case_sensitive() {
        assert_eq!(Operation::decode("MOV", &ops(&["rax", "1"])), Operation::Nop);
        assert_eq!(Operation::decode("Add", &[]), Operation::Nop);
        assert_eq!(Operation::decode("nop", &[]), Operation::Nop);
    }

    #[test]
    fn extra_operands_are_ignored() {
        assert_eq!(
            Operation::decode("push", &ops(&["1", "2", "3"])),
            Operation::Push { src: "1".into() }
        );
    }

    #[test]
    fn arith_wraps_and_traps() {
        assert_eq!(ArithOp::Add.apply(i64::MAX, 1).unwrap(), i64::MIN);
        assert_eq!(ArithOp::Sub.apply(3, 5).unwrap(), -2);
        assert_eq!(ArithOp::Mul.apply(-4, 6).unwrap(), -24);
        assert_eq!(ArithOp::Div.apply(7, 2).unwrap(), 3);
        assert_eq!(ArithOp::Div.apply(-7, 2).unwrap(), -3);
        assert_eq!(ArithOp::Div.apply(i64::MIN, -1).unwrap(), i64::MIN);
        assert!(matches!(
            ArithOp::Div.apply(1, 0),
            Err(VMError::DivisionByZero)
        ));
    }
}
