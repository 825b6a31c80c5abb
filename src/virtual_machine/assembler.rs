//! Source parser: normalization, tokenization, label resolution.
//!
//! # Syntax
//!
//! ```text
//! [label:]... opcode operand1, operand2, ...  ; optional comment
//! ```
//!
//! - `;` starts a comment running to the end of the line
//! - Tokens are separated by spaces, tabs or commas
//! - A leading token ending in `:` declares a label; several may prefix one line
//! - Opcodes are lowercase and case-sensitive (`mov`, `push`, `add`, ...)
//! - Registers are named (`rax`, `rbx`, ..., `r15`)
//! - Immediates are decimal or `0x` hexadecimal, optionally signed
//!
//! Parsing is a single pass over the lines that records each label at the
//! index of the next instruction. Jump targets are only looked up at run time,
//! once the table is complete, so forward references resolve.

use crate::error;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{COMMENT_CHAR, LABEL_SUFFIX, MAX_TOKEN_LEN, MAX_TOKENS};
use crate::virtual_machine::program::{Instruction, Program};
use std::fmt::Write;
use std::fs;
use std::num::IntErrorKind;
use std::path::Path;

/// Formats a compiler-style diagnostic for a fatal parse error.
fn render_assembly_diagnostic(file: &str, source: &str, line: usize, message: &str) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, raw_line.trim_end_matches('\r'));
        let _ = write!(diag, "  |");
    }

    diag
}

/// Strips the comment and surrounding whitespace from a raw line.
pub(crate) fn normalize(line: &str) -> &str {
    let code = match line.find(COMMENT_CHAR) {
        Some(pos) => &line[..pos],
        None => line,
    };
    code.trim_end_matches([' ', '\t', '\r', '\n'])
        .trim_start_matches([' ', '\t'])
}

/// Cuts a token down to [`MAX_TOKEN_LEN`] characters.
fn truncate_token(tok: &str) -> &str {
    match tok.char_indices().nth(MAX_TOKEN_LEN) {
        Some((end, _)) => &tok[..end],
        None => tok,
    }
}

/// Splits a normalized line into at most [`MAX_TOKENS`] tokens.
///
/// Rules:
/// - spaces, tabs and commas separate tokens; runs of them count once
/// - each token is truncated to [`MAX_TOKEN_LEN`] characters
/// - tokens past the limit are dropped
pub(crate) fn tokenize(line: &str) -> Vec<&str> {
    line.split([' ', '\t', ','])
        .filter(|tok| !tok.is_empty())
        .take(MAX_TOKENS)
        .map(truncate_token)
        .collect()
}

/// Parses a signed decimal or `0x` hexadecimal literal.
///
/// The whole token must be consumed; `+`, `-`, `0x` or trailing garbage on
/// their own are rejected. A magnitude too large for `i64` saturates to
/// `i64::MAX` before the sign is applied.
pub(crate) fn parse_i64(tok: &str) -> Result<i64, VMError> {
    let invalid = || VMError::InvalidOperand {
        token: tok.to_string(),
    };

    let (negative, rest) = match tok.as_bytes().first() {
        Some(b'-') => (true, &tok[1..]),
        Some(b'+') => (false, &tok[1..]),
        _ => (false, tok),
    };

    let (radix, digits) = match rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, rest),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }

    let magnitude = match i64::from_str_radix(digits, radix) {
        Ok(value) => value,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => i64::MAX,
        Err(_) => return Err(invalid()),
    };
    Ok(if negative { -magnitude } else { magnitude })
}

/// Checks if a token is a label declaration (ends with `:`).
fn is_label_def(tok: &str) -> bool {
    tok.ends_with(LABEL_SUFFIX)
}

/// Extracts the label name from a label declaration token.
fn label_name(tok: &str) -> &str {
    &tok[..tok.len() - LABEL_SUFFIX.len_utf8()]
}

/// Parses a full source string into a [`Program`].
///
/// Blank and comment-only lines are skipped, leading label tokens are bound
/// to the next instruction index, and the remaining tokens (if any) become one
/// instruction. Invalid or duplicate labels abort the parse.
pub fn assemble_source(source: &str) -> Result<Program, VMError> {
    let mut program = Program::new();

    for (line_idx, raw_line) in source.lines().enumerate() {
        let line_no = line_idx + 1;
        let text = normalize(raw_line);
        if text.is_empty() {
            continue;
        }

        let tokens = tokenize(text);
        let mut rest = tokens.as_slice();
        while let Some((tok, tail)) = rest.split_first() {
            if !is_label_def(tok) {
                break;
            }
            program.define_label(label_name(tok), line_no)?;
            rest = tail;
        }

        // label-only line
        let Some((opcode, operands)) = rest.split_first() else {
            continue;
        };

        program.push(Instruction::new(
            text.to_string(),
            line_no,
            opcode.to_string(),
            operands.iter().map(|op| op.to_string()).collect(),
        ))?;
    }

    Ok(program)
}

/// Parses source with an associated name for error diagnostics.
///
/// Logs a compiler-style diagnostic on failure.
pub fn assemble_source_with_name(source: &str, source_name: &str) -> Result<Program, VMError> {
    let result = assemble_source(source);

    if let Err(err) = &result {
        match err.line() {
            Some(line) => error!(
                "{}",
                render_assembly_diagnostic(source_name, source, line, &err.to_string())
            ),
            None => error!("{source_name}: {err}"),
        }
    }

    result
}

/// Reads a file to a string, mapping failures to [`VMError::IoError`].
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<String, VMError> {
    let path_ref = path.as_ref();
    fs::read_to_string(path_ref).map_err(|e| VMError::IoError {
        path: path_ref.display().to_string(),
        source: e.to_string(),
    })
}

/// Convenience: parse directly from a file path.
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Program, VMError> {
    let path_ref = path.as_ref();
    let source = read_source(path_ref)?;
    assemble_source_with_name(&source, &path_ref.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::isa::{ArithOp, Operation};

    #[test]
    fn normalize_strips_comment_and_whitespace() {
        assert_eq!(normalize("  mov rax, 1 ; set\r\n"), "mov rax, 1");
        assert_eq!(normalize("\tpush 2\t"), "push 2");
        assert_eq!(normalize("; only a comment"), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn tokenize_splits_on_space_tab_comma() {
        assert_eq!(tokenize("mov rax,rbx"), vec!["mov", "rax", "rbx"]);
        assert_eq!(tokenize("mov\trax ,, 5"), vec!["mov", "rax", "5"]);
        assert!(tokenize(",,").is_empty());
    }

    #[test]
    fn tokenize_caps_count_and_length() {
        let tokens = tokenize("a b c d e f g h i j");
        assert_eq!(tokens.len(), MAX_TOKENS);
        assert_eq!(tokens.last(), Some(&"h"));

        let long = "x".repeat(40);
        let tokens = tokenize(&long);
        assert_eq!(tokens[0].len(), MAX_TOKEN_LEN);
    }

    #[test]
    fn parse_i64_decimal_and_hex() {
        assert_eq!(parse_i64("42").unwrap(), 42);
        assert_eq!(parse_i64("-7").unwrap(), -7);
        assert_eq!(parse_i64("+9").unwrap(), 9);
        assert_eq!(parse_i64("0x1F").unwrap(), 31);
        assert_eq!(parse_i64("0Xff").unwrap(), 255);
        assert_eq!(parse_i64("-0x10").unwrap(), -16);
        assert_eq!(parse_i64("0x7fffffffffffffff").unwrap(), i64::MAX);
    }

    #[test]
    fn parse_i64_saturates_large_magnitudes() {
        assert_eq!(parse_i64("9223372036854775808").unwrap(), i64::MAX);
        assert_eq!(parse_i64("99999999999999999999").unwrap(), i64::MAX);
        assert_eq!(parse_i64("0xffffffffffffffff").unwrap(), i64::MAX);
        assert_eq!(parse_i64("0x10000000000000000").unwrap(), i64::MAX);
        // the sign applies after saturation
        assert_eq!(parse_i64("-9223372036854775808").unwrap(), -i64::MAX);
        assert_eq!(parse_i64("-0xffffffffffffffff").unwrap(), -i64::MAX);
    }

    #[test]
    fn parse_i64_rejects_garbage() {
        for tok in [
            "", "-", "+", "0x", "-0x", "12abc", "0x1g", "--1", "+-1", "0x+1", "1.5", " 1",
            "99999999999999999999x", "0xfffffffffffffffffg",
        ] {
            assert!(
                matches!(parse_i64(tok), Err(VMError::InvalidOperand { .. })),
                "{tok:?} should be rejected"
            );
        }
    }

    #[test]
    fn assemble_empty_and_comment_only() {
        let program = assemble_source("\n; nothing here\n   \n").unwrap();
        assert!(program.is_empty());
    }

    #[test]
    fn assemble_keeps_line_numbers_and_text() {
        let program = assemble_source("; header\n\nmov rax, 5 ; five\npush rax\n").unwrap();
        assert_eq!(program.len(), 2);

        let first = program.get(0).unwrap();
        assert_eq!(first.line, 3);
        assert_eq!(first.source, "mov rax, 5");
        assert_eq!(first.opcode, "mov");
        assert_eq!(first.operands, vec!["rax", "5"]);

        assert_eq!(program.get(1).unwrap().line, 4);
    }

    #[test]
    fn assemble_labels_prefixing_instruction() {
        let program = assemble_source("a: b: add\nc:\n").unwrap();
        assert_eq!(program.len(), 1);
        assert_eq!(program.resolve_label("a").unwrap(), 0);
        assert_eq!(program.resolve_label("b").unwrap(), 0);
        // trailing label binds to the end of the program
        assert_eq!(program.resolve_label("c").unwrap(), 1);

        let add = program.get(0).unwrap();
        assert_eq!(add.operation, Operation::StackArith(ArithOp::Add));
        assert_eq!(add.source, "a: b: add");
    }

    #[test]
    fn assemble_label_only_line_binds_forward() {
        let program = assemble_source("jmp done\nmov rax, 1\ndone:\npush rax\n").unwrap();
        assert_eq!(program.resolve_label("done").unwrap(), 2);
        assert_eq!(program.get(2).unwrap().opcode, "push");
    }

    #[test]
    fn assemble_invalid_label() {
        let err = assemble_source("mov rax, 1\n: push 1\n").unwrap_err();
        assert!(matches!(err, VMError::InvalidLabel { line: 2 }));
    }

    #[test]
    fn assemble_duplicate_label() {
        let err = assemble_source("top:\npush 1\ntop: pop\n").unwrap_err();
        assert!(matches!(
            err,
            VMError::DuplicateLabel { line: 3, ref label } if label == "top"
        ));
    }

    #[test]
    fn assemble_label_counts_toward_token_limit() {
        let program = assemble_source("l1: l2: l3: mov rax 1 2 3 4 5").unwrap();
        let instr = program.get(0).unwrap();
        assert_eq!(instr.opcode, "mov");
        assert_eq!(instr.operands, vec!["rax", "1", "2", "3"]);
    }

    #[test]
    fn assemble_unknown_opcode_is_kept() {
        let program = assemble_source("nop\nhlt 1").unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program.get(0).unwrap().operation, Operation::Nop);
    }

    #[test]
    fn assemble_file_missing() {
        let err = assemble_file("/definitely/not/here.asm").unwrap_err();
        assert!(matches!(err, VMError::IoError { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn diagnostic_points_at_line() {
        let diag = render_assembly_diagnostic("prog.asm", "push 1\ntop:\n", 2, "bad");
        assert!(diag.starts_with("error: bad\n --> prog.asm:2\n"));
        assert!(diag.contains("   2 | top:"));
    }
}
