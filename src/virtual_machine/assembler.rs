//! Assembly language parser and bytecode compiler.
//!
//! Converts human-readable assembly source into executable bytecode, and
//! bytecode back into assembly. Uses
//! [`for_each_instruction!`](crate::for_each_instruction) to generate the
//! assembler IR, its encoder, its decoder and the operand parser, so every
//! opcode in the table is accepted without further wiring.
//!
//! # Syntax
//!
//! ```text
//! MNEMONIC [operand]  # optional comment
//! ```
//!
//! - One instruction per line; blank lines are skipped
//! - Mnemonics are exact and uppercase (e.g., `PUSH1`, `ADD`)
//! - Operands are unsigned decimal (`42`) or hexadecimal (`0x2A`) integers,
//!   `_` may separate digits (`0xFFFF_FFFF`)
//! - The operand must fit the immediate width of the opcode
//! - Comments start with `#`
//! - Commas and tabs separate tokens like spaces do

use crate::define_instructions;
use crate::for_each_instruction;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use std::fmt;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';
const HEX_PREFIX: &str = "0x";
const DIGIT_SEPARATOR: char = '_';

/// Return the line/column/message triple for assembly-related errors.
fn assembly_error_location(err: &VMError) -> Option<(usize, usize, &str)> {
    match err {
        VMError::AssemblyError {
            line,
            offset,
            source,
        } => Some((*line, *offset, source.as_str())),
        _ => None,
    }
}

/// Formats a compiler-style diagnostic for assembly failures.
fn render_assembly_diagnostic(
    file: &str,
    source: &str,
    line: usize,
    offset: usize,
    message: &str,
) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}:{offset}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let underline = " ".repeat(offset.saturating_sub(1));
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "  | {}^", underline);
    }

    diag
}

/// Emit a helpful diagnostic to stderr for assembly errors.
fn log_assembly_error(file: &str, source: &str, err: &VMError) {
    if let Some((line, offset, message)) = assembly_error_location(err) {
        eprintln!(
            "{}",
            render_assembly_diagnostic(file, source, line, offset, message)
        );
    } else {
        eprintln!("error: {err}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column offset in the line.
    offset: usize,
}

/// Tokenize a single line of assembly.
///
/// Rules:
/// - `#` starts a comment
/// - commas are separators
/// - whitespace-separated tokens
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let code = match line.find(COMMENT_CHAR) {
        Some(end) => &line[..end],
        None => line,
    };

    let mut out = Vec::with_capacity(2);
    let mut start: Option<usize> = None;

    for (i, c) in code.char_indices() {
        let separator = c == ',' || c.is_whitespace();
        match (start, separator) {
            (None, false) => start = Some(i),
            (Some(s), true) => {
                out.push(Token {
                    text: &code[s..i],
                    offset: s + 1,
                });
                start = None;
            }
            _ => {}
        }
    }

    if let Some(s) = start {
        out.push(Token {
            text: &code[s..],
            offset: s + 1,
        });
    }

    out
}

/// Parse an unsigned integer literal that must fit in `width` bytes.
///
/// Accepts decimal and `0x`-prefixed hexadecimal, with `_` between digits.
pub(crate) fn parse_unsigned(tok: &str, width: usize) -> Result<u64, VMError> {
    let invalid = || VMError::InvalidOperand {
        token: tok.to_string(),
        width,
    };

    let (body, radix) = match tok.strip_prefix(HEX_PREFIX) {
        Some(hex) => (hex, 16),
        None => (tok, 10),
    };
    if body.starts_with(DIGIT_SEPARATOR) || body.ends_with(DIGIT_SEPARATOR) {
        return Err(invalid());
    }

    let digits: String = body.chars().filter(|&c| c != DIGIT_SEPARATOR).collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }

    let value = u64::from_str_radix(&digits, radix).map_err(|_| invalid())?;
    if width < 8 && value >> (width * 8) != 0 {
        return Err(invalid());
    }
    Ok(value)
}

pub(crate) fn parse_u8(tok: &str) -> Result<u8, VMError> {
    let value = parse_unsigned(tok, 1)?;
    u8::try_from(value).map_err(|_| VMError::InvalidOperand {
        token: tok.to_string(),
        width: 1,
    })
}

pub(crate) fn parse_u64(tok: &str) -> Result<u64, VMError> {
    parse_unsigned(tok, 8)
}

/// Wraps `err` with the position of `tok`.
fn at_token(line: usize, tok: &Token, err: VMError) -> VMError {
    VMError::AssemblyError {
        line,
        offset: tok.offset,
        source: err.to_string(),
    }
}

macro_rules! define_parse_instruction {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {

        // =========================
        // Assembler IR
        // =========================
        #[derive(Debug, Clone, PartialEq, Eq)]
        enum AsmInstr {
            $(
                $name {
                    $( $field: define_instructions!(@ty $kind) ),*
                },
            )*
        }

        impl AsmInstr {
            /// Encodes the assembly instruction into bytecode
            fn assemble(&self, out: &mut Vec<u8>) {
                match self {
                    $(
                        AsmInstr::$name { $( $field ),* } => {
                            out.push($opcode);
                            $(
                                define_instructions!(@emit out, $kind, $field);
                            )*
                        }
                    ),*
                }
            }

            /// Decodes the instruction starting at `offset`.
            ///
            /// Returns the instruction and the offset of the next one.
            fn decode(code: &[u8], offset: usize) -> Result<(AsmInstr, usize), VMError> {
                let byte = code.get(offset).copied().ok_or(VMError::UnexpectedEndOfBytecode {
                    ip: offset,
                    requested: 1,
                    available: 0,
                })?;
                let opcode = Opcode::decode_at(byte, offset)?;

                let start = offset + 1;
                let width = opcode.immediate_width();
                let _immediate = code.get(start..start + width).ok_or(
                    VMError::UnexpectedEndOfBytecode {
                        ip: start,
                        requested: width,
                        available: code.len().saturating_sub(start),
                    },
                )?;

                let instr = match opcode {
                    $(
                        Opcode::$name => AsmInstr::$name {
                            $( $field: define_parse_instruction!(@decode $kind, _immediate) ),*
                        },
                    )*
                };
                Ok((instr, start + width))
            }
        }

        impl fmt::Display for AsmInstr {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(
                        AsmInstr::$name { $( $field ),* } => {
                            f.write_str($mnemonic)?;
                            $( write!(f, " 0x{:x}", $field)?; )*
                            Ok(())
                        }
                    ),*
                }
            }
        }

        /// Parse one instruction from tokens into [`AsmInstr`].
        ///
        /// Every error is reported as [`VMError::AssemblyError`] pointing at
        /// the offending token of line `line`.
        fn parse_instruction(line: usize, tokens: &[Token]) -> Result<AsmInstr, VMError> {
            let Some(head) = tokens.first() else {
                return Err(VMError::AssemblyError {
                    line,
                    offset: 1,
                    source: "missing opcode".to_string(),
                });
            };

            let opcode = Opcode::from_mnemonic(head.text).map_err(|e| at_token(line, head, e))?;

            match opcode {
                $(
                    Opcode::$name => {
                        const EXPECTED: usize = define_parse_instruction!(@count $( $field ),*);
                        let operands = &tokens[1..];
                        if operands.len() != EXPECTED {
                            let culprit = operands.get(EXPECTED).unwrap_or(head);
                            return Err(at_token(
                                line,
                                culprit,
                                VMError::ArityMismatch {
                                    instruction: head.text.to_string(),
                                    expected: EXPECTED,
                                    actual: operands.len(),
                                },
                            ));
                        }

                        let mut _it = operands.iter();
                        Ok(AsmInstr::$name {
                            $(
                                $field: {
                                    let tok = _it.next().unwrap_or(head);
                                    define_parse_instruction!(@parse_operand $kind, tok.text)
                                        .map_err(|e| at_token(line, tok, e))?
                                },
                            )*
                        })
                    }
                ),*
            }
        }
    };

    // ---------- counting ----------
    (@count $( $x:ident ),* ) => {
        <[()]>::len(&[ $( define_parse_instruction!(@unit $x) ),* ])
    };

    (@unit $x:ident) => { () };

    // ---------- parsing ----------
    (@parse_operand Imm8, $tok:expr) => {
        parse_u8($tok)
    };

    (@parse_operand Imm64, $tok:expr) => {
        parse_u64($tok)
    };

    // ---------- decoding ----------
    (@decode Imm8, $imm:ident) => {
        $imm[0]
    };

    (@decode Imm64, $imm:ident) => {{
        let mut word = [0u8; 8];
        word.copy_from_slice($imm);
        u64::from_be_bytes(word)
    }};
}

for_each_instruction!(define_parse_instruction);

/// Assemble a full source string into bytecode.
///
/// Lines are assembled in order; the first failing line aborts assembly with
/// a [`VMError::AssemblyError`] carrying its line and column.
pub fn assemble_source(source: impl Into<String>) -> Result<Vec<u8>, VMError> {
    let source = source.into();
    let mut bytecode = Vec::new();

    for (line_no, line) in source.lines().enumerate() {
        let tokens = tokenize(line);
        if tokens.is_empty() {
            continue;
        }
        parse_instruction(line_no + 1, &tokens)?.assemble(&mut bytecode);
    }

    Ok(bytecode)
}

/// Convenience: assemble directly from file path
///
/// On failure a compiler-style diagnostic pointing into the file is written
/// to stderr before the error is returned.
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, VMError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref).map_err(|e| VMError::IoError {
        path: path_ref.display().to_string(),
        source: e.to_string(),
    })?;

    let result = assemble_source(source.as_str());
    if let Err(err) = &result {
        log_assembly_error(&path_ref.display().to_string(), &source, err);
    }
    result
}

/// Renders bytecode as assembly, one instruction per line.
///
/// Immediates are printed in hexadecimal. The output assembles back to the
/// same bytes. Fails on undefined opcodes and truncated immediates.
pub fn disassemble(bytecode: &[u8]) -> Result<String, VMError> {
    let mut out = String::new();
    let mut offset = 0;
    while offset < bytecode.len() {
        let (instr, next) = AsmInstr::decode(bytecode, offset)?;
        let _ = writeln!(out, "{instr}");
        offset = next;
    }
    Ok(out)
}
