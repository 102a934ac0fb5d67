//! Recursive textual disassembly of compiled functions.
//!
//! The listing is a pure function of the function tree and the options: one
//! line per instruction (`0xNN (mnemonic) 0xNN ...`), closure-creation
//! instructions followed inline by the full listing of the nested function
//! at one more indent level, optionally preceded by a `Source (Line N):`
//! header per function.

use core::fmt::Write;

use thiserror::Error;

use crate::bytecode::function::FunctionBytecode;
use crate::bytecode::opcodes::{lookup, ClosureWidth};

/// Columns per nesting level.
pub const INDENT_WIDTH: usize = 2;

/// Errors that abort a disassembly pass.
///
/// All of these are fatal for the whole pass: once an instruction cannot be
/// decoded, its size is unknown and every later offset would be garbage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DisasmError {
    /// A byte in the instruction buffer has no entry in the opcode table.
    #[error("invalid opcode {opcode:#04x} at offset {offset}")]
    InvalidOpcode {
        /// The undefined opcode byte.
        opcode: u8,
        /// Byte offset of the opcode within its instruction buffer.
        offset: usize,
    },

    /// Fewer bytes remain than the instruction's declared size requires.
    #[error("truncated `{mnemonic}` at offset {offset}: needs {needed} bytes, {remaining} remain")]
    Truncated {
        /// Mnemonic of the truncated instruction.
        mnemonic: &'static str,
        /// Byte offset of the opcode within its instruction buffer.
        offset: usize,
        /// Declared encoded size of the instruction.
        needed: usize,
        /// Bytes actually remaining in the buffer.
        remaining: usize,
    },

    /// A closure-creation operand does not resolve to a nested function.
    #[error("closure target {index} at offset {offset} is not a function constant")]
    BadClosureTarget {
        /// Constant-pool index decoded from the operand bytes.
        index: u32,
        /// Byte offset of the closure-creation opcode.
        offset: usize,
    },

    /// A constant-referencing operand points outside the pool (validation).
    #[error("constant index {index} at offset {offset} is outside the pool ({pool_len} entries)")]
    BadConstIndex {
        /// Out-of-range constant-pool index.
        index: u32,
        /// Byte offset of the referencing opcode.
        offset: usize,
        /// Size of the constant pool.
        pool_len: usize,
    },

    /// Closure nesting exceeded the configured limit.
    #[error("closure nesting deeper than the configured limit of {0}")]
    DepthLimit(usize),
}

/// Options for one disassembly pass.
#[derive(Debug, Clone, Default)]
pub struct DisasmOptions {
    /// Suppress the source header and body for every function, at every
    /// nesting depth.
    pub strip: bool,
    /// Optional bound on closure nesting. `None` reproduces the reference
    /// behavior (the input is assumed to be a finite tree).
    pub max_depth: Option<usize>,
}

/// Disassemble a compiled function and every nested function, depth-first.
///
/// The output is buffered in a `String`; two passes over the same input with
/// the same options yield byte-identical text.
pub fn disassemble(func: &FunctionBytecode, opts: &DisasmOptions) -> Result<String, DisasmError> {
    let mut out = String::new();
    dump(&mut out, func, opts, 0)?;
    Ok(out)
}

fn dump(
    out: &mut String,
    func: &FunctionBytecode,
    opts: &DisasmOptions,
    depth: usize,
) -> Result<(), DisasmError> {
    if let Some(limit) = opts.max_depth {
        if depth > limit {
            return Err(DisasmError::DepthLimit(limit));
        }
    }

    let pad = " ".repeat(depth * INDENT_WIDTH);

    if !opts.strip {
        if let Some(source) = func.source.as_deref() {
            if !source.is_empty() {
                write_source(out, source, func.line_num, depth);
            }
        }
    }

    let code = &func.byte_code;
    let mut offset = 0usize;

    while offset < code.len() {
        let opcode = code[offset];
        let info = lookup(opcode).ok_or(DisasmError::InvalidOpcode { opcode, offset })?;

        let size = info.size as usize;
        let remaining = code.len() - offset;
        if size > remaining {
            return Err(DisasmError::Truncated {
                mnemonic: info.mnemonic,
                offset,
                needed: size,
                remaining,
            });
        }
        let operands = &code[offset + 1..offset + size];

        let _ = write!(out, "{pad}{opcode:#04x} ({})", info.mnemonic);
        for byte in operands {
            let _ = write!(out, " {byte:#04x}");
        }
        out.push('\n');

        if let Some(width) = info.closure {
            let index = match width {
                ClosureWidth::U8 => u32::from(operands[0]),
                ClosureWidth::U32 => {
                    u32::from_le_bytes([operands[0], operands[1], operands[2], operands[3]])
                }
            };
            let nested = func
                .function_at(index)
                .ok_or(DisasmError::BadClosureTarget { index, offset })?;
            dump(out, nested, opts, depth + 1)?;
        }

        offset += size;
    }

    Ok(())
}

/// Emit the `Source (Line N):` header plus the re-indented source body.
///
/// Every line of a multi-line body continues at `depth + 1`, not just the
/// first one.
fn write_source(out: &mut String, source: &str, line_num: u32, depth: usize) {
    let pad = " ".repeat(depth * INDENT_WIDTH);
    let inner = " ".repeat((depth + 1) * INDENT_WIDTH);

    let _ = writeln!(out, "{pad}Source (Line {line_num}):");
    out.push_str(&inner);
    for ch in source.chars() {
        out.push(ch);
        if ch == '\n' {
            out.push_str(&inner);
        }
    }
    out.push('\n');
}
