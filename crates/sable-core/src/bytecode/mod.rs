//! Bytecode primitives (opcode table, compiled functions, disassembly).
//!
//! The instruction stream is a flat byte buffer: one opcode byte followed by
//! `size - 1` operand bytes, sizes fixed per opcode. Nested functions live in
//! the constant pool and are reached through the two closure-creation
//! opcodes; the disassembler follows them depth-first.

pub mod disasm;
pub mod function;
pub mod helpers;
pub mod opcodes;

pub use disasm::{disassemble, DisasmError, DisasmOptions};
pub use function::{ConstValue, FunctionBytecode};
pub use opcodes::{lookup, ClosureWidth, OpInfo, OPCODES};
