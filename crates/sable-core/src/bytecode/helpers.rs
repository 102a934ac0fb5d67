//! Helper validations reused by tooling.

use crate::bytecode::disasm::DisasmError;
use crate::bytecode::function::FunctionBytecode;
use crate::bytecode::opcodes::{
    lookup, ClosureWidth, OP_DEFINE_GLOBAL, OP_GET_GLOBAL, OP_PUSH_CONST, OP_PUSH_CONST8,
    OP_PUT_GLOBAL,
};

/// Structural validation of a compiled function and its nested functions.
///
/// Performs the same cursor walk as the disassembler without producing any
/// output: every opcode must be defined, every instruction fully present,
/// and every constant-pool reference in range, recursively through the
/// closure tree. Tooling runs this before listing so that errors surface
/// with a dedicated message rather than halfway through the output.
pub fn validate(func: &FunctionBytecode) -> Result<(), DisasmError> {
    let code = &func.byte_code;
    let pool_len = func.cpool.len();
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
            validate(nested)?;
        } else if let Some(index) = const_operand(opcode, operands) {
            if index as usize >= pool_len {
                return Err(DisasmError::BadConstIndex { index, offset, pool_len });
            }
        }

        offset += size;
    }

    Ok(())
}

/// Constant-pool index referenced by a non-closure instruction, if any.
fn const_operand(opcode: u8, operands: &[u8]) -> Option<u32> {
    match opcode {
        OP_PUSH_CONST8 => Some(u32::from(operands[0])),
        OP_PUSH_CONST | OP_GET_GLOBAL | OP_PUT_GLOBAL | OP_DEFINE_GLOBAL => Some(
            u32::from_le_bytes([operands[0], operands[1], operands[2], operands[3]]),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::function::ConstValue;
    use crate::bytecode::opcodes::{OP_FCLOSURE8, OP_NOP, OP_PUSH_CONST8, OP_RET_NULL};
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_well_formed_streams() {
        let nested = FunctionBytecode {
            byte_code: vec![OP_RET_NULL],
            ..FunctionBytecode::default()
        };
        let func = FunctionBytecode {
            byte_code: vec![OP_PUSH_CONST8, 0x00, OP_FCLOSURE8, 0x01, OP_NOP],
            cpool: vec![ConstValue::Int(1), ConstValue::Function(nested)],
            ..FunctionBytecode::default()
        };
        assert_eq!(validate(&func), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_const_reference() {
        let func = FunctionBytecode {
            byte_code: vec![OP_PUSH_CONST8, 0x03],
            cpool: vec![ConstValue::Int(1)],
            ..FunctionBytecode::default()
        };
        assert_eq!(
            validate(&func),
            Err(DisasmError::BadConstIndex { index: 3, offset: 0, pool_len: 1 })
        );
    }

    #[test]
    fn recurses_into_nested_functions() {
        // The outer stream is fine; the nested one references a missing
        // constant and must fail the whole validation.
        let nested = FunctionBytecode {
            byte_code: vec![OP_PUSH_CONST8, 0x00],
            ..FunctionBytecode::default()
        };
        let func = FunctionBytecode {
            byte_code: vec![OP_FCLOSURE8, 0x00],
            cpool: vec![ConstValue::Function(nested)],
            ..FunctionBytecode::default()
        };
        assert_eq!(
            validate(&func),
            Err(DisasmError::BadConstIndex { index: 0, offset: 0, pool_len: 0 })
        );
    }

    #[test]
    fn rejects_truncated_trailing_instruction() {
        let func = FunctionBytecode {
            byte_code: vec![OP_NOP, OP_PUSH_CONST8],
            cpool: vec![ConstValue::Int(1)],
            ..FunctionBytecode::default()
        };
        assert_eq!(
            validate(&func),
            Err(DisasmError::Truncated {
                mnemonic: "push_const8",
                offset: 1,
                needed: 2,
                remaining: 1
            })
        );
    }
}
