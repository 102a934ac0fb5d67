//! Static opcode table for the Sable VM instruction set.
//!
//! One entry per defined opcode byte: mnemonic plus total encoded size
//! (opcode byte included). The table is built once at compile time and never
//! mutated; lookup is a plain array index. Bytes without an entry are not
//! part of the instruction set and must abort decoding.

/// Operand width of a closure-creation instruction.
///
/// The instruction set has exactly two closure-creation forms. Carrying the
/// width on the descriptor lets the decoder resolve the constant-pool index
/// without comparing mnemonic strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureWidth {
    /// Single operand byte is the constant-pool index.
    U8,
    /// Four operand bytes, little-endian, form the constant-pool index.
    U32,
}

/// Descriptor for one opcode value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    /// Human-readable name, unique per opcode.
    pub mnemonic: &'static str,
    /// Total encoded size in bytes, opcode byte included. Always >= 1;
    /// `size - 1` operand bytes follow the opcode in the stream.
    pub size: u8,
    /// Set for the two closure-creation forms, `None` otherwise.
    pub closure: Option<ClosureWidth>,
}

macro_rules! define_opcodes {
    ($($konst:ident = $code:literal, $name:literal, $size:literal $(, closure($width:ident))? ;)*) => {
        $(
            #[doc = concat!("Opcode byte for `", $name, "`.")]
            pub const $konst: u8 = $code;
        )*

        /// Dense opcode table, indexed by the opcode byte itself.
        pub static OPCODES: [Option<OpInfo>; 256] = {
            let mut table: [Option<OpInfo>; 256] = [None; 256];
            $(
                table[$code as usize] = Some(OpInfo {
                    mnemonic: $name,
                    size: $size,
                    closure: define_opcodes!(@closure $($width)?),
                });
            )*
            table
        };
    };
    (@closure) => { None };
    (@closure $width:ident) => { Some(ClosureWidth::$width) };
}

define_opcodes! {
    OP_NOP           = 0x00, "nop",           1;
    OP_PUSH_NULL     = 0x01, "push_null",     1;
    OP_PUSH_TRUE     = 0x02, "push_true",     1;
    OP_PUSH_FALSE    = 0x03, "push_false",    1;
    OP_PUSH_I8       = 0x04, "push_i8",       2;
    OP_PUSH_I32      = 0x05, "push_i32",      5;
    OP_PUSH_CONST8   = 0x06, "push_const8",   2;
    OP_PUSH_CONST    = 0x07, "push_const",    5;
    OP_FCLOSURE8     = 0x08, "fclosure8",     2, closure(U8);
    OP_FCLOSURE      = 0x09, "fclosure",      5, closure(U32);
    OP_DUP           = 0x0a, "dup",           1;
    OP_DROP          = 0x0b, "drop",          1;
    OP_SWAP          = 0x0c, "swap",          1;
    OP_GET_LOCAL8    = 0x0d, "get_local8",    2;
    OP_PUT_LOCAL8    = 0x0e, "put_local8",    2;
    OP_GET_LOCAL16   = 0x0f, "get_local16",   3;
    OP_PUT_LOCAL16   = 0x10, "put_local16",   3;
    OP_GET_GLOBAL    = 0x11, "get_global",    5;
    OP_PUT_GLOBAL    = 0x12, "put_global",    5;
    OP_DEFINE_GLOBAL = 0x13, "define_global", 5;
    OP_ADD           = 0x14, "add",           1;
    OP_SUB           = 0x15, "sub",           1;
    OP_MUL           = 0x16, "mul",           1;
    OP_DIV           = 0x17, "div",           1;
    OP_MOD           = 0x18, "mod",           1;
    OP_NEG           = 0x19, "neg",           1;
    OP_NOT           = 0x1a, "not",           1;
    OP_EQ            = 0x1b, "eq",            1;
    OP_NEQ           = 0x1c, "neq",           1;
    OP_LT            = 0x1d, "lt",            1;
    OP_LTE           = 0x1e, "lte",           1;
    OP_GT            = 0x1f, "gt",            1;
    OP_GTE           = 0x20, "gte",           1;
    OP_JMP           = 0x21, "jmp",           5;
    OP_JMP_IF_FALSE  = 0x22, "jmp_if_false",  5;
    OP_JMP_IF_TRUE   = 0x23, "jmp_if_true",   5;
    OP_CALL8         = 0x24, "call8",         2;
    OP_CALL          = 0x25, "call",          5;
    OP_RET           = 0x26, "ret",           1;
    OP_RET_NULL      = 0x27, "ret_null",      1;
    OP_PRINT         = 0x28, "print",         1;
}

/// Lookup the descriptor for an opcode byte.
///
/// Returns `None` for bytes that are not part of the instruction set; the
/// decoder treats that as fatal since the instruction size is unknown.
#[inline]
pub fn lookup(opcode: u8) -> Option<&'static OpInfo> {
    OPCODES[opcode as usize].as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_entry_has_a_sane_size() {
        for info in OPCODES.iter().flatten() {
            assert!(info.size >= 1, "{} has size 0", info.mnemonic);
            assert!(!info.mnemonic.is_empty());
        }
    }

    #[test]
    fn mnemonics_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for info in OPCODES.iter().flatten() {
            assert!(seen.insert(info.mnemonic), "duplicate mnemonic {}", info.mnemonic);
        }
    }

    #[test]
    fn exactly_two_closure_forms() {
        let widths: Vec<_> = OPCODES
            .iter()
            .flatten()
            .filter_map(|info| info.closure.map(|w| (info.mnemonic, info.size, w)))
            .collect();
        assert_eq!(
            widths,
            vec![
                ("fclosure8", 2, ClosureWidth::U8),
                ("fclosure", 5, ClosureWidth::U32),
            ]
        );
    }

    #[test]
    fn closure_operand_width_matches_declared_size() {
        for info in OPCODES.iter().flatten() {
            match info.closure {
                Some(ClosureWidth::U8) => assert_eq!(info.size, 2),
                Some(ClosureWidth::U32) => assert_eq!(info.size, 5),
                None => {}
            }
        }
    }

    #[test]
    fn lookup_defined_and_undefined() {
        assert_eq!(lookup(OP_NOP).map(|i| i.mnemonic), Some("nop"));
        assert_eq!(lookup(OP_FCLOSURE).map(|i| i.size), Some(5));
        assert!(lookup(0xff).is_none());
        assert!(lookup(0x29).is_none());
    }
}
