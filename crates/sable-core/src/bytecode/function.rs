//! Compiled function objects as produced by the host engine.
//!
//! A `FunctionBytecode` owns its instruction buffer and its constant pool;
//! nested functions live directly in the pool (`ConstValue::Function`), so a
//! compiled program forms a plain ownership tree. The disassembler only ever
//! borrows this structure, it never mutates or shares it.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Values that can live in the constant pool.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstValue {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// UTF-8 string constant.
    Str(String),
    /// Nested compiled function, instantiated as a closure at runtime.
    Function(FunctionBytecode),
}

impl ConstValue {
    /// Short type label used by tooling (JSON views, previews).
    pub fn type_name(&self) -> &'static str {
        match self {
            ConstValue::Null => "null",
            ConstValue::Bool(_) => "bool",
            ConstValue::Int(_) => "int",
            ConstValue::Float(_) => "float",
            ConstValue::Str(_) => "str",
            ConstValue::Function(_) => "function",
        }
    }
}

/// A compiled function: instruction buffer, constant pool, source metadata.
///
/// Produced by `sable-engine`; read-only for every consumer in this
/// workspace. `source` covers exactly the text of this function (the whole
/// program for the top-level function) and `line_num` is the 1-based line on
/// which that text starts.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FunctionBytecode {
    /// Function name, if the source gave it one.
    pub name: Option<String>,
    /// Flat instruction stream: opcode byte + fixed-width operand bytes.
    pub byte_code: Vec<u8>,
    /// Constant pool; indices are operands of `push_const*`, the global ops
    /// and the closure-creation ops.
    pub cpool: Vec<ConstValue>,
    /// Source text of this function, absent once stripped by the engine.
    pub source: Option<String>,
    /// 1-based starting line of `source` in the original input.
    pub line_num: u32,
    /// Number of declared parameters.
    pub arg_count: u16,
    /// Number of local slots (parameters included).
    pub var_count: u16,
}

impl FunctionBytecode {
    /// Lookup a constant by pool index.
    pub fn const_at(&self, index: u32) -> Option<&ConstValue> {
        self.cpool.get(index as usize)
    }

    /// Lookup a nested function by pool index.
    ///
    /// `None` when the index is out of range or the slot holds a
    /// non-function constant.
    pub fn function_at(&self, index: u32) -> Option<&FunctionBytecode> {
        match self.const_at(index) {
            Some(ConstValue::Function(func)) => Some(func),
            _ => None,
        }
    }

    /// Display name for listings: the declared name or `<anonymous>`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_at_rejects_non_functions() {
        let func = FunctionBytecode {
            cpool: vec![ConstValue::Int(3), ConstValue::Function(FunctionBytecode::default())],
            ..FunctionBytecode::default()
        };
        assert!(func.function_at(0).is_none());
        assert!(func.function_at(1).is_some());
        assert!(func.function_at(2).is_none());
    }

    #[test]
    fn display_name_falls_back() {
        let mut func = FunctionBytecode::default();
        assert_eq!(func.display_name(), "<anonymous>");
        func.name = Some("main".into());
        assert_eq!(func.display_name(), "main");
    }
}
