//! sable-core — primitives partagées du bytecode Sable
//!
//! Fournit :
//! - La table d'opcodes (`bytecode::opcodes`) : 256 entrées, construites une
//!   fois, jamais mutées
//! - `FunctionBytecode` + `ConstValue` : l'objet fonction compilé produit par
//!   le moteur hôte (`sable-engine`), pool de constantes incluse
//! - Le désassembleur récursif (`bytecode::disasm`) et ses erreurs
//! - Helpers de validation structurelle (`bytecode::helpers`)
//!
//! Features :
//! - `serde` : derive (dé)sérialisation sur le modèle de données

#![deny(missing_docs)]

/// Primitives de bytecode (opcodes, objets fonction, désassembleur, helpers).
pub mod bytecode;

pub use bytecode::disasm::{disassemble, DisasmError, DisasmOptions};
pub use bytecode::function::{ConstValue, FunctionBytecode};
pub use bytecode::helpers::validate;
pub use bytecode::opcodes::{lookup, ClosureWidth, OpInfo, OPCODES};

/// Alias résultat commun au core.
pub type CoreResult<T> = core::result::Result<T, DisasmError>;

/// Prélude pratique pour importer les types/funcs clés du crate.
pub mod prelude {
    /// Réexports utiles pour une importation rapide.
    pub use super::{
        disassemble, lookup, validate, ClosureWidth, ConstValue, CoreResult, DisasmError,
        DisasmOptions, FunctionBytecode, OpInfo, OPCODES,
    };
}
