//! sable-engine — moteur hôte du langage Sable (compilation seule).
//!
//! Chaîne complète source → bytecode : [`lexer`] découpe, [`parser`]
//! construit l'AST, l'émetteur interne produit un [`FunctionBytecode`]
//! prêt pour le désassembleur de `sable-core`. Le moteur ne fournit
//! volontairement aucun interpréteur : il existe pour alimenter
//! l'outillage d'inspection.
//!
//! ## Exemple
//! ```
//! use sable_engine::Engine;
//!
//! let engine = Engine::new();
//! let func = engine.compile("print 1 + 2;", "demo").unwrap();
//! assert_eq!(func.name.as_deref(), Some("demo"));
//! ```

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod lexer;
pub mod parser;

mod codegen;

use sable_core::FunctionBytecode;

use crate::parser::Parser;

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreur de compilation, rattachée à l'étiquette de la source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// Erreur lexicale ou syntaxique, avec position.
    #[error("{label}:{line}:{col}: {message}")]
    Syntax {
        /// Étiquette de la source (nom de fichier ou autre).
        label: String,
        /// Ligne 1-based.
        line: u32,
        /// Colonne 1-based.
        col: u32,
        /// Message humain.
        message: String,
    },
    /// Limite d'encodage dépassée à l'émission.
    #[error("{label}: {message}")]
    Emit {
        /// Étiquette de la source.
        label: String,
        /// Message humain.
        message: String,
    },
}

/* ─────────────────────────── Moteur ─────────────────────────── */

/// Compilateur Sable. Sans état entre deux compilations.
#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

impl Engine {
    /// Crée un moteur.
    pub fn new() -> Self {
        Self
    }

    /// Compile `source` en objet fonction de tête.
    ///
    /// `label` identifie la source dans les diagnostics et nomme la
    /// fonction de tête. La fonction de tête porte la source complète
    /// (ligne 1) ; chaque littéral `fn` imbriqué porte sa propre tranche.
    pub fn compile(&self, source: &str, label: &str) -> Result<FunctionBytecode, CompileError> {
        let stmts = Parser::new(source)
            .and_then(|mut p| p.parse_program())
            .map_err(|e| CompileError::Syntax {
                label: label.to_string(),
                line: e.line,
                col: e.col,
                message: e.message,
            })?;

        let func = codegen::compile_program(source, Some(label.to_string()), &stmts).map_err(
            |e| CompileError::Emit { label: label.to_string(), message: e.message },
        )?;

        log::debug!(
            "compilé `{label}`: {} octets de bytecode, {} constantes",
            func.byte_code.len(),
            func.cpool.len()
        );
        Ok(func)
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sable_core::{validate, ConstValue};

    #[test]
    fn top_level_function_carries_label_and_full_source() {
        let src = "let x = 1;\nprint x;\n";
        let func = Engine::new().compile(src, "script.sb").unwrap();
        assert_eq!(func.name.as_deref(), Some("script.sb"));
        assert_eq!(func.source.as_deref(), Some(src));
        assert_eq!(func.line_num, 1);
        assert!(validate(&func).is_ok());
    }

    #[test]
    fn nested_function_carries_its_own_slice_and_line() {
        let src = "let one = 1;\nlet f = fn () {\n  return one;\n};\n";
        let func = Engine::new().compile(src, "script.sb").unwrap();
        let nested = func
            .cpool
            .iter()
            .find_map(|c| match c {
                ConstValue::Function(f) => Some(f),
                _ => None,
            })
            .expect("fonction au pool");
        assert_eq!(nested.line_num, 2);
        assert_eq!(
            nested.source.as_deref(),
            Some("fn () {\n  return one;\n}")
        );
    }

    #[test]
    fn syntax_errors_carry_label_and_position() {
        let err = Engine::new().compile("let = 1;", "bad.sb").unwrap_err();
        let CompileError::Syntax { label, line, .. } = err else {
            panic!("attendu une erreur de syntaxe");
        };
        assert_eq!(label, "bad.sb");
        assert_eq!(line, 1);
    }

    #[test]
    fn error_display_is_label_line_col_message() {
        let err = Engine::new().compile("print ;", "t.sb").unwrap_err();
        assert!(err.to_string().starts_with("t.sb:1:7: "));
    }
}
