//! sable-tools — Bibliothèque commune pour les outils CLI Sable.
//!
//! Objectifs : mutualiser I/O, chrono, couleurs, vues texte/JSON du bytecode.
//!
//! ## Modules & zones clés
//! - `prelude` : import rapide des types/fns usuels
//! - I/O       : `read_text`, `read_stdin_to_string`, `write_text`
//! - Time      : `Timer`, `human_millis`
//! - Couleurs  : `ColorMode`, `setup_colors`
//! - Disasm    : `listing` (re-export `sable-core`, vers `String`)
//! - JSON      : `function_json` (vue structurée récursive)
//!
//! Les fonctions sont pensées "no surprises" et avec `anyhow::Result`.
//!
//! ⚠️ Ce crate n'exécute jamais de bytecode — il ne dépend que de
//! `sable-core` et du compilateur `sable-engine`.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]
#![cfg_attr(not(debug_assertions), warn(missing_docs))]

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

pub use sable_core::{
    disassemble, lookup, validate, ConstValue, DisasmError, DisasmOptions, FunctionBytecode,
};
pub use sable_engine::{CompileError, Engine};

/// Version lisible du crate (hérite de sable-tools).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Petite bannière de version utile pour logs/outils.
pub fn version_banner(tool: &str) -> String {
    format!("{tool} — sable-tools {VERSION}")
}

/* ------------------------------------------------------------------------- */
/* Prelude                                                                   */
/* ------------------------------------------------------------------------- */

/// Prelude pratique pour les bins: re-exports compacts.
pub mod prelude {
    pub use crate::{
        default_out_path, function_json, human_millis, listing, read_stdin_to_string, read_text,
        setup_colors, to_utf8, version_banner, write_text, ColorMode, ConstJson, FunctionJson,
        InstrJson, Timer,
    };
    pub use anyhow::{anyhow, Context, Result};
    pub use camino::{Utf8Path, Utf8PathBuf};
    pub use std::path::PathBuf;
}

/* ------------------------------------------------------------------------- */
/* I/O utils                                                                 */
/* ------------------------------------------------------------------------- */

/// Lis un fichier texte en UTF-8.
pub fn read_text(path: &Utf8Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("lecture {}", path))
}

/// Lis tout `stdin` en String (UTF-8).
pub fn read_stdin_to_string() -> Result<String> {
    let mut s = String::new();
    io::stdin().read_to_string(&mut s)?;
    Ok(s)
}

/// Écrit un texte (UTF-8). Crée les dossiers au besoin.
pub fn write_text(path: &Utf8Path, s: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::File::create(path)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

/// Convertit un `PathBuf` en `Utf8PathBuf` (erreur si non UTF-8).
pub fn to_utf8(p: PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(p).map_err(|_| anyhow!("chemin non UTF-8"))
}

/// Remplace l'extension par `ext` (sans point), ex: `.disasm.txt`.
pub fn default_out_path(input: &Utf8Path, ext: &str) -> Utf8PathBuf {
    input.with_extension(ext).to_path_buf()
}

/* ------------------------------------------------------------------------- */
/* Time / chrono                                                             */
/* ------------------------------------------------------------------------- */

/// Chrono de scope simple; loggable ensuite.
pub struct Timer {
    start: Instant,
}
impl Timer {
    /// Démarre un chrono.
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }
    /// Durée écoulée.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
    /// Format humain court.
    pub fn pretty(&self) -> String {
        human_millis(self.elapsed())
    }
}

/// Format "humain" d'une durée.
pub fn human_millis(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1_000 {
        return format!("{ms} ms");
    }
    let s = ms as f64 / 1000.0;
    if s < 60.0 {
        return format!("{s:.3} s");
    }
    let m = (s / 60.0).floor();
    let rest = s - m * 60.0;
    format!("{m:.0} min {rest:.1} s")
}

/* ------------------------------------------------------------------------- */
/* Couleurs                                                                  */
/* ------------------------------------------------------------------------- */

/// Contrôle l'application de couleurs ANSI dans les sorties CLI.
#[derive(Clone, Copy, Debug)]
pub enum ColorMode {
    /// Active les couleurs seulement si la sortie supporte ANSI (auto-détection).
    Auto,
    /// Force l'activation des couleurs, même si le terminal semble ne pas les supporter.
    Always,
    /// Désactive complètement les couleurs ANSI.
    Never,
}

/// Configure le mode couleur global pour yansi (si feature `colors` active).
pub fn setup_colors(mode: ColorMode) {
    #[cfg(feature = "colors")]
    {
        match mode {
            ColorMode::Auto => {
                yansi::whenever(yansi::Condition::DEFAULT);
            }
            ColorMode::Always => {
                yansi::enable();
            }
            ColorMode::Never => yansi::disable(),
        }
    }
    #[cfg(not(feature = "colors"))]
    {
        let _ = mode;
    }
}

/* ------------------------------------------------------------------------- */
/* Disasm helpers                                                            */
/* ------------------------------------------------------------------------- */

/// Désassemble en listing texte, avec contexte d'erreur pour la CLI.
pub fn listing(func: &FunctionBytecode, opts: &DisasmOptions) -> Result<String> {
    disassemble(func, opts)
        .with_context(|| format!("désassemblage de `{}`", func.display_name()))
}

/* ------------------------------------------------------------------------- */
/* Vue JSON                                                                  */
/* ------------------------------------------------------------------------- */

/// Vue JSON d'un objet fonction, closures imbriquées comprises.
#[derive(Debug, Serialize)]
pub struct FunctionJson {
    /// Nom de la fonction (None pour une fonction anonyme).
    pub name: Option<String>,
    /// Ligne de déclaration dans la source.
    pub line: u32,
    /// Nombre de paramètres.
    pub arg_count: u16,
    /// Nombre de slots locaux.
    pub var_count: u16,
    /// Instructions décodées, dans l'ordre du flux.
    pub instructions: Vec<InstrJson>,
    /// Pool de constantes (les fonctions imbriquées récursent).
    pub consts: Vec<ConstJson>,
    /// Source attachée (absente si strippée ou jamais fournie).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Une instruction décodée.
#[derive(Debug, Serialize)]
pub struct InstrJson {
    /// Offset byte dans le flux.
    pub offset: usize,
    /// Byte d'opcode.
    pub opcode: u8,
    /// Mnémonique.
    pub mnemonic: &'static str,
    /// Octets d'opérandes, bruts.
    pub operands: Vec<u8>,
}

/// Une constante du pool.
#[derive(Debug, Serialize)]
pub struct ConstJson {
    /// Index dans le pool.
    pub index: u32,
    /// Nom du type.
    #[serde(rename = "type")]
    pub ty: &'static str,
    /// Valeur (objet récursif pour une fonction).
    pub value: serde_json::Value,
}

/// Construit la vue JSON récursive d'un objet fonction.
///
/// `strip` omet les sources à tous les niveaux, comme pour le listing
/// texte. Le flux doit être valide (passer [`validate`] avant).
pub fn function_json(func: &FunctionBytecode, strip: bool) -> Result<FunctionJson> {
    let mut instructions = Vec::new();
    let buf = &func.byte_code;
    let mut offset = 0usize;
    while offset < buf.len() {
        let opcode = buf[offset];
        let info = lookup(opcode)
            .ok_or_else(|| anyhow!("opcode inconnu {opcode:#04x} à l'offset {offset}"))?;
        let size = info.size as usize;
        if offset + size > buf.len() {
            return Err(anyhow!("instruction `{}` tronquée à l'offset {offset}", info.mnemonic));
        }
        instructions.push(InstrJson {
            offset,
            opcode,
            mnemonic: info.mnemonic,
            operands: buf[offset + 1..offset + size].to_vec(),
        });
        offset += size;
    }

    let mut consts = Vec::with_capacity(func.cpool.len());
    for (ix, value) in func.cpool.iter().enumerate() {
        let json_value = match value {
            ConstValue::Null => serde_json::Value::Null,
            ConstValue::Bool(b) => serde_json::json!(b),
            ConstValue::Int(v) => serde_json::json!(v),
            ConstValue::Float(v) => serde_json::json!(v),
            ConstValue::Str(s) => serde_json::json!(s),
            ConstValue::Function(f) => serde_json::to_value(function_json(f, strip)?)?,
        };
        consts.push(ConstJson { index: ix as u32, ty: value.type_name(), value: json_value });
    }

    Ok(FunctionJson {
        name: func.name.clone(),
        line: func.line_num,
        arg_count: func.arg_count,
        var_count: func.var_count,
        instructions,
        consts,
        source: if strip { None } else { func.source.clone() },
    })
}

/* ------------------------------------------------------------------------- */
/* Tests                                                                     */
/* ------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn human_millis_scales() {
        assert_eq!(human_millis(Duration::from_millis(12)), "12 ms");
        assert_eq!(human_millis(Duration::from_millis(2_500)), "2.500 s");
        assert_eq!(human_millis(Duration::from_secs(75)), "1 min 15.0 s");
    }

    #[test]
    fn json_view_walks_nested_functions() {
        let func = Engine::new()
            .compile("let f = fn (a) { return a; };", "t.sb")
            .unwrap();
        let view = function_json(&func, false).unwrap();
        assert_eq!(view.name.as_deref(), Some("t.sb"));
        let nested = view
            .consts
            .iter()
            .find(|c| c.ty == "function")
            .expect("fonction au pool");
        assert_eq!(nested.value["name"], serde_json::json!("f"));
        assert_eq!(nested.value["arg_count"], serde_json::json!(1));
    }

    #[test]
    fn json_strip_removes_sources_recursively() {
        let func = Engine::new()
            .compile("let f = fn () { return 1; };", "t.sb")
            .unwrap();
        let view = function_json(&func, true).unwrap();
        assert!(view.source.is_none());
        let nested = view.consts.iter().find(|c| c.ty == "function").unwrap();
        assert_eq!(nested.value.get("source"), None);
    }
}
