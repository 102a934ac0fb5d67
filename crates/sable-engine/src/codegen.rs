//! Émission de bytecode Sable depuis l'AST.
//!
//! Conventions d'encodage :
//! - opérandes multi-octets en little-endian ;
//! - sauts absolus sur 4 octets, patchés après coup ;
//! - les fonctions imbriquées sont compilées récursivement puis déposées
//!   dans le pool de constantes de la fonction englobante ; l'émetteur
//!   choisit `fclosure8` quand l'index tient sur un octet, `fclosure` sinon.
//!
//! Limitation assumée : pas de capture de variables (pas d'upvalues) ; un
//! nom non résolu localement est traité comme un accès global. Le moteur ne
//! faisant que compiler pour l'outillage, la sémantique d'exécution n'est
//! pas en jeu ici.

use core::fmt;

use sable_core::bytecode::opcodes::{
    OP_ADD, OP_CALL, OP_CALL8, OP_DEFINE_GLOBAL, OP_DIV, OP_DROP, OP_EQ, OP_FCLOSURE,
    OP_FCLOSURE8, OP_GET_GLOBAL, OP_GET_LOCAL16, OP_GET_LOCAL8, OP_GT, OP_GTE, OP_JMP,
    OP_JMP_IF_FALSE, OP_LT, OP_LTE, OP_MOD, OP_MUL, OP_NEG, OP_NEQ, OP_NOT, OP_PRINT,
    OP_PUSH_CONST, OP_PUSH_CONST8, OP_PUSH_FALSE, OP_PUSH_I32, OP_PUSH_I8, OP_PUSH_NULL,
    OP_PUSH_TRUE, OP_PUT_GLOBAL, OP_PUT_LOCAL16, OP_PUT_LOCAL8, OP_RET, OP_RET_NULL, OP_SUB,
};
use sable_core::{ConstValue, FunctionBytecode};

use crate::parser::{BinaryOp, Expr, FunctionLit, Stmt, UnaryOp};

/// Nombre maximal de slots locaux par fonction (`get_local16` adresse u16).
const MAX_LOCALS: usize = u16::MAX as usize;

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreur d'émission (limites de l'encodage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenError {
    /// Message humain.
    pub message: String,
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CodegenError {}

type CResult<T> = Result<T, CodegenError>;

/* ─────────────────────────── État par fonction ─────────────────────────── */

struct FuncState {
    name: Option<String>,
    code: Vec<u8>,
    cpool: Vec<ConstValue>,
    locals: Vec<String>,
    scopes: Vec<usize>,
    max_locals: usize,
    arg_count: u16,
}

impl FuncState {
    fn new(name: Option<String>, params: &[String]) -> Self {
        Self {
            name,
            code: Vec::new(),
            cpool: Vec::new(),
            locals: params.to_vec(),
            scopes: Vec::new(),
            max_locals: params.len(),
            arg_count: params.len() as u16,
        }
    }

    fn emit(&mut self, byte: u8) {
        self.code.push(byte);
    }

    fn emit_u16(&mut self, v: u16) {
        self.code.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_u32(&mut self, v: u32) {
        self.code.extend_from_slice(&v.to_le_bytes());
    }

    fn add_const(&mut self, value: ConstValue) -> u32 {
        // Déduplication légère des constantes scalaires (jamais des
        // fonctions : chaque littéral `fn` garde son objet propre).
        if !matches!(value, ConstValue::Function(_)) {
            if let Some(ix) = self.cpool.iter().position(|c| c == &value) {
                return ix as u32;
            }
        }
        let ix = self.cpool.len() as u32;
        self.cpool.push(value);
        ix
    }

    fn emit_push_const(&mut self, index: u32) {
        if index <= 0xff {
            self.emit(OP_PUSH_CONST8);
            self.emit(index as u8);
        } else {
            self.emit(OP_PUSH_CONST);
            self.emit_u32(index);
        }
    }

    fn emit_fclosure(&mut self, func: FunctionBytecode) {
        let index = self.cpool.len() as u32;
        self.cpool.push(ConstValue::Function(func));
        if index <= 0xff {
            self.emit(OP_FCLOSURE8);
            self.emit(index as u8);
        } else {
            self.emit(OP_FCLOSURE);
            self.emit_u32(index);
        }
    }

    /// Émet un saut avec cible provisoire ; renvoie l'offset à patcher.
    fn emit_jump(&mut self, op: u8) -> usize {
        self.emit(op);
        let at = self.code.len();
        self.emit_u32(0xffff_ffff);
        at
    }

    /// Fait pointer le saut émis en `at` sur l'offset courant.
    fn patch_jump(&mut self, at: usize) {
        let target = self.code.len() as u32;
        self.code[at..at + 4].copy_from_slice(&target.to_le_bytes());
    }

    fn begin_scope(&mut self) {
        self.scopes.push(self.locals.len());
    }

    fn end_scope(&mut self) {
        let keep = self.scopes.pop().unwrap_or(0);
        while self.locals.len() > keep {
            self.locals.pop();
            self.emit(OP_DROP);
        }
    }

    fn declare_local(&mut self, name: &str) -> CResult<usize> {
        if self.locals.len() >= MAX_LOCALS {
            return Err(CodegenError {
                message: format!("trop de variables locales (max {MAX_LOCALS})"),
            });
        }
        self.locals.push(name.to_string());
        self.max_locals = self.max_locals.max(self.locals.len());
        Ok(self.locals.len() - 1)
    }

    /// Slot du dernier local portant ce nom (shadowing), sinon `None`.
    fn resolve_local(&self, name: &str) -> Option<usize> {
        self.locals.iter().rposition(|n| n == name)
    }

    fn emit_get_local(&mut self, slot: usize) {
        if slot <= 0xff {
            self.emit(OP_GET_LOCAL8);
            self.emit(slot as u8);
        } else {
            self.emit(OP_GET_LOCAL16);
            self.emit_u16(slot as u16);
        }
    }

    fn emit_put_local(&mut self, slot: usize) {
        if slot <= 0xff {
            self.emit(OP_PUT_LOCAL8);
            self.emit(slot as u8);
        } else {
            self.emit(OP_PUT_LOCAL16);
            self.emit_u16(slot as u16);
        }
    }
}

/* ─────────────────────────── Compilateur ─────────────────────────── */

/// Compile un programme entier en objet fonction de tête.
///
/// `src` est le texte source complet (attaché tel quel à la fonction de
/// tête, ligne 1) ; `name` devient le nom de la fonction de tête.
pub(crate) fn compile_program(
    src: &str,
    name: Option<String>,
    stmts: &[Stmt],
) -> CResult<FunctionBytecode> {
    let mut state = FuncState::new(name, &[]);
    let top_level = true;
    for stmt in stmts {
        compile_stmt(src, &mut state, stmt, top_level)?;
    }
    state.emit(OP_RET_NULL);
    Ok(finish(state, src.to_string(), 1))
}

fn finish(state: FuncState, source: String, line_num: u32) -> FunctionBytecode {
    FunctionBytecode {
        name: state.name,
        byte_code: state.code,
        cpool: state.cpool,
        source: Some(source),
        line_num,
        arg_count: state.arg_count,
        var_count: state.max_locals as u16,
    }
}

fn compile_stmt(src: &str, state: &mut FuncState, stmt: &Stmt, top_level: bool) -> CResult<()> {
    match stmt {
        Stmt::Let { name, value, .. } => {
            compile_named_expr(src, state, value, Some(name))?;
            if top_level && state.scopes.is_empty() {
                let ix = state.add_const(ConstValue::Str(name.clone()));
                state.emit(OP_DEFINE_GLOBAL);
                state.emit_u32(ix);
            } else {
                state.declare_local(name)?;
                // La valeur reste sur la pile : son slot est le local.
            }
        }
        Stmt::Assign { name, value, .. } => {
            compile_expr(src, state, value)?;
            match state.resolve_local(name) {
                Some(slot) => state.emit_put_local(slot),
                None => {
                    let ix = state.add_const(ConstValue::Str(name.clone()));
                    state.emit(OP_PUT_GLOBAL);
                    state.emit_u32(ix);
                }
            }
        }
        Stmt::Print { value } => {
            compile_expr(src, state, value)?;
            state.emit(OP_PRINT);
        }
        Stmt::Return { value } => match value {
            Some(expr) => {
                compile_expr(src, state, expr)?;
                state.emit(OP_RET);
            }
            None => state.emit(OP_RET_NULL),
        },
        Stmt::If { cond, then_body, else_body } => {
            compile_expr(src, state, cond)?;
            let to_else = state.emit_jump(OP_JMP_IF_FALSE);
            compile_body(src, state, then_body)?;
            match else_body {
                Some(else_body) => {
                    let to_end = state.emit_jump(OP_JMP);
                    state.patch_jump(to_else);
                    compile_body(src, state, else_body)?;
                    state.patch_jump(to_end);
                }
                None => state.patch_jump(to_else),
            }
        }
        Stmt::While { cond, body } => {
            let loop_start = state.code.len() as u32;
            compile_expr(src, state, cond)?;
            let to_end = state.emit_jump(OP_JMP_IF_FALSE);
            compile_body(src, state, body)?;
            state.emit(OP_JMP);
            state.emit_u32(loop_start);
            state.patch_jump(to_end);
        }
        Stmt::Block(body) => compile_body(src, state, body)?,
        Stmt::Expr(expr) => {
            compile_expr(src, state, expr)?;
            state.emit(OP_DROP);
        }
    }
    Ok(())
}

fn compile_body(src: &str, state: &mut FuncState, body: &[Stmt]) -> CResult<()> {
    state.begin_scope();
    for stmt in body {
        compile_stmt(src, state, stmt, false)?;
    }
    state.end_scope();
    Ok(())
}

fn compile_expr(src: &str, state: &mut FuncState, expr: &Expr) -> CResult<()> {
    compile_named_expr(src, state, expr, None)
}

/// Comme `compile_expr`, avec un nom suggéré pour les littéraux `fn`
/// (`let f = fn ...` nomme la fonction `f` dans les listings).
fn compile_named_expr(
    src: &str,
    state: &mut FuncState,
    expr: &Expr,
    name_hint: Option<&str>,
) -> CResult<()> {
    match expr {
        Expr::Null => state.emit(OP_PUSH_NULL),
        Expr::Bool(true) => state.emit(OP_PUSH_TRUE),
        Expr::Bool(false) => state.emit(OP_PUSH_FALSE),
        Expr::Int(v) => compile_int(state, *v),
        Expr::Float(v) => {
            let ix = state.add_const(ConstValue::Float(*v));
            state.emit_push_const(ix);
        }
        Expr::Str(s) => {
            let ix = state.add_const(ConstValue::Str(s.clone()));
            state.emit_push_const(ix);
        }
        Expr::Ident(name) => match state.resolve_local(name) {
            Some(slot) => state.emit_get_local(slot),
            None => {
                let ix = state.add_const(ConstValue::Str(name.clone()));
                state.emit(OP_GET_GLOBAL);
                state.emit_u32(ix);
            }
        },
        Expr::Unary { op, rhs } => {
            compile_expr(src, state, rhs)?;
            state.emit(match op {
                UnaryOp::Neg => OP_NEG,
                UnaryOp::Not => OP_NOT,
            });
        }
        Expr::Binary { op, lhs, rhs } => {
            compile_expr(src, state, lhs)?;
            compile_expr(src, state, rhs)?;
            state.emit(binary_opcode(*op));
        }
        Expr::Call { callee, args } => {
            compile_expr(src, state, callee)?;
            for arg in args {
                compile_expr(src, state, arg)?;
            }
            if args.len() <= 0xff {
                state.emit(OP_CALL8);
                state.emit(args.len() as u8);
            } else {
                state.emit(OP_CALL);
                state.emit_u32(args.len() as u32);
            }
        }
        Expr::Function(lit) => {
            let func = compile_function_lit(src, lit, name_hint)?;
            state.emit_fclosure(func);
        }
    }
    Ok(())
}

fn compile_int(state: &mut FuncState, v: i64) {
    if let Ok(small) = i8::try_from(v) {
        state.emit(OP_PUSH_I8);
        state.emit(small as u8);
    } else if let Ok(medium) = i32::try_from(v) {
        state.emit(OP_PUSH_I32);
        state.emit_u32(medium as u32);
    } else {
        let ix = state.add_const(ConstValue::Int(v));
        state.emit_push_const(ix);
    }
}

fn binary_opcode(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Add => OP_ADD,
        BinaryOp::Sub => OP_SUB,
        BinaryOp::Mul => OP_MUL,
        BinaryOp::Div => OP_DIV,
        BinaryOp::Mod => OP_MOD,
        BinaryOp::Eq => OP_EQ,
        BinaryOp::Neq => OP_NEQ,
        BinaryOp::Lt => OP_LT,
        BinaryOp::Lte => OP_LTE,
        BinaryOp::Gt => OP_GT,
        BinaryOp::Gte => OP_GTE,
    }
}

fn compile_function_lit(
    src: &str,
    lit: &FunctionLit,
    name_hint: Option<&str>,
) -> CResult<FunctionBytecode> {
    if lit.params.len() > MAX_LOCALS {
        return Err(CodegenError {
            message: format!("trop de paramètres (max {MAX_LOCALS})"),
        });
    }
    let mut state = FuncState::new(name_hint.map(str::to_string), &lit.params);
    for stmt in &lit.body {
        compile_stmt(src, &mut state, stmt, false)?;
    }
    state.emit(OP_RET_NULL);
    let source = src[lit.span.0..lit.span.1].to_string();
    Ok(finish(state, source, lit.line))
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn compile(src: &str) -> FunctionBytecode {
        let stmts = Parser::new(src).unwrap().parse_program().unwrap();
        compile_program(src, None, &stmts).unwrap()
    }

    #[test]
    fn print_of_small_int() {
        let func = compile("print 7;");
        assert_eq!(func.byte_code, vec![OP_PUSH_I8, 7, OP_PRINT, OP_RET_NULL]);
        assert!(func.cpool.is_empty());
    }

    #[test]
    fn negative_and_wide_ints_pick_wider_encodings() {
        let func = compile("print 1000;");
        assert_eq!(
            func.byte_code,
            vec![OP_PUSH_I32, 0xe8, 0x03, 0x00, 0x00, OP_PRINT, OP_RET_NULL]
        );

        let func = compile("print 5000000000;");
        assert_eq!(
            func.byte_code,
            vec![OP_PUSH_CONST8, 0x00, OP_PRINT, OP_RET_NULL]
        );
        assert_eq!(func.cpool, vec![ConstValue::Int(5_000_000_000)]);
    }

    #[test]
    fn top_level_let_defines_a_global() {
        let func = compile("let x = 1;");
        assert_eq!(
            func.byte_code,
            vec![OP_PUSH_I8, 1, OP_DEFINE_GLOBAL, 0x00, 0x00, 0x00, 0x00, OP_RET_NULL]
        );
        assert_eq!(func.cpool, vec![ConstValue::Str("x".into())]);
    }

    #[test]
    fn block_locals_use_local_slots() {
        let func = compile("{ let a = 1; print a; }");
        assert_eq!(
            func.byte_code,
            vec![
                OP_PUSH_I8, 1,        // valeur de `a`, slot 0
                OP_GET_LOCAL8, 0x00,  // print a
                OP_PRINT,
                OP_DROP,              // fin de portée
                OP_RET_NULL,
            ]
        );
    }

    #[test]
    fn function_literal_lands_in_cpool_with_fclosure8() {
        let src = "let f = fn (a) { return a; };";
        let func = compile(src);
        assert_eq!(func.byte_code[0], OP_FCLOSURE8);
        assert_eq!(func.byte_code[1], 0x00);

        let nested = func.function_at(0).expect("fonction imbriquée au pool");
        assert_eq!(nested.name.as_deref(), Some("f"));
        assert_eq!(nested.arg_count, 1);
        assert_eq!(nested.source.as_deref(), Some("fn (a) { return a; }"));
        assert_eq!(nested.line_num, 1);
        assert_eq!(
            nested.byte_code,
            vec![OP_GET_LOCAL8, 0x00, OP_RET, OP_RET_NULL]
        );
    }

    #[test]
    fn nested_function_literals_nest_in_pools() {
        let src = "let f = fn () { let g = fn () { return 1; }; return g; };";
        let func = compile(src);
        let f = func.function_at(0).unwrap();
        let g = f.function_at(0).unwrap();
        assert_eq!(g.name.as_deref(), Some("g"));
        assert_eq!(g.line_num, 1);
        assert_eq!(g.source.as_deref(), Some("fn () { return 1; }"));
    }

    #[test]
    fn fclosure_wide_form_past_255_constants() {
        let mut state = FuncState::new(None, &[]);
        for i in 0..256 {
            state.cpool.push(ConstValue::Int(i));
        }
        state.emit_fclosure(FunctionBytecode::default());
        assert_eq!(state.code[0], OP_FCLOSURE);
        assert_eq!(&state.code[1..5], &256u32.to_le_bytes());
    }

    #[test]
    fn if_else_patches_forward_jumps() {
        let func = compile("if (true) { print 1; } else { print 2; }");
        assert_eq!(func.byte_code[0], OP_PUSH_TRUE);
        assert_eq!(func.byte_code[1], OP_JMP_IF_FALSE);
        let to_else = u32::from_le_bytes(func.byte_code[2..6].try_into().unwrap()) as usize;
        // La cible du saut doit tomber sur une frontière d'instruction,
        // après la branche vraie et son `jmp` de sortie.
        assert!(to_else > 6 && to_else < func.byte_code.len());
        assert!(sable_core::validate(&func).is_ok());
    }

    #[test]
    fn while_loops_jump_backwards() {
        let func = compile("while (true) { print 1; }");
        assert!(sable_core::validate(&func).is_ok());
        let jmp_at = func
            .byte_code
            .iter()
            .rposition(|&b| b == OP_JMP)
            .expect("jmp de boucle");
        let target = u32::from_le_bytes(func.byte_code[jmp_at + 1..jmp_at + 5].try_into().unwrap());
        assert_eq!(target, 0);
    }

    #[test]
    fn scalar_constants_are_deduplicated() {
        let func = compile("print \"a\"; print \"a\";");
        assert_eq!(func.cpool, vec![ConstValue::Str("a".into())]);
    }

    #[test]
    fn every_compiled_stream_validates() {
        let srcs = [
            "print 1 + 2 * 3;",
            "let x = 1; x = x + 1; print x;",
            "let f = fn (a, b) { return a < b; }; print f(1, 2);",
            "{ let a = 1; { let b = 2; print a + b; } }",
            "if (1 < 2) { print \"oui\"; } else { print \"non\"; }",
        ];
        for src in srcs {
            let func = compile(src);
            assert!(sable_core::validate(&func).is_ok(), "invalide: {src}");
        }
    }
}
