//! Parseur du langage Sable (descente récursive + précédences).
//!
//! Grammaire (essentiel) :
//! ```text
//! program   := stmt*
//! stmt      := "let" ident "=" expr ";"
//!            | ident "=" expr ";"
//!            | "print" expr ";"
//!            | "return" expr? ";"
//!            | "if" "(" expr ")" block ("else" (block | if_stmt))?
//!            | "while" "(" expr ")" block
//!            | block
//!            | expr ";"
//! block     := "{" stmt* "}"
//! expr      := equality
//! equality  := comparison (("==" | "!=") comparison)*
//! comparison:= term (("<" | "<=" | ">" | ">=") term)*
//! term      := factor (("+" | "-") factor)*
//! factor    := unary (("*" | "/" | "%") unary)*
//! unary     := ("-" | "!") unary | call
//! call      := primary ("(" args? ")")*
//! primary   := INT | FLOAT | STRING | "true" | "false" | "null"
//!            | ident | "(" expr ")" | "fn" "(" params? ")" block
//! ```

use core::fmt;

use crate::lexer::{Keyword, LexError, Lexer, Token, TokenKind};

/* ─────────────────────────── AST ─────────────────────────── */

/// Opérateur unaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `!`
    Not,
}

/// Opérateur binaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
}

/// Littéral de fonction `fn (params) { ... }`.
///
/// `span` couvre le texte du `fn` jusqu'à l'accolade fermante incluse ; le
/// moteur s'en sert pour attacher la tranche de source à la fonction
/// compilée.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLit {
    /// Paramètres, dans l'ordre de déclaration.
    pub params: Vec<String>,
    /// Corps de la fonction.
    pub body: Vec<Stmt>,
    /// Ligne 1-based du mot-clé `fn`.
    pub line: u32,
    /// Plage byte `[start, end)` du littéral dans la source.
    pub span: (usize, usize),
}

/// Expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Entier.
    Int(i64),
    /// Flottant.
    Float(f64),
    /// Chaîne.
    Str(String),
    /// Référence à une variable.
    Ident(String),
    /// Application d'un opérateur unaire.
    Unary {
        /// L'opérateur.
        op: UnaryOp,
        /// L'opérande.
        rhs: Box<Expr>,
    },
    /// Application d'un opérateur binaire.
    Binary {
        /// L'opérateur.
        op: BinaryOp,
        /// Opérande gauche.
        lhs: Box<Expr>,
        /// Opérande droite.
        rhs: Box<Expr>,
    },
    /// Appel `callee(args...)`.
    Call {
        /// Expression appelée.
        callee: Box<Expr>,
        /// Arguments, dans l'ordre.
        args: Vec<Expr>,
    },
    /// Littéral de fonction.
    Function(FunctionLit),
}

/// Instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let name = expr;`
    Let {
        /// Nom déclaré.
        name: String,
        /// Valeur initiale.
        value: Expr,
        /// Ligne de la déclaration.
        line: u32,
    },
    /// `name = expr;`
    Assign {
        /// Cible de l'affectation.
        name: String,
        /// Nouvelle valeur.
        value: Expr,
        /// Ligne de l'affectation.
        line: u32,
    },
    /// `print expr;`
    Print {
        /// Valeur à afficher.
        value: Expr,
    },
    /// `return expr?;`
    Return {
        /// Valeur renvoyée (None = `return;`).
        value: Option<Expr>,
    },
    /// `if (cond) { ... } else ...`
    If {
        /// Condition.
        cond: Expr,
        /// Branche vraie.
        then_body: Vec<Stmt>,
        /// Branche fausse (peut contenir un seul `If` pour `else if`).
        else_body: Option<Vec<Stmt>>,
    },
    /// `while (cond) { ... }`
    While {
        /// Condition de boucle.
        cond: Expr,
        /// Corps.
        body: Vec<Stmt>,
    },
    /// Bloc `{ ... }` introduisant une portée.
    Block(Vec<Stmt>),
    /// Expression en instruction (valeur jetée).
    Expr(Expr),
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreur de parsing avec position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Ligne 1-based.
    pub line: u32,
    /// Colonne 1-based.
    pub col: u32,
    /// Message humain.
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError { line: e.line, col: e.col, message: e.message }
    }
}

type PResult<T> = Result<T, ParseError>;

/// Table opérateur binaire → (op, précédence). Plus grand = plus liant.
fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    Some(match kind {
        TokenKind::EqEq => (BinaryOp::Eq, 1),
        TokenKind::BangEq => (BinaryOp::Neq, 1),
        TokenKind::Lt => (BinaryOp::Lt, 2),
        TokenKind::Le => (BinaryOp::Lte, 2),
        TokenKind::Gt => (BinaryOp::Gt, 2),
        TokenKind::Ge => (BinaryOp::Gte, 2),
        TokenKind::Plus => (BinaryOp::Add, 3),
        TokenKind::Minus => (BinaryOp::Sub, 3),
        TokenKind::Star => (BinaryOp::Mul, 4),
        TokenKind::Slash => (BinaryOp::Div, 4),
        TokenKind::Percent => (BinaryOp::Mod, 4),
        _ => return None,
    })
}

/* ─────────────────────────── Parser ─────────────────────────── */

/// Parser Sable à un token d'anticipation.
pub struct Parser<'a> {
    lx: Lexer<'a>,
    look: Token,
}

impl<'a> Parser<'a> {
    /// Crée un parser depuis une source.
    pub fn new(src: &'a str) -> PResult<Self> {
        let mut lx = Lexer::new(src);
        let look = lx.next_token()?;
        Ok(Self { lx, look })
    }

    /// Parse un programme complet (jusqu'à `Eof`).
    pub fn parse_program(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while self.look.kind != TokenKind::Eof {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    /* ─────────── Navigation ─────────── */

    fn bump(&mut self) -> PResult<Token> {
        let next = self.lx.next_token()?;
        Ok(core::mem::replace(&mut self.look, next))
    }

    fn eat(&mut self, kind: &TokenKind) -> PResult<bool> {
        if &self.look.kind == kind {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<Token> {
        if &self.look.kind == kind {
            self.bump()
        } else {
            Err(self.error(format!("attendu {what}, trouvé {:?}", self.look.kind)))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError { line: self.look.line, col: self.look.col, message: message.into() }
    }

    /* ─────────── Instructions ─────────── */

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        match &self.look.kind {
            TokenKind::Kw(Keyword::Let) => self.parse_let(),
            TokenKind::Kw(Keyword::Print) => {
                self.bump()?;
                let value = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::Print { value })
            }
            TokenKind::Kw(Keyword::Return) => {
                self.bump()?;
                let value = if self.look.kind == TokenKind::Semicolon {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::Return { value })
            }
            TokenKind::Kw(Keyword::If) => self.parse_if(),
            TokenKind::Kw(Keyword::While) => {
                self.bump()?;
                self.expect(&TokenKind::LParen, "`(`")?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                let body = self.parse_block()?;
                Ok(Stmt::While { cond, body })
            }
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Ident(_) => {
                // Affectation `x = ...;` ou expression ; un seul token
                // d'anticipation suffit car une cible d'affectation est
                // toujours un identifiant nu.
                let ident_tok = self.bump()?;
                let TokenKind::Ident(name) = ident_tok.kind else { unreachable!() };
                if self.eat(&TokenKind::Assign)? {
                    let value = self.parse_expr()?;
                    self.expect(&TokenKind::Semicolon, "`;`")?;
                    Ok(Stmt::Assign { name, value, line: ident_tok.line })
                } else {
                    let expr = self.parse_call_tail(Expr::Ident(name))?;
                    let expr = self.parse_binary_tail(expr, 0)?;
                    self.expect(&TokenKind::Semicolon, "`;`")?;
                    Ok(Stmt::Expr(expr))
                }
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_let(&mut self) -> PResult<Stmt> {
        let let_tok = self.bump()?;
        let name_tok = self.bump()?;
        let TokenKind::Ident(name) = name_tok.kind else {
            return Err(ParseError {
                line: name_tok.line,
                col: name_tok.col,
                message: "attendu un identifiant après `let`".into(),
            });
        };
        self.expect(&TokenKind::Assign, "`=`")?;
        let value = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon, "`;`")?;
        Ok(Stmt::Let { name, value, line: let_tok.line })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.bump()?; // `if`
        self.expect(&TokenKind::LParen, "`(`")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "`)`")?;
        let then_body = self.parse_block()?;
        let else_body = if self.eat(&TokenKind::Kw(Keyword::Else))? {
            if self.look.kind == TokenKind::Kw(Keyword::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If { cond, then_body, else_body })
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        while self.look.kind != TokenKind::RBrace {
            if self.look.kind == TokenKind::Eof {
                return Err(self.error("`}` manquant avant la fin de l'entrée"));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.bump()?; // `}`
        Ok(stmts)
    }

    /* ─────────── Expressions ─────────── */

    fn parse_expr(&mut self) -> PResult<Expr> {
        let lhs = self.parse_unary()?;
        self.parse_binary_tail(lhs, 0)
    }

    /// Précédences croissantes : égalité < comparaison < terme < facteur.
    fn parse_binary_tail(&mut self, mut lhs: Expr, min_prec: u8) -> PResult<Expr> {
        while let Some((op, prec)) = binary_op(&self.look.kind) {
            if prec < min_prec {
                break;
            }
            self.bump()?;
            let mut rhs = self.parse_unary()?;
            while let Some((_, next_prec)) = binary_op(&self.look.kind) {
                if next_prec <= prec {
                    break;
                }
                rhs = self.parse_binary_tail(rhs, prec + 1)?;
            }
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        match self.look.kind {
            TokenKind::Minus => {
                self.bump()?;
                let rhs = self.parse_unary()?;
                Ok(Expr::Unary { op: UnaryOp::Neg, rhs: Box::new(rhs) })
            }
            TokenKind::Bang => {
                self.bump()?;
                let rhs = self.parse_unary()?;
                Ok(Expr::Unary { op: UnaryOp::Not, rhs: Box::new(rhs) })
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_call_tail(primary)
            }
        }
    }

    fn parse_call_tail(&mut self, mut callee: Expr) -> PResult<Expr> {
        while self.look.kind == TokenKind::LParen {
            self.bump()?;
            let mut args = Vec::new();
            if self.look.kind != TokenKind::RParen {
                loop {
                    args.push(self.parse_expr()?);
                    if !self.eat(&TokenKind::Comma)? {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RParen, "`)`")?;
            callee = Expr::Call { callee: Box::new(callee), args };
        }
        Ok(callee)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.bump()?;
        match tok.kind {
            TokenKind::Int(v) => Ok(Expr::Int(v)),
            TokenKind::Float(v) => Ok(Expr::Float(v)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::Kw(Keyword::True) => Ok(Expr::Bool(true)),
            TokenKind::Kw(Keyword::False) => Ok(Expr::Bool(false)),
            TokenKind::Kw(Keyword::Null) => Ok(Expr::Null),
            TokenKind::Ident(name) => Ok(Expr::Ident(name)),
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(expr)
            }
            TokenKind::Kw(Keyword::Fn) => self.parse_function_lit(&tok),
            other => Err(ParseError {
                line: tok.line,
                col: tok.col,
                message: format!("attendu une expression, trouvé {other:?}"),
            }),
        }
    }

    fn parse_function_lit(&mut self, fn_tok: &Token) -> PResult<Expr> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        if self.look.kind != TokenKind::RParen {
            loop {
                let tok = self.bump()?;
                let TokenKind::Ident(name) = tok.kind else {
                    return Err(ParseError {
                        line: tok.line,
                        col: tok.col,
                        message: "attendu un nom de paramètre".into(),
                    });
                };
                params.push(name);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "`)`")?;

        self.expect(&TokenKind::LBrace, "`{`")?;
        let mut body = Vec::new();
        while self.look.kind != TokenKind::RBrace {
            if self.look.kind == TokenKind::Eof {
                return Err(self.error("`}` manquant avant la fin de l'entrée"));
            }
            body.push(self.parse_stmt()?);
        }
        let close = self.bump()?; // `}`

        Ok(Expr::Function(FunctionLit {
            params,
            body,
            line: fn_tok.line,
            span: (fn_tok.offset, close.offset + 1),
        }))
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> Vec<Stmt> {
        Parser::new(src).unwrap().parse_program().unwrap()
    }

    #[test]
    fn precedence_mul_over_add() {
        let stmts = parse("1 + 2 * 3;");
        assert_eq!(
            stmts,
            vec![Stmt::Expr(Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expr::Int(1)),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: Box::new(Expr::Int(2)),
                    rhs: Box::new(Expr::Int(3)),
                }),
            })]
        );
    }

    #[test]
    fn comparison_binds_looser_than_term() {
        let stmts = parse("1 + 2 < 4;");
        let Stmt::Expr(Expr::Binary { op, .. }) = &stmts[0] else {
            panic!("attendu un binaire");
        };
        assert_eq!(*op, BinaryOp::Lt);
    }

    #[test]
    fn let_assign_and_call() {
        let stmts = parse("let x = 1; x = f(x, 2);");
        assert!(matches!(&stmts[0], Stmt::Let { name, .. } if name == "x"));
        let Stmt::Assign { name, value, .. } = &stmts[1] else {
            panic!("attendu une affectation");
        };
        assert_eq!(name, "x");
        let Expr::Call { args, .. } = value else { panic!("attendu un appel") };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn function_literal_span_covers_braces() {
        let src = "let f = fn (a) { return a; };";
        let stmts = parse(src);
        let Stmt::Let { value: Expr::Function(lit), .. } = &stmts[0] else {
            panic!("attendu un littéral de fonction");
        };
        assert_eq!(lit.params, vec!["a".to_string()]);
        assert_eq!(&src[lit.span.0..lit.span.1], "fn (a) { return a; }");
        assert_eq!(lit.line, 1);
    }

    #[test]
    fn else_if_chains() {
        let stmts = parse("if (a) { } else if (b) { } else { print 1; }");
        let Stmt::If { else_body: Some(else_body), .. } = &stmts[0] else {
            panic!("attendu if/else");
        };
        assert!(matches!(&else_body[0], Stmt::If { else_body: Some(_), .. }));
    }

    #[test]
    fn missing_semicolon_reports_position() {
        let err = Parser::new("let x = 1").unwrap().parse_program().unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("`;`"));
    }

    #[test]
    fn expression_statement_starting_with_ident_keeps_binary_tail() {
        let stmts = parse("a + 1;");
        assert!(matches!(
            &stmts[0],
            Stmt::Expr(Expr::Binary { op: BinaryOp::Add, .. })
        ));
    }
}
