//! Analyse lexicale pour le langage Sable.
//!
//! Couverture : commentaires `//` et `/* */`, identifiants/mots-clés,
//! entiers (décimaux), flottants, chaînes avec échappements simples,
//! ponctuation et opérateurs à deux caractères (`==`, `!=`, `<=`, `>=`).
//! Chaque token garde sa ligne, sa colonne (1-based) et son offset byte,
//! utilisés plus loin pour les diagnostics et les tranches de source.

use core::fmt;

/* ─────────────────────────── Tokens ─────────────────────────── */

/// Mots-clés reconnus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `fn`
    Fn,
    /// `let`
    Let,
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `return`
    Return,
    /// `print`
    Print,
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
}

fn keyword(text: &str) -> Option<Keyword> {
    Some(match text {
        "fn" => Keyword::Fn,
        "let" => Keyword::Let,
        "if" => Keyword::If,
        "else" => Keyword::Else,
        "while" => Keyword::While,
        "return" => Keyword::Return,
        "print" => Keyword::Print,
        "true" => Keyword::True,
        "false" => Keyword::False,
        "null" => Keyword::Null,
        _ => return None,
    })
}

/// Nature d'un token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifiant.
    Ident(String),
    /// Entier 64 bits signé.
    Int(i64),
    /// Flottant 64 bits.
    Float(f64),
    /// Chaîne (échappements résolus).
    Str(String),
    /// Mot-clé.
    Kw(Keyword),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `=`
    Assign,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `!`
    Bang,
    /// `==`
    EqEq,
    /// `!=`
    BangEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// Fin d'entrée.
    Eof,
}

/// Token + localisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Nature du token.
    pub kind: TokenKind,
    /// Ligne 1-based.
    pub line: u32,
    /// Colonne 1-based.
    pub col: u32,
    /// Offset byte du premier caractère dans la source.
    pub offset: usize,
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreur lexicale avec position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// Ligne 1-based.
    pub line: u32,
    /// Colonne 1-based.
    pub col: u32,
    /// Message humain.
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for LexError {}

type LResult<T> = Result<T, LexError>;

/* ─────────────────────────── Lexer ─────────────────────────── */

/// Lexer séquentiel sur une source UTF-8.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    /// Crée un lexer au début de `src`.
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0, line: 1, col: 1 }
    }

    /// Token suivant (ou `Eof`, renvoyé indéfiniment une fois la fin atteinte).
    pub fn next_token(&mut self) -> LResult<Token> {
        self.skip_trivia()?;

        let (line, col, offset) = (self.line, self.col, self.pos);
        let Some(ch) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, line, col, offset });
        };

        let kind = match ch {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            ',' => self.single(TokenKind::Comma),
            ';' => self.single(TokenKind::Semicolon),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            '=' => self.one_or_two('=', TokenKind::Assign, TokenKind::EqEq),
            '!' => self.one_or_two('=', TokenKind::Bang, TokenKind::BangEq),
            '<' => self.one_or_two('=', TokenKind::Lt, TokenKind::Le),
            '>' => self.one_or_two('=', TokenKind::Gt, TokenKind::Ge),
            '"' => self.string()?,
            c if c.is_ascii_digit() => self.number()?,
            c if c == '_' || c.is_alphabetic() => self.ident(),
            c => {
                return Err(self.error_at(line, col, format!("caractère inattendu `{c}`")));
            }
        };

        Ok(Token { kind, line, col, offset })
    }

    /* ─────────── Scanning interne ─────────── */

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut it = self.src[self.pos..].chars();
        it.next();
        it.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn one_or_two(&mut self, second: char, short: TokenKind, long: TokenKind) -> TokenKind {
        self.bump();
        if self.peek() == Some(second) {
            self.bump();
            long
        } else {
            short
        }
    }

    fn skip_trivia(&mut self) -> LResult<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek2() == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(self.error_at(line, col, "commentaire bloc non terminé"));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn ident(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        match keyword(text) {
            Some(kw) => TokenKind::Kw(kw),
            None => TokenKind::Ident(text.to_string()),
        }
    }

    fn number(&mut self) -> LResult<TokenKind> {
        let (line, col) = (self.line, self.col);
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.src[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error_at(line, col, format!("flottant invalide `{text}`")))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error_at(line, col, format!("entier hors limites `{text}`")))
        }
    }

    fn string(&mut self) -> LResult<TokenKind> {
        let (line, col) = (self.line, self.col);
        self.bump(); // guillemet ouvrant
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(TokenKind::Str(text)),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some(c) => {
                        return Err(self.error_at(line, col, format!("échappement inconnu `\\{c}`")));
                    }
                    None => return Err(self.error_at(line, col, "chaîne non terminée")),
                },
                Some(c) => text.push(c),
                None => return Err(self.error_at(line, col, "chaîne non terminée")),
            }
        }
    }

    fn error_at(&self, line: u32, col: u32, message: impl Into<String>) -> LexError {
        LexError { line, col, message: message.into() }
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lx = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lx.next_token().unwrap();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn punctuation_and_two_char_operators() {
        assert_eq!(
            kinds("= == ! != < <= > >="),
            vec![
                TokenKind::Assign,
                TokenKind::EqEq,
                TokenKind::Bang,
                TokenKind::BangEq,
                TokenKind::Lt,
                TokenKind::Le,
                TokenKind::Gt,
                TokenKind::Ge,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("let fnord fn"),
            vec![
                TokenKind::Kw(Keyword::Let),
                TokenKind::Ident("fnord".into()),
                TokenKind::Kw(Keyword::Fn),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_strings() {
        assert_eq!(
            kinds(r#"42 3.5 "a\nb""#),
            vec![
                TokenKind::Int(42),
                TokenKind::Float(3.5),
                TokenKind::Str("a\nb".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_trivia() {
        assert_eq!(
            kinds("1 // ligne\n/* bloc\nsur deux lignes */ 2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn positions_track_lines_and_offsets() {
        let mut lx = Lexer::new("let\n  x");
        let t1 = lx.next_token().unwrap();
        assert_eq!((t1.line, t1.col, t1.offset), (1, 1, 0));
        let t2 = lx.next_token().unwrap();
        assert_eq!((t2.line, t2.col, t2.offset), (2, 3, 6));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut lx = Lexer::new("\"abc");
        let err = lx.next_token().unwrap_err();
        assert_eq!((err.line, err.col), (1, 1));
    }
}
