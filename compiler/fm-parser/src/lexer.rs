// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Lexer for the Formality reference language.

use fm_ast::span::Span;
use logos::Logos;
use smol_str::SmolStr;

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of this token.
    pub kind: TokenKind,
    /// The source span of this token.
    pub span: Span,
}

/// Token kinds produced by the lexer.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    /// The `type` keyword.
    #[token("type")]
    Type,
    /// The `case` keyword.
    #[token("case")]
    Case,

    /// Dotted identifier such as `Bool.not`.
    #[regex(r"[A-Za-z_][A-Za-z0-9_.]*", |lex| SmolStr::new(lex.slice()))]
    Ident(SmolStr),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,

    /// Any character the language does not use.
    Error,

    /// End of input.
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Type => write!(f, "`type`"),
            TokenKind::Case => write!(f, "`case`"),
            TokenKind::Ident(name) => write!(f, "identifier `{name}`"),
            TokenKind::LParen => write!(f, "`(`"),
            TokenKind::RParen => write!(f, "`)`"),
            TokenKind::LBrace => write!(f, "`{{`"),
            TokenKind::RBrace => write!(f, "`}}`"),
            TokenKind::Colon => write!(f, "`:`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::Error => write!(f, "invalid character"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}

/// Tokenize `source`, always ending with an [`TokenKind::Eof`] token.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = TokenKind::lexer(source)
        .spanned()
        .map(|(result, range)| Token {
            kind: result.unwrap_or(TokenKind::Error),
            span: Span::from(range),
        })
        .collect();
    let end = source.len() as u32;
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::empty(end),
    });
    tokens
}
