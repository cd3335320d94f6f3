// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Parser for the Formality reference language.
//!
//! A hand-written recursive descent parser over a pre-lexed token stream.
//! Parsing a file yields the list of top-level [`Def`]s it introduces, or the
//! first error encountered. There is no recovery: the language server keeps
//! the previous definitions of a file that fails to parse.

mod error;
pub mod lexer;

use std::collections::HashSet;
use std::sync::Arc;

use fm_ast::span::Span;
use fm_ast::{Branch, Def, DefKind, Ident, Name, Param, SynthState, Term, TermKind};

pub use error::{ParseError, ParseResult};
use lexer::{Token, TokenKind};

/// Deepest nesting of terms the parser accepts.
pub const MAX_DEPTH: usize = 256;

/// Parse the file at `uri` with contents `source`.
pub fn parse(uri: &str, source: &str) -> ParseResult<Vec<Def>> {
    Parser::new(uri, source).parse_file()
}

/// Parser for one source file.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Terms currently open.
    depth: usize,
    file: Arc<str>,
    code: Arc<str>,
}

impl Parser {
    /// Create a new parser for the given source.
    pub fn new(uri: &str, source: &str) -> Self {
        Self {
            tokens: lexer::tokenize(source),
            pos: 0,
            depth: 0,
            file: Arc::from(uri),
            code: Arc::from(source),
        }
    }

    /// Parse a complete source file.
    pub fn parse_file(&mut self) -> ParseResult<Vec<Def>> {
        let mut defs = Vec::new();
        let mut seen: HashSet<Name> = HashSet::new();

        while !self.is_eof() {
            for def in self.parse_item()? {
                if !seen.insert(def.name.clone()) {
                    return Err(ParseError::Duplicate {
                        span: def.origin,
                        name: def.name,
                    });
                }
                defs.push(def);
            }
        }

        Ok(defs)
    }

    /// Parse a single top-level item.
    fn parse_item(&mut self) -> ParseResult<Vec<Def>> {
        match self.peek().kind {
            TokenKind::Type => self.parse_type(),
            TokenKind::Ident(_) => Ok(vec![self.parse_function()?]),
            _ => Err(ParseError::unexpected(self.peek(), "a definition")),
        }
    }

    /// `type Name { ctor, ctor(field: Type), }`
    fn parse_type(&mut self) -> ParseResult<Vec<Def>> {
        let start = self.advance().span;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace, "`{`")?;

        let mut ctors = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let ctor = self.expect_ident()?;
            let fields = if self.check(&TokenKind::LParen) {
                self.parse_params()?
            } else {
                Vec::new()
            };
            ctors.push((ctor, fields));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "`}`")?.span;
        let span = start.merge(end);

        let qualified: Vec<Name> = ctors
            .iter()
            .map(|(ctor, _)| Name::from(format!("{}.{}", name.name, ctor.name)))
            .collect();

        let mut defs = Vec::with_capacity(ctors.len() + 1);
        defs.push(self.def(
            name.name.clone(),
            name.span,
            span,
            DefKind::Type {
                ctors: qualified.clone(),
            },
        ));
        for ((ctor, fields), full) in ctors.into_iter().zip(qualified) {
            defs.push(self.def(
                full,
                ctor.span,
                span,
                DefKind::Ctor {
                    owner: name.clone(),
                    fields,
                },
            ));
        }
        Ok(defs)
    }

    /// `name(param: Type, ...): Type body`
    fn parse_function(&mut self) -> ParseResult<Def> {
        let name = self.expect_ident()?;
        let params = if self.check(&TokenKind::LParen) {
            self.parse_params()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::Colon, "`:`")?;
        let ret = self.expect_ident()?;
        let body = self.parse_term()?;
        let span = name.span.merge(body.span);

        Ok(self.def(
            name.name.clone(),
            name.span,
            span,
            DefKind::Func { params, ret, body },
        ))
    }

    /// `(name: Type, ...)`
    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let name = self.expect_ident()?;
            self.expect(TokenKind::Colon, "`:`")?;
            let ty = self.expect_ident()?;
            params.push(Param { name, ty });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(params)
    }

    /// A term, nested at most [`MAX_DEPTH`] deep so that parsing and
    /// checking it cannot exhaust the stack.
    fn parse_term(&mut self) -> ParseResult<Term> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep {
                span: self.peek().span,
                limit: MAX_DEPTH,
            });
        }
        self.depth += 1;
        let term = self.parse_term_inner();
        self.depth -= 1;
        term
    }

    fn parse_term_inner(&mut self) -> ParseResult<Term> {
        if self.check(&TokenKind::Case) {
            return self.parse_case();
        }

        let head = self.expect_ident()?;
        if !self.check(&TokenKind::LParen) {
            return Ok(Term {
                kind: TermKind::Ref(head.name),
                span: head.span,
            });
        }

        self.advance();
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.parse_term()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RParen, "`)`")?.span;
        Ok(Term {
            span: head.span.merge(end),
            kind: TermKind::App { func: head, args },
        })
    }

    /// `case x { ctor: term, ... }`
    fn parse_case(&mut self) -> ParseResult<Term> {
        let start = self.advance().span;
        let scrutinee = self.expect_ident()?;
        self.expect(TokenKind::LBrace, "`{`")?;

        let mut branches = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let ctor = self.expect_ident()?;
            self.expect(TokenKind::Colon, "`:`")?;
            let body = self.parse_term()?;
            branches.push(Branch { ctor, body });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "`}`")?.span;

        Ok(Term {
            kind: TermKind::Case {
                scrutinee,
                branches,
            },
            span: start.merge(end),
        })
    }

    fn def(&self, name: Name, origin: Span, span: Span, kind: DefKind) -> Def {
        Def {
            name,
            file: Arc::clone(&self.file),
            code: Arc::clone(&self.code),
            origin,
            span,
            kind,
            state: SynthState::Parsed,
        }
    }

    // === Token stream helpers ===

    fn peek(&self) -> &Token {
        // The stream always ends with Eof and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn is_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected(self.peek(), what))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<Ident> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let ident = Ident::new(name.clone(), self.peek().span);
                self.advance();
                Ok(ident)
            }
            _ => Err(ParseError::unexpected(self.peek(), "identifier")),
        }
    }
}
