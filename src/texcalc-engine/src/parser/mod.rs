// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Hand-written recursive descent parser for LaTeX math expressions.
//!
//! Precedence, loosest first: `+ -`, explicit `\cdot`/`*`/`/`, implicit
//! multiplication by juxtaposition, unary `-`, `^` (right associative),
//! postfix indexing, and primaries.  Names are resolved against the
//! caller's symbols while parsing, so the tree never holds a name that
//! has to be rewritten later.

use crate::ast::{BinaryOp, Binding, Callee, Expr, Loc, UnaryOp};
use crate::builtins::BuiltinFn;
use crate::common::{
    EquationError, EquationResult, ErrorCode, Ident, canonicalize, span_offset,
};
use crate::lexer::{Lexer, LexerType, Spanned, Token};
use crate::registry::SymbolId;
use crate::units::Context;

#[cfg(test)]
mod tests;

/// What a name means to the caller's symbol table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved {
    Value(SymbolId),
    /// A user function and the number of parameters it takes.
    Function(SymbolId, usize),
}

/// Resolver is the parser's view of the symbols bound so far.
pub trait Resolver {
    fn resolve(&self, name: &Ident) -> Option<Resolved>;
}

/// NoSymbols resolves nothing, for expressions parsed outside of any
/// document.
pub struct NoSymbols;

impl Resolver for NoSymbols {
    fn resolve(&self, _name: &Ident) -> Option<Resolved> {
        None
    }
}

/// Everything names in an equation are resolved against.
pub struct ParseEnv<'a> {
    pub units: &'a Context,
    pub symbols: &'a dyn Resolver,
    /// Parameter names, when parsing the body of a function definition.
    pub locals: &'a [Ident],
}

/// TokenKind discriminant for efficient peek comparisons without payload matching
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Plus,
    Minus,
    Mul,
    Div,
    Exp,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Frac,
    Sqrt,
    Function,
    Unit,
    Ident,
    Num,
}

impl<'a> From<&Token<'a>> for TokenKind {
    fn from(token: &Token<'a>) -> Self {
        match token {
            Token::Plus => TokenKind::Plus,
            Token::Minus => TokenKind::Minus,
            Token::Mul => TokenKind::Mul,
            Token::Div => TokenKind::Div,
            Token::Exp => TokenKind::Exp,
            Token::LParen => TokenKind::LParen,
            Token::RParen => TokenKind::RParen,
            Token::LBracket => TokenKind::LBracket,
            Token::RBracket => TokenKind::RBracket,
            Token::LBrace => TokenKind::LBrace,
            Token::RBrace => TokenKind::RBrace,
            Token::Comma => TokenKind::Comma,
            Token::Frac => TokenKind::Frac,
            Token::Sqrt => TokenKind::Sqrt,
            Token::Function(_) => TokenKind::Function,
            Token::Unit(_) => TokenKind::Unit,
            Token::Ident(_) => TokenKind::Ident,
            Token::Num(_) => TokenKind::Num,
        }
    }
}

impl TokenKind {
    /// starts_operand is true for tokens that may begin the right-hand
    /// side of an implicit multiplication, like the `x` in `2x`.
    fn starts_operand(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Num | Ident | Unit | Function | Frac | Sqrt | LParen | LBrace | LBracket
        )
    }

    fn is_closer(self) -> bool {
        matches!(
            self,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace
        )
    }
}

fn error<T>(code: ErrorCode, start: usize, end: usize) -> EquationResult<T> {
    Err(EquationError {
        start: span_offset(start),
        end: span_offset(end),
        code,
    })
}

/// Parser state holding tokenized input
struct Parser<'a> {
    tokens: Vec<Spanned<Token<'a>>>,
    pos: usize,
    is_units: bool,
    env: Option<&'a ParseEnv<'a>>,
}

impl<'a> Parser<'a> {
    /// Create a new parser from a lexer, collecting all tokens up front.
    /// Returns an error if the lexer produces any errors.
    fn new(
        lexer: Lexer<'a>,
        is_units: bool,
        env: Option<&'a ParseEnv<'a>>,
    ) -> EquationResult<Self> {
        let tokens = lexer.collect::<EquationResult<Vec<_>>>()?;
        Ok(Parser {
            tokens,
            pos: 0,
            is_units,
            env,
        })
    }

    fn peek(&self) -> Option<&Spanned<Token<'a>>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|(_, tok, _)| TokenKind::from(tok))
    }

    /// advance consumes the current token, failing at the end of input.
    fn advance(&mut self) -> EquationResult<Spanned<Token<'a>>> {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                Ok(tok.clone())
            }
            None => self.eof_error(),
        }
    }

    /// span_kind is the current token's kind and span.
    fn span_kind(&self) -> Option<(usize, TokenKind, usize)> {
        self.peek()
            .map(|(start, tok, end)| (*start, TokenKind::from(tok), *end))
    }

    fn expect(&mut self, expected: TokenKind) -> EquationResult<Spanned<Token<'a>>> {
        match self.span_kind() {
            Some((_, kind, _)) if kind == expected => self.advance(),
            Some((start, _, end)) => error(ErrorCode::UnrecognizedToken, start, end),
            None => self.eof_error(),
        }
    }

    /// close consumes the delimiter matching an opener spanning
    /// `open_start..open_end`, returning where the group ends.
    fn close(
        &mut self,
        expected: TokenKind,
        open_start: usize,
        open_end: usize,
    ) -> EquationResult<usize> {
        match self.span_kind() {
            Some((_, kind, end)) if kind == expected => {
                self.pos += 1;
                Ok(end)
            }
            Some((start, kind, end)) if kind.is_closer() => {
                error(ErrorCode::UnmatchedBracket, start, end)
            }
            Some((start, _, end)) => error(ErrorCode::UnrecognizedToken, start, end),
            None => error(ErrorCode::UnmatchedBracket, open_start, open_end),
        }
    }

    fn eof_position(&self) -> usize {
        if let Some((_, _, end)) = self.tokens.last() {
            *end
        } else {
            0
        }
    }

    fn eof_error<T>(&self) -> EquationResult<T> {
        let pos = self.eof_position();
        error(ErrorCode::UnrecognizedEof, pos, pos + 1)
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Parse an equation from the token stream.
    /// Returns Ok(None) for empty input.
    fn parse_equation(&mut self) -> EquationResult<Option<Expr>> {
        if self.is_at_end() {
            return Ok(None);
        }

        let expr = self.parse_expr()?;

        if let Some((start, kind, end)) = self.span_kind() {
            let code = if kind.is_closer() {
                ErrorCode::UnmatchedBracket
            } else {
                ErrorCode::ExtraToken
            };
            return error(code, start, end);
        }

        Ok(Some(expr))
    }

    fn parse_expr(&mut self) -> EquationResult<Expr> {
        self.parse_additive()
    }

    /// Parse additive operators: + -
    fn parse_additive(&mut self) -> EquationResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            let loc = left.get_loc().union(&right.get_loc());
            left = Expr::Op2(op, Box::new(left), Box::new(right), loc);
        }

        Ok(left)
    }

    /// Parse explicit multiplicative operators: * / \cdot \times \div
    fn parse_multiplicative(&mut self) -> EquationResult<Expr> {
        let mut left = self.parse_implicit()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Mul) => BinaryOp::Mul,
                Some(TokenKind::Div) => BinaryOp::Div,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_implicit()?;
            let loc = left.get_loc().union(&right.get_loc());
            left = Expr::Op2(op, Box::new(left), Box::new(right), loc);
        }

        Ok(left)
    }

    /// Parse multiplication by juxtaposition, which binds tighter than
    /// an explicit operator: `5\,\mathrm{km} / 2\,\mathrm{h}` divides
    /// by two hours.
    fn parse_implicit(&mut self) -> EquationResult<Expr> {
        let mut left = self.parse_unary()?;

        while self.peek_kind().is_some_and(TokenKind::starts_operand) {
            let right = self.parse_power()?;
            let loc = left.get_loc().union(&right.get_loc());
            left = Expr::Op2(BinaryOp::Mul, Box::new(left), Box::new(right), loc);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> EquationResult<Expr> {
        let op = match self.peek_kind() {
            Some(TokenKind::Minus) => UnaryOp::Negative,
            Some(TokenKind::Plus) => UnaryOp::Positive,
            _ => return self.parse_power(),
        };
        let (lpos, _, _) = self.advance()?;
        let operand = self.parse_unary()?;
        let loc = Loc::new(lpos, operand.get_loc().end as usize);
        Ok(Expr::Op1(op, Box::new(operand), loc))
    }

    /// Parse exponentiation (right-associative): `2^3^2` is `2^9`
    fn parse_power(&mut self) -> EquationResult<Expr> {
        let base = self.parse_postfix()?;

        if self.peek_kind() == Some(TokenKind::Exp) {
            self.pos += 1;
            let exponent = self.parse_unary()?;
            let loc = base.get_loc().union(&exponent.get_loc());
            return Ok(Expr::Op2(
                BinaryOp::Exp,
                Box::new(base),
                Box::new(exponent),
                loc,
            ));
        }

        Ok(base)
    }

    /// Parse index suffixes: `gamma[1]`, `f(x)[0]`
    fn parse_postfix(&mut self) -> EquationResult<Expr> {
        let mut expr = self.parse_primary()?;

        while self.peek_kind() == Some(TokenKind::LBracket) && expr.is_indexable() {
            let (lpos, _, rpos) = self.advance()?;
            let index = self.parse_expr()?;
            let end = self.close(TokenKind::RBracket, lpos, rpos)?;
            let loc = Loc::new(expr.get_loc().start as usize, end);
            expr = Expr::Index(Box::new(expr), Box::new(index), loc);
        }

        Ok(expr)
    }

    /// frac_argument parses one argument of `\frac`.  Unbraced, TeX
    /// takes a single digit, so `\frac12` is a half and `\frac123` is
    /// `\frac{1}{2}3`.
    fn frac_argument(&mut self) -> EquationResult<Expr> {
        if let Some((lpos, Token::Num(s), rpos)) = self.peek().cloned() {
            let bytes = s.as_bytes();
            if bytes.len() > 1 && bytes[0].is_ascii_digit() && bytes[1].is_ascii_digit() {
                let (digit, rest) = s.split_at(1);
                self.tokens[self.pos] = (lpos + 1, Token::Num(rest), rpos);
                let n = f64::from(bytes[0] - b'0');
                return Ok(Expr::Const(digit.to_owned(), n, Loc::new(lpos, lpos + 1)));
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> EquationResult<Expr> {
        let (lpos, tok, rpos) = match self.peek() {
            Some(tok) => tok.clone(),
            None => return self.eof_error(),
        };

        match tok {
            Token::Num(s) => {
                self.pos += 1;
                match s.parse::<f64>() {
                    Ok(n) => Ok(Expr::Const(s.to_string(), n, Loc::new(lpos, rpos))),
                    Err(_) => error(ErrorCode::ExpectedNumber, lpos, rpos),
                }
            }
            Token::Unit(units) => {
                self.pos += 1;
                Ok(Expr::Unit(units.into_owned(), Loc::new(lpos, rpos)))
            }
            Token::Ident(s) => {
                self.pos += 1;
                self.parse_identifier(s, lpos, rpos)
            }
            Token::Function(name) => {
                self.pos += 1;
                self.parse_function_command(name, lpos, rpos)
            }
            Token::Frac => {
                self.pos += 1;
                let numerator = self.frac_argument()?;
                let denominator = self.frac_argument()?;
                let loc = Loc::new(lpos, denominator.get_loc().end as usize);
                Ok(Expr::Op2(
                    BinaryOp::Div,
                    Box::new(numerator),
                    Box::new(denominator),
                    loc,
                ))
            }
            Token::Sqrt => {
                self.pos += 1;
                self.parse_sqrt(lpos, rpos)
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                let end = self.close(TokenKind::RParen, lpos, rpos)?;
                Ok(Expr::Group(Box::new(inner), Loc::new(lpos, end)))
            }
            Token::LBrace => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                let end = self.close(TokenKind::RBrace, lpos, rpos)?;
                Ok(Expr::Group(Box::new(inner), Loc::new(lpos, end)))
            }
            Token::LBracket => {
                self.pos += 1;
                self.parse_array(lpos, rpos)
            }
            Token::RParen | Token::RBracket | Token::RBrace => {
                error(ErrorCode::UnmatchedBracket, lpos, rpos)
            }
            _ => error(ErrorCode::UnrecognizedToken, lpos, rpos),
        }
    }

    /// Parse `[a, b, c]`; the opening bracket has been consumed.
    fn parse_array(&mut self, lpos: usize, rpos: usize) -> EquationResult<Expr> {
        if let Some((_, TokenKind::RBracket, end)) = self.span_kind() {
            return error(ErrorCode::EmptyArray, lpos, end);
        }

        let mut elements = vec![self.parse_expr()?];
        while self.peek_kind() == Some(TokenKind::Comma) {
            self.pos += 1;
            elements.push(self.parse_expr()?);
        }
        let end = self.close(TokenKind::RBracket, lpos, rpos)?;

        Ok(Expr::Array(elements, Loc::new(lpos, end)))
    }

    /// `\sqrt{x}` is a call to sqrt; `\sqrt[n]{x}` is `x^(1/n)`.
    fn parse_sqrt(&mut self, lpos: usize, rpos: usize) -> EquationResult<Expr> {
        let root = if self.peek_kind() == Some(TokenKind::LBracket) {
            let (open_start, _, open_end) = self.advance()?;
            let root = self.parse_expr()?;
            self.close(TokenKind::RBracket, open_start, open_end)?;
            Some(root)
        } else {
            None
        };

        let arg = self.parse_primary()?;
        let loc = Loc::new(lpos, arg.get_loc().end as usize);
        let Some(root) = root else {
            return Ok(Expr::App(
                canonicalize(BuiltinFn::Sqrt.name()),
                Callee::Builtin(BuiltinFn::Sqrt),
                vec![arg],
                loc,
            ));
        };

        let root_loc = root.get_loc();
        let one = Expr::Const("1".to_owned(), 1.0, Loc::new(lpos, rpos));
        let exponent = Expr::Group(
            Box::new(Expr::Op2(
                BinaryOp::Div,
                Box::new(one),
                Box::new(root),
                root_loc,
            )),
            root_loc,
        );
        Ok(Expr::Op2(
            BinaryOp::Exp,
            Box::new(arg),
            Box::new(exponent),
            loc,
        ))
    }

    fn resolve(&self, name: &Ident) -> Option<Resolved> {
        self.env.and_then(|env| env.symbols.resolve(name))
    }

    fn local(&self, name: &Ident) -> Option<usize> {
        self.env
            .and_then(|env| env.locals.iter().position(|local| local == name))
    }

    fn is_unit_symbol(&self, name: &Ident) -> bool {
        self.env.is_some_and(|env| env.units.is_reserved(name))
    }

    /// parse_identifier resolves a name: function parameters first, then
    /// bound symbols, then builtins, then unit symbols.
    fn parse_identifier(&mut self, s: &str, lpos: usize, rpos: usize) -> EquationResult<Expr> {
        let name = canonicalize(s);
        let loc = Loc::new(lpos, rpos);
        let is_call = self.peek_kind() == Some(TokenKind::LParen);

        if self.is_units {
            if is_call {
                return self.parse_call(name, Callee::Unresolved, None, lpos);
            }
            return Ok(Expr::Var(name, Binding::Unresolved, loc));
        }

        // a value followed by parentheses multiplies: `a(b + c)`
        if let Some(i) = self.local(&name) {
            return Ok(Expr::Var(name, Binding::Local(i), loc));
        }
        match self.resolve(&name) {
            Some(Resolved::Value(id)) => return Ok(Expr::Var(name, Binding::Global(id), loc)),
            Some(Resolved::Function(id, arity)) if is_call => {
                return self.parse_call(name, Callee::User(id), Some(arity), lpos);
            }
            // a function named without arguments; not a value
            Some(Resolved::Function(id, _)) if !self.is_unit_symbol(&name) => {
                return Ok(Expr::Var(name, Binding::Global(id), loc));
            }
            Some(Resolved::Function(..)) => {}
            None => {}
        }

        let builtin = BuiltinFn::from_name(name.as_str());
        if is_call {
            return match builtin {
                Some(builtin) => self.parse_call(name, Callee::Builtin(builtin), None, lpos),
                None => self.parse_call(name, Callee::Unresolved, None, lpos),
            };
        }
        if let Some(builtin) = builtin.filter(BuiltinFn::is_0_arity) {
            return Ok(Expr::App(name, Callee::Builtin(builtin), vec![], loc));
        }
        if self.is_unit_symbol(&name) {
            return Ok(Expr::Unit(s.to_owned(), loc));
        }

        Ok(Expr::Var(name, Binding::Unresolved, loc))
    }

    /// parse_function_command handles `\sin`, `\max` and
    /// `\operatorname{name}`, whose argument may be parenthesized, braced
    /// or (for `\sin x`) bare.
    fn parse_function_command(&mut self, s: &str, lpos: usize, rpos: usize) -> EquationResult<Expr> {
        let name = canonicalize(s);
        let user = match self.resolve(&name) {
            Some(Resolved::Function(id, arity)) => Some((id, arity)),
            _ => None,
        };
        let (callee, arity) = match (BuiltinFn::from_name(name.as_str()), user) {
            (Some(builtin), _) => (Callee::Builtin(builtin), None),
            (None, Some((id, arity))) => (Callee::User(id), Some(arity)),
            (None, None) => (Callee::Unresolved, None),
        };

        if self.peek_kind() == Some(TokenKind::LParen) {
            return self.parse_call(name, callee, arity, lpos);
        }

        let arg = match self.peek_kind() {
            Some(TokenKind::LBrace) => self.parse_primary()?,
            Some(_) => self.parse_unary()?,
            None => return error(ErrorCode::UnrecognizedEof, lpos, rpos),
        };
        let loc = Loc::new(lpos, arg.get_loc().end as usize);
        self.check_arity(&callee, arity, 1, loc)?;
        Ok(Expr::App(name, callee, vec![arg], loc))
    }

    /// parse_call parses a parenthesized argument list for a callee.
    /// `arity` is the parameter count of a user function.
    fn parse_call(
        &mut self,
        name: Ident,
        callee: Callee,
        arity: Option<usize>,
        lpos: usize,
    ) -> EquationResult<Expr> {
        let (open_start, _, open_end) = self.expect(TokenKind::LParen)?;

        let mut args = Vec::new();
        if self.peek_kind() != Some(TokenKind::RParen) {
            args.push(self.parse_expr()?);
            while self.peek_kind() == Some(TokenKind::Comma) {
                self.pos += 1;
                args.push(self.parse_expr()?);
            }
        }
        let end = self.close(TokenKind::RParen, open_start, open_end)?;
        let loc = Loc::new(lpos, end);

        self.check_arity(&callee, arity, args.len(), loc)?;
        Ok(Expr::App(name, callee, args, loc))
    }

    fn check_arity(
        &self,
        callee: &Callee,
        arity: Option<usize>,
        n: usize,
        loc: Loc,
    ) -> EquationResult<()> {
        let ok = match callee {
            Callee::Builtin(builtin) => builtin.arity().accepts(n),
            Callee::User(_) => arity.is_none_or(|arity| arity == n),
            Callee::Unresolved => true,
        };
        if ok {
            Ok(())
        } else {
            error(ErrorCode::BadArity, loc.start as usize, loc.end as usize)
        }
    }
}

/// Parse an expression with no symbols in scope.  In `Units` mode every
/// name is left unresolved, as the unit table resolves them itself.
///
/// Returns:
/// - `Ok(Some(expr))` for valid equations
/// - `Ok(None)` for empty input
/// - `Err(error)` for lex and parse errors
pub fn parse(input: &str, lexer_type: LexerType) -> Result<Option<Expr>, Vec<EquationError>> {
    let lexer = Lexer::new(input, lexer_type);
    let is_units = lexer_type == LexerType::Units;
    let mut parser = Parser::new(lexer, is_units, None).map_err(|e| vec![e])?;

    parser.parse_equation().map_err(|e| vec![e])
}

/// Parse an equation, resolving its names against `env`.
pub fn parse_equation(input: &str, env: &ParseEnv<'_>) -> Result<Option<Expr>, Vec<EquationError>> {
    let lexer = Lexer::new(input, LexerType::Equation).with_units(env.units);
    let mut parser = Parser::new(lexer, false, Some(env)).map_err(|e| vec![e])?;

    parser.parse_equation().map_err(|e| vec![e])
}
