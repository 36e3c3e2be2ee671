// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

// a hand-written tokenizer for the LaTeX math subset, in the shape of
// LALRPOP's whitespace tokenizer

use std::borrow::Cow;
use std::str::CharIndices;

use lazy_static::lazy_static;
use regex::Regex;
use unicode_xid::UnicodeXID;

use self::Token::*;
use crate::common::ErrorCode::*;
use crate::common::{EquationError, ErrorCode, span_offset};
use crate::units::Context;

#[cfg(test)]
mod test;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LexerType {
    Equation,
    Units,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token<'input> {
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
    /// `\sin`, `\max` or `\operatorname{name}`; holds the bare name.
    Function(&'input str),
    /// The contents of `\mathrm{..}` and friends, with LaTeX escapes
    /// like `\mu` already turned into their plain-text symbols.
    Unit(Cow<'input, str>),
    Ident(&'input str),
    Num(&'input str),
}

fn error<T>(code: ErrorCode, start: usize, end: usize) -> Result<T, EquationError> {
    Err(EquationError {
        start: span_offset(start),
        end: span_offset(end),
        code,
    })
}

pub type Spanned<T> = (usize, T, usize);

pub struct Lexer<'input> {
    text: &'input str,
    chars: CharIndices<'input>,
    lookahead: Option<(usize, char)>,
    is_units: bool,
    units: Option<&'input Context>,
    matrix_depth: usize,
}

const FUNCTION_COMMANDS: &[&str] = &[
    "sin", "cos", "tan", "sinh", "cosh", "tanh", "arcsin", "arccos", "arctan", "exp", "ln", "log",
    "max", "min",
];

const GREEK: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
    "vartheta", "iota", "kappa", "lambda", "mu", "nu", "xi", "pi", "rho", "sigma", "tau",
    "upsilon", "phi", "varphi", "chi", "psi", "omega", "Gamma", "Delta", "Theta", "Lambda", "Xi",
    "Pi", "Sigma", "Upsilon", "Phi", "Psi", "Omega",
];

const UNIT_WRAPPERS: &[&str] = &["mathrm", "text", "textrm", "unit", "si"];

// sizing and spacing commands that carry no meaning for evaluation
const IGNORED: &[&str] = &[
    "left",
    "right",
    "big",
    "Big",
    "bigg",
    "Bigg",
    "bigl",
    "bigr",
    "Bigl",
    "Bigr",
    "quad",
    "qquad",
    "displaystyle",
    "textstyle",
];

const MATRIX_ENVIRONMENTS: &[&str] = &["matrix", "bmatrix", "pmatrix"];

/// brace_group_end returns the offset just past the `}` matching the
/// `{` at `open`, skipping escaped braces.
pub(crate) fn brace_group_end(text: &str, open: usize) -> Option<usize> {
    if !text[open..].starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in text[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// unescape_units turns the body of a unit wrapper into the plain-text
/// unit string the unit parser understands: `\mu g` becomes `µg`, `\%`
/// becomes `%`, `^{\circ}C` becomes `°C` and LaTeX spacing becomes a
/// space (which the unit parser reads as multiplication).
pub fn unescape_units(content: &str) -> Cow<'_, str> {
    if !content.contains(['\\', '~']) {
        return Cow::Borrowed(content);
    }

    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(c) = rest.chars().next() {
        if let Some(r) = rest
            .strip_prefix("^{\\circ}")
            .or_else(|| rest.strip_prefix("^\\circ"))
        {
            out.push('°');
            rest = r.trim_start_matches(' ');
            continue;
        }
        if c == '~' {
            out.push(' ');
            rest = &rest[1..];
            continue;
        }
        if c != '\\' {
            out.push(c);
            rest = &rest[c.len_utf8()..];
            continue;
        }

        let command = &rest[1..];
        let name_len = command
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .count();
        if name_len == 0 {
            match command.chars().next() {
                Some('%') => out.push('%'),
                Some(',' | ';' | ':' | '!' | ' ') => out.push(' '),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
            let skip = command.chars().next().map_or(0, char::len_utf8);
            rest = &command[skip..];
            continue;
        }

        let name = &command[..name_len];
        match name {
            "mu" => out.push('µ'),
            "Omega" => out.push('Ω'),
            "circ" => out.push('°'),
            "percent" => out.push('%'),
            "cdot" | "times" => out.push('*'),
            // nested wrappers: the braces that follow group like parens
            "mathrm" | "text" | "textrm" | "unit" | "si" => {}
            _ => {
                out.push('\\');
                out.push_str(name);
                out.push(' ');
            }
        }
        rest = command[name_len..].trim_start_matches(' ');
    }

    Cow::Owned(out)
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str, lexer_type: LexerType) -> Self {
        let mut t = Lexer {
            text: input,
            chars: input.char_indices(),
            lookahead: None,
            is_units: matches!(lexer_type, LexerType::Units),
            units: None,
            matrix_depth: 0,
        };
        t.bump();
        t
    }

    /// with_units lets bare multi-letter words that name a known unit
    /// (`mg`, `min`) lex as unit literals.
    pub fn with_units(mut self, units: &'input Context) -> Self {
        self.units = Some(units);
        self
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.lookahead = self.chars.next();
        self.lookahead
    }

    fn pos(&self) -> usize {
        match self.lookahead {
            Some((i, _)) => i,
            None => self.text.len(),
        }
    }

    fn advance_to(&mut self, end: usize) {
        while let Some((i, _)) = self.lookahead {
            if i >= end {
                break;
            }
            self.bump();
        }
    }

    fn char_at(&self, idx: usize) -> Option<char> {
        self.text.get(idx..).and_then(|rest| rest.chars().next())
    }

    fn take_while<F>(&mut self, mut keep_going: F) -> usize
    where
        F: FnMut(char) -> bool,
    {
        loop {
            match self.lookahead {
                None => return self.text.len(),
                Some((idx1, c)) => {
                    if !keep_going(c) {
                        return idx1;
                    }
                    self.bump();
                }
            }
        }
    }

    /// braced consumes a `{..}` group (after optional whitespace),
    /// returning the span of its contents and the offset past the `}`.
    fn braced(
        &mut self,
        idx0: usize,
        code: ErrorCode,
    ) -> Result<(usize, usize, usize), EquationError> {
        self.take_while(char::is_whitespace);
        match self.lookahead {
            Some((open, '{')) => match brace_group_end(self.text, open) {
                Some(end) => {
                    self.advance_to(end);
                    Ok((open + 1, end - 1, end))
                }
                None => {
                    self.advance_to(self.text.len());
                    error(code, idx0, self.text.len())
                }
            },
            _ => error(code, idx0, self.pos()),
        }
    }

    /// decorations scans subscripts and primes following a name that
    /// ends at `pos`, returning where the decorated name ends.
    fn decorations(&self, mut pos: usize) -> Result<usize, EquationError> {
        loop {
            let rest = &self.text[pos..];
            if let Some(after) = rest.strip_prefix('_') {
                let sub = pos + 1;
                match after.chars().next() {
                    Some('{') => match brace_group_end(self.text, sub) {
                        Some(end) => pos = end,
                        None => return error(UnclosedGroup, pos, self.text.len()),
                    },
                    Some('\\') => {
                        let len = after[1..]
                            .chars()
                            .take_while(|c| c.is_ascii_alphabetic())
                            .count();
                        if len == 0 {
                            return error(UnrecognizedToken, pos, sub + 1);
                        }
                        pos = sub + 1 + len;
                    }
                    Some(c) if c.is_alphanumeric() => {
                        let len: usize = after
                            .chars()
                            .take_while(|c| c.is_alphanumeric())
                            .map(char::len_utf8)
                            .sum();
                        pos = sub + len;
                    }
                    _ => return error(UnrecognizedToken, pos, sub),
                }
            } else if rest.starts_with('\'') {
                pos += 1;
            } else if rest.starts_with("^{\\prime}") {
                pos += "^{\\prime}".len();
            } else if rest.starts_with("^\\prime") {
                pos += "^\\prime".len();
            } else {
                return Ok(pos);
            }
        }
    }

    fn decorated(
        &mut self,
        idx0: usize,
        base_end: usize,
    ) -> Result<Spanned<Token<'input>>, EquationError> {
        let end = self.decorations(base_end)?;
        self.advance_to(end);
        Ok((idx0, Ident(&self.text[idx0..end]), end))
    }

    /// is_unit_word decides whether a bare word is a unit literal: it
    /// must be longer than one letter (single letters are variables),
    /// name a known unit and not be called like a function.
    fn is_unit_word(&self, word: &str, end: usize) -> bool {
        let Some(units) = self.units else {
            return false;
        };
        if !units.reads_as_unit(word) {
            return false;
        }
        let next = self.text[end..].chars().find(|c| !c.is_whitespace());
        next != Some('(')
    }

    fn identifierish(&mut self, idx0: usize) -> Result<Spanned<Token<'input>>, EquationError> {
        let is_units = self.is_units;
        let base_end = self.take_while(|c| is_identifier_continue(c, is_units));
        if is_units {
            return Ok((idx0, Ident(&self.text[idx0..base_end]), base_end));
        }

        let (start, tok, end) = self.decorated(idx0, base_end)?;
        let word = &self.text[start..end];
        if end == base_end && self.is_unit_word(word, end) {
            Ok((start, Unit(Cow::Borrowed(word)), end))
        } else {
            Ok((start, tok, end))
        }
    }

    fn number(&mut self, idx0: usize) -> Result<Spanned<Token<'input>>, EquationError> {
        lazy_static! {
            static ref NUMBER_RE: Regex =
                Regex::new(r"^(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?").unwrap();
        }

        let Some(m) = NUMBER_RE.find(&self.text[idx0..]) else {
            self.bump();
            return error(MalformedNumber, idx0, self.pos());
        };
        let end = idx0 + m.end();
        self.advance_to(end);

        // `1.2.3`, `1e+` and `2e` are typos, not a number followed by
        // something else
        let rest = &self.text[end..];
        let mut chars = rest.chars();
        let malformed_len = match (chars.next(), chars.next()) {
            (Some('.'), _) => Some(
                1 + rest[1..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit() || *c == '.')
                    .count(),
            ),
            (Some('e' | 'E'), Some('+' | '-')) => Some(2),
            (Some('e' | 'E'), next) if !next.is_some_and(char::is_alphabetic) => Some(1),
            _ => None,
        };
        if let Some(len) = malformed_len {
            self.advance_to(end + len);
            return error(MalformedNumber, idx0, end + len);
        }

        Ok((idx0, Num(&self.text[idx0..end]), end))
    }

    /// command lexes a backslash command.  `None` means the command was
    /// consumed but produces no token (spacing, `\left`).
    fn command(&mut self, idx0: usize) -> Option<Result<Spanned<Token<'input>>, EquationError>> {
        // eat the '\'
        self.bump();
        let (i, c) = match self.lookahead {
            Some(next) => next,
            None => return Some(error(UnknownCommand, idx0, idx0 + 1)),
        };

        if !c.is_ascii_alphabetic() {
            self.bump();
            let end = i + c.len_utf8();
            return match c {
                '\\' if self.matrix_depth > 0 => Some(Ok((idx0, Comma, end))),
                '\\' | ',' | ';' | ':' | '!' | ' ' => None,
                '{' => Some(Ok((idx0, LBrace, end))),
                '}' => Some(Ok((idx0, RBrace, end))),
                '%' if self.is_units => Some(Ok((idx0, Ident(&self.text[i..end]), end))),
                '%' => Some(Ok((idx0, Unit(Cow::Borrowed("%")), end))),
                _ => Some(error(UnknownCommand, idx0, end)),
            };
        }

        let text = self.text;
        let end = self.take_while(|c| c.is_ascii_alphabetic());
        let name = &text[i..end];

        if UNIT_WRAPPERS.contains(&name) {
            return Some(self.braced(idx0, UnclosedUnit).map(|(start, stop, end)| {
                (idx0, Unit(unescape_units(&text[start..stop])), end)
            }));
        }
        if IGNORED.contains(&name) {
            // `\left.` is an invisible delimiter
            if matches!(self.lookahead, Some((_, '.'))) {
                self.bump();
            }
            return None;
        }
        if FUNCTION_COMMANDS.contains(&name) {
            return Some(Ok((idx0, Function(name), end)));
        }
        if GREEK.contains(&name) {
            return Some(self.decorated(idx0, end));
        }

        let tok = match name {
            "frac" | "dfrac" | "tfrac" => Frac,
            "sqrt" => Sqrt,
            "cdot" | "times" | "ast" => Mul,
            "div" => Div,
            "operatorname" => {
                return Some(
                    self.braced(idx0, UnclosedGroup)
                        .map(|(start, stop, end)| (idx0, Function(text[start..stop].trim()), end)),
                );
            }
            "begin" | "end" => return Some(self.environment(idx0, name == "begin")),
            _ => return Some(error(UnknownCommand, idx0, end)),
        };

        Some(Ok((idx0, tok, end)))
    }

    /// environment handles `\begin{bmatrix}` and `\end{bmatrix}`, which
    /// delimit an array literal whose rows are separated by `\\`.
    fn environment(
        &mut self,
        idx0: usize,
        begin: bool,
    ) -> Result<Spanned<Token<'input>>, EquationError> {
        let (start, stop, end) = self.braced(idx0, UnclosedGroup)?;
        let env = self.text[start..stop].trim();
        if !MATRIX_ENVIRONMENTS.contains(&env) {
            return error(UnknownCommand, idx0, end);
        }

        if begin {
            self.matrix_depth += 1;
            Ok((idx0, LBracket, end))
        } else {
            self.matrix_depth = self.matrix_depth.saturating_sub(1);
            Ok((idx0, RBracket, end))
        }
    }

    #[allow(clippy::unnecessary_wraps)]
    fn consume(
        &mut self,
        i: usize,
        tok: Token<'input>,
        c: char,
    ) -> Option<Result<Spanned<Token<'input>>, EquationError>> {
        self.bump();
        Some(Ok((i, tok, i + c.len_utf8())))
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = Result<Spanned<Token<'input>>, EquationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.text;
        loop {
            let (i, c) = self.lookahead?;
            return match c {
                '\\' => match self.command(i) {
                    Some(result) => Some(result),
                    None => continue,
                },
                '+' => self.consume(i, Plus, c),
                '-' | '\u{2212}' => self.consume(i, Minus, c),
                '*' | '\u{b7}' | '\u{d7}' | '\u{22c5}' => self.consume(i, Mul, c),
                '/' => self.consume(i, Div, c),
                '^' => self.consume(i, Exp, c),
                '(' => self.consume(i, LParen, c),
                ')' => self.consume(i, RParen, c),
                '[' => self.consume(i, LBracket, c),
                ']' => self.consume(i, RBracket, c),
                '{' => self.consume(i, LBrace, c),
                '}' => self.consume(i, RBrace, c),
                ',' => self.consume(i, Comma, c),
                '&' if self.matrix_depth > 0 => self.consume(i, Comma, c),
                '%' if self.is_units => self.consume(i, Ident(&text[i..i + 1]), c),
                '%' => self.consume(i, Unit(Cow::Borrowed("%")), c),
                '~' => {
                    self.bump();
                    continue;
                }
                c if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                c if is_digit(c) || (c == '.' && self.char_at(i + 1).is_some_and(is_digit)) => {
                    Some(self.number(i))
                }
                c if is_identifier_start(c, self.is_units) => Some(self.identifierish(i)),
                _ => {
                    self.bump(); // eat whatever is killing us
                    let code = if c == '.' {
                        MalformedNumber
                    } else {
                        UnrecognizedToken
                    };
                    Some(error(code, i, self.pos()))
                }
            };
        }
    }
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_unit_symbol_char(c: char) -> bool {
    matches!(c, '$' | '°' | 'µ' | 'Ω')
}

fn is_identifier_start(c: char, is_units: bool) -> bool {
    UnicodeXID::is_xid_start(c) || (is_units && is_unit_symbol_char(c))
}

fn is_identifier_continue(c: char, is_units: bool) -> bool {
    if is_units {
        // digits after a unit name are a (missing) exponent, not part of it
        (UnicodeXID::is_xid_continue(c) && !c.is_ascii_digit() && c != '_')
            || is_unit_symbol_char(c)
    } else {
        // underscores start a subscript decoration
        UnicodeXID::is_xid_continue(c) && c != '_'
    }
}
