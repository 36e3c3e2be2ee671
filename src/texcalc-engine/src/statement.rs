// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Splitting a statement into its parts: `f(x) := body`,
//! `name := expr [== [value] | =>]` and `expr == [value]` / `expr =>`.
//! A statement may already carry a rendered result and diagnostic
//! markup from an earlier run; both are recognized and set aside, and
//! the unit the result was shown in becomes the hint for this run.

use lazy_static::lazy_static;
use regex::Regex;

use crate::ast::Loc;
use crate::common::{Error, ErrorCode, Ident, Result, canonicalize, span_offset};
use crate::format::{MARKUP_START, REQUESTED};
use crate::lexer::{Lexer, LexerType, Token, brace_group_end};

const UNIT_WRAPPERS: &[&str] = &["\\mathrm", "\\text", "\\textrm", "\\unit", "\\si"];

/// A piece of the statement text and the byte offset it starts at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub offset: usize,
}

impl Fragment {
    fn new(statement: &str, start: usize, end: usize) -> Self {
        Fragment {
            text: statement[start..end].to_owned(),
            offset: start,
        }
    }

    /// trimmed is the fragment without surrounding whitespace, and where
    /// that starts.
    pub fn trimmed(&self) -> (&str, usize) {
        let leading = self.text.len() - self.text.trim_start().len();
        (self.text.trim(), self.offset + leading)
    }
}

/// How a result is displayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Display {
    /// `==`: convert to `hint` when there is one, otherwise pick
    /// readable units.
    Convert { hint: Option<String> },
    /// `=>`: show the value as computed.
    Raw,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Definition {
        name: Fragment,
        params: Vec<Ident>,
        /// Where each parameter sits in the statement, in order.
        param_locs: Vec<Loc>,
        body: Fragment,
    },
    Assignment {
        name: Fragment,
        expr: Fragment,
        display: Option<Display>,
    },
    Display {
        expr: Fragment,
        display: Display,
    },
}

/// A statement along with the text it renders after: everything up to
/// and including the display operator, or the whole statement when
/// nothing is displayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parsed {
    pub statement: Statement,
    pub prefix: String,
}

impl Parsed {
    pub fn display(&self) -> Option<&Display> {
        match self.statement {
            Statement::Definition { .. } => None,
            Statement::Assignment { ref display, .. } => display.as_ref(),
            Statement::Display { ref display, .. } => Some(display),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operator {
    Assign,
    Convert,
    Raw,
}

fn bad_statement<T>(start: usize, end: usize, details: &str) -> Result<T> {
    Err(Error::new(
        ErrorCode::BadStatement,
        span_offset(start),
        span_offset(end),
        Some(details.to_owned()),
    ))
}

/// split_markup separates a statement from diagnostic markup left by
/// an earlier run.
pub fn split_markup(text: &str) -> (&str, Option<&str>) {
    match text.find(MARKUP_START) {
        Some(pos) => (&text[..pos], Some(&text[pos..])),
        None => (text, None),
    }
}

// operators outside of any brackets, braces or parens
fn top_level_operators(text: &str) -> Vec<(usize, Operator)> {
    let bytes = text.as_bytes();
    let mut operators = vec![];
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        let operator = match (bytes[i], next) {
            (b'\\', _) => {
                // skip the escaped character, so `\{` doesn't nest
                i += 2;
                continue;
            }
            (b'{' | b'(' | b'[', _) => {
                depth += 1;
                None
            }
            (b'}' | b')' | b']', _) => {
                depth -= 1;
                None
            }
            (b':', Some(b'=')) if depth == 0 => Some(Operator::Assign),
            (b'=', Some(b'=')) if depth == 0 => Some(Operator::Convert),
            (b'=', Some(b'>')) if depth == 0 => Some(Operator::Raw),
            _ => None,
        };
        match operator {
            Some(op) => {
                operators.push((i, op));
                i += 2;
            }
            None => i += 1,
        }
    }
    operators
}

/// is_name reports whether `text` is a single, possibly decorated,
/// identifier like `rate`, `v_{max}` or `\gamma'`.
fn is_name(text: &str) -> bool {
    let mut lexer = Lexer::new(text, LexerType::Equation);
    matches!(
        (lexer.next(), lexer.next()),
        (Some(Ok((_, Token::Ident(_), _))), None)
    )
}

// `f(x, y)` on the left of `:=`, as the function name and parameters
fn function_head(name: &Fragment) -> Result<Option<(Fragment, Vec<Ident>, Vec<Loc>)>> {
    let (text, start) = name.trimmed();
    let Some(open) = text.find('(') else {
        return Ok(None);
    };
    if !text.ends_with(')') {
        return Ok(None);
    }

    let head = Fragment {
        text: text[..open].to_owned(),
        offset: start,
    };
    if !is_name(head.text.trim()) {
        return Err(Error::new(
            ErrorCode::ExpectedIdent,
            span_offset(start),
            span_offset(start + open),
            Some(head.text.trim().to_owned()),
        ));
    }

    let mut params: Vec<Ident> = vec![];
    let mut param_locs: Vec<Loc> = vec![];
    let mut param_start = start + open + 1;
    for param in text[open + 1..text.len() - 1].split(',') {
        let param_end = param_start + param.len();
        let trimmed = param.trim();
        if !is_name(trimmed) {
            return Err(Error::new(
                ErrorCode::BadParameter,
                span_offset(param_start),
                span_offset(param_end),
                Some(trimmed.to_owned()),
            ));
        }
        let ident = canonicalize(trimmed);
        if params.contains(&ident) {
            return Err(Error::new(
                ErrorCode::BadParameter,
                span_offset(param_start),
                span_offset(param_end),
                Some(format!("{ident} is repeated")),
            ));
        }
        let leading = param.len() - param.trim_start().len();
        params.push(ident);
        param_locs.push(Loc::new(
            param_start + leading,
            param_start + leading + trimmed.len(),
        ));
        param_start = param_end + 1;
    }

    Ok(Some((head, params, param_locs)))
}

// the end of a leading `[..]` array, counting nested brackets
fn bracket_end(text: &str) -> Option<usize> {
    let mut depth = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// strip_value removes a rendered value from the front of the text
/// after a display operator, leaving the unit it was shown in.
fn strip_value(tail: &str) -> &str {
    lazy_static! {
        static ref NUMBER_RE: Regex = Regex::new(
            r"^[-+]?\s*(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?(\s*\\times\s*10\^\{[-+]?\d+\})?"
        )
        .unwrap();
        static ref MATRIX_END_RE: Regex = Regex::new(r"\\end\s*\{[a-z]*matrix\}").unwrap();
    }

    let tail = tail.trim_start();
    let rest = if tail.starts_with('[') {
        bracket_end(tail).map_or("", |end| &tail[end..])
    } else if tail.starts_with("\\begin") {
        MATRIX_END_RE.find(tail).map_or("", |m| &tail[m.end()..])
    } else {
        NUMBER_RE.find(tail).map_or(tail, |m| &tail[m.end()..])
    };

    let mut rest = rest;
    loop {
        let trimmed = rest
            .trim_start()
            .trim_start_matches('~')
            .trim_start_matches("\\ ")
            .trim_start_matches("\\,")
            .trim_start_matches("\\;");
        if trimmed.len() == rest.len() {
            return rest;
        }
        rest = trimmed;
    }
}

/// unit_content returns what's inside a leading `\mathrm{..}` (or
/// another unit wrapper), or the text itself if it isn't wrapped.
fn unit_content(text: &str) -> &str {
    for wrapper in UNIT_WRAPPERS {
        let Some(after) = text.strip_prefix(wrapper) else {
            continue;
        };
        // `\textrm` also starts with `\text`
        if after.starts_with(|c: char| c.is_ascii_alphabetic()) {
            continue;
        }
        let open = text.len() - after.trim_start().len();
        if let Some(end) = brace_group_end(text, open) {
            return text[open + 1..end - 1].trim();
        }
    }
    text.trim()
}

/// recover_hint finds the unit a `==` result should be shown in: a hint
/// that couldn't be honoured last time is carried in the markup, and
/// otherwise it's whatever unit follows the displayed value.
fn recover_hint(tail: &str, markup: Option<&str>) -> Option<String> {
    if let Some(markup) = markup {
        if let Some(pos) = markup.find(REQUESTED) {
            let open = pos + REQUESTED.len();
            if let Some(end) = brace_group_end(markup, open) {
                return Some(markup[open + 1..end - 1].to_owned());
            }
        }
    }

    let hint = unit_content(strip_value(tail));
    if hint.is_empty() {
        None
    } else {
        Some(hint.to_owned())
    }
}

impl Statement {
    /// parse splits a statement at its top-level operators.
    pub fn parse(text: &str) -> Result<Parsed> {
        let (body, markup) = split_markup(text);
        let body = body.trim_end();
        let operators = top_level_operators(body);

        let (assign, display) = match operators.as_slice() {
            [] => {
                return bad_statement(0, body.len(), "expected :=, == or =>");
            }
            [(a, Operator::Assign)] => (Some(*a), None),
            [(a, Operator::Assign), (d, op)] if *op != Operator::Assign => {
                (Some(*a), Some((*d, *op)))
            }
            [(d, op)] => (None, Some((*d, *op))),
            [.., (pos, _)] => {
                return bad_statement(*pos, *pos + 2, "too many operators");
            }
        };

        let expr_start = assign.map_or(0, |a| a + 2);
        let expr_end = display.map_or(body.len(), |(d, _)| d);
        let expr = Fragment::new(body, expr_start, expr_end);

        let (display, prefix) = match display {
            None => (None, body.to_owned()),
            Some((d, op)) => {
                let display = match op {
                    Operator::Raw => Display::Raw,
                    _ => Display::Convert {
                        hint: recover_hint(&body[d + 2..], markup),
                    },
                };
                (Some(display), body[..d + 2].to_owned())
            }
        };

        let Some(a) = assign else {
            // a display without assignment; `expr_start` is 0
            let display = display.unwrap_or(Display::Raw);
            return Ok(Parsed {
                statement: Statement::Display { expr, display },
                prefix,
            });
        };

        let name = Fragment::new(body, 0, a);
        if let Some((name, params, param_locs)) = function_head(&name)? {
            if display.is_some() {
                let (d, _) = operators[1];
                return bad_statement(d, d + 2, "a function definition has no value to display");
            }
            return Ok(Parsed {
                statement: Statement::Definition {
                    name,
                    params,
                    param_locs,
                    body: expr,
                },
                prefix,
            });
        }

        let (name_text, name_start) = name.trimmed();
        if !is_name(name_text) {
            return Err(Error::new(
                ErrorCode::ExpectedIdent,
                span_offset(name_start),
                span_offset(name_start + name_text.len()),
                Some(name_text.to_owned()),
            ));
        }

        Ok(Parsed {
            statement: Statement::Assignment {
                name,
                expr,
                display,
            },
            prefix,
        })
    }
}

/// clear removes computed results and markup from a statement, keeping
/// the unit a `==` result was shown in so the next run shows it the
/// same way.
pub fn clear(text: &str) -> String {
    let parsed = match Statement::parse(text) {
        Ok(parsed) => parsed,
        Err(_) => return split_markup(text).0.trim_end().to_owned(),
    };
    match parsed.display() {
        Some(Display::Convert { hint: Some(hint) }) => {
            format!("{} \\mathrm{{{hint}}}", parsed.prefix)
        }
        _ => parsed.prefix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Parsed {
        Statement::parse(text).unwrap_or_else(|err| panic!("parsing {text}: {err}"))
    }

    fn hint(text: &str) -> Option<String> {
        match parse(text).display() {
            Some(Display::Convert { hint }) => hint.clone(),
            other => panic!("expected a conversion, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment() {
        let parsed = parse("rate := 15\\,\\mathrm{mg/L/d}");
        let Statement::Assignment {
            name,
            expr,
            display,
        } = parsed.statement
        else {
            panic!("expected an assignment");
        };
        assert_eq!(("rate", 0), name.trimmed());
        assert_eq!(" 15\\,\\mathrm{mg/L/d}", expr.text);
        assert_eq!(7, expr.offset);
        assert_eq!(None, display);
        assert_eq!("rate := 15\\,\\mathrm{mg/L/d}", parsed.prefix);
    }

    #[test]
    fn test_display() {
        let parsed = parse("mass := volume \\cdot rate ==");
        assert_eq!(Some(&Display::Convert { hint: None }), parsed.display());
        assert_eq!("mass := volume \\cdot rate ==", parsed.prefix);

        let parsed = parse("x + y =>");
        let Statement::Display { expr, display } = parsed.statement else {
            panic!("expected a display");
        };
        assert_eq!(Display::Raw, display);
        assert_eq!(("x + y", 0), expr.trimmed());

        // operators inside braces don't split
        let parsed = parse("\\text{a==b} ==");
        assert!(matches!(parsed.statement, Statement::Display { .. }));
    }

    #[test]
    fn test_definition() {
        let parsed = parse("f_1(x, y) := x^2 + y");
        let Statement::Definition {
            name,
            params,
            param_locs,
            body,
        } = parsed.statement
        else {
            panic!("expected a definition");
        };
        assert_eq!("f_1", name.text);
        assert_eq!(vec![canonicalize("x"), canonicalize("y")], params);
        assert_eq!(vec![Loc::new(4, 5), Loc::new(7, 8)], param_locs);
        assert_eq!((" x^2 + y", 12), (body.text.as_str(), body.offset));

        let err = Statement::parse("f(x, 2) := x").unwrap_err();
        assert_eq!(ErrorCode::BadParameter, err.code);
        assert_eq!((4, 6), (err.start, err.end));

        let err = Statement::parse("f(x, x) := x").unwrap_err();
        assert_eq!(ErrorCode::BadParameter, err.code);

        let err = Statement::parse("f(x) := x ==").unwrap_err();
        assert_eq!(ErrorCode::BadStatement, err.code);
    }

    #[test]
    fn test_bad_statements() {
        let cases: &[(&str, ErrorCode)] = &[
            ("x + 1", ErrorCode::BadStatement),
            ("a := b := c", ErrorCode::BadStatement),
            ("a == b == c", ErrorCode::BadStatement),
            ("2 := 3", ErrorCode::ExpectedIdent),
            ("a b := 3", ErrorCode::ExpectedIdent),
        ];
        for (text, code) in cases {
            let err = Statement::parse(text).unwrap_err();
            assert_eq!(*code, err.code, "parsing {text}");
        }
    }

    #[test]
    fn test_hint_recovery() {
        assert_eq!(None, hint("x =="));
        assert_eq!(Some("g/d".to_owned()), hint("x == \\mathrm{g/d}"));
        assert_eq!(Some("g/d".to_owned()), hint("x == 567.36\\ \\mathrm{g/d}"));
        assert_eq!(Some("km".to_owned()), hint("x == 5 km"));
        assert_eq!(None, hint("x == 12"));
        assert_eq!(
            Some("m".to_owned()),
            hint("x == -1.5 \\times 10^{7}\\ \\mathrm{m}")
        );
        assert_eq!(
            Some("mg/L/d".to_owned()),
            hint("gamma == [15, 30.5, 34]\\ \\mathrm{mg/L/d}")
        );
        assert_eq!(
            Some("m".to_owned()),
            hint("v == \\begin{bmatrix}1 \\\\ 2\\end{bmatrix}\\ \\mathrm{m}")
        );
        assert_eq!(Some("m^{2}".to_owned()), hint("a == 4\\ \\mathrm{m^{2}}"));

        // a hint that couldn't be honoured wins over the fallback's unit
        let rendered = "x == 5\\ \\mathrm{m}\\quad \\color{orange}{\\text{conversion\\_mismatch}\\ \\text{requested}\\ \\mathrm{s}}";
        assert_eq!(Some("s".to_owned()), hint(rendered));
    }

    #[test]
    fn test_clear() {
        assert_eq!(
            "mass := volume \\cdot rate == \\mathrm{g/d}",
            clear("mass := volume \\cdot rate == 567.36\\ \\mathrm{g/d}")
        );
        assert_eq!("x =>", clear("x => 5\\ \\mathrm{m}"));
        assert_eq!("y ==", clear("y == 12"));
        assert_eq!(
            "z := x + 1",
            clear("z := x + 1 \\quad \\color{red}{\\text{undefined\\_variable: x}}")
        );
        assert_eq!(
            "z := x + 1 == \\mathrm{s}",
            clear("z := x + 1 == \\quad \\color{red}{\\text{undefined\\_variable: x}\\ \\text{requested}\\ \\mathrm{s}}")
        );
        // a statement that doesn't parse just loses its markup
        assert_eq!("x + 1", clear("x + 1\\quad \\color{red}{\\text{bad\\_statement}}"));
    }
}
