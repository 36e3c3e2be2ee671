// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::borrow::Cow;

use super::ErrorCode::*;
use super::Token::*;
use super::{EquationError, ErrorCode, Lexer, LexerType, Token, unescape_units};
use crate::test_common::units;

fn test(input: &str, expected: Vec<(&str, Token)>) {
    test_inner(input, expected, LexerType::Equation)
}

fn test_units(input: &str, expected: Vec<(&str, Token)>) {
    test_inner(input, expected, LexerType::Units)
}

// straight from LALRPOP: each expected span is marked with `~`s under
// the input text
fn test_inner(input: &str, expected: Vec<(&str, Token)>, lexer_type: LexerType) {
    let tokenizer = Lexer::new(input, lexer_type).with_units(units());
    let len = expected.len();
    for (token, (expected_span, expected_tok)) in tokenizer.zip(expected.into_iter()) {
        let expected_start = expected_span.find('~').unwrap();
        let expected_end = expected_span.rfind('~').unwrap() + 1;
        assert_eq!(Ok((expected_start, expected_tok, expected_end)), token);
    }

    let tokenizer = Lexer::new(input, lexer_type).with_units(units());
    assert_eq!(None, tokenizer.skip(len).next());
}

fn test_err(input: &str, expected: (&str, ErrorCode)) {
    let tokenizer = Lexer::new(input, LexerType::Equation).with_units(units());
    let token = tokenizer.into_iter().find(|tok| tok.is_err()).unwrap();
    let (expected_span, expected_code) = expected;
    let expected_start = expected_span.find('~').unwrap();
    let expected_end = expected_span.rfind('~').unwrap() + 1;
    let expected_err = EquationError {
        start: expected_start as u16,
        end: expected_end as u16,
        code: expected_code,
    };
    assert_eq!(Err(expected_err), token);
}

#[test]
fn arithmetic() {
    test(
        "2x + 3",
        vec![
            ("~     ", Num("2")),
            (" ~    ", Ident("x")),
            ("   ~  ", Plus),
            ("     ~", Num("3")),
        ],
    );
}

#[test]
fn numbers() {
    test(
        "1.5e-3 .25 10",
        vec![
            ("~~~~~~       ", Num("1.5e-3")),
            ("       ~~~   ", Num(".25")),
            ("           ~~", Num("10")),
        ],
    );
}

#[test]
fn unit_wrapper() {
    test(
        "5\\,\\mathrm{mg/L}",
        vec![
            ("~                ", Num("5")),
            ("   ~~~~~~~~~~~~~ ", Unit(Cow::Borrowed("mg/L"))),
        ],
    );
    test(
        "\\mathrm{\\mu g}",
        vec![("~~~~~~~~~~~~~~", Unit(Cow::Owned("µg".to_owned())))],
    );
    test(
        "15\\%",
        vec![("~~  ", Num("15")), ("  ~~", Unit(Cow::Borrowed("%")))],
    );
}

#[test]
fn decorated_identifiers() {
    test(
        "v_{max} + x_1'",
        vec![
            ("~~~~~~~       ", Ident("v_{max}")),
            ("        ~     ", Plus),
            ("          ~~~~", Ident("x_1'")),
        ],
    );
    test(
        "m^{\\prime}",
        vec![("~~~~~~~~~~", Ident("m^{\\prime}"))],
    );
}

#[test]
fn greek() {
    test(
        "\\alpha_0 \\cdot \\pi",
        vec![
            ("~~~~~~~~          ", Ident("\\alpha_0")),
            ("         ~~~~~    ", Mul),
            ("               ~~~", Ident("\\pi")),
        ],
    );
}

#[test]
fn functions() {
    test(
        "\\sin(x)",
        vec![
            ("~~~~   ", Function("sin")),
            ("    ~  ", LParen),
            ("     ~ ", Ident("x")),
            ("      ~", RParen),
        ],
    );
    test(
        "\\operatorname{mean}(a)",
        vec![
            ("~~~~~~~~~~~~~~~~~~~   ", Function("mean")),
            ("                   ~  ", LParen),
            ("                    ~ ", Ident("a")),
            ("                     ~", RParen),
        ],
    );
}

#[test]
fn fractions() {
    test(
        "\\frac{1}{2}",
        vec![
            ("~~~~~      ", Frac),
            ("     ~     ", LBrace),
            ("      ~    ", Num("1")),
            ("       ~   ", RBrace),
            ("        ~  ", LBrace),
            ("         ~ ", Num("2")),
            ("          ~", RBrace),
        ],
    );
}

#[test]
fn matrices() {
    test(
        "\\begin{bmatrix}1\\\\2\\end{bmatrix}",
        vec![
            ("~~~~~~~~~~~~~~~                 ", LBracket),
            ("               ~                ", Num("1")),
            ("                ~~              ", Comma),
            ("                  ~             ", Num("2")),
            ("                   ~~~~~~~~~~~~~", RBracket),
        ],
    );
    // outside of a matrix a line break is just layout
    test(
        "1 \\\\ + 2",
        vec![
            ("~       ", Num("1")),
            ("     ~  ", Plus),
            ("       ~", Num("2")),
        ],
    );
}

#[test]
fn sizing_commands() {
    test(
        "\\left(x\\right)",
        vec![
            ("     ~        ", LParen),
            ("      ~       ", Ident("x")),
            ("             ~", RParen),
        ],
    );
}

#[test]
fn bare_unit_words() {
    test(
        "3 mg + min(2)",
        vec![
            ("~            ", Num("3")),
            ("  ~~         ", Unit(Cow::Borrowed("mg"))),
            ("     ~       ", Plus),
            ("       ~~~   ", Ident("min")),
            ("          ~  ", LParen),
            ("           ~ ", Num("2")),
            ("            ~", RParen),
        ],
    );
    // single letters are always variables, decorated names never units
    test(
        "m g_1",
        vec![("~    ", Ident("m")), ("  ~~~", Ident("g_1"))],
    );
}

#[test]
fn units_mode() {
    test_units(
        "kg*m/s^2",
        vec![
            ("~~      ", Ident("kg")),
            ("  ~     ", Mul),
            ("   ~    ", Ident("m")),
            ("    ~   ", Div),
            ("     ~  ", Ident("s")),
            ("      ~ ", Exp),
            ("       ~", Num("2")),
        ],
    );
    test_units("°C", vec![("~~~", Ident("°C"))]);
    test_units(
        "%/d",
        vec![("~  ", Ident("%")), (" ~ ", Div), ("  ~", Ident("d"))],
    );
}

#[test]
fn errors() {
    test_err("1.2.3", ("~~~~~", MalformedNumber));
    test_err("2e+", ("~~~", MalformedNumber));
    test_err(". 5", ("~  ", MalformedNumber));
    test_err("x + \\mathrm{mg", ("    ~~~~~~~~~~", UnclosedUnit));
    test_err("\\foo + 1", ("~~~~    ", UnknownCommand));
    test_err("x_{1 + 2", (" ~~~~~~~", UnclosedGroup));
    test_err("3 # 4", ("  ~  ", UnrecognizedToken));
    test_err("\\begin{align}", ("~~~~~~~~~~~~~", UnknownCommand));
}

#[test]
fn test_unescape_units() {
    assert_eq!("µg/L", unescape_units("\\mu g/L"));
    assert_eq!("°C", unescape_units("^{\\circ}C"));
    assert_eq!("kg*m/s^{2}", unescape_units("kg\\cdot m/s^{2}"));
    assert_eq!("%", unescape_units("\\%"));
    assert_eq!("m s", unescape_units("m\\,s"));
    assert!(matches!(unescape_units("mg/L/d"), Cow::Borrowed(_)));
}

#[test]
fn long_input_spans_saturate() {
    let input = format!("{}# 4", "1 + ".repeat(20000));
    let tokenizer = Lexer::new(&input, LexerType::Equation).with_units(units());
    let token = tokenizer.into_iter().find(|tok| tok.is_err()).unwrap();
    assert_eq!(
        Err(EquationError {
            start: u16::MAX,
            end: u16::MAX,
            code: UnrecognizedToken,
        }),
        token
    );
}
