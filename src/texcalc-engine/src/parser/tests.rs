// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;

use super::*;
use crate::ast::print_eqn;
use crate::test_common::units;

fn parse_eq(input: &str) -> Result<Option<Expr>, Vec<EquationError>> {
    parse(input, LexerType::Equation)
}

fn parse_one(input: &str) -> Expr {
    parse_eq(input)
        .unwrap_or_else(|err| panic!("parsing {input}: {err:?}"))
        .unwrap()
}

struct Symbols(HashMap<Ident, Resolved>);

impl Symbols {
    fn new(entries: &[(&str, Resolved)]) -> Self {
        Symbols(
            entries
                .iter()
                .map(|(name, resolved)| (canonicalize(name), *resolved))
                .collect(),
        )
    }
}

impl Resolver for Symbols {
    fn resolve(&self, name: &Ident) -> Option<Resolved> {
        self.0.get(name).copied()
    }
}

fn parse_with(
    input: &str,
    symbols: &Symbols,
    locals: &[&str],
) -> Result<Option<Expr>, Vec<EquationError>> {
    let locals: Vec<Ident> = locals.iter().map(|l| canonicalize(l)).collect();
    let env = ParseEnv {
        units: units(),
        symbols,
        locals: &locals,
    };
    parse_equation(input, &env)
}

fn parse_err(input: &str, expected: (&str, ErrorCode)) {
    let errors = parse_eq(input).unwrap_err();
    let (expected_span, expected_code) = expected;
    let expected_start = expected_span.find('~').unwrap();
    let expected_end = expected_span.rfind('~').unwrap() + 1;
    assert_eq!(
        vec![EquationError {
            start: expected_start as u16,
            end: expected_end as u16,
            code: expected_code,
        }],
        errors,
        "parsing {input}"
    );
}

fn var(name: &str) -> Expr {
    Expr::Var(canonicalize(name), Binding::Unresolved, Loc::default())
}

fn num(s: &str) -> Expr {
    Expr::Const(s.to_owned(), s.parse().unwrap(), Loc::default())
}

fn op2(op: BinaryOp, l: Expr, r: Expr) -> Expr {
    Expr::Op2(op, Box::new(l), Box::new(r), Loc::default())
}

#[test]
fn test_empty() {
    assert_eq!(None, parse_eq("").unwrap());
    assert_eq!(None, parse_eq("  \\, ").unwrap());
}

#[test]
fn test_precedence() {
    let cases: &[(&str, &str)] = &[
        ("a + b * c", "a + b * c"),
        ("a - b - c", "a - b - c"),
        ("-a^2", "-a ^ 2"),
        ("2^3^2", "2 ^ 3 ^ 2"),
        ("(a + b) c", "(a + b) * c"),
        ("\\frac{a + b}{c} d", "(a + b) / (c) * d"),
    ];
    for (input, expected) in cases {
        assert_eq!(*expected, print_eqn(&parse_one(input)), "parsing {input}");
    }

    // right associativity: the exponent is itself a power
    let expected = op2(BinaryOp::Exp, num("2"), op2(BinaryOp::Exp, num("3"), num("2")));
    assert_eq!(expected, parse_one("2^3^2").strip_loc());

    // unary minus binds looser than ^
    let expected = Expr::Op1(
        UnaryOp::Negative,
        Box::new(op2(BinaryOp::Exp, var("a"), num("2"))),
        Loc::default(),
    );
    assert_eq!(expected, parse_one("-a^2").strip_loc());
}

#[test]
fn test_implicit_multiplication() {
    let expected = op2(BinaryOp::Mul, num("2"), var("x"));
    assert_eq!(expected, parse_one("2x").strip_loc());

    // juxtaposition binds tighter than an explicit division
    let expected = op2(
        BinaryOp::Div,
        op2(BinaryOp::Mul, num("5"), Expr::Unit("km".to_owned(), Loc::default())),
        op2(BinaryOp::Mul, num("2"), Expr::Unit("h".to_owned(), Loc::default())),
    );
    assert_eq!(
        expected,
        parse_one("5\\,\\mathrm{km} / 2\\,\\mathrm{h}").strip_loc()
    );

    let expected = op2(
        BinaryOp::Mul,
        num("15"),
        Expr::Unit("mg/L/d".to_owned(), Loc::default()),
    );
    assert_eq!(expected, parse_one("15\\,\\mathrm{mg/L/d}").strip_loc());
}

#[test]
fn test_fractions_and_roots() {
    let expected = op2(
        BinaryOp::Div,
        Expr::Group(Box::new(num("1")), Loc::default()),
        Expr::Group(Box::new(var("x")), Loc::default()),
    );
    assert_eq!(expected, parse_one("\\frac{1}{x}").strip_loc());

    // unbraced arguments are single digits
    let half = op2(BinaryOp::Div, num("1"), num("2"));
    assert_eq!(half, parse_one("\\frac12").strip_loc());
    assert_eq!(half, parse_one("\\frac1 2").strip_loc());
    assert_eq!(
        op2(BinaryOp::Mul, half.clone(), num("3")),
        parse_one("\\frac123").strip_loc()
    );
    assert_eq!(
        op2(BinaryOp::Div, num("1"), var("x")),
        parse_one("\\frac1x").strip_loc()
    );
    let Expr::Op2(_, numerator, denominator, loc) = parse_one("\\frac12") else {
        panic!("expected a fraction");
    };
    assert_eq!(Loc::new(5, 6), numerator.get_loc());
    assert_eq!(Loc::new(6, 7), denominator.get_loc());
    assert_eq!(Loc::new(0, 7), loc);

    let sqrt = parse_one("\\sqrt{x}").strip_loc();
    assert!(matches!(
        sqrt,
        Expr::App(_, Callee::Builtin(BuiltinFn::Sqrt), ref args, _) if args.len() == 1
    ));

    let cube_root = parse_one("\\sqrt[3]{x}").strip_loc();
    let Expr::Op2(BinaryOp::Exp, base, exponent, _) = cube_root else {
        panic!("expected a power");
    };
    assert_eq!(Expr::Group(Box::new(var("x")), Loc::default()), *base);
    assert_eq!("(1 / 3)", print_eqn(&exponent));
}

#[test]
fn test_arrays_and_indexing() {
    let expected = Expr::Array(vec![num("15"), num("30.5"), num("34")], Loc::default());
    assert_eq!(expected, parse_one("[15, 30.5, 34]").strip_loc());
    assert_eq!(
        expected,
        parse_one("\\begin{bmatrix}15 \\\\ 30.5 \\\\ 34\\end{bmatrix}").strip_loc()
    );

    let expected = Expr::Index(Box::new(var("gamma")), Box::new(num("1")), Loc::default());
    assert_eq!(expected, parse_one("gamma[1]").strip_loc());

    let indexed = parse_one("[1, 2][0]");
    assert!(matches!(indexed, Expr::Index(..)));
    assert_eq!(Loc::new(0, 9), indexed.get_loc());

    // a number is not indexable, so a following bracket is an array
    let product = parse_one("2 [1, 2]").strip_loc();
    assert!(matches!(product, Expr::Op2(BinaryOp::Mul, _, _, _)));
}

#[test]
fn test_function_commands() {
    let sin = parse_one("\\sin(x)").strip_loc();
    assert_eq!(
        Expr::App(
            canonicalize("sin"),
            Callee::Builtin(BuiltinFn::Sin),
            vec![var("x")],
            Loc::default()
        ),
        sin
    );
    // with no parentheses the argument is the following power
    assert_eq!(sin, parse_one("\\sin x").strip_loc());

    let max = parse_one("\\max(a, b, c)").strip_loc();
    assert!(matches!(max, Expr::App(_, Callee::Builtin(BuiltinFn::Max), ref args, _) if args.len() == 3));

    let mean = parse_one("\\operatorname{mean}(a)").strip_loc();
    assert!(matches!(mean, Expr::App(_, Callee::Builtin(BuiltinFn::Mean), _, _)));

    let pi = parse_one("2\\pi r");
    assert_eq!("2 * \\pi() * r", print_eqn(&pi));

    let unknown = parse_one("\\operatorname{lerp}(a, b)").strip_loc();
    assert!(matches!(unknown, Expr::App(_, Callee::Unresolved, _, _)));
}

#[test]
fn test_locs() {
    let expr = parse_one("a + \\frac{b}{c}");
    assert_eq!(Loc::new(0, 15), expr.get_loc());
    let Expr::Op2(_, _, frac, _) = expr else {
        panic!("expected a sum");
    };
    assert_eq!(Loc::new(4, 15), frac.get_loc());

    let call = parse_one("max(1, 2)");
    assert_eq!(Loc::new(0, 9), call.get_loc());
}

#[test]
fn test_resolution() {
    let symbols = Symbols::new(&[
        ("rate", Resolved::Value(SymbolId(0))),
        ("v_{max}", Resolved::Value(SymbolId(1))),
        ("f", Resolved::Function(SymbolId(2), 1)),
        ("f1", Resolved::Value(SymbolId(3))),
    ]);

    let expr = parse_with("rate \\cdot v_max", &symbols, &[])
        .unwrap()
        .unwrap()
        .strip_loc();
    let expected = op2(
        BinaryOp::Mul,
        Expr::Var(canonicalize("rate"), Binding::Global(SymbolId(0)), Loc::default()),
        Expr::Var(canonicalize("v_max"), Binding::Global(SymbolId(1)), Loc::default()),
    );
    assert_eq!(expected, expr);

    // f and f1 are distinct entries, never prefixes of each other
    let expr = parse_with("f(f1)", &symbols, &[]).unwrap().unwrap().strip_loc();
    let expected = Expr::App(
        canonicalize("f"),
        Callee::User(SymbolId(2)),
        vec![Expr::Var(
            canonicalize("f1"),
            Binding::Global(SymbolId(3)),
            Loc::default(),
        )],
        Loc::default(),
    );
    assert_eq!(expected, expr);

    // parameters shadow globals
    let expr = parse_with("rate x", &symbols, &["x", "rate"])
        .unwrap()
        .unwrap()
        .strip_loc();
    let expected = op2(
        BinaryOp::Mul,
        Expr::Var(canonicalize("rate"), Binding::Local(1), Loc::default()),
        Expr::Var(canonicalize("x"), Binding::Local(0), Loc::default()),
    );
    assert_eq!(expected, expr);

    // a bound value followed by parentheses multiplies
    let expr = parse_with("rate(2)", &symbols, &[]).unwrap().unwrap().strip_loc();
    assert!(matches!(expr, Expr::Op2(BinaryOp::Mul, _, _, _)));

    // unbound unit symbols become unit literals; other names stay unresolved
    let expr = parse_with("m + y", &symbols, &[]).unwrap().unwrap().strip_loc();
    let expected = op2(
        BinaryOp::Add,
        Expr::Unit("m".to_owned(), Loc::default()),
        var("y"),
    );
    assert_eq!(expected, expr);

    let errors = parse_with("f(1, 2)", &symbols, &[]).unwrap_err();
    assert_eq!(ErrorCode::BadArity, errors[0].code);
    assert_eq!((0, 7), (errors[0].start, errors[0].end));
}

#[test]
fn test_units_mode() {
    let expr = parse("kg m^{-1}", LexerType::Units).unwrap().unwrap().strip_loc();
    let Expr::Op2(BinaryOp::Mul, l, r, _) = expr else {
        panic!("expected a product");
    };
    assert_eq!(var("kg"), *l);
    assert!(matches!(*r, Expr::Op2(BinaryOp::Exp, _, _, _)));

    // no builtins in unit strings
    let expr = parse("sqrt(s)", LexerType::Units).unwrap().unwrap();
    assert!(matches!(expr, Expr::App(_, Callee::Unresolved, _, _)));
}

#[test]
fn test_errors() {
    parse_err("1 +", ("   ~", ErrorCode::UnrecognizedEof));
    parse_err("(1 + 2", ("~     ", ErrorCode::UnmatchedBracket));
    parse_err("1 + 2)", ("     ~", ErrorCode::UnmatchedBracket));
    parse_err("[1, 2}", ("     ~", ErrorCode::UnmatchedBracket));
    parse_err("[]", ("~~", ErrorCode::EmptyArray));
    parse_err("1 * * 2", ("    ~  ", ErrorCode::UnrecognizedToken));
    parse_err("(1, 2)", ("  ~   ", ErrorCode::UnrecognizedToken));
    parse_err("sin(1, 2)", ("~~~~~~~~~", ErrorCode::BadArity));
    parse_err("1, 2", (" ~  ", ErrorCode::ExtraToken));
    // lexer errors come through unchanged
    parse_err("1.2.3", ("~~~~~", ErrorCode::MalformedNumber));
}
