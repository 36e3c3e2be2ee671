// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;
use std::result::Result as StdResult;

use float_cmp::approx_eq;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::common::{EquationError, EquationResult, ErrorCode, Ident};
use crate::datamodel::{Prefixes, Unit, UnitMap};
use crate::eqn_err;
use crate::lexer::{LexerType, unescape_units};
use crate::parser;
use crate::quantity::Quantity;

/// The SI base units every dimension is expressed in.
pub const BASE_UNITS: &[&str] = &["m", "kg", "s", "A", "K", "mol", "cd"];

/// A resolved unit symbol: what dimension it measures and how to get
/// from a magnitude in this unit to SI base units, `(x + offset) * scale`.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitDef {
    pub symbol: String,
    pub display: String,
    pub dimension: UnitMap,
    pub scale: f64,
    pub offset: f64,
}

// (symbol, factor, which prefix set it belongs to, used when compacting)
const PREFIXES: &[(&str, f64, Prefixes, bool)] = &[
    ("G", 1e9, Prefixes::Engineering, true),
    ("M", 1e6, Prefixes::Engineering, true),
    ("k", 1e3, Prefixes::Engineering, true),
    ("d", 1e-1, Prefixes::Metric, false),
    ("c", 1e-2, Prefixes::Metric, false),
    ("m", 1e-3, Prefixes::Engineering, true),
    ("µ", 1e-6, Prefixes::Engineering, true),
    ("u", 1e-6, Prefixes::Engineering, false),
    ("n", 1e-9, Prefixes::Engineering, true),
];

#[derive(Debug, Default, PartialEq)]
pub struct Context {
    aliases: HashMap<String, String>,
    units: HashMap<String, UnitDef>,
    // stem symbol -> the prefixed symbols a magnitude may be compacted into
    families: HashMap<String, Vec<String>>,
    stems: HashMap<String, String>,
}

fn builtin_units() -> Vec<Unit> {
    use Prefixes::{Engineering, Metric};

    #[rustfmt::skip]
    let table: &[(&str, Option<&str>, f64, &[&str], Prefixes)] = &[
        // base units
        ("m", None, 1.0, &["meter", "metre", "meters"], Metric),
        ("kg", None, 1.0, &["kilogram"], Prefixes::None),
        ("s", None, 1.0, &["sec", "second", "seconds"], Engineering),
        ("A", None, 1.0, &["ampere"], Engineering),
        ("K", None, 1.0, &["kelvin"], Prefixes::None),
        ("mol", None, 1.0, &["mole"], Engineering),
        ("cd", None, 1.0, &["candela"], Prefixes::None),
        // mass and volume
        ("g", Some("kg"), 1e-3, &["gram", "grams"], Engineering),
        ("L", Some("m^3"), 1e-3, &["liter", "litre", "liters"], Metric),
        // time
        ("min", Some("s"), 60.0, &["minute", "minutes"], Prefixes::None),
        ("h", Some("s"), 3600.0, &["hr", "hour", "hours"], Prefixes::None),
        ("d", Some("s"), 86400.0, &["day", "days"], Prefixes::None),
        ("wk", Some("s"), 604800.0, &["week", "weeks"], Prefixes::None),
        ("yr", Some("s"), 31557600.0, &["year", "years"], Prefixes::None),
        // derived SI units
        ("Hz", Some("1/s"), 1.0, &["hertz"], Engineering),
        ("N", Some("kg*m/s^2"), 1.0, &["newton"], Engineering),
        ("Pa", Some("N/m^2"), 1.0, &["pascal"], Engineering),
        ("J", Some("N*m"), 1.0, &["joule"], Engineering),
        ("W", Some("J/s"), 1.0, &["watt"], Engineering),
        ("C", Some("A*s"), 1.0, &["coulomb"], Engineering),
        ("V", Some("W/A"), 1.0, &["volt"], Engineering),
        ("bar", Some("Pa"), 1e5, &[], Prefixes::None),
        ("atm", Some("Pa"), 101325.0, &[], Prefixes::None),
        // dimensionless
        ("rad", Some("1"), 1.0, &["radian", "radians"], Prefixes::None),
        ("%", Some("1"), 0.01, &["percent"], Prefixes::None),
        ("ppm", Some("1"), 1e-6, &[], Prefixes::None),
    ];

    let mut units: Vec<Unit> = table
        .iter()
        .map(|(name, equation, scale, aliases, prefixes)| Unit {
            name: name.to_string(),
            equation: equation.map(|eqn| eqn.to_owned()),
            scale: *scale,
            offset: 0.0,
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            prefixes: *prefixes,
            display: None,
        })
        .collect();

    let special: &[(&str, f64, f64, &[&str], &str)] = &[
        ("deg", std::f64::consts::PI / 180.0, 0.0, &["°", "degree", "degrees"], "°"),
        ("degC", 1.0, 273.15, &["°C", "celsius"], "°C"),
        ("degF", 5.0 / 9.0, 459.67, &["°F", "fahrenheit"], "°F"),
    ];
    for (name, scale, offset, aliases, display) in special {
        let equation = if *name == "deg" { "1" } else { "K" };
        units.push(Unit {
            name: name.to_string(),
            equation: Some(equation.to_owned()),
            scale: *scale,
            offset: *offset,
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            prefixes: Prefixes::None,
            display: Some(display.to_string()),
        });
    }

    units
}

fn duplicate(name: &str) -> (String, Vec<EquationError>) {
    (
        name.to_owned(),
        vec![EquationError {
            start: 0,
            end: 0,
            code: ErrorCode::DuplicateUnit,
        }],
    )
}

impl Context {
    /// new_with_builtins builds the SI table plus common non-SI units,
    /// followed by any caller-supplied definitions.
    pub fn new_with_builtins(units: &[Unit]) -> StdResult<Self, Vec<(String, Vec<EquationError>)>> {
        let mut all_units = builtin_units();
        all_units.extend(units.iter().cloned());

        Self::new(&all_units)
    }

    pub fn new(units: &[Unit]) -> StdResult<Self, Vec<(String, Vec<EquationError>)>> {
        let mut unit_errors: Vec<(String, Vec<EquationError>)> = Vec::new();
        let mut ctx = Context::default();

        // step 1: build our base context consisting of all prime units
        for unit in units.iter().filter(|unit| unit.equation.is_none()) {
            let def = UnitDef {
                symbol: unit.name.clone(),
                display: unit.display.clone().unwrap_or_else(|| unit.name.clone()),
                dimension: UnitMap::unit(&unit.name),
                scale: unit.scale,
                offset: unit.offset,
            };
            ctx.insert(unit, def, &mut unit_errors);
        }

        // step 2: use this base context to parse our units with equations.
        // Definitions may only refer to units defined before them.
        for unit in units.iter() {
            let Some(eqn) = unit.equation.as_ref() else {
                continue;
            };

            let components = match ctx.parse_units(eqn) {
                Ok(components) => components,
                Err(errors) => {
                    unit_errors.push((unit.name.clone(), errors));
                    continue;
                }
            };
            // parse_units only returns known symbols
            let Some(base) = ctx.quantity(1.0, components) else {
                continue;
            };

            let def = UnitDef {
                symbol: unit.name.clone(),
                display: unit.display.clone().unwrap_or_else(|| unit.name.clone()),
                dimension: base.dimension,
                scale: unit.scale * base.scale,
                offset: unit.offset,
            };
            ctx.insert(unit, def, &mut unit_errors);
        }

        if unit_errors.is_empty() {
            Ok(ctx)
        } else {
            Err(unit_errors)
        }
    }

    fn insert(
        &mut self,
        unit: &Unit,
        def: UnitDef,
        unit_errors: &mut Vec<(String, Vec<EquationError>)>,
    ) {
        if self.is_unit(&unit.name) {
            unit_errors.push(duplicate(&unit.name));
            return;
        }
        for alias in unit.aliases.iter() {
            if self.is_unit(alias) || *alias == unit.name {
                unit_errors.push(duplicate(&unit.name));
            } else {
                self.aliases.insert(alias.clone(), unit.name.clone());
            }
        }

        self.units.insert(unit.name.clone(), def.clone());
        if unit.prefixes != Prefixes::None {
            self.add_prefixes(&def, unit.prefixes);
        }
    }

    fn add_prefixes(&mut self, def: &UnitDef, prefixes: Prefixes) {
        let mut family = vec![def.symbol.clone()];
        for &(prefix, factor, class, compact) in PREFIXES {
            if class == Prefixes::Metric && prefixes != Prefixes::Metric {
                continue;
            }
            let symbol = format!("{prefix}{}", def.symbol);
            let scale = def.scale * factor;

            // an existing unit wins; kg predates g, so adopt it into
            // the gram family when it means the same thing
            if let Some(existing) = self.lookup(&symbol) {
                if compact
                    && existing.dimension == def.dimension
                    && approx_eq!(f64, existing.scale, scale, ulps = 4)
                {
                    family.push(existing.symbol.clone());
                }
                continue;
            }

            self.units.insert(
                symbol.clone(),
                UnitDef {
                    symbol: symbol.clone(),
                    display: format!("{prefix}{}", def.display),
                    dimension: def.dimension.clone(),
                    scale,
                    offset: 0.0,
                },
            );
            if compact {
                family.push(symbol);
            }
        }

        for member in family.iter() {
            self.stems.insert(member.clone(), def.symbol.clone());
        }
        self.families.insert(def.symbol.clone(), family);
    }

    pub fn lookup(&self, ident: &str) -> Option<&UnitDef> {
        // first, see if this identifier is an alias of a better-known unit
        let normalized = self
            .aliases
            .get(ident)
            .map(|s| s.as_str())
            .unwrap_or(ident);
        self.units.get(normalized)
    }

    pub fn is_unit(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// is_reserved reports whether binding a value to `name` would
    /// shadow a unit symbol.  Subscripted or primed names never do.
    pub fn is_reserved(&self, name: &Ident) -> bool {
        !name.is_decorated() && self.is_unit(name.as_str())
    }

    /// reads_as_unit is true for a bare word that expressions treat as
    /// a unit symbol rather than a name: single letters stay names.
    pub fn reads_as_unit(&self, word: &str) -> bool {
        word.chars().count() >= 2 && self.is_unit(word)
    }

    /// display_symbol is how a canonical symbol is written back out.
    pub fn display_symbol<'a>(&'a self, symbol: &'a str) -> &'a str {
        match self.lookup(symbol) {
            Some(def) => def.display.as_str(),
            None => symbol,
        }
    }

    /// family lists the prefixed variants a quantity in `symbol` may be
    /// rewritten into when compacting, including `symbol` itself.
    pub fn family(&self, symbol: &str) -> &[String] {
        self.stems
            .get(symbol)
            .and_then(|stem| self.families.get(stem))
            .map(|family| family.as_slice())
            .unwrap_or(&[])
    }

    /// parse_units turns a unit string like `mg/L/d` or `kg\cdot m/s^{2}`
    /// into a product of canonical unit symbols.  An empty string is
    /// dimensionless.
    pub fn parse_units(&self, text: &str) -> StdResult<UnitMap, Vec<EquationError>> {
        let text = unescape_units(text);
        match parser::parse(&text, LexerType::Units)? {
            Some(expr) => build_unit_components(self, &expr).map_err(|err| vec![err]),
            None => Ok(UnitMap::new()),
        }
    }

    /// quantity pairs a magnitude with units, resolving the dimension and
    /// scale.  Returns `None` if a symbol is unknown or a dimension
    /// exponent overflows.
    pub fn quantity(&self, magnitude: f64, units: UnitMap) -> Option<Quantity> {
        let mut dimension = UnitMap::new();
        let mut scale = 1.0;
        for (symbol, exp) in units.iter() {
            let def = self.lookup(symbol)?;
            dimension = dimension.checked_mul(def.dimension.clone().checked_exp(exp)?)?;
            scale *= def.scale.powi(exp);
        }

        // an affine offset only applies to a lone unit like `degC`; in
        // a compound like `degC/min` the unit measures a difference
        let offset = match units.iter().next() {
            Some((symbol, 1)) if units.len() == 1 => self.lookup(symbol).map_or(0.0, |def| def.offset),
            _ => 0.0,
        };

        Some(Quantity {
            magnitude,
            units,
            dimension,
            scale,
            offset,
        })
    }
}

fn const_int_eval(ast: &Expr) -> EquationResult<i32> {
    match ast {
        Expr::Const(_, n, loc) => {
            if !approx_eq!(f64, *n, n.round()) {
                eqn_err!(ExpectedInteger, loc.start, loc.end)
            } else if n.round().abs() > i32::MAX as f64 {
                eqn_err!(UnitExponentOverflow, loc.start, loc.end)
            } else {
                Ok(n.round() as i32)
            }
        }
        Expr::Var(_, _, loc)
        | Expr::Unit(_, loc)
        | Expr::App(_, _, _, loc)
        | Expr::Array(_, loc)
        | Expr::Index(_, _, loc) => {
            eqn_err!(ExpectedInteger, loc.start, loc.end)
        }
        Expr::Group(expr, _) => const_int_eval(expr),
        Expr::Op1(op, expr, loc) => {
            let expr = const_int_eval(expr)?;
            let result = match op {
                UnaryOp::Positive => Some(expr),
                UnaryOp::Negative => expr.checked_neg(),
            };
            match result {
                Some(result) => Ok(result),
                None => eqn_err!(UnitExponentOverflow, loc.start, loc.end),
            }
        }
        Expr::Op2(op, l, r, loc) => {
            let l = const_int_eval(l)?;
            let r = const_int_eval(r)?;
            let result = match op {
                BinaryOp::Add => l.checked_add(r),
                BinaryOp::Sub => l.checked_sub(r),
                BinaryOp::Exp => {
                    if r < 0 {
                        return eqn_err!(ExpectedInteger, loc.start, loc.end);
                    }
                    l.checked_pow(r as u32)
                }
                BinaryOp::Mul => l.checked_mul(r),
                BinaryOp::Div => {
                    if r == 0 {
                        Some(0)
                    } else {
                        l.checked_div(r)
                    }
                }
            };
            match result {
                Some(result) => Ok(result),
                None => eqn_err!(UnitExponentOverflow, loc.start, loc.end),
            }
        }
    }
}

fn build_unit_components(ctx: &Context, ast: &Expr) -> EquationResult<UnitMap> {
    let unit_map: UnitMap = match ast {
        Expr::Const(_, _, loc) => {
            // dimensionless is special
            if let Ok(1) = const_int_eval(ast) {
                UnitMap::new()
            } else {
                // nothing to do here (handled below in Op2)
                return eqn_err!(NoConstInUnits, loc.start, loc.end);
            }
        }
        Expr::Var(id, _, loc) => {
            let id = id.as_str();
            if id == "dimensionless" || id == "dmnl" {
                UnitMap::new()
            } else {
                match ctx.lookup(id) {
                    Some(def) => UnitMap::unit(&def.symbol),
                    None => return eqn_err!(UnknownUnit, loc.start, loc.end),
                }
            }
        }
        Expr::Unit(units, loc) => match ctx.lookup(units) {
            Some(def) => UnitMap::unit(&def.symbol),
            None => return eqn_err!(UnknownUnit, loc.start, loc.end),
        },
        Expr::Group(expr, _) => build_unit_components(ctx, expr)?,
        Expr::App(_, _, _, loc) => {
            return eqn_err!(NoAppInUnits, loc.start, loc.end);
        }
        Expr::Array(_, loc) | Expr::Index(_, _, loc) => {
            return eqn_err!(NoIndexInUnits, loc.start, loc.end);
        }
        Expr::Op1(_, _, loc) => {
            return eqn_err!(NoUnaryOpInUnits, loc.start, loc.end);
        }
        Expr::Op2(op, l, r, loc) => match op {
            BinaryOp::Exp => {
                let exp = const_int_eval(r)?;
                match build_unit_components(ctx, l)?.checked_exp(exp) {
                    Some(units) => units,
                    None => return eqn_err!(UnitExponentOverflow, loc.start, loc.end),
                }
            }
            BinaryOp::Mul => {
                let l = build_unit_components(ctx, l)?;
                match l.checked_mul(build_unit_components(ctx, r)?) {
                    Some(units) => units,
                    None => return eqn_err!(UnitExponentOverflow, loc.start, loc.end),
                }
            }
            BinaryOp::Div => {
                // check first for the reciprocal case -- 1/blah
                if let Ok(i) = const_int_eval(l) {
                    if i != 1 {
                        let loc = l.get_loc();
                        return eqn_err!(ExpectedIntegerOne, loc.start, loc.end);
                    }
                    match build_unit_components(ctx, r)?.checked_reciprocal() {
                        Some(units) => units,
                        None => return eqn_err!(UnitExponentOverflow, loc.start, loc.end),
                    }
                } else {
                    let l = build_unit_components(ctx, l)?;
                    match l.checked_div(build_unit_components(ctx, r)?) {
                        Some(units) => units,
                        None => return eqn_err!(UnitExponentOverflow, loc.start, loc.end),
                    }
                }
            }
            BinaryOp::Add | BinaryOp::Sub => {
                return eqn_err!(BadBinaryOpInUnits, loc.start, loc.end);
            }
        },
    };

    Ok(unit_map)
}

#[cfg(test)]
fn simple_unit(name: &str, equation: Option<&str>, aliases: &[&str]) -> Unit {
    Unit {
        name: name.to_owned(),
        equation: equation.map(|eqn| eqn.to_owned()),
        scale: 1.0,
        offset: 0.0,
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        prefixes: Prefixes::None,
        display: None,
    }
}

#[test]
fn test_context_creation() {
    let simple_units = &[
        simple_unit("time", None, &[]),
        simple_unit("people", None, &["person", "persons"]),
        Unit {
            scale: 12.0,
            ..simple_unit("dozen", Some("people"), &[])
        },
    ];

    let context = Context::new(simple_units).unwrap();
    assert_eq!("people", context.lookup("persons").unwrap().symbol);
    assert!(context.lookup("years").is_none());

    let dozen = context.lookup("dozen").unwrap();
    assert_eq!(UnitMap::unit("people"), dozen.dimension);
    assert_eq!(12.0, dozen.scale);

    let duplicates = &[
        simple_unit("time", None, &[]),
        simple_unit("people", None, &["time"]),
    ];
    let errors = Context::new(duplicates).unwrap_err();
    assert_eq!(1, errors.len());
    assert_eq!("people", errors[0].0);
    assert_eq!(ErrorCode::DuplicateUnit, errors[0].1[0].code);

    // definitions may only build on units defined before them
    let out_of_order = &[
        simple_unit("throughput", Some("widget/time"), &[]),
        simple_unit("widget", Some("1"), &[]),
        simple_unit("time", None, &[]),
    ];
    let errors = Context::new(out_of_order).unwrap_err();
    assert_eq!("throughput", errors[0].0);
    assert_eq!(ErrorCode::UnknownUnit, errors[0].1[0].code);
}

#[test]
fn test_builtin_context() {
    let context = Context::new_with_builtins(&[]).unwrap();

    for base in BASE_UNITS {
        let def = context.lookup(base).unwrap();
        assert_eq!(UnitMap::unit(base), def.dimension);
        assert_eq!(1.0, def.scale);
    }

    let newton = context.lookup("N").unwrap();
    let expected: UnitMap = [("kg".to_owned(), 1), ("m".to_owned(), 1), ("s".to_owned(), -2)]
        .into_iter()
        .collect();
    assert_eq!(expected, newton.dimension);

    let kpa = context.lookup("kPa").unwrap();
    assert!(approx_eq!(f64, 1000.0, kpa.scale));

    let ml = context.lookup("mL").unwrap();
    assert!(approx_eq!(f64, 1e-6, ml.scale, ulps = 4));
    assert!(context.is_unit("cm"));
    assert!(context.is_unit("µg"));
    assert!(context.is_unit("ug"));
    // centi and deci are only generated for length and volume
    assert!(!context.is_unit("cs"));

    assert_eq!("°C", context.display_symbol("degC"));
    assert_eq!("mg", context.display_symbol("mg"));
    assert_eq!("µg", context.display_symbol("µg"));
}

#[test]
fn test_prefix_families() {
    let context = Context::new_with_builtins(&[]).unwrap();

    let grams = context.family("mg");
    for symbol in ["g", "kg", "mg", "µg", "ng"] {
        assert!(grams.iter().any(|s| s == symbol), "{symbol} not in {grams:?}");
    }
    assert!(!grams.iter().any(|s| s == "ug"));
    assert_eq!(grams, context.family("kg"));

    let meters = context.family("m");
    assert!(meters.iter().any(|s| s == "km"));
    assert!(!meters.iter().any(|s| s == "cm"));

    assert!(context.family("d").is_empty());
}

#[test]
fn test_reserved() {
    use crate::common::canonicalize;

    let context = Context::new_with_builtins(&[]).unwrap();
    assert!(context.is_reserved(&canonicalize("m")));
    assert!(context.is_reserved(&canonicalize("min")));
    assert!(context.is_reserved(&canonicalize("days")));
    assert!(!context.is_reserved(&canonicalize("m_1")));
    assert!(!context.is_reserved(&canonicalize("m'")));
    assert!(!context.is_reserved(&canonicalize("rate")));
}

#[test]
fn test_basic_unit_parsing() {
    let context = Context::new_with_builtins(&[]).unwrap();

    let positive_cases: &[(&str, &str)] = &[
        ("mg/L/d", "mg/L/d"),
        ("kg*m/s^2", "kg*m/s^2"),
        ("kg\\cdot m/s^{2}", "kg*m/s^2"),
        ("1/s", "1/s"),
        ("m^{2}", "m^2"),
        ("\\mu g/L", "µg/L"),
        ("days", "d"),
        ("kg m^{-1}", "kg/m"),
        ("L\\,mg/L", "mg"),
        ("^{\\circ}C", "degC"),
        ("\\%", "%"),
        ("1", "1"),
        ("dimensionless", "1"),
        ("", "1"),
    ];

    for (input, output) in positive_cases {
        let result = context.parse_units(input).unwrap();
        assert_eq!(*output, result.pretty_print(), "parsing {input}");
    }

    let negative_cases = &[
        ("2 / s", ErrorCode::ExpectedIntegerOne),
        ("2 * s", ErrorCode::NoConstInUnits),
        ("foo(s)", ErrorCode::NoAppInUnits),
        ("bar[s]", ErrorCode::NoIndexInUnits),
        ("-s", ErrorCode::NoUnaryOpInUnits),
        ("m + s", ErrorCode::BadBinaryOpInUnits),
        ("furlongs", ErrorCode::UnknownUnit),
        ("m^{1.5}", ErrorCode::ExpectedInteger),
        ("m^{2^{40}}", ErrorCode::UnitExponentOverflow),
        ("(m^{65536})^{65536}", ErrorCode::UnitExponentOverflow),
        ("m^{2147483647}\\cdot m", ErrorCode::UnitExponentOverflow),
        ("m^{1e12}", ErrorCode::UnitExponentOverflow),
    ];

    for (input, output) in negative_cases {
        let errors = context.parse_units(input).unwrap_err();
        assert_eq!(*output, errors[0].code, "parsing {input}");
    }
}

#[test]
fn test_quantity() {
    let context = Context::new_with_builtins(&[]).unwrap();

    let rate = context
        .quantity(15.0, context.parse_units("mg/L/d").unwrap())
        .unwrap();
    let expected_dimension: UnitMap = [("kg".to_owned(), 1), ("m".to_owned(), -3), ("s".to_owned(), -1)]
        .into_iter()
        .collect();
    assert_eq!(expected_dimension, rate.dimension);
    assert!(approx_eq!(
        f64,
        15.0 * 1e-3 / 86400.0,
        rate.to_si(),
        epsilon = 1e-15
    ));

    let warm = context
        .quantity(20.0, context.parse_units("degC").unwrap())
        .unwrap();
    assert!(approx_eq!(f64, 293.15, warm.to_si(), ulps = 4));

    // a compound unit measures a difference, so it has no offset
    let warming = context
        .quantity(2.0, context.parse_units("degC/h").unwrap())
        .unwrap();
    assert_eq!(0.0, warming.offset);

    assert!(
        context
            .quantity(1.0, UnitMap::unit("furlong"))
            .is_none()
    );

    // L is m^3, so a large enough power of it has no dimension
    let huge_volume: UnitMap = [("L".to_owned(), 1 << 30)].into_iter().collect();
    assert!(context.quantity(1.0, huge_volume).is_none());
}

#[test]
fn test_const_int_eval() {
    let positive_cases = &[
        ("0", 0),
        ("1", 1),
        ("-1", -1),
        ("1 * 1", 1),
        ("2 / 3", 0),
        ("7 / 0", 0),
        ("4 - 1", 3),
        ("3^(1+2)", 27),
        ("{-2}", -2),
    ];

    for (input, output) in positive_cases {
        let expr = parser::parse(input, LexerType::Units).unwrap().unwrap();
        assert_eq!(*output, const_int_eval(&expr).unwrap());
    }

    let negative_cases = &["3.5", "foo", "bar[2]", "foo(1, 2)", "2^-1"];

    for input in negative_cases {
        let expr = parser::parse(input, LexerType::Units).unwrap().unwrap();
        assert_eq!(
            ErrorCode::ExpectedInteger,
            const_int_eval(&expr).unwrap_err().code
        );
    }

    let overflow_cases = &["2^{40}", "65536 * 65536", "2147483647 + 1", "-2147483647 - 2"];

    for input in overflow_cases {
        let expr = parser::parse(input, LexerType::Units).unwrap().unwrap();
        assert_eq!(
            ErrorCode::UnitExponentOverflow,
            const_int_eval(&expr).unwrap_err().code,
            "evaluating {input}"
        );
    }
}
