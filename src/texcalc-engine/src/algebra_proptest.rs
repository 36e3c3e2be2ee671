// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Property-based tests for quantity arithmetic using proptest.
//!
//! These tests verify that:
//! 1. Adding and then subtracting a commensurable quantity is a no-op
//! 2. Dimensions compose multiplicatively
//! 3. Array operations broadcast elementwise
//! 4. Formatted values evaluate back to what was formatted

use float_cmp::approx_eq;
use proptest::prelude::*;

use crate::datamodel::{DisplayMode, Settings};
use crate::format::Formatter;
use crate::interpreter::Evaluator;
use crate::parser::{NoSymbols, ParseEnv, parse_equation};
use crate::quantity::{Quantity, Value};
use crate::registry::Registry;
use crate::test_common::units;

fn quantity(magnitude: f64, unit_str: &str) -> Quantity {
    let ctx = units();
    ctx.quantity(magnitude, ctx.parse_units(unit_str).unwrap())
        .unwrap()
}

fn eval(input: &str) -> Value {
    let env = ParseEnv {
        units: units(),
        symbols: &NoSymbols,
        locals: &[],
    };
    let expr = parse_equation(input, &env)
        .unwrap_or_else(|err| panic!("parsing {input}: {err:?}"))
        .unwrap();
    let registry = Registry::new();
    let settings = Settings::default();
    let mut evaluator = Evaluator::new(units(), &registry, &settings);
    evaluator
        .eval(&expr)
        .unwrap_or_else(|err| panic!("evaluating {input}: {err}"))
}

fn close(expected: f64, actual: f64) -> bool {
    approx_eq!(
        f64,
        expected,
        actual,
        epsilon = expected.abs().max(1.0) * 1e-9
    )
}

// Strategy helpers for generating magnitudes and units

fn magnitude() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        Just(1.0),
        (-1000i32..1000).prop_map(|x| x as f64),
        (-1000i32..1000).prop_map(|x| x as f64 / 8.0),
        (1i32..1000).prop_map(|x| x as f64 * 1e5),
    ]
}

fn length_unit() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("m"), Just("km"), Just("cm"), Just("mm"), Just("µm")]
}

fn any_unit() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("m"),
        Just("kg"),
        Just("s"),
        Just("g/d"),
        Just("mg/L/d"),
        Just("kg*m/s^2"),
        Just("L"),
        Just("h"),
        Just("kPa"),
        Just("%"),
    ]
}

fn display_mode() -> impl Strategy<Value = DisplayMode> {
    prop_oneof![
        Just(DisplayMode::Native),
        Just(DisplayMode::Grouped),
        Just(DisplayMode::NegativeExponent),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn add_then_subtract_is_identity(
        a in magnitude(),
        a_unit in length_unit(),
        b in magnitude(),
        b_unit in length_unit(),
    ) {
        let a = quantity(a, a_unit);
        let b = quantity(b, b_unit);

        let sum = a.add(&b).unwrap();
        // sums are expressed in the left operand's units
        prop_assert_eq!(&a.units, &sum.units);
        let back = sum.sub(&b).unwrap();
        // cancellation loses precision relative to the larger operand
        let scale = a.to_si().abs().max(b.to_si().abs()).max(1.0);
        prop_assert!(
            approx_eq!(f64, a.to_si(), back.to_si(), epsilon = scale * 1e-9),
            "{} != {}",
            a.to_si(),
            back.to_si()
        );
    }

    #[test]
    fn dimensions_compose(
        a in magnitude(),
        a_unit in any_unit(),
        b in (1i32..1000).prop_map(|x| x as f64 / 4.0),
        b_unit in any_unit(),
    ) {
        let a = quantity(a, a_unit);
        let b = quantity(b, b_unit);

        let product = a.mul(&b).unwrap();
        prop_assert_eq!(a.dimension.clone() * b.dimension.clone(), product.dimension.clone());
        prop_assert!(close(a.to_si() * b.to_si(), product.to_si()));

        let quotient = product.div(&b).unwrap();
        prop_assert_eq!(&a.dimension, &quotient.dimension);
        prop_assert!(close(a.to_si(), quotient.to_si()));

        // different dimensions never add
        if a.dimension != b.dimension {
            prop_assert!(a.add(&b).is_none());
        }
    }

    #[test]
    fn arrays_broadcast(
        elements in prop::collection::vec(-1000i32..1000, 1..8),
        k in 1i32..100,
    ) {
        let list: Vec<String> = elements.iter().map(|x| x.to_string()).collect();
        let array = format!("[{}]\\,\\mathrm{{m}}", list.join(", "));

        let scaled = eval(&format!("{array} \\cdot {k}\\,\\mathrm{{s}}"));
        prop_assert_eq!(elements.len(), scaled.len());
        for (x, q) in elements.iter().zip(scaled.quantities()) {
            prop_assert!(close((*x as f64) * (k as f64), q.to_si()));
            prop_assert_eq!(&quantity(1.0, "m*s").dimension, &q.dimension);
        }

        let shifted = eval(&format!("{array} + {k}\\,\\mathrm{{km}}"));
        for (x, q) in elements.iter().zip(shifted.quantities()) {
            prop_assert!(close(*x as f64 + (k as f64) * 1000.0, q.to_si()));
        }

        let same = eval(&format!("{array} - {array}"));
        prop_assert!(same.quantities().iter().all(|q| q.magnitude == 0.0));
    }

    #[test]
    fn formatted_values_evaluate_back(
        n in magnitude(),
        unit_str in any_unit(),
        mode in display_mode(),
    ) {
        let settings = Settings {
            display: mode,
            ..Settings::default()
        };
        let fmt = Formatter::new(units(), &settings);
        let expected = Value::Scalar(quantity(n, unit_str));
        let text = fmt.value(&expected);

        let actual = eval(&text);
        let (expected, actual) = (expected.first().unwrap(), actual.first().unwrap());
        prop_assert_eq!(&expected.dimension, &actual.dimension, "{}", text);
        // rounded to the configured significant digits
        let tolerance = expected.to_si().abs() * 1e-5;
        prop_assert!(
            (expected.to_si() - actual.to_si()).abs() <= tolerance,
            "{}: {} != {}",
            text,
            expected.to_si(),
            actual.to_si()
        );
    }
}
