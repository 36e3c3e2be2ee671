// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Rendering of values back into LaTeX.  Everything produced here lexes
//! and parses back into the value it came from (to the configured
//! precision), which is what lets a rendered document be processed again
//! with the same result.

use crate::common::Severity;
use crate::datamodel::{DisplayMode, Settings, UnitMap};
use crate::quantity::{Quantity, Value};
use crate::units::Context;

/// Markup always starts with this, so it can be found and cut off again.
pub const MARKUP_START: &str = "\\quad \\color{";

/// The marker placed before a unit hint that could not be honoured.
pub(crate) const REQUESTED: &str = "\\ \\text{requested}\\ \\mathrm";

pub struct Formatter<'a> {
    units: &'a Context,
    settings: &'a Settings,
}

fn trim_zeros(s: &str) -> String {
    let trimmed = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    };
    if trimmed == "-0" {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// latex_symbol writes a unit symbol so that the unit-wrapper unescaping
/// in the lexer turns it back into the same symbol.
fn latex_symbol(symbol: &str) -> String {
    let mut out = String::with_capacity(symbol.len() + 4);
    for c in symbol.chars() {
        match c {
            'µ' => out.push_str("\\mu "),
            'Ω' => out.push_str("\\Omega "),
            '%' => out.push_str("\\%"),
            '°' => out.push_str("^{\\circ}"),
            _ => out.push(c),
        }
    }
    out
}

impl<'a> Formatter<'a> {
    pub fn new(units: &'a Context, settings: &'a Settings) -> Self {
        Formatter { units, settings }
    }

    /// number renders a magnitude with `precision` significant digits,
    /// switching to `a \times 10^{b}` outside the configured range.
    pub fn number(&self, n: f64) -> String {
        if n.is_nan() {
            return "\\mathrm{NaN}".to_owned();
        }

        let precision = self.settings.precision.max(1);
        let sci = format!("{:.*e}", precision - 1, n);
        let Some((mantissa, exp)) = sci.split_once('e') else {
            return sci;
        };
        let exp: i32 = exp.parse().unwrap_or(0);
        // decide on the rounded value, so 999999.9 is written like 1e6
        let rounded: f64 = sci.parse().unwrap_or(n);
        if rounded == 0.0 {
            return "0".to_owned();
        }

        let magnitude = rounded.abs();
        if magnitude >= self.settings.scientific_above || magnitude < self.settings.scientific_below
        {
            return format!("{} \\times 10^{{{}}}", trim_zeros(mantissa), exp);
        }

        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_zeros(&format!("{rounded:.decimals$}"))
    }

    fn factor(&self, symbol: &str, exp: i32) -> String {
        let symbol = latex_symbol(self.units.display_symbol(symbol));
        if exp == 1 {
            symbol
        } else {
            format!("{symbol}^{{{exp}}}")
        }
    }

    /// unit_latex renders a unit product as the contents of a
    /// `\mathrm{..}` wrapper, in the configured display mode.
    pub fn unit_latex(&self, units: &UnitMap) -> String {
        if self.settings.display == DisplayMode::NegativeExponent {
            let factors: Vec<String> = units
                .numerator()
                .chain(units.denominator())
                .map(|(s, exp)| self.factor(s, exp))
                .collect();
            return factors.join("\\cdot ");
        }

        let numerator: Vec<String> = units
            .numerator()
            .map(|(s, exp)| self.factor(s, exp))
            .collect();
        let numerator = if numerator.is_empty() {
            "1".to_owned()
        } else {
            numerator.join("\\cdot ")
        };
        let denominator: Vec<String> = units
            .denominator()
            .map(|(s, exp)| self.factor(s, -exp))
            .collect();

        match (self.settings.display, denominator.len()) {
            (_, 0) => numerator,
            (DisplayMode::Grouped, n) if n > 1 => {
                format!("{numerator}/({})", denominator.join("\\cdot "))
            }
            _ => {
                let mut out = numerator;
                for d in denominator.iter() {
                    out.push('/');
                    out.push_str(d);
                }
                out
            }
        }
    }

    fn with_units(&self, magnitude: String, units: &UnitMap) -> String {
        if units.is_empty() {
            magnitude
        } else {
            format!("{magnitude}\\ \\mathrm{{{}}}", self.unit_latex(units))
        }
    }

    pub fn quantity(&self, q: &Quantity) -> String {
        self.with_units(self.number(q.magnitude), &q.units)
    }

    /// value renders a scalar, or an array inline (`[1, 2]\ \mathrm{m}`)
    /// or as a `bmatrix` column once it is longer than the threshold.
    pub fn value(&self, value: &Value) -> String {
        let elements = match value {
            Value::Scalar(q) => return self.quantity(q),
            Value::Array(elements) => elements,
        };

        let numbers: Vec<String> = elements.iter().map(|q| self.number(q.magnitude)).collect();
        let body = if elements.len() > self.settings.array_column_threshold {
            format!(
                "\\begin{{bmatrix}}{}\\end{{bmatrix}}",
                numbers.join(" \\\\ ")
            )
        } else {
            format!("[{}]", numbers.join(", "))
        };
        match value.first() {
            Some(first) => self.with_units(body, &first.units),
            None => body,
        }
    }

    /// compact re-prefixes a value whose only numerator unit is a
    /// prefixable symbol so its largest magnitude lands in [1, 1000):
    /// 567360 mg/d becomes 567.36 g/d.
    pub fn compact(&self, value: &Value) -> Value {
        let Some(first) = value.first() else {
            return value.clone();
        };
        if first.offset != 0.0 {
            return value.clone();
        }
        let mut numerator = first.units.numerator();
        let symbol = match (numerator.next(), numerator.next()) {
            (Some((symbol, 1)), None) => symbol,
            _ => return value.clone(),
        };

        let largest = value
            .quantities()
            .iter()
            .map(|q| q.magnitude.abs())
            .fold(0.0, f64::max);
        if largest == 0.0 || (1.0..1000.0).contains(&largest) {
            return value.clone();
        }
        let Some(current) = self.units.lookup(symbol) else {
            return value.clone();
        };

        for candidate in self.units.family(symbol) {
            let Some(def) = self.units.lookup(candidate) else {
                continue;
            };
            let factor = current.scale / def.scale;
            if !(1.0..1000.0).contains(&(largest * factor)) {
                continue;
            }
            let units = first.units.clone() / UnitMap::unit(symbol) * UnitMap::unit(candidate);
            return value.map(|q| {
                self.units
                    .quantity(q.magnitude * factor, units.clone())
                    .unwrap_or_else(|| q.clone())
            });
        }

        value.clone()
    }
}

/// escape_text makes a message safe to place inside `\text{..}`.
pub fn escape_text(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for c in message.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '^' => out.push_str("\\^{}"),
            '~' => out.push_str("\\~{}"),
            '_' | '%' | '&' | '#' | '$' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// markup renders a diagnostic for display after a statement.  A unit
/// hint that couldn't be applied is carried along so that processing
/// the rendered statement again asks for the same unit.
pub fn markup(severity: Severity, message: &str, requested: Option<&str>) -> String {
    let color = match severity {
        Severity::Error => "red",
        Severity::Warning => "orange",
    };
    let mut body = format!("\\text{{{}}}", escape_text(message));
    if let Some(hint) = requested {
        body.push_str(REQUESTED);
        body.push('{');
        body.push_str(hint);
        body.push('}');
    }
    format!("{MARKUP_START}{color}}}{{{body}}}")
}
