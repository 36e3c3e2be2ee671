// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// UnitMap is a product of named units raised to integer powers.  The
/// same type describes both the units a quantity is written in
/// (`mg`, `L`, `d`) and its SI dimension (`kg`, `m`, `s`).  Zero
/// exponents are never stored, so two maps are equal iff they describe
/// the same product.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitMap {
    pub map: BTreeMap<String, i32>,
}

impl UnitMap {
    pub fn new() -> UnitMap {
        Default::default()
    }

    pub fn unit(name: &str) -> UnitMap {
        [(name.to_owned(), 1)].into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn get(&self, unit: &str) -> i32 {
        self.map.get(unit).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.map.iter().map(|(unit, exp)| (unit.as_str(), *exp))
    }

    pub fn numerator(&self) -> impl Iterator<Item = (&str, i32)> {
        self.iter().filter(|(_, exp)| *exp > 0)
    }

    pub fn denominator(&self) -> impl Iterator<Item = (&str, i32)> {
        self.iter().filter(|(_, exp)| *exp < 0)
    }

    pub fn reciprocal(mut self) -> Self {
        for (_id, exp) in self.map.iter_mut() {
            *exp = exp.saturating_neg();
        }
        self
    }

    pub fn exp(mut self, exp: i32) -> Self {
        if exp == 0 {
            return UnitMap::new();
        }
        for (_id, unit) in self.map.iter_mut() {
            *unit = unit.saturating_mul(exp);
        }

        self
    }

    /// checked_reciprocal is `reciprocal`, or `None` if an exponent has
    /// no negation in `i32`.
    pub fn checked_reciprocal(mut self) -> Option<Self> {
        for (_id, exp) in self.map.iter_mut() {
            *exp = exp.checked_neg()?;
        }
        Some(self)
    }

    /// checked_exp is `exp`, or `None` if an exponent overflows.
    pub fn checked_exp(mut self, exp: i32) -> Option<Self> {
        if exp == 0 {
            return Some(UnitMap::new());
        }
        for (_id, unit) in self.map.iter_mut() {
            *unit = unit.checked_mul(exp)?;
        }
        Some(self)
    }

    /// checked_mul is `self * rhs`, or `None` if an exponent overflows.
    pub fn checked_mul(mut self, rhs: Self) -> Option<Self> {
        for (unit, n) in rhs.map.into_iter() {
            let new_value = match self.map.get(&unit) {
                None => n,
                Some(m) => n.checked_add(*m)?,
            };
            if new_value == 0 {
                self.map.remove(&unit);
            } else {
                self.map.insert(unit, new_value);
            }
        }
        Some(self)
    }

    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        self.checked_mul(rhs.checked_reciprocal()?)
    }

    /// scaled raises every exponent by a real power, succeeding only if
    /// every resulting exponent is integral (`m^2` to the `0.5` is `m`,
    /// `m` to the `0.5` is not representable).
    pub fn scaled(&self, power: f64) -> Option<Self> {
        let mut result = UnitMap::new();
        for (unit, exp) in self.iter() {
            let scaled = exp as f64 * power;
            let rounded = scaled.round();
            if (scaled - rounded).abs() > 1e-9 || rounded.abs() > i32::MAX as f64 {
                return None;
            }
            if rounded != 0.0 {
                result.map.insert(unit.to_owned(), rounded as i32);
            }
        }
        Some(result)
    }

    pub fn pretty_print(&self) -> String {
        format!("{self}")
    }
}

impl std::ops::Div for UnitMap {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn div(self, rhs: Self) -> Self::Output {
        self * rhs.reciprocal()
    }
}

impl std::ops::Mul for UnitMap {
    type Output = Self;

    fn mul(mut self, rhs: Self) -> Self::Output {
        for (unit, n) in rhs.map.into_iter() {
            let new_value = match self.map.get(&unit) {
                None => n,
                Some(m) => n.saturating_add(*m),
            };

            if new_value == 0 {
                self.map.remove(&unit);
            } else {
                self.map.insert(unit, new_value);
            }
        }

        self
    }
}

impl Display for UnitMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut written = false;
        for (unit, exp) in self.numerator() {
            if written {
                write!(f, "*")?;
            }
            write!(f, "{unit}")?;
            if exp > 1 {
                write!(f, "^{exp}")?;
            }
            written = true;
        }

        for (unit, exp) in self.denominator() {
            if !written {
                write!(f, "1")?;
                written = true;
            }
            write!(f, "/{unit}")?;
            if exp < -1 {
                write!(f, "^{}", -exp)?;
            }
        }

        if !written {
            write!(f, "1")?;
        }

        Ok(())
    }
}

impl FromIterator<(String, i32)> for UnitMap {
    fn from_iter<I: IntoIterator<Item = (String, i32)>>(iter: I) -> Self {
        UnitMap {
            map: iter.into_iter().filter(|(_, exp)| *exp != 0).collect(),
        }
    }
}

/// Which SI prefixes are generated for a unit.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prefixes {
    #[default]
    None,
    /// G, M, k, m, µ (also spelled u) and n.
    Engineering,
    /// Engineering prefixes plus c and d, for length and volume.
    Metric,
}

fn one() -> f64 {
    1.0
}

/// A unit definition.  A unit without an equation is a base dimension
/// of its own; otherwise it is `scale` times the unit product named by
/// `equation`, shifted by `offset` for affine scales like degrees
/// Celsius.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    #[serde(default)]
    pub equation: Option<String>,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub prefixes: Prefixes,
    /// The symbol as written back out, if it differs from `name`.
    #[serde(default)]
    pub display: Option<String>,
}

/// How a unit product is written out.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// `mg/L/d`
    #[default]
    Native,
    /// `mg/(L\cdot d)`
    Grouped,
    /// `mg\cdot L^{-1}\cdot d^{-1}`
    NegativeExponent,
}

/// What adding or subtracting quantities of different dimension does.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Record a warning and continue with the left operand in SI base units.
    #[default]
    Warn,
    /// Abort the statement with a hard dimension error.
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub display: DisplayMode,
    pub precision: usize,
    pub array_column_threshold: usize,
    pub mismatch: MismatchPolicy,
    pub compact_prefixes: bool,
    pub max_call_depth: usize,
    pub scientific_above: f64,
    pub scientific_below: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            display: DisplayMode::Native,
            precision: 6,
            array_column_threshold: 5,
            mismatch: MismatchPolicy::Warn,
            compact_prefixes: true,
            max_call_depth: 64,
            scientific_above: 1e6,
            scientific_below: 1e-3,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> serde_json::Result<Settings> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> String {
        // a struct of plain scalars always serializes
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(pairs: &[(&str, i32)]) -> UnitMap {
        pairs.iter().map(|(u, e)| (u.to_string(), *e)).collect()
    }

    #[test]
    fn test_unit_map_algebra() {
        let mg_per_l_per_d = units(&[("mg", 1), ("L", -1), ("d", -1)]);
        let l = UnitMap::unit("L");

        let product = l.clone() * mg_per_l_per_d.clone();
        assert_eq!(units(&[("mg", 1), ("d", -1)]), product);

        let quotient = product / UnitMap::unit("mg");
        assert_eq!(units(&[("d", -1)]), quotient);

        assert_eq!(UnitMap::new(), l.clone() / l);
        assert_eq!(units(&[("m", 2)]), UnitMap::unit("m").exp(2));
        assert_eq!(UnitMap::new(), UnitMap::unit("m").exp(0));
    }

    #[test]
    fn test_unit_map_scaled() {
        let area = units(&[("m", 2)]);
        assert_eq!(Some(UnitMap::unit("m")), area.scaled(0.5));
        assert_eq!(None, UnitMap::unit("m").scaled(0.5));
        assert_eq!(Some(UnitMap::new()), UnitMap::new().scaled(0.25));
    }

    #[test]
    fn test_unit_map_overflow() {
        let big = units(&[("m", 65536)]);
        assert_eq!(None, big.clone().checked_exp(65536));
        assert_eq!(Some(units(&[("m", 131072)])), big.clone().checked_exp(2));
        assert_eq!(None, big.scaled(65536.0));

        let max = units(&[("m", i32::MAX)]);
        assert_eq!(None, max.clone().checked_mul(UnitMap::unit("m")));
        assert_eq!(
            Some(UnitMap::new()),
            max.clone().checked_div(max.clone())
        );
        assert_eq!(None, units(&[("m", i32::MIN)]).checked_reciprocal());

        // the operators saturate rather than wrap
        assert_eq!(max.clone(), max.clone() * UnitMap::unit("m"));
        assert_eq!(max.clone(), UnitMap::unit("m").exp(i32::MAX).exp(2));
    }

    #[test]
    fn test_unit_map_display() {
        let cases: &[(&[(&str, i32)], &str)] = &[
            (&[("kg", 1), ("m", 1), ("s", -2)], "kg*m/s^2"),
            (&[("mg", 1), ("L", -1), ("d", -1)], "mg/L/d"),
            (&[("s", -1)], "1/s"),
            (&[], "1"),
            (&[("m", 3)], "m^3"),
        ];
        for (pairs, expected) in cases {
            assert_eq!(*expected, units(pairs).pretty_print());
        }
    }

    #[test]
    fn test_settings_json() {
        let settings = Settings::from_json(r#"{"display": "negative_exponent", "precision": 3}"#)
            .unwrap();
        assert_eq!(DisplayMode::NegativeExponent, settings.display);
        assert_eq!(3, settings.precision);
        assert_eq!(MismatchPolicy::Warn, settings.mismatch);
        assert_eq!(5, settings.array_column_threshold);

        let roundtrip = Settings::from_json(&settings.to_json()).unwrap();
        assert_eq!(settings, roundtrip);

        let strict = Settings::from_json(r#"{"mismatch": "error"}"#).unwrap();
        assert_eq!(MismatchPolicy::Error, strict.mismatch);

        assert!(Settings::from_json(r#"{"display": "sideways"}"#).is_err());
    }

    #[test]
    fn test_unit_json_defaults() {
        let unit: Unit =
            serde_json::from_str(r#"{"name": "furlong", "equation": "m", "scale": 201.168}"#)
                .unwrap();
        assert_eq!("furlong", unit.name);
        assert_eq!(Some("m".to_owned()), unit.equation);
        assert_eq!(0.0, unit.offset);
        assert_eq!(Prefixes::None, unit.prefixes);

        let widget: Unit = serde_json::from_str(r#"{"name": "widget"}"#).unwrap();
        assert_eq!(1.0, widget.scale);
        assert_eq!(None, widget.equation);
    }
}
