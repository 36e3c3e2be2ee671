// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::borrow::Cow;

use crate::datamodel::UnitMap;

/// A magnitude paired with the units it is written in.  `dimension`
/// and `scale` are derived from `units` by the unit context and cached
/// here, so arithmetic never needs to consult the unit table:
/// the SI value is `(magnitude + offset) * scale`.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantity {
    pub magnitude: f64,
    pub units: UnitMap,
    pub dimension: UnitMap,
    pub scale: f64,
    pub offset: f64,
}

impl Quantity {
    pub fn dimensionless(magnitude: f64) -> Self {
        Quantity {
            magnitude,
            units: UnitMap::new(),
            dimension: UnitMap::new(),
            scale: 1.0,
            offset: 0.0,
        }
    }

    /// is_number is true for a bare number, which has neither units nor
    /// dimension.  `50%` is dimensionless but not a bare number.
    pub fn is_number(&self) -> bool {
        self.units.is_empty()
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dimension.is_empty()
    }

    pub fn same_dimension(&self, other: &Quantity) -> bool {
        self.dimension == other.dimension
    }

    pub fn to_si(&self) -> f64 {
        (self.magnitude + self.offset) * self.scale
    }

    /// to_base re-expresses the quantity in SI base units.
    pub fn to_base(&self) -> Quantity {
        Quantity {
            magnitude: self.to_si(),
            units: self.dimension.clone(),
            dimension: self.dimension.clone(),
            scale: 1.0,
            offset: 0.0,
        }
    }

    pub fn with_magnitude(&self, magnitude: f64) -> Quantity {
        Quantity {
            magnitude,
            ..self.clone()
        }
    }

    /// convert_to expresses this quantity in the units of `target`,
    /// ignoring the target's magnitude.  `None` if the dimensions differ.
    pub fn convert_to(&self, target: &Quantity) -> Option<Quantity> {
        if !self.same_dimension(target) {
            return None;
        }
        Some(target.with_magnitude(self.to_si() / target.scale - target.offset))
    }

    fn without_offset(&self) -> Cow<'_, Quantity> {
        if self.offset == 0.0 {
            Cow::Borrowed(self)
        } else {
            Cow::Owned(self.to_base())
        }
    }

    // the magnitude of `rhs`, as an amount to add to `self`.  Adding to
    // an affine unit (20 degC + 5 K) treats the right side as a
    // difference; otherwise it is an absolute value.
    fn addend(&self, rhs: &Quantity) -> f64 {
        if self.offset != 0.0 {
            rhs.magnitude * rhs.scale / self.scale
        } else {
            rhs.to_si() / self.scale
        }
    }

    /// add returns the sum in the left operand's units, or `None` if
    /// the dimensions differ.
    pub fn add(&self, rhs: &Quantity) -> Option<Quantity> {
        if !self.same_dimension(rhs) {
            return None;
        }
        Some(self.with_magnitude(self.magnitude + self.addend(rhs)))
    }

    pub fn sub(&self, rhs: &Quantity) -> Option<Quantity> {
        if !self.same_dimension(rhs) {
            return None;
        }
        Some(self.with_magnitude(self.magnitude - self.addend(rhs)))
    }

    pub fn neg(&self) -> Quantity {
        self.with_magnitude(-self.magnitude)
    }

    /// mul multiplies.  `None` if a unit exponent overflows.
    pub fn mul(&self, rhs: &Quantity) -> Option<Quantity> {
        // scaling by a bare number keeps the units as written, offset
        // included: `2 \cdot 20 degC` stays in degC
        if self.is_number() {
            return Some(rhs.with_magnitude(self.magnitude * rhs.magnitude));
        }
        if rhs.is_number() {
            return Some(self.with_magnitude(self.magnitude * rhs.magnitude));
        }

        let l = self.without_offset();
        let r = rhs.without_offset();
        Some(Quantity {
            magnitude: l.magnitude * r.magnitude,
            units: l.units.clone().checked_mul(r.units.clone())?,
            dimension: l.dimension.clone().checked_mul(r.dimension.clone())?,
            scale: l.scale * r.scale,
            offset: 0.0,
        })
    }

    /// div divides; the caller checks for a zero divisor.  `None` if a
    /// unit exponent overflows.
    pub fn div(&self, rhs: &Quantity) -> Option<Quantity> {
        if rhs.is_number() {
            return Some(self.with_magnitude(self.magnitude / rhs.magnitude));
        }

        let l = self.without_offset();
        let r = rhs.without_offset();
        Some(Quantity {
            magnitude: l.magnitude / r.magnitude,
            units: l.units.clone().checked_div(r.units.clone())?,
            dimension: l.dimension.clone().checked_div(r.dimension.clone())?,
            scale: l.scale / r.scale,
            offset: 0.0,
        })
    }

    /// powf raises to a real power.  `None` if some unit would end up
    /// with a fractional exponent (`\sqrt{m}`).
    pub fn powf(&self, power: f64) -> Option<Quantity> {
        let base = self.without_offset();
        let units = base.units.scaled(power)?;
        let dimension = base.dimension.scaled(power)?;
        Some(Quantity {
            magnitude: base.magnitude.powf(power),
            units,
            dimension,
            scale: base.scale.powf(power),
            offset: 0.0,
        })
    }
}

/// The result of evaluating an expression.  Arrays are never empty and
/// all their elements share the first element's units.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(Quantity),
    Array(Vec<Quantity>),
}

impl Value {
    pub fn number(n: f64) -> Value {
        Value::Scalar(Quantity::dimensionless(n))
    }

    /// array builds a homogeneous array, converting every element to
    /// the units of the first.  On a dimension clash returns the index
    /// of the first offending element.
    pub fn array(elements: Vec<Quantity>) -> Result<Value, usize> {
        let Some(first) = elements.first() else {
            return Err(0);
        };
        if elements.iter().all(|q| q.units == first.units) {
            return Ok(Value::Array(elements));
        }

        let target = first.clone();
        let mut converted = Vec::with_capacity(elements.len());
        for (i, element) in elements.iter().enumerate() {
            match element.convert_to(&target) {
                Some(q) => converted.push(q),
                None => return Err(i),
            }
        }
        Ok(Value::Array(converted))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn len(&self) -> usize {
        self.quantities().len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities().is_empty()
    }

    /// quantities views a scalar as a one-element slice.
    pub fn quantities(&self) -> &[Quantity] {
        match self {
            Value::Scalar(q) => std::slice::from_ref(q),
            Value::Array(elements) => elements,
        }
    }

    /// first is the element whose units an array is displayed in.
    pub fn first(&self) -> Option<&Quantity> {
        self.quantities().first()
    }

    pub fn map<F>(&self, f: F) -> Value
    where
        F: Fn(&Quantity) -> Quantity,
    {
        match self {
            Value::Scalar(q) => Value::Scalar(f(q)),
            Value::Array(elements) => Value::Array(elements.iter().map(f).collect()),
        }
    }

    pub fn try_map<F, E>(&self, mut f: F) -> Result<Value, E>
    where
        F: FnMut(&Quantity) -> Result<Quantity, E>,
    {
        match self {
            Value::Scalar(q) => Ok(Value::Scalar(f(q)?)),
            Value::Array(elements) => {
                let elements: Result<Vec<Quantity>, E> = elements.iter().map(f).collect();
                Ok(Value::Array(elements?))
            }
        }
    }

    pub fn to_base(&self) -> Value {
        self.map(Quantity::to_base)
    }
}
