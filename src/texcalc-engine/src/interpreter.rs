// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use log::warn;

use crate::ast::{BinaryOp, Binding, Callee, Expr, Loc, UnaryOp};
use crate::builtins::BuiltinFn;
use crate::common::{Diagnostic, Error, ErrorCode, Ident, Result};
use crate::datamodel::{MismatchPolicy, Settings};
use crate::eval_err;
use crate::quantity::{Quantity, Value};
use crate::registry::{FunctionDefinition, Registry, Symbol, SymbolId};
use crate::units::Context;

/// Evaluator walks an expression tree bottom-up, carrying units through
/// every operation.  Hard errors abort the walk; dimension mismatches
/// under `MismatchPolicy::Warn` are collected in `warnings` and evaluation
/// carries on with an SI fallback.
pub struct Evaluator<'a> {
    units: &'a Context,
    registry: &'a Registry,
    settings: &'a Settings,
    warnings: Vec<Diagnostic>,
    depth: usize,
}

fn describe(q: &Quantity) -> String {
    if q.units.is_empty() {
        "a number".to_owned()
    } else {
        q.units.pretty_print()
    }
}

fn check_finite(value: Value, loc: Loc) -> Result<Value> {
    if value.quantities().iter().all(|q| q.magnitude.is_finite()) {
        Ok(value)
    } else {
        eval_err!(NotFinite, loc)
    }
}

impl<'a> Evaluator<'a> {
    pub fn new(units: &'a Context, registry: &'a Registry, settings: &'a Settings) -> Self {
        Evaluator {
            units,
            registry,
            settings,
            warnings: vec![],
            depth: 0,
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value> {
        self.eval_in(expr, &[])
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Diagnostic> {
        self.warnings
    }

    fn warn(&mut self, code: ErrorCode, loc: Loc, details: String) {
        // a broadcast operation fails the same way for every element
        let seen = self
            .warnings
            .iter()
            .any(|w| w.code == code && w.start == loc.start && w.end == loc.end);
        if !seen {
            warn!("{code} at {loc}: {details}");
            self.warnings.push(Diagnostic::warning(
                code,
                loc.start,
                loc.end,
                format!("{code}: {details}"),
            ));
        }
    }

    // a name resolved while parsing must still be bound when evaluated;
    // a miss is a bug in this crate, not in the expression
    fn missing_symbol(&self, id: SymbolId, loc: Loc) -> Error {
        debug_assert!(false, "symbol {id} is missing from the registry");
        Error::new(
            ErrorCode::UnknownSymbolId,
            loc.start,
            loc.end,
            Some(format!("symbol {id}")),
        )
    }

    fn eval_in(&mut self, expr: &Expr, locals: &[Value]) -> Result<Value> {
        match expr {
            Expr::Const(_, n, loc) => check_finite(Value::number(*n), *loc),
            Expr::Var(name, binding, loc) => self.eval_var(name, binding, *loc, locals),
            Expr::Unit(text, loc) => {
                let quantity = self.unit_quantity(text, *loc)?;
                Ok(Value::Scalar(quantity))
            }
            Expr::App(name, callee, args, loc) => self.eval_app(name, callee, args, *loc, locals),
            Expr::Array(elements, loc) => {
                let mut quantities = Vec::with_capacity(elements.len());
                for element in elements.iter() {
                    match self.eval_in(element, locals)? {
                        Value::Scalar(q) => quantities.push(q),
                        Value::Array(_) => {
                            return eval_err!(
                                HeterogeneousArray,
                                element.get_loc(),
                                "arrays can't be nested".to_owned()
                            );
                        }
                    }
                }
                match Value::array(quantities) {
                    Ok(value) => Ok(value),
                    Err(i) => {
                        let loc = elements.get(i).map_or(*loc, Expr::get_loc);
                        eval_err!(
                            HeterogeneousArray,
                            loc,
                            "array elements must all have the same dimension".to_owned()
                        )
                    }
                }
            }
            Expr::Index(base, index, loc) => {
                let base = self.eval_in(base, locals)?;
                let index_loc = index.get_loc();
                let index = self.eval_in(index, locals)?;
                self.index(&base, &index, index_loc, *loc)
            }
            Expr::Op1(op, operand, _) => {
                let operand = self.eval_in(operand, locals)?;
                let result = match op {
                    UnaryOp::Positive => operand,
                    UnaryOp::Negative => operand.map(Quantity::neg),
                };
                Ok(result)
            }
            Expr::Op2(op, l, r, loc) => {
                let l = self.eval_in(l, locals)?;
                let r = self.eval_in(r, locals)?;
                let loc = *loc;
                let result = match op {
                    BinaryOp::Add | BinaryOp::Sub => {
                        let op = *op;
                        self.broadcast(&l, &r, loc, |this, a, b| this.add_sub(op, a, b, loc))?
                    }
                    BinaryOp::Mul => self.broadcast(&l, &r, loc, |_, a, b| match a.mul(b) {
                        Some(product) => Ok(product),
                        None => eval_err!(UnitExponentOverflow, loc),
                    })?,
                    BinaryOp::Div => self.broadcast(&l, &r, loc, |_, a, b| {
                        if b.magnitude == 0.0 {
                            return eval_err!(DivisionByZero, loc);
                        }
                        match a.div(b) {
                            Some(quotient) => Ok(quotient),
                            None => eval_err!(UnitExponentOverflow, loc),
                        }
                    })?,
                    BinaryOp::Exp => self.broadcast(&l, &r, loc, |_, a, b| power(a, b, loc))?,
                };
                check_finite(result, loc)
            }
            Expr::Group(inner, _) => self.eval_in(inner, locals),
        }
    }

    fn eval_var(
        &mut self,
        name: &Ident,
        binding: &Binding,
        loc: Loc,
        locals: &[Value],
    ) -> Result<Value> {
        let registry = self.registry;
        let entry = match *binding {
            Binding::Local(i) => {
                return match locals.get(i) {
                    Some(value) => Ok(value.clone()),
                    None => Err(Error::new(
                        ErrorCode::UnknownSymbolId,
                        loc.start,
                        loc.end,
                        Some(format!("parameter {i} of {name}")),
                    )),
                };
            }
            Binding::Global(id) => match registry.get(id) {
                Some(entry) => entry,
                None => return Err(self.missing_symbol(id, loc)),
            },
            Binding::Unresolved => match registry.lookup(name) {
                Some(entry) => entry,
                None => return eval_err!(UndefinedVariable, loc, name.to_string()),
            },
        };

        match entry.symbol {
            Symbol::Value(ref value) => Ok(value.value.clone()),
            Symbol::Function(_) => eval_err!(
                NotAValue,
                loc,
                format!("{} is a function", entry.display)
            ),
        }
    }

    fn unit_quantity(&self, text: &str, loc: Loc) -> Result<Quantity> {
        let units = match self.units.parse_units(text) {
            Ok(units) => units,
            Err(errors) => {
                let code = errors
                    .first()
                    .map_or(ErrorCode::UnknownUnit, |err| err.code);
                return Err(Error::new(code, loc.start, loc.end, Some(text.to_owned())));
            }
        };
        // parse_units only returns known symbols, so a failure here is
        // a dimension exponent out of range
        match self.units.quantity(1.0, units) {
            Some(q) => Ok(q),
            None => eval_err!(UnitExponentOverflow, loc, text.to_owned()),
        }
    }

    fn eval_app(
        &mut self,
        name: &Ident,
        callee: &Callee,
        args: &[Expr],
        loc: Loc,
        locals: &[Value],
    ) -> Result<Value> {
        let registry = self.registry;
        let entry = match *callee {
            Callee::Builtin(builtin) => {
                if !builtin.arity().accepts(args.len()) {
                    return eval_err!(
                        BadArity,
                        loc,
                        format!("{} takes {}", builtin.name(), builtin.arity())
                    );
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args.iter() {
                    values.push(self.eval_in(arg, locals)?);
                }
                let result = self.apply_builtin(builtin, &values, loc)?;
                return check_finite(result, loc);
            }
            Callee::User(id) => match registry.get(id) {
                Some(entry) => entry,
                None => return Err(self.missing_symbol(id, loc)),
            },
            Callee::Unresolved => match registry.lookup(name) {
                Some(entry) => entry,
                None => return eval_err!(UndefinedFunction, loc, name.to_string()),
            },
        };

        match entry.symbol {
            Symbol::Function(ref func) => self.call(func, args, loc, locals),
            Symbol::Value(_) => eval_err!(
                NotAFunction,
                loc,
                format!("{} is not a function", entry.display)
            ),
        }
    }

    /// call evaluates a user function's body with its parameters bound
    /// to the evaluated arguments.  Errors inside the body are reported
    /// at the call site.
    fn call(
        &mut self,
        func: &FunctionDefinition,
        args: &[Expr],
        loc: Loc,
        locals: &[Value],
    ) -> Result<Value> {
        if args.len() != func.arity() {
            return eval_err!(
                BadArity,
                loc,
                format!(
                    "{} takes {} arguments, got {}",
                    func.name,
                    func.arity(),
                    args.len()
                )
            );
        }
        if self.depth >= self.settings.max_call_depth {
            return eval_err!(CallDepthExceeded, loc, func.name.to_string());
        }

        let mut scope = Vec::with_capacity(args.len());
        for arg in args.iter() {
            scope.push(self.eval_in(arg, locals)?);
        }

        let n_warnings = self.warnings.len();
        self.depth += 1;
        let result = self.eval_in(&func.body, &scope);
        self.depth -= 1;

        for warning in self.warnings[n_warnings..].iter_mut() {
            warning.start = loc.start;
            warning.end = loc.end;
        }
        result.map_err(|err| Error {
            start: loc.start,
            end: loc.end,
            ..err
        })
    }

    fn index(&self, base: &Value, index: &Value, index_loc: Loc, loc: Loc) -> Result<Value> {
        let Value::Array(elements) = base else {
            return eval_err!(CantIndexScalar, loc);
        };
        let i = match index {
            Value::Scalar(q) if q.is_number() && q.magnitude.fract() == 0.0 => q.magnitude,
            _ => {
                return eval_err!(
                    NonIntegerIndex,
                    index_loc,
                    "an index must be a whole number".to_owned()
                );
            }
        };
        if i < 0.0 || i >= elements.len() as f64 {
            return eval_err!(
                IndexOutOfRange,
                index_loc,
                format!("index {i} of an array of {} elements", elements.len())
            );
        }
        Ok(Value::Scalar(elements[i as usize].clone()))
    }

    /// broadcast applies `f` element-wise: scalars pair with every
    /// element of an array, and two arrays must have the same length.
    fn broadcast<F>(&mut self, l: &Value, r: &Value, loc: Loc, mut f: F) -> Result<Value>
    where
        F: FnMut(&mut Self, &Quantity, &Quantity) -> Result<Quantity>,
    {
        let elements = match (l, r) {
            (Value::Scalar(a), Value::Scalar(b)) => return Ok(Value::Scalar(f(self, a, b)?)),
            (Value::Array(xs), Value::Scalar(b)) => {
                let mut elements = Vec::with_capacity(xs.len());
                for a in xs.iter() {
                    elements.push(f(self, a, b)?);
                }
                elements
            }
            (Value::Scalar(a), Value::Array(ys)) => {
                let mut elements = Vec::with_capacity(ys.len());
                for b in ys.iter() {
                    elements.push(f(self, a, b)?);
                }
                elements
            }
            (Value::Array(xs), Value::Array(ys)) => {
                if xs.len() != ys.len() {
                    return eval_err!(
                        ArrayLengthMismatch,
                        loc,
                        format!("{} and {} elements", xs.len(), ys.len())
                    );
                }
                let mut elements = Vec::with_capacity(xs.len());
                for (a, b) in xs.iter().zip(ys.iter()) {
                    elements.push(f(self, a, b)?);
                }
                elements
            }
        };

        match Value::array(elements) {
            Ok(value) => Ok(value),
            Err(_) => eval_err!(
                HeterogeneousArray,
                loc,
                "array elements must all have the same dimension".to_owned()
            ),
        }
    }

    fn add_sub(
        &mut self,
        op: BinaryOp,
        l: &Quantity,
        r: &Quantity,
        loc: Loc,
    ) -> Result<Quantity> {
        let result = if op == BinaryOp::Add {
            l.add(r)
        } else {
            l.sub(r)
        };
        if let Some(q) = result {
            return Ok(q);
        }

        let verb = if op == BinaryOp::Add { "add" } else { "subtract" };
        let details = format!("can't {verb} {} and {}", describe(l), describe(r));
        match self.settings.mismatch {
            MismatchPolicy::Error => eval_err!(DimensionMismatch, loc, details),
            MismatchPolicy::Warn => {
                self.warn(ErrorCode::DimensionMismatch, loc, details);
                Ok(l.to_base())
            }
        }
    }

    fn apply_builtin(&self, builtin: BuiltinFn, args: &[Value], loc: Loc) -> Result<Value> {
        use BuiltinFn::*;

        if builtin == Pi {
            return Ok(Value::number(std::f64::consts::PI));
        }
        if builtin.is_transcendental() {
            let f: fn(f64) -> f64 = match builtin {
                Sin => f64::sin,
                Cos => f64::cos,
                Tan => f64::tan,
                Sinh => f64::sinh,
                Cosh => f64::cosh,
                Tanh => f64::tanh,
                Arcsin => f64::asin,
                Arccos => f64::acos,
                Arctan => f64::atan,
                Exp => f64::exp,
                Ln => f64::ln,
                _ => f64::log10,
            };
            return args[0].try_map(|q| {
                if !q.is_dimensionless() {
                    return eval_err!(
                        DimensionedArgument,
                        loc,
                        format!("{} of {}", builtin.name(), describe(q))
                    );
                }
                Ok(Quantity::dimensionless(f(q.to_si())))
            });
        }

        match builtin {
            Sqrt => args[0].try_map(|q| match q.powf(0.5) {
                Some(root) => Ok(root),
                None => eval_err!(
                    NonIntegerUnitExponent,
                    loc,
                    format!("square root of {}", describe(q))
                ),
            }),
            Abs => Ok(args[0].map(|q| q.with_magnitude(q.magnitude.abs()))),
            Floor => Ok(args[0].map(|q| q.with_magnitude(q.magnitude.floor()))),
            Ceil => Ok(args[0].map(|q| q.with_magnitude(q.magnitude.ceil()))),
            Round => Ok(args[0].map(|q| q.with_magnitude(q.magnitude.round()))),
            Size => Ok(Value::number(args[0].len() as f64)),
            Min | Max | Sum | Mean => {
                let quantities = same_units(args, loc)?;
                let Some(first) = quantities.first() else {
                    return eval_err!(BadArity, loc);
                };
                let magnitudes = quantities.iter().map(|q| q.magnitude);
                let result = match builtin {
                    Min => magnitudes.fold(f64::INFINITY, f64::min),
                    Max => magnitudes.fold(f64::NEG_INFINITY, f64::max),
                    Sum => magnitudes.sum(),
                    _ => magnitudes.sum::<f64>() / quantities.len() as f64,
                };
                Ok(Value::Scalar(first.with_magnitude(result)))
            }
            _ => unreachable!("{} handled above", builtin.name()),
        }
    }
}

/// same_units flattens the arguments of a reduction into a single list
/// expressed in the units of the first element.
fn same_units(args: &[Value], loc: Loc) -> Result<Vec<Quantity>> {
    let flattened: Vec<Quantity> = args
        .iter()
        .flat_map(|arg| arg.quantities().iter().cloned())
        .collect();
    match Value::array(flattened) {
        Ok(value) => Ok(value.quantities().to_vec()),
        Err(_) => eval_err!(
            HeterogeneousArray,
            loc,
            "arguments must all have the same dimension".to_owned()
        ),
    }
}

fn power(base: &Quantity, exponent: &Quantity, loc: Loc) -> Result<Quantity> {
    if !exponent.is_dimensionless() {
        return eval_err!(
            DimensionedExponent,
            loc,
            format!("exponent has units of {}", describe(exponent))
        );
    }
    let power = exponent.to_si();
    if base.is_number() {
        return Ok(base.with_magnitude(base.magnitude.powf(power)));
    }
    match base.powf(power) {
        Some(q) => Ok(q),
        None if power.fract() == 0.0 => eval_err!(
            UnitExponentOverflow,
            loc,
            format!("{} to the power {power}", describe(base))
        ),
        None => eval_err!(
            NonIntegerUnitExponent,
            loc,
            format!("{} to the power {power}", describe(base))
        ),
    }
}
