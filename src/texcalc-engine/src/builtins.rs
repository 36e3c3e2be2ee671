// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum BuiltinFn {
    // dimensionless in, dimensionless out
    Sin,
    Cos,
    Tan,
    Sinh,
    Cosh,
    Tanh,
    Arcsin,
    Arccos,
    Arctan,
    Exp,
    Ln,
    Log,
    // units carried through
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Round,
    // reductions over scalars and arrays
    Min,
    Max,
    Sum,
    Mean,
    Size,
    // constants
    Pi,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Exactly(m) => n == m,
            Arity::AtLeast(m) => n >= m,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exactly(1) => write!(f, "1 argument"),
            Arity::Exactly(n) => write!(f, "{n} arguments"),
            Arity::AtLeast(1) => write!(f, "at least 1 argument"),
            Arity::AtLeast(n) => write!(f, "at least {n} arguments"),
        }
    }
}

impl BuiltinFn {
    pub fn name(&self) -> &'static str {
        use BuiltinFn::*;
        match self {
            Sin => "sin",
            Cos => "cos",
            Tan => "tan",
            Sinh => "sinh",
            Cosh => "cosh",
            Tanh => "tanh",
            Arcsin => "arcsin",
            Arccos => "arccos",
            Arctan => "arctan",
            Exp => "exp",
            Ln => "ln",
            Log => "log",
            Sqrt => "sqrt",
            Abs => "abs",
            Floor => "floor",
            Ceil => "ceil",
            Round => "round",
            Min => "min",
            Max => "max",
            Sum => "sum",
            Mean => "mean",
            Size => "size",
            Pi => "pi",
        }
    }

    /// from_name maps both the plain name (`sum`) and the command
    /// spelling (`\pi`) to a builtin.
    pub fn from_name(name: &str) -> Option<BuiltinFn> {
        use BuiltinFn::*;
        let name = name.strip_prefix('\\').unwrap_or(name);
        let builtin = match name {
            "sin" => Sin,
            "cos" => Cos,
            "tan" => Tan,
            "sinh" => Sinh,
            "cosh" => Cosh,
            "tanh" => Tanh,
            "arcsin" | "asin" => Arcsin,
            "arccos" | "acos" => Arccos,
            "arctan" | "atan" => Arctan,
            "exp" => Exp,
            "ln" => Ln,
            "log" => Log,
            "sqrt" => Sqrt,
            "abs" => Abs,
            "floor" => Floor,
            "ceil" => Ceil,
            "round" => Round,
            "min" => Min,
            "max" => Max,
            "sum" => Sum,
            "mean" => Mean,
            "size" => Size,
            "pi" => Pi,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn arity(&self) -> Arity {
        use BuiltinFn::*;
        match self {
            Pi => Arity::Exactly(0),
            Min | Max | Sum | Mean => Arity::AtLeast(1),
            _ => Arity::Exactly(1),
        }
    }

    pub fn is_0_arity(&self) -> bool {
        self.arity() == Arity::Exactly(0)
    }

    /// is_transcendental builtins require a dimensionless argument and
    /// produce a dimensionless result.
    pub fn is_transcendental(&self) -> bool {
        use BuiltinFn::*;
        matches!(
            self,
            Sin | Cos | Tan | Sinh | Cosh | Tanh | Arcsin | Arccos | Arctan | Exp | Ln | Log
        )
    }
}

pub fn is_builtin_fn(name: &str) -> bool {
    BuiltinFn::from_name(name).is_some()
}

#[test]
fn test_is_builtin_fn() {
    assert!(is_builtin_fn("sin"));
    assert!(is_builtin_fn("\\sin"));
    assert!(!is_builtin_fn("sinz"));
    assert!(is_builtin_fn("mean"));
    assert!(is_builtin_fn("\\pi"));
    assert!(!is_builtin_fn("lookup"));
}

#[test]
fn test_arity() {
    assert!(BuiltinFn::Pi.is_0_arity());
    assert!(!BuiltinFn::Sqrt.is_0_arity());
    assert!(BuiltinFn::Max.arity().accepts(3));
    assert!(!BuiltinFn::Max.arity().accepts(0));
    assert!(BuiltinFn::Ln.arity().accepts(1));
    assert!(!BuiltinFn::Ln.arity().accepts(2));
    assert_eq!("at least 1 argument", format!("{}", BuiltinFn::Sum.arity()));
}

#[test]
fn test_name() {
    for builtin in [BuiltinFn::Arctan, BuiltinFn::Round, BuiltinFn::Pi] {
        assert_eq!(Some(builtin), BuiltinFn::from_name(builtin.name()));
    }
    assert!(BuiltinFn::Log.is_transcendental());
    assert!(!BuiltinFn::Abs.is_transcendental());
}
