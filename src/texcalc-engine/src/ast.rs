// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

use crate::builtins::BuiltinFn;
use crate::common::{Ident, span_offset};
use crate::registry::SymbolId;

/// Loc describes a location in an expression by the starting point and ending point.
/// Expressions are strings typed by humans for a single statement -- u16 is long enough,
/// and offsets past it saturate.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
pub struct Loc {
    pub start: u16,
    pub end: u16,
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl Loc {
    pub fn new(start: usize, end: usize) -> Self {
        Loc {
            start: span_offset(start),
            end: span_offset(end),
        }
    }

    /// union takes a second Loc and returns the inclusive range from the
    /// start of the earlier token to the end of the later token.
    pub fn union(&self, rhs: &Self) -> Self {
        Loc {
            start: self.start.min(rhs.start),
            end: self.end.max(rhs.end),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Exp,
    Mul,
    Div,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum UnaryOp {
    Positive,
    Negative,
}

/// Where a variable reference points, decided while parsing.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Binding {
    /// The n-th parameter of the function body being parsed.
    Local(usize),
    /// A registry entry that existed when the expression was parsed.
    Global(SymbolId),
    /// Looked up by name when evaluated.
    Unresolved,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Callee {
    Builtin(BuiltinFn),
    User(SymbolId),
    Unresolved,
}

#[derive(PartialEq, Clone, Debug)]
pub enum Expr {
    Const(String, f64, Loc),
    Var(Ident, Binding, Loc),
    /// A unit product as written, e.g. `mg/L/d` from `\mathrm{mg/L/d}`.
    Unit(String, Loc),
    App(Ident, Callee, Vec<Expr>, Loc),
    Array(Vec<Expr>, Loc),
    Index(Box<Expr>, Box<Expr>, Loc),
    Op1(UnaryOp, Box<Expr>, Loc),
    Op2(BinaryOp, Box<Expr>, Box<Expr>, Loc),
    Group(Box<Expr>, Loc),
}

impl Expr {
    pub fn get_loc(&self) -> Loc {
        match self {
            Expr::Const(_, _, loc) => *loc,
            Expr::Var(_, _, loc) => *loc,
            Expr::Unit(_, loc) => *loc,
            Expr::App(_, _, _, loc) => *loc,
            Expr::Array(_, loc) => *loc,
            Expr::Index(_, _, loc) => *loc,
            Expr::Op1(_, _, loc) => *loc,
            Expr::Op2(_, _, _, loc) => *loc,
            Expr::Group(_, loc) => *loc,
        }
    }

    /// is_indexable reports whether a following `[...]` subscripts this
    /// expression rather than starting an array literal.
    pub(crate) fn is_indexable(&self) -> bool {
        matches!(
            self,
            Expr::Var(..) | Expr::App(..) | Expr::Array(..) | Expr::Index(..) | Expr::Group(..)
        )
    }

    #[cfg(test)]
    pub(crate) fn strip_loc(self) -> Self {
        let loc = Loc::default();
        match self {
            Expr::Const(s, n, _loc) => Expr::Const(s, n, loc),
            Expr::Var(id, binding, _loc) => Expr::Var(id, binding, loc),
            Expr::Unit(units, _loc) => Expr::Unit(units, loc),
            Expr::App(id, callee, args, _loc) => Expr::App(
                id,
                callee,
                args.into_iter().map(|arg| arg.strip_loc()).collect(),
                loc,
            ),
            Expr::Array(elements, _loc) => {
                Expr::Array(elements.into_iter().map(|e| e.strip_loc()).collect(), loc)
            }
            Expr::Index(base, index, _loc) => {
                Expr::Index(Box::new(base.strip_loc()), Box::new(index.strip_loc()), loc)
            }
            Expr::Op1(op, r, _loc) => Expr::Op1(op, Box::new(r.strip_loc()), loc),
            Expr::Op2(op, l, r, _loc) => {
                Expr::Op2(op, Box::new(l.strip_loc()), Box::new(r.strip_loc()), loc)
            }
            Expr::Group(inner, _loc) => Expr::Group(Box::new(inner.strip_loc()), loc),
        }
    }
}

/// print_eqn renders an expression back to plain text, used in trace
/// logging and test failure output.
pub fn print_eqn(expr: &Expr) -> String {
    match expr {
        Expr::Const(s, _, _) => s.clone(),
        Expr::Var(id, _, _) => id.to_string(),
        Expr::Unit(units, _) => format!("[{units}]"),
        Expr::App(id, _, args, _) => {
            let args: Vec<String> = args.iter().map(print_eqn).collect();
            format!("{}({})", id, args.join(", "))
        }
        Expr::Array(elements, _) => {
            let elements: Vec<String> = elements.iter().map(print_eqn).collect();
            format!("[{}]", elements.join(", "))
        }
        Expr::Index(base, index, _) => format!("{}[{}]", print_eqn(base), print_eqn(index)),
        Expr::Op1(op, r, _) => {
            let r = print_eqn(r);
            match op {
                UnaryOp::Positive => format!("+{r}"),
                UnaryOp::Negative => format!("-{r}"),
            }
        }
        Expr::Op2(op, l, r, _) => {
            let op = match op {
                BinaryOp::Add => "+",
                BinaryOp::Sub => "-",
                BinaryOp::Exp => "^",
                BinaryOp::Mul => "*",
                BinaryOp::Div => "/",
            };
            format!("{} {} {}", print_eqn(l), op, print_eqn(r))
        }
        Expr::Group(inner, _) => format!("({})", print_eqn(inner)),
    }
}

#[test]
fn test_loc_basics() {
    let a = Loc { start: 3, end: 7 };
    assert_eq!(a, Loc::new(3, 7));

    let b = Loc { start: 4, end: 11 };
    assert_eq!(Loc::new(3, 11), a.union(&b));

    let c = Loc { start: 1, end: 5 };
    assert_eq!(Loc::new(1, 7), a.union(&c));
}

#[test]
fn test_loc_saturates() {
    assert_eq!(
        Loc {
            start: u16::MAX,
            end: u16::MAX
        },
        Loc::new(70000, 70010)
    );
    assert_eq!(
        Loc {
            start: 65000,
            end: u16::MAX
        },
        Loc::new(65000, 65600)
    );
}

#[test]
fn test_print_eqn() {
    use crate::common::canonicalize;

    let loc = Loc::default();
    let expr = Expr::Op2(
        BinaryOp::Mul,
        Box::new(Expr::Var(canonicalize("volume"), Binding::Unresolved, loc)),
        Box::new(Expr::Group(
            Box::new(Expr::Op1(
                UnaryOp::Negative,
                Box::new(Expr::Unit("mg/L".to_owned(), loc)),
                loc,
            )),
            loc,
        )),
        loc,
    );
    assert_eq!("volume * (-[mg/L])", print_eqn(&expr));
}
