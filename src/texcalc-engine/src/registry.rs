// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::ast::{Expr, Loc, print_eqn};
use crate::common::{Ident, Result, canonicalize};
use crate::eval_err;
use crate::parser::{Resolved, Resolver};
use crate::quantity::Value;
use crate::units::Context;

/// The registry-private identity of a bound name.  Ids are handed out
/// in binding order and never reused, and since they are never spelled
/// out in source text one can't be mistaken for part of another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SymbolValue {
    pub value: Value,
    /// The right-hand side as it was written.
    pub source: String,
}

#[derive(Debug, PartialEq)]
pub struct FunctionDefinition {
    pub name: Ident,
    pub params: Vec<Ident>,
    /// Parsed with the parameters bound to `Binding::Local`, and not
    /// evaluated until called.
    pub body: Expr,
    pub source: String,
}

impl FunctionDefinition {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Symbol {
    Value(SymbolValue),
    Function(Rc<FunctionDefinition>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub id: SymbolId,
    pub name: Ident,
    /// The name as first written, braces and all.
    pub display: String,
    pub symbol: Symbol,
}

impl Entry {
    pub fn value(&self) -> Option<&SymbolValue> {
        match self.symbol {
            Symbol::Value(ref value) => Some(value),
            Symbol::Function(_) => None,
        }
    }

    pub fn function(&self) -> Option<&Rc<FunctionDefinition>> {
        match self.symbol {
            Symbol::Function(ref func) => Some(func),
            Symbol::Value(_) => None,
        }
    }
}

/// Registry maps display names to bound values and functions for one
/// processing pass.  Entries are only ever added or replaced, in
/// statement order.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    entries: Vec<Entry>,
    by_name: HashMap<Ident, SymbolId>,
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: SymbolId) -> Option<&Entry> {
        self.entries.get(id.index())
    }

    pub fn lookup(&self, name: &Ident) -> Option<&Entry> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    /// iter walks the entries in the order they were first bound.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// bind_value binds `display` to a value, replacing any previous
    /// binding of the same name.  `loc` is where the name was written.
    pub fn bind_value(
        &mut self,
        units: &Context,
        display: &str,
        value: Value,
        source: &str,
        loc: Loc,
    ) -> Result<SymbolId> {
        let name = canonicalize(display);
        if units.is_reserved(&name) {
            return eval_err!(
                UnitRedefinition,
                loc,
                format!("{name} is a unit; add a subscript to use it as a name")
            );
        }

        let symbol = Symbol::Value(SymbolValue {
            value,
            source: source.trim().to_owned(),
        });
        Ok(self.bind(name, display, symbol))
    }

    /// define_function binds a function.  A function name is always
    /// written with an argument list, so unlike a value it may share its
    /// spelling with a unit symbol (`g(x)` next to grams).
    pub fn define_function(
        &mut self,
        display: &str,
        params: Vec<Ident>,
        body: Expr,
        source: &str,
    ) -> SymbolId {
        let name = canonicalize(display);
        let symbol = Symbol::Function(Rc::new(FunctionDefinition {
            name: name.clone(),
            params,
            body,
            source: source.trim().to_owned(),
        }));
        self.bind(name, display, symbol)
    }

    fn bind(&mut self, name: Ident, display: &str, symbol: Symbol) -> SymbolId {
        // rebinding keeps the name's id, so expressions that resolved
        // the name earlier see the new binding
        if let Some(&id) = self.by_name.get(&name) {
            if let Some(entry) = self.entries.get_mut(id.index()) {
                entry.symbol = symbol;
                return id;
            }
        }

        let id = SymbolId(self.entries.len() as u32);
        self.entries.push(Entry {
            id,
            name: name.clone(),
            display: display.trim().to_owned(),
            symbol,
        });
        self.by_name.insert(name, id);
        id
    }

    /// snapshot exports every binding in a serializable form.
    pub fn snapshot(&self) -> Snapshot {
        let symbols = self
            .entries
            .iter()
            .map(|entry| match entry.symbol {
                Symbol::Value(ref value) => {
                    let quantities = value.value.quantities();
                    SymbolSnapshot::Value {
                        name: entry.display.clone(),
                        id: entry.id.0,
                        values: quantities.iter().map(|q| q.magnitude).collect(),
                        is_array: value.value.is_array(),
                        unit: value
                            .value
                            .first()
                            .map(|q| q.units.pretty_print())
                            .unwrap_or_default(),
                        source: value.source.clone(),
                    }
                }
                Symbol::Function(ref func) => SymbolSnapshot::Function {
                    name: entry.display.clone(),
                    id: entry.id.0,
                    params: func.params.iter().map(|p| p.to_string()).collect(),
                    body: print_eqn(&func.body),
                    source: func.source.clone(),
                },
            })
            .collect();

        Snapshot { symbols }
    }
}

impl Resolver for Registry {
    fn resolve(&self, name: &Ident) -> Option<Resolved> {
        let entry = self.lookup(name)?;
        let resolved = match entry.symbol {
            Symbol::Value(_) => Resolved::Value(entry.id),
            Symbol::Function(ref func) => Resolved::Function(entry.id, func.arity()),
        };
        Some(resolved)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SymbolSnapshot {
    Value {
        name: String,
        id: u32,
        values: Vec<f64>,
        is_array: bool,
        unit: String,
        source: String,
    },
    Function {
        name: String,
        id: u32,
        params: Vec<String>,
        body: String,
        source: String,
    },
}

/// A point-in-time export of a registry, in binding order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub symbols: Vec<SymbolSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use crate::test_common::units;

    fn bind(registry: &mut Registry, name: &str, n: f64) -> Result<SymbolId> {
        let source = n.to_string();
        registry.bind_value(units(), name, Value::number(n), &source, Loc::default())
    }

    #[test]
    fn test_ids_are_stable() {
        let mut registry = Registry::new();
        let f = bind(&mut registry, "f", 1.0).unwrap();
        let f1 = bind(&mut registry, "f1", 2.0).unwrap();
        assert_ne!(f, f1);

        // rebinding keeps the id and replaces the value
        let again = bind(&mut registry, "f", 3.0).unwrap();
        assert_eq!(f, again);
        assert_eq!(2, registry.len());
        let entry = registry.lookup(&canonicalize("f")).unwrap();
        assert_eq!(Value::number(3.0), entry.value().unwrap().value);

        assert_eq!("#1", f1.to_string());
    }

    #[test]
    fn test_decoration_insensitive_lookup() {
        let mut registry = Registry::new();
        let id = bind(&mut registry, "v_{max}", 4.0).unwrap();
        assert_eq!(Some(id), registry.lookup(&canonicalize("v_max")).map(|e| e.id));
        assert_eq!("v_{max}", registry.get(id).unwrap().display);
        assert_eq!(
            Some(Resolved::Value(id)),
            registry.resolve(&canonicalize("v_{ max }"))
        );
    }

    #[test]
    fn test_unit_redefinition() {
        let mut registry = Registry::new();
        let err = bind(&mut registry, "m", 10.0).unwrap_err();
        assert_eq!(ErrorCode::UnitRedefinition, err.code);
        assert!(registry.is_empty());

        // a subscript disambiguates
        assert!(bind(&mut registry, "m_1", 10.0).is_ok());
        assert!(bind(&mut registry, "m'", 10.0).is_ok());
        assert!(bind(&mut registry, "rate", 10.0).is_ok());
    }

    #[test]
    fn test_functions() {
        let mut registry = Registry::new();
        let body = Expr::Const("1".to_owned(), 1.0, Loc::default());
        let g = registry.define_function("g", vec![canonicalize("x")], body, "1");
        assert_eq!(
            Some(Resolved::Function(g, 1)),
            registry.resolve(&canonicalize("g"))
        );

        let body = Expr::Const("1".to_owned(), 1.0, Loc::default());
        let f = registry.define_function(
            "f",
            vec![canonicalize("x"), canonicalize("y")],
            body,
            "1",
        );
        assert_ne!(g, f);
        assert_eq!(
            Some(Resolved::Function(f, 2)),
            registry.resolve(&canonicalize("f"))
        );
        assert!(registry.get(f).unwrap().function().is_some());
        assert!(registry.get(f).unwrap().value().is_none());
    }

    #[test]
    fn test_snapshot() {
        let mut registry = Registry::new();
        bind(&mut registry, "rate", 15.0).unwrap();
        let snapshot = registry.snapshot();
        assert_eq!(1, snapshot.symbols.len());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!("value", json["symbols"][0]["kind"]);
        assert_eq!("rate", json["symbols"][0]["name"]);
        assert_eq!(15.0, json["symbols"][0]["values"][0]);
    }
}
