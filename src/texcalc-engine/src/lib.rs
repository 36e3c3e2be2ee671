// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub use texcalc_core::datamodel;

pub mod ast;
pub mod builtins;
pub mod common;
pub mod document;
pub mod format;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod quantity;
pub mod registry;
pub mod statement;
pub mod units;

#[cfg(test)]
mod algebra_proptest;
#[cfg(test)]
mod test_common;

pub use self::common::{
    Diagnostic, Error, ErrorCode, ErrorKind, Ident, Result, Severity, canonicalize,
};
pub use self::datamodel::{DisplayMode, MismatchPolicy, Settings, Unit};
pub use self::document::{Document, StatementOutput};
pub use self::registry::{Registry, Snapshot, SymbolId};
pub use self::statement::clear;
pub use self::units::Context;
