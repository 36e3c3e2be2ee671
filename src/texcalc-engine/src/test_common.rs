// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Common test infrastructure
//!
//! A shared unit table, plus a builder for running a list of statements
//! through a fresh document.

use lazy_static::lazy_static;

use crate::datamodel::{DisplayMode, Settings};
use crate::document::{Document, StatementOutput};
use crate::units::Context;

lazy_static! {
    static ref UNITS: Context = Context::new_with_builtins(&[]).unwrap();
}

/// The builtin unit table, built once per test binary.
pub(crate) fn units() -> &'static Context {
    &UNITS
}

/// Builder for running statements through a document in order
pub struct TestDocument {
    statements: Vec<(String, Option<String>)>,
    settings: Settings,
}

impl TestDocument {
    pub fn new() -> Self {
        Self {
            statements: Vec::new(),
            settings: Settings::default(),
        }
    }

    pub fn statement(mut self, text: &str) -> Self {
        self.statements.push((text.to_owned(), None));
        self
    }

    /// Add a statement along with a unit hint from the caller
    pub fn statement_with_hint(mut self, text: &str, hint: &str) -> Self {
        self.statements.push((text.to_owned(), Some(hint.to_owned())));
        self
    }

    #[allow(dead_code)]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[allow(dead_code)]
    pub fn display(mut self, mode: DisplayMode) -> Self {
        self.settings.display = mode;
        self
    }

    #[allow(dead_code)]
    pub fn without_compaction(mut self) -> Self {
        self.settings.compact_prefixes = false;
        self
    }

    /// Process every statement, returning each one's output
    pub fn run(self) -> Vec<StatementOutput> {
        self.run_document().0
    }

    /// Process every statement, also returning the document so tests
    /// can inspect its symbols and counters
    pub fn run_document(self) -> (Vec<StatementOutput>, Document<'static>) {
        let mut doc = Document::new(units(), self.settings);
        let outputs = self
            .statements
            .iter()
            .map(|(text, hint)| doc.process(text, hint.as_deref()))
            .collect();
        (outputs, doc)
    }

    /// Rendered statements only, for comparing whole documents
    #[allow(dead_code)]
    pub fn render(self) -> Vec<String> {
        self.run().into_iter().map(|output| output.rendered).collect()
    }
}
