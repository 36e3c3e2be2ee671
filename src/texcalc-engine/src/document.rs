// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use log::{debug, trace, warn};

use crate::ast::{Expr, Loc, print_eqn};
use crate::common::{
    Diagnostic, Error, ErrorCode, Ident, Result, Severity, canonicalize, span_offset,
};
use crate::datamodel::Settings;
use crate::eval_err;
use crate::format::{Formatter, markup};
use crate::interpreter::Evaluator;
use crate::lexer::brace_group_end;
use crate::parser::{ParseEnv, parse_equation};
use crate::quantity::Value;
use crate::registry::{Registry, Snapshot, Symbol};
use crate::statement::{Display, Fragment, Statement, split_markup};
use crate::units::Context;

/// What processing one statement produced.
#[derive(Clone, Debug, PartialEq)]
pub struct StatementOutput {
    pub rendered: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl StatementOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Document is one processing pass over a document's statements, in
/// order.  It owns the symbols bound so far; nothing carries over to
/// another document.
pub struct Document<'a> {
    units: &'a Context,
    settings: Settings,
    registry: Registry,
    errors: usize,
    warnings: usize,
}

fn fragment_loc(fragment: &Fragment) -> Loc {
    let (text, start) = fragment.trimmed();
    Loc::new(start, start + text.len())
}

fn shifted(err: Error, offset: usize) -> Error {
    let offset = span_offset(offset);
    Error {
        start: err.start.saturating_add(offset),
        end: err.end.saturating_add(offset),
        ..err
    }
}

impl<'a> Document<'a> {
    pub fn new(units: &'a Context, settings: Settings) -> Self {
        Document {
            units,
            settings,
            registry: Registry::new(),
            errors: 0,
            warnings: 0,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    /// process runs one statement.  `hint` is a unit supplied by the
    /// caller, used for a `==` display only when the statement doesn't
    /// name a unit itself.  A statement that fails leaves the symbols
    /// untouched.
    pub fn process(&mut self, text: &str, hint: Option<&str>) -> StatementOutput {
        debug!("processing statement: {text}");

        let parsed = match Statement::parse(text) {
            Ok(parsed) => parsed,
            Err(err) => {
                let prefix = split_markup(text).0.trim_end();
                return self.finish(prefix, None, vec![], Err(err));
            }
        };

        let requested = match parsed.display() {
            Some(Display::Convert { hint: Some(inline) }) => Some(inline.as_str()),
            Some(Display::Convert { hint: None }) => hint,
            _ => None,
        };

        let mut warnings = vec![];
        let result = self.run(&parsed.statement, requested, &mut warnings);
        self.finish(&parsed.prefix, requested, warnings, result)
    }

    // renders the outcome of a statement and updates the counters
    fn finish(
        &mut self,
        prefix: &str,
        requested: Option<&str>,
        mut diagnostics: Vec<Diagnostic>,
        result: Result<Option<String>>,
    ) -> StatementOutput {
        let rendered = match result {
            Ok(value) => {
                let mut rendered = prefix.to_owned();
                if let Some(value) = value {
                    rendered.push(' ');
                    rendered.push_str(&value);
                }
                if let Some(warning) = diagnostics.first() {
                    // carry the hint along only if the value isn't in it
                    let unhonoured = diagnostics
                        .iter()
                        .any(|d| d.code == ErrorCode::ConversionMismatch);
                    let requested = requested.filter(|_| unhonoured);
                    rendered.push_str(&markup(Severity::Warning, &warning.message, requested));
                }
                rendered
            }
            Err(err) => {
                debug!("statement failed: {err}");
                let diagnostic = Diagnostic::error(&err);
                let rendered = format!(
                    "{prefix} {}",
                    markup(Severity::Error, &diagnostic.message, requested)
                );
                // a failed statement's warnings are moot
                diagnostics = vec![diagnostic];
                rendered
            }
        };

        for diagnostic in diagnostics.iter() {
            if diagnostic.is_error() {
                self.errors += 1;
            } else {
                self.warnings += 1;
            }
        }

        StatementOutput {
            rendered,
            diagnostics,
        }
    }

    fn run(
        &mut self,
        statement: &Statement,
        hint: Option<&str>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<Option<String>> {
        match statement {
            Statement::Definition {
                name,
                params,
                param_locs,
                body,
            } => {
                // the body lexes unit words as units, so such a
                // parameter could never be referenced
                for (param, loc) in params.iter().zip(param_locs) {
                    if !param.is_decorated() && self.units.reads_as_unit(param.as_str()) {
                        return eval_err!(
                            UnitRedefinition,
                            *loc,
                            format!("{param} is a unit")
                        );
                    }
                }
                let expr = self.parse(body, params)?;
                let (display_name, _) = name.trimmed();
                let id = self
                    .registry
                    .define_function(display_name, params.clone(), expr, &body.text);
                debug!("defined function {display_name} ({id})");
                Ok(None)
            }
            Statement::Assignment {
                name,
                expr,
                display,
            } => {
                let value = self.evaluate(expr, warnings)?;
                let rendered = match display {
                    Some(display) => Some(self.render(&value, display, hint, expr, warnings)?),
                    None => None,
                };

                let (display_name, name_start) = name.trimmed();
                let name_loc = Loc::new(name_start, name_start + display_name.len());
                let id = self
                    .registry
                    .bind_value(self.units, display_name, value, &expr.text, name_loc)?;
                debug!("bound {display_name} ({id})");
                Ok(rendered)
            }
            Statement::Display { expr, display } => {
                let value = self.evaluate(expr, warnings)?;
                let rendered = self.render(&value, display, hint, expr, warnings)?;
                Ok(Some(rendered))
            }
        }
    }

    fn parse(&self, fragment: &Fragment, locals: &[Ident]) -> Result<Expr> {
        let env = ParseEnv {
            units: self.units,
            symbols: &self.registry,
            locals,
        };
        match parse_equation(&fragment.text, &env) {
            Ok(Some(expr)) => {
                trace!("parsed {}", print_eqn(&expr));
                Ok(expr)
            }
            Ok(None) => eval_err!(EmptyEquation, fragment_loc(fragment)),
            Err(errors) => {
                // the parser stops at its first error
                let err = errors
                    .into_iter()
                    .next()
                    .map(Error::from)
                    .unwrap_or_else(|| Error::new(ErrorCode::EmptyEquation, 0, 0, None));
                Err(shifted(err, fragment.offset))
            }
        }
    }

    fn evaluate(&self, fragment: &Fragment, warnings: &mut Vec<Diagnostic>) -> Result<Value> {
        let expr = self.parse(fragment, &[])?;
        let mut evaluator = Evaluator::new(self.units, &self.registry, &self.settings);
        let value = evaluator
            .eval(&expr)
            .map_err(|err| shifted(err, fragment.offset))?;
        warnings.extend(
            evaluator
                .into_warnings()
                .into_iter()
                .map(|w| w.shifted(fragment.offset)),
        );
        Ok(value)
    }

    fn render(
        &self,
        value: &Value,
        display: &Display,
        hint: Option<&str>,
        expr: &Fragment,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<String> {
        let fmt = Formatter::new(self.units, &self.settings);
        let shown = match (display, hint) {
            (Display::Raw, _) => value.clone(),
            (Display::Convert { .. }, Some(hint)) => {
                let (converted, warning) = self.apply_hint(value, hint, fragment_loc(expr))?;
                warnings.extend(warning);
                converted
            }
            (Display::Convert { .. }, None) if self.settings.compact_prefixes => {
                fmt.compact(value)
            }
            (Display::Convert { .. }, None) => value.clone(),
        };
        Ok(fmt.value(&shown))
    }

    /// apply_hint expresses a value in the hinted unit.  A bare number
    /// is tagged with the unit; a value of another dimension can't be
    /// converted and falls back to SI base units with a warning.
    fn apply_hint(
        &self,
        value: &Value,
        hint: &str,
        loc: Loc,
    ) -> Result<(Value, Option<Diagnostic>)> {
        let units = match self.units.parse_units(hint) {
            Ok(units) => units,
            Err(errors) => {
                let code = errors
                    .first()
                    .map_or(ErrorCode::UnknownUnit, |err| err.code);
                return Err(Error::new(
                    code,
                    loc.start,
                    loc.end,
                    Some(format!("unit hint {hint}")),
                ));
            }
        };
        let Some(target) = self.units.quantity(1.0, units) else {
            return eval_err!(UnknownUnit, loc, hint.to_owned());
        };

        let converted = value.try_map(|q| {
            if q.is_number() {
                Ok(target.with_magnitude(q.magnitude))
            } else {
                q.convert_to(&target).ok_or_else(|| q.units.clone())
            }
        });
        match converted {
            Ok(converted) => Ok((converted, None)),
            Err(from) => {
                let code = ErrorCode::ConversionMismatch;
                let details = format!(
                    "can't express {} in {}",
                    from.pretty_print(),
                    target.units.pretty_print()
                );
                warn!("{code} at {loc}: {details}");
                let warning =
                    Diagnostic::warning(code, loc.start, loc.end, format!("{code}: {details}"));
                Ok((value.to_base(), Some(warning)))
            }
        }
    }

    fn placeholder(&mut self, name: &str) -> String {
        let fmt = Formatter::new(self.units, &self.settings);
        let message = match self.registry.lookup(&canonicalize(name)) {
            Some(entry) => match entry.symbol {
                Symbol::Value(ref value) => {
                    let value = if self.settings.compact_prefixes {
                        fmt.compact(&value.value)
                    } else {
                        value.value.clone()
                    };
                    return fmt.value(&value);
                }
                Symbol::Function(_) => format!("{}: {name} is a function", ErrorCode::NotAValue),
            },
            None => format!("{}: {name}", ErrorCode::UndefinedVariable),
        };
        self.errors += 1;
        markup(Severity::Error, &message, None)
    }

    /// resolve_placeholders replaces every `{{name}}` in `prose` with the
    /// value currently bound to `name`.
    pub fn resolve_placeholders(&mut self, prose: &str) -> String {
        let mut out = String::with_capacity(prose.len());
        let mut rest = prose;
        while let Some(pos) = rest.find("{{") {
            let inner_end = brace_group_end(rest, pos + 1);
            let end = match inner_end {
                Some(end) if rest[end..].starts_with('}') => end,
                _ => {
                    out.push_str(&rest[..pos + 2]);
                    rest = &rest[pos + 2..];
                    continue;
                }
            };
            out.push_str(&rest[..pos]);
            let name = rest[pos + 2..end - 1].trim();
            let replacement = self.placeholder(name);
            out.push_str(&replacement);
            rest = &rest[end + 1..];
        }
        out.push_str(rest);
        out
    }

    pub fn snapshot(&self) -> Snapshot {
        self.registry.snapshot()
    }

    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}
