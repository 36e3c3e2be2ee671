// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

/// The broad class an error belongs to.  Every `ErrorCode` maps to
/// exactly one kind, and the document layer counts and renders
/// diagnostics by kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Lex,
    Parse,
    UndefinedVariable,
    Arity,
    UnitRedefinition,
    ArrayLengthMismatch,
    IndexOutOfRange,
    Numeric,
    Dimension,
    Unit,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorKind::*;
        let name = match self {
            Lex => "LexError",
            Parse => "ParseError",
            UndefinedVariable => "UndefinedVariableError",
            Arity => "ArityError",
            UnitRedefinition => "UnitRedefinitionError",
            ArrayLengthMismatch => "ArrayLengthMismatchError",
            IndexOutOfRange => "IndexOutOfRangeError",
            Numeric => "NumericError",
            Dimension => "DimensionError",
            Unit => "UnitError",
            Internal => "InternalError",
        };
        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // lexer
    UnrecognizedToken,
    MalformedNumber,
    UnclosedUnit,
    UnclosedGroup,
    UnknownCommand,
    // parser
    UnrecognizedEof,
    ExtraToken,
    UnmatchedBracket,
    ExpectedNumber,
    ExpectedIdent,
    EmptyArray,
    EmptyEquation,
    BadStatement,
    BadParameter,
    // name resolution
    UndefinedVariable,
    UndefinedFunction,
    NotAFunction,
    NotAValue,
    BadArity,
    UnitRedefinition,
    // arrays
    ArrayLengthMismatch,
    IndexOutOfRange,
    NonIntegerIndex,
    CantIndexScalar,
    // numerics
    DivisionByZero,
    NotFinite,
    CallDepthExceeded,
    // dimensions
    DimensionMismatch,
    ConversionMismatch,
    DimensionedExponent,
    DimensionedArgument,
    NonIntegerUnitExponent,
    HeterogeneousArray,
    // unit definitions
    UnknownUnit,
    NoConstInUnits,
    NoAppInUnits,
    NoIndexInUnits,
    NoUnaryOpInUnits,
    BadBinaryOpInUnits,
    ExpectedInteger,
    ExpectedIntegerOne,
    DuplicateUnit,
    UnitExponentOverflow,
    // invariant violations
    UnknownSymbolId,
}

impl ErrorCode {
    pub fn kind(&self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            UnrecognizedToken | MalformedNumber | UnclosedUnit | UnclosedGroup | UnknownCommand => {
                ErrorKind::Lex
            }
            UnrecognizedEof | ExtraToken | UnmatchedBracket | ExpectedNumber | ExpectedIdent
            | EmptyArray | EmptyEquation | BadStatement | BadParameter => ErrorKind::Parse,
            UndefinedVariable | UndefinedFunction | NotAFunction | NotAValue => {
                ErrorKind::UndefinedVariable
            }
            BadArity => ErrorKind::Arity,
            UnitRedefinition => ErrorKind::UnitRedefinition,
            ArrayLengthMismatch => ErrorKind::ArrayLengthMismatch,
            IndexOutOfRange | NonIntegerIndex | CantIndexScalar => ErrorKind::IndexOutOfRange,
            DivisionByZero | NotFinite | CallDepthExceeded => ErrorKind::Numeric,
            DimensionMismatch
            | ConversionMismatch
            | DimensionedExponent
            | DimensionedArgument
            | NonIntegerUnitExponent
            | HeterogeneousArray => ErrorKind::Dimension,
            UnknownUnit | NoConstInUnits | NoAppInUnits | NoIndexInUnits | NoUnaryOpInUnits
            | BadBinaryOpInUnits | ExpectedInteger | ExpectedIntegerOne | DuplicateUnit
            | UnitExponentOverflow => ErrorKind::Unit,
            UnknownSymbolId => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            UnrecognizedToken => "unrecognized_token",
            MalformedNumber => "malformed_number",
            UnclosedUnit => "unclosed_unit",
            UnclosedGroup => "unclosed_group",
            UnknownCommand => "unknown_command",
            UnrecognizedEof => "unrecognized_eof",
            ExtraToken => "extra_token",
            UnmatchedBracket => "unmatched_bracket",
            ExpectedNumber => "expected_number",
            ExpectedIdent => "expected_ident",
            EmptyArray => "empty_array",
            EmptyEquation => "empty_equation",
            BadStatement => "bad_statement",
            BadParameter => "bad_parameter",
            UndefinedVariable => "undefined_variable",
            UndefinedFunction => "undefined_function",
            NotAFunction => "not_a_function",
            NotAValue => "not_a_value",
            BadArity => "bad_arity",
            UnitRedefinition => "unit_redefinition",
            ArrayLengthMismatch => "array_length_mismatch",
            IndexOutOfRange => "index_out_of_range",
            NonIntegerIndex => "non_integer_index",
            CantIndexScalar => "cant_index_scalar",
            DivisionByZero => "division_by_zero",
            NotFinite => "not_finite",
            CallDepthExceeded => "call_depth_exceeded",
            DimensionMismatch => "dimension_mismatch",
            ConversionMismatch => "conversion_mismatch",
            DimensionedExponent => "dimensioned_exponent",
            DimensionedArgument => "dimensioned_argument",
            NonIntegerUnitExponent => "non_integer_unit_exponent",
            HeterogeneousArray => "heterogeneous_array",
            UnknownUnit => "unknown_unit",
            NoConstInUnits => "no_const_in_units",
            NoAppInUnits => "no_app_in_units",
            NoIndexInUnits => "no_index_in_units",
            NoUnaryOpInUnits => "no_unary_op_in_units",
            BadBinaryOpInUnits => "bad_binary_op_in_units",
            ExpectedInteger => "expected_integer",
            ExpectedIntegerOne => "expected_integer_one",
            DuplicateUnit => "duplicate_unit",
            UnitExponentOverflow => "unit_exponent_overflow",
            UnknownSymbolId => "unknown_symbol_id",
        };

        write!(f, "{name}")
    }
}

/// span_offset narrows a byte offset to the u16 spans carry, pinning
/// anything past the end of the range to `u16::MAX`.
pub fn span_offset(pos: usize) -> u16 {
    pos.min(u16::MAX as usize) as u16
}

/// A span-tagged error from the tokenizer or parser.  Offsets are byte
/// offsets into the expression text; expressions are typed by humans
/// so u16 is long enough.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EquationError {
    pub start: u16,
    pub end: u16,
    pub code: ErrorCode,
}

impl fmt::Display for EquationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.end, self.code)
    }
}

impl error::Error for EquationError {}

/// Severity separates hard errors, which abort the current statement,
/// from warnings, which substitute a fallback value and carry on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub start: u16,
    pub end: u16,
    pub details: Option<String>,
}

impl From<EquationError> for Error {
    fn from(err: EquationError) -> Self {
        Error {
            kind: err.code.kind(),
            code: err.code,
            start: err.start,
            end: err.end,
            details: None,
        }
    }
}

impl Error {
    pub fn new(code: ErrorCode, start: u16, end: u16, details: Option<String>) -> Self {
        Error {
            kind: code.kind(),
            code,
            start,
            end,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }

    /// message is the human-readable text placed inside error markup.
    pub fn message(&self) -> String {
        match self.details {
            Some(ref details) => format!("{}: {}", self.code, details),
            None => format!("{}", self.code),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", self.kind, self.code, details),
            None => write!(f, "{}{{{}}}", self.kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;
pub type EquationResult<T> = result::Result<T, EquationError>;

/// A diagnostic attached to one processed statement.  Offsets are
/// relative to the statement text as the caller supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub start: u16,
    pub end: u16,
    pub message: String,
}

impl Diagnostic {
    pub fn error(err: &Error) -> Self {
        Diagnostic {
            severity: Severity::Error,
            kind: err.kind,
            code: err.code,
            start: err.start,
            end: err.end,
            message: err.message(),
        }
    }

    pub fn warning(code: ErrorCode, start: u16, end: u16, message: String) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            kind: code.kind(),
            code,
            start,
            end,
            message,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// shifted moves the span right by `offset` bytes, used when an
    /// expression was cut out of a longer statement.
    pub fn shifted(mut self, offset: usize) -> Self {
        let offset = span_offset(offset);
        self.start = self.start.saturating_add(offset);
        self.end = self.end.saturating_add(offset);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{}:{}: {} {}",
            self.start, self.end, severity, self.message
        )
    }
}

/// A canonicalized display name.  Two spellings of the same name that
/// differ only in bracing or whitespace (`v_{max}` and `v_max`) share
/// one `Ident`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// is_decorated reports whether the name carries a subscript or
    /// prime, which exempts it from colliding with reserved unit symbols.
    pub fn is_decorated(&self) -> bool {
        self.0.contains('_') || self.0.contains('\'')
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn canonicalize(name: &str) -> Ident {
    let mut canonical = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c == '{' || c == '}' || c.is_whitespace() {
            continue;
        }
        canonical.push(c);
    }

    // superscript primes are spelled three ways; keep one
    let canonical = canonical.replace("^\\prime", "'").replace("\\prime", "'");

    Ident(canonical)
}

#[test]
fn test_canonicalize() {
    assert_eq!("v_max", canonicalize("v_{max}").as_str());
    assert_eq!("v_max", canonicalize("  v_max ").as_str());
    assert_eq!("\\gamma_1", canonicalize("\\gamma_{1}").as_str());
    assert_eq!("m'", canonicalize("m^{\\prime}").as_str());
    assert_eq!("m'", canonicalize("m'").as_str());
    assert_eq!("rate", canonicalize("rate").as_str());
    assert!(canonicalize("x_{1}").is_decorated());
    assert!(canonicalize("m'").is_decorated());
    assert!(!canonicalize("mass").is_decorated());
}

#[test]
fn test_error_kinds() {
    assert_eq!(ErrorKind::Lex, ErrorCode::MalformedNumber.kind());
    assert_eq!(ErrorKind::Parse, ErrorCode::UnmatchedBracket.kind());
    assert_eq!(ErrorKind::Arity, ErrorCode::BadArity.kind());
    assert_eq!(
        ErrorKind::UnitRedefinition,
        ErrorCode::UnitRedefinition.kind()
    );
    assert_eq!(ErrorKind::Numeric, ErrorCode::DivisionByZero.kind());
    assert_eq!(ErrorKind::Unit, ErrorCode::UnitExponentOverflow.kind());
    assert_eq!(
        "unit_exponent_overflow",
        ErrorCode::UnitExponentOverflow.to_string()
    );
    assert_eq!(ErrorKind::Internal, ErrorCode::UnknownSymbolId.kind());

    let err = Error::new(
        ErrorCode::UndefinedVariable,
        3,
        7,
        Some("volume".to_owned()),
    );
    assert_eq!(ErrorKind::UndefinedVariable, err.kind);
    assert_eq!("undefined_variable: volume", err.message());
    assert_eq!(
        "UndefinedVariableError{undefined_variable: volume}",
        format!("{err}")
    );

    let from_eqn: Error = EquationError {
        start: 1,
        end: 2,
        code: ErrorCode::UnclosedUnit,
    }
    .into();
    assert_eq!(ErrorKind::Lex, from_eqn.kind);
    assert_eq!((1, 2), (from_eqn.start, from_eqn.end));
}

#[test]
fn test_diagnostic() {
    let err = Error::new(ErrorCode::DivisionByZero, 2, 5, None);
    let diag = Diagnostic::error(&err).shifted(10);
    assert!(diag.is_error());
    assert_eq!((12, 15), (diag.start, diag.end));
    assert_eq!("12:15: error division_by_zero", format!("{diag}"));

    let warn = Diagnostic::warning(
        ErrorCode::DimensionMismatch,
        0,
        3,
        "cannot add m and s".to_owned(),
    );
    assert!(!warn.is_error());
    assert_eq!(ErrorKind::Dimension, warn.kind);
}
