// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

// Re-export all common types from texcalc-core
pub use texcalc_core::common::*;

// Macros for error creation live here rather than in texcalc-core as
// they use crate-local paths.

#[macro_export]
macro_rules! eqn_err(
    ($code:tt, $start:expr, $end:expr) => {{
        use $crate::common::{EquationError, ErrorCode};
        Err(EquationError{
            start: $crate::common::span_offset($start as usize),
            end: $crate::common::span_offset($end as usize),
            code: ErrorCode::$code,
        })
    }}
);

#[macro_export]
macro_rules! eval_err {
    ($code:tt, $loc:expr, $str:expr) => {{
        use $crate::common::{Error, ErrorCode};
        let loc = $loc;
        Err(Error::new(ErrorCode::$code, loc.start, loc.end, Some($str)))
    }};
    ($code:tt, $loc:expr) => {{
        use $crate::common::{Error, ErrorCode};
        let loc = $loc;
        Err(Error::new(ErrorCode::$code, loc.start, loc.end, None))
    }};
}
