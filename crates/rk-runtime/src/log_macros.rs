//! Domain-aware logging macros, ported from the teacher's `wf_log!` family.
//!
//! Each macro injects a `domain` field automatically so callers never need to
//! remember the string literal. The domain is one of: `sys`, `sched`, `nav`,
//! `motor`, `sonar`, `est`, `conf`.
//!
//! ```ignore
//! use crate::log_macros::*;
//!
//! rk_info!(sys, "bootstrap complete");
//! rk_warn!(motor, port = ?port, "encoder read failed, skipping tick");
//! ```

#[doc(hidden)]
macro_rules! rk_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

macro_rules! rk_error {
    ($domain:ident, $($rest:tt)*) => {
        rk_log!(error, $domain, $($rest)*)
    };
}

macro_rules! rk_warn {
    ($domain:ident, $($rest:tt)*) => {
        rk_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! rk_info {
    ($domain:ident, $($rest:tt)*) => {
        rk_log!(info, $domain, $($rest)*)
    };
}

macro_rules! rk_debug {
    ($domain:ident, $($rest:tt)*) => {
        rk_log!(debug, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! rk_trace {
    ($domain:ident, $($rest:tt)*) => {
        rk_log!(trace, $domain, $($rest)*)
    };
}

pub(crate) use {rk_debug, rk_error, rk_info, rk_log, rk_trace, rk_warn};
