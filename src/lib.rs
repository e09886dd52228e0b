//! # Concolic Value Marking for Test Generation
//!
//! This crate lets a test-generation harness mark selected runtime values as *concolic*:
//! each marked value keeps its current concrete content while also becoming a free variable
//! that a symbolic-execution engine may later replace with alternative concrete values along
//! different explored paths.
//!
//! It covers two directions of the same naming protocol:
//! * [`marker::ConcolicMarker`] encodes a value's logical identity (a dotted path name), its
//!   semantic kind and its role (`value` vs `size`) into a single flat identifier the engine
//!   accepts as a variable name, registers the value's bytes with the engine and issues the
//!   matching size/range constraints.
//! * [`assignment::AssignmentTree`] consumes a flat identifier→bytes mapping (the concrete
//!   assignment the engine produced for one explored path) and reconstructs a nested, typed
//!   structure mirroring the original path hierarchy.
//!
//! The engine itself is only consumed through the [`engine::EngineGateway`] capability and the
//! host's dynamic values through [`value::HostValue`]. How paths are explored or constraints
//! are solved is entirely out of scope here.
//!
//! ## Suspension points
//! Every call that registers a buffer or issues a constraint is a potential fork point: the
//! engine may clone the calling process right after it and resume each clone along a different
//! path. All marking operations therefore validate *everything* (bounds, identifier length,
//! buffer allocation) before the first engine call, so that no failure can leave a buffer
//! registered without its completed constraint sequence.
#![cfg_attr(feature = "document-features", doc = document_features::document_features!())]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]
#![cfg_attr(not(test), warn(missing_debug_implementations, missing_docs))]

use core::fmt::{self, Display};
use std::io;

pub mod assignment;
pub mod engine;
pub mod marker;
pub mod naming;
pub mod size_policy;
pub mod value;

pub use assignment::{AssignmentTree, AssignmentValue};
pub use engine::{EngineGateway, Predicate};
pub use marker::{ConcolicMarker, SessionConfig};
pub use naming::{KindTag, VariableName};
pub use size_policy::SizeBounds;
pub use value::HostValue;

#[cfg(feature = "errors_backtrace")]
/// Error Backtrace type when `errors_backtrace` feature is enabled (== [`backtrace::Backtrace`])
pub type ErrorBacktrace = backtrace::Backtrace;

#[cfg(not(feature = "errors_backtrace"))]
#[derive(Debug, Default)]
/// Empty struct to use when `errors_backtrace` is disabled
pub struct ErrorBacktrace {}
#[cfg(not(feature = "errors_backtrace"))]
impl ErrorBacktrace {
    /// Nop
    #[must_use]
    pub fn new() -> Self {
        Self {}
    }
}

#[cfg(feature = "errors_backtrace")]
fn display_error_backtrace(f: &mut fmt::Formatter, err: &ErrorBacktrace) -> fmt::Result {
    write!(f, "\nBacktrace: {err:?}")
}
#[cfg(not(feature = "errors_backtrace"))]
#[allow(clippy::unnecessary_wraps)]
fn display_error_backtrace(_f: &mut fmt::Formatter, _err: &ErrorBacktrace) -> fmt::Result {
    fmt::Result::Ok(())
}

/// Main error struct for this crate
#[derive(Debug)]
pub enum Error {
    /// The symbolic execution engine does not report itself active
    EngineInactive(String, ErrorBacktrace),
    /// A value or its declared bounds violate the size/range constraints
    Constraint(String, ErrorBacktrace),
    /// The value's runtime kind cannot be marked concolic
    UnsupportedType(String, ErrorBacktrace),
    /// A required private buffer copy could not be allocated
    Allocation(String, ErrorBacktrace),
    /// The naming protocol between producer and consumer is broken
    InvariantViolation(String, ErrorBacktrace),
    /// An encoded identifier exceeds the engine's variable-name length limit
    IdentifierTooLong(String, ErrorBacktrace),
    /// Serialization error
    Serialize(String, ErrorBacktrace),
    /// File related error
    File(io::Error, ErrorBacktrace),
}

impl Error {
    /// The symbolic execution engine does not report itself active
    #[must_use]
    pub fn engine_inactive<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::EngineInactive(arg.into(), ErrorBacktrace::new())
    }
    /// A value or its declared bounds violate the size/range constraints
    #[must_use]
    pub fn constraint<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::Constraint(arg.into(), ErrorBacktrace::new())
    }
    /// The value's runtime kind cannot be marked concolic
    #[must_use]
    pub fn unsupported_type<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::UnsupportedType(arg.into(), ErrorBacktrace::new())
    }
    /// A required private buffer copy could not be allocated
    #[must_use]
    pub fn allocation<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::Allocation(arg.into(), ErrorBacktrace::new())
    }
    /// The naming protocol between producer and consumer is broken
    #[must_use]
    pub fn invariant_violation<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::InvariantViolation(arg.into(), ErrorBacktrace::new())
    }
    /// An encoded identifier exceeds the engine's variable-name length limit
    #[must_use]
    pub fn identifier_too_long<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::IdentifierTooLong(arg.into(), ErrorBacktrace::new())
    }
    /// Serialization error
    #[must_use]
    pub fn serialize<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::Serialize(arg.into(), ErrorBacktrace::new())
    }
    /// File related error
    #[must_use]
    pub fn file(arg: io::Error) -> Self {
        Error::File(arg, ErrorBacktrace::new())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EngineInactive(s, b) => {
                write!(f, "Not in symbolic mode: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::Constraint(s, b) => {
                write!(f, "Incompatible constraints: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::UnsupportedType(s, b) => {
                write!(f, "Unsupported type: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::Allocation(s, b) => {
                write!(f, "Allocation failed: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::InvariantViolation(s, b) => {
                write!(f, "Naming protocol violated: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::IdentifierTooLong(s, b) => {
                write!(f, "Identifier exceeds the engine name limit: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::Serialize(s, b) => {
                write!(f, "Error in Serialization: `{0}`", &s)?;
                display_error_backtrace(f, b)
            }
            Self::File(err, b) => {
                write!(f, "File IO failed: {:?}", &err)?;
                display_error_backtrace(f, b)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::file(err)
    }
}

impl From<postcard::Error> for Error {
    fn from(err: postcard::Error) -> Self {
        Self::serialize(format!("{err:?}"))
    }
}
