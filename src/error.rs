//! Error types with fix suggestions
//!
//! Two layers:
//! - [`BindError`]: what a bind call returns (fatal shape error, or the
//!   aggregated field report)
//! - [`ConvertError`]: a single string → value failure, kept internal to the
//!   binder and only logged

use thiserror::Error;

use crate::report::Report;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Errors returned by bind calls
#[derive(Error, Debug)]
pub enum BindError {
    /// The descriptor passed to the binder was built for another record type.
    /// Returned before any value is resolved.
    #[error("BIND-001: schema describes `{schema}` but the target is `{target}`")]
    SchemaMismatch {
        schema: &'static str,
        target: &'static str,
    },

    /// Every required-missing, conversion and preprocessor failure found in
    /// one full pass. The text is the report summary, verbatim.
    #[error("{0}")]
    Invalid(Report),
}

impl BindError {
    /// The aggregated report, if this is a field-level failure
    pub fn report(&self) -> Option<&Report> {
        match self {
            BindError::Invalid(report) => Some(report),
            BindError::SchemaMismatch { .. } => None,
        }
    }
}

impl FixSuggestion for BindError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            BindError::SchemaMismatch { .. } => {
                Some("Build the schema with introspect::<T>() for the same T you bind into")
            }
            BindError::Invalid(report) if !report.missing().is_empty() => {
                Some("Send the missing parameters or give the fields a default")
            }
            BindError::Invalid(report) if !report.unconvertible().is_empty() => {
                Some("Check the parameter values match the field types")
            }
            BindError::Invalid(_) => Some("Check the preprocessor input format"),
        }
    }
}

/// A raw string that could not become the requested value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("BIND-010: cannot parse {input:?} as {target}: {reason}")]
    Parse {
        input: String,
        target: &'static str,
        reason: String,
    },

    #[error("BIND-011: {input:?} is out of range for {target}")]
    Range { input: String, target: &'static str },

    #[error("BIND-012: convertor for {target} rejected {input:?}: {message}")]
    Custom {
        input: String,
        target: &'static str,
        message: String,
    },
}

/// A named preprocessor that failed on one raw value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PreprocessError {
    pub message: String,
}

impl PreprocessError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
