//! Error aggregation
//!
//! Walks a bound tree depth-first in declaration order and folds every
//! failure into one [`Report`]. Three disjoint categories:
//! - required fields that ended up unset
//! - fields whose raw value could not be converted
//! - raw preprocessor error texts
//!
//! The rendered text is a stable contract:
//! ```text
//! parameter required but not found: [Y, X.C]; parameter type cannot be converted from string: [L]; <preprocessor errors>
//! ```

use std::fmt;

use serde::Serialize;

use crate::descriptor::{CollectionElement, FieldKind, RecordDescriptor};
use crate::state::BindState;

const MISSING: &str = "parameter required but not found";
const UNCONVERTIBLE: &str = "parameter type cannot be converted from string";

/// Every field-level failure found in one bind pass
///
/// Serializes as `{"missing": [..], "unconvertible": [..], "preprocessing": [..]}`
/// for API error bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    missing: Vec<String>,
    unconvertible: Vec<String>,
    preprocessing: Vec<String>,
}

impl Report {
    /// Paths of required fields that no source (or default) provided
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Paths of fields with at least one value that failed conversion
    pub fn unconvertible(&self) -> &[String] {
        &self.unconvertible
    }

    /// Raw preprocessor error texts
    pub fn preprocessing(&self) -> &[String] {
        &self.preprocessing
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unconvertible.is_empty() && self.preprocessing.is_empty()
    }

    pub(crate) fn push_missing(&mut self, path: impl Into<String>) {
        self.missing.push(path.into());
    }

    pub(crate) fn push_unconvertible(&mut self, path: impl Into<String>) {
        self.unconvertible.push(path.into());
    }

    pub(crate) fn push_preprocessing(&mut self, message: impl Into<String>) {
        self.preprocessing.push(message.into());
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(2 + self.preprocessing.len());
        if !self.missing.is_empty() {
            parts.push(format!("{MISSING}: [{}]", self.missing.join(", ")));
        }
        if !self.unconvertible.is_empty() {
            parts.push(format!("{UNCONVERTIBLE}: [{}]", self.unconvertible.join(", ")));
        }
        parts.extend(self.preprocessing.iter().cloned());
        f.write_str(&parts.join("; "))
    }
}

/// Collect every failure of a finished bind. `None` when nothing failed.
pub(crate) fn aggregate(schema: &RecordDescriptor, state: &BindState) -> Option<Report> {
    let mut report = Report::default();
    let mut indices = Vec::new();
    collect(schema, state, &mut indices, &mut report);
    (!report.is_empty()).then_some(report)
}

fn collect(
    schema: &RecordDescriptor,
    state: &BindState,
    indices: &mut Vec<usize>,
    report: &mut Report,
) {
    for field in schema.fields() {
        if field.is_ignored() {
            continue;
        }
        let result = state.result(field.id());

        if result.is_unset() && field.is_required() {
            report.push_missing(field.display_path(indices));
        }
        if result.has_conversion_error() {
            report.push_unconvertible(field.display_path(indices));
        }
        for message in result.preprocess_errors() {
            report.push_preprocessing(message.clone());
        }

        match field.kind() {
            FieldKind::Record(nested) => collect(nested, state, indices, report),
            FieldKind::Collection(collection) => {
                if let CollectionElement::Record(element) = collection.element() {
                    for (index, frame) in result.elements().iter().enumerate() {
                        indices.push(index);
                        collect(element, frame, indices, report);
                        indices.pop();
                    }
                }
            }
            FieldKind::Scalar(_) | FieldKind::File { .. } => {}
        }
    }
}
