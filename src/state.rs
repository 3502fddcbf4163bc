//! Per-bind mutable state
//!
//! Descriptors are shared and never written to. Each bind allocates one
//! [`BindState`] with a [`BindResult`] per field id of the record's id space;
//! each element of a collection of records gets its own nested state.

use crate::descriptor::RecordDescriptor;

/// Outcome of one field in one bind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindResult {
    has_value: bool,
    is_unset: bool,
    has_conversion_error: bool,
    preprocess_errors: Vec<String>,
    elements: Vec<BindState>,
}

impl BindResult {
    /// A value was resolved and assigned
    pub fn has_value(&self) -> bool {
        self.has_value
    }

    /// No source and no default provided anything
    pub fn is_unset(&self) -> bool {
        self.is_unset
    }

    /// At least one raw value failed conversion
    pub fn has_conversion_error(&self) -> bool {
        self.has_conversion_error
    }

    pub fn preprocess_errors(&self) -> &[String] {
        &self.preprocess_errors
    }

    /// Per-element states of a collection of records
    pub fn elements(&self) -> &[BindState] {
        &self.elements
    }

    pub(crate) fn mark_value(&mut self) {
        self.has_value = true;
        self.is_unset = false;
    }

    pub(crate) fn mark_unset(&mut self) {
        self.is_unset = true;
        self.has_value = false;
    }

    pub(crate) fn mark_conversion_error(&mut self) {
        self.has_conversion_error = true;
    }

    pub(crate) fn push_preprocess_errors(&mut self, errors: impl IntoIterator<Item = String>) {
        self.preprocess_errors.extend(errors);
    }

    pub(crate) fn set_elements(&mut self, elements: Vec<BindState>) {
        self.elements = elements;
    }
}

/// Isolated outcome table for one record's id space
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindState {
    results: Vec<BindResult>,
}

impl BindState {
    pub fn new(schema: &RecordDescriptor) -> Self {
        Self {
            results: vec![BindResult::default(); schema.slots()],
        }
    }

    pub fn result(&self, id: usize) -> &BindResult {
        &self.results[id]
    }

    pub(crate) fn result_mut(&mut self, id: usize) -> &mut BindResult {
        &mut self.results[id]
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
