//! Raw value lookup across sources
//!
//! Precedence is fixed: header, query, path, form, json, then the default
//! literal. The first source reporting presence wins; an empty value is
//! still presence.

use serde_json::Value;
use tracing::trace;

use crate::descriptor::FieldDescriptor;
use crate::jsonpath;
use crate::request::RequestSource;
use crate::schema::Sources;

/// What one bind reads from: the request plus its body parsed once
pub(crate) struct Context<'r> {
    request: &'r dyn RequestSource,
    body: Option<Value>,
}

impl<'r> Context<'r> {
    /// A body that is not JSON is treated as absent for json lookups
    pub(crate) fn new(request: &'r dyn RequestSource) -> Self {
        let raw = request.body();
        let body = if raw.is_empty() {
            None
        } else {
            serde_json::from_slice(raw).ok()
        };
        Self { request, body }
    }

    pub(crate) fn request(&self) -> &'r dyn RequestSource {
        self.request
    }

    pub(crate) fn json(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Raw values for `field`, or `None` when unset
///
/// `indices` fills the collection placeholders of the field's JSON path.
pub(crate) fn resolve(field: &FieldDescriptor, cx: &Context<'_>, indices: &[usize]) -> Option<Vec<String>> {
    let sources = field.sources();
    let name = field.external_name();
    let request = cx.request();

    if sources.contains(Sources::HEADER) {
        if let Some(values) = request.header(name) {
            trace!(field = name, source = "header", "resolved");
            return Some(values.to_vec());
        }
    }

    if sources.contains(Sources::QUERY) {
        if let Some(values) = request.query(name) {
            trace!(field = name, source = "query", "resolved");
            return Some(values.to_vec());
        }
    }

    if sources.contains(Sources::PATH) {
        if let Some(value) = request.path_param(name) {
            trace!(field = name, source = "path", "resolved");
            return Some(vec![value.to_string()]);
        }
    }

    if sources.contains(Sources::FORM) {
        if let Some(values) = request.form(name) {
            trace!(field = name, source = "form", "resolved");
            return Some(values.to_vec());
        }
    }

    if sources.contains(Sources::JSON) {
        let found = cx
            .json()
            .and_then(|body| jsonpath::apply(body, &field.path().concrete(indices)));
        if let Some(value) = found {
            trace!(field = name, source = "json", "resolved");
            return Some(vec![jsonpath::raw_text(value)]);
        }
    }

    field.default_value().map(|literal| {
        trace!(field = name, source = "default", "resolved");
        vec![literal.to_string()]
    })
}
