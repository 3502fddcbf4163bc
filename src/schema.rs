//! Per-field configuration
//!
//! Records register their fields in [`Record::describe`]:
//!
//! ```
//! use reqbind::{Record, Schema};
//!
//! #[derive(Default)]
//! struct Search {
//!     request_id: String,
//!     ids: Vec<i64>,
//!     page: u32,
//! }
//!
//! impl Record for Search {
//!     fn describe(schema: &mut Schema<Self>) {
//!         schema.field("request_id", |s| &mut s.request_id).bind("x_request-id,header,req");
//!         schema.field("ids", |s| &mut s.ids).bind("ids,query").preprocess("split");
//!         schema.field("page", |s| &mut s.page).bind("auto").default("1");
//!     }
//! }
//! ```
//!
//! Directive vocabulary for [`FieldBuilder::bind`], comma-separated:
//!
//! | Token                                      | Meaning                       |
//! |--------------------------------------------|-------------------------------|
//! | `header`, `query`, `form`, `json`, `path`  | add a source                  |
//! | `auto`                                     | header, query, form, json     |
//! | `-`                                        | ignore the field              |
//! | `required`, `req`                          | fail the bind when unset      |
//! | anything else                              | external name (rename)        |
//!
//! A field without any source only ever takes its default.

use std::marker::PhantomData;
use std::sync::Arc;

use bitflags::bitflags;

use crate::descriptor::Slot;
use crate::shape::{FieldType, Record, Shape};

// ============================================================================
// SOURCES
// ============================================================================

bitflags! {
    /// Set of input sources a field reads from
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Sources: u8 {
        const HEADER = 1 << 0;
        const QUERY = 1 << 1;
        const FORM = 1 << 2;
        const PATH = 1 << 3;
        const JSON = 1 << 4;
        /// Header, then query, then form, then json
        const AUTO = Self::HEADER.bits() | Self::QUERY.bits() | Self::FORM.bits() | Self::JSON.bits();
    }
}

impl Sources {
    /// Parse a single directive selector (`header`, `auto`, ...)
    pub fn from_selector(name: &str) -> Option<Sources> {
        match name {
            "header" => Some(Sources::HEADER),
            "query" => Some(Sources::QUERY),
            "form" => Some(Sources::FORM),
            "path" => Some(Sources::PATH),
            "json" => Some(Sources::JSON),
            "auto" => Some(Sources::AUTO),
            _ => None,
        }
    }
}

// ============================================================================
// FIELD BUILDER
// ============================================================================

/// Configuration of one field, filled through chained calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldBuilder {
    pub(crate) sources: Sources,
    pub(crate) header_selected: bool,
    pub(crate) rename: Option<String>,
    pub(crate) required: bool,
    pub(crate) ignored: bool,
    pub(crate) default: Option<String>,
    pub(crate) preprocessors: Vec<String>,
}

impl FieldBuilder {
    /// Apply a directive string such as `"X-Trace,header,req"`
    pub fn bind(&mut self, directive: &str) -> &mut Self {
        for token in directive.split(',').map(str::trim) {
            match token {
                "" => {}
                "-" => self.ignored = true,
                "required" | "req" => self.required = true,
                "header" => {
                    self.sources |= Sources::HEADER;
                    self.header_selected = true;
                }
                other => match Sources::from_selector(other) {
                    Some(sources) => self.sources |= sources,
                    None => self.rename = Some(other.to_string()),
                },
            }
        }
        self
    }

    /// Add sources. Selecting `HEADER` without the rest of `AUTO`
    /// canonicalizes the external name like the `header` directive does.
    pub fn sources(&mut self, sources: Sources) -> &mut Self {
        if sources.contains(Sources::HEADER) && !sources.contains(Sources::AUTO) {
            self.header_selected = true;
        }
        self.sources |= sources;
        self
    }

    /// External name for header/query/form/path/file lookup and the JSON path
    pub fn rename(&mut self, name: impl Into<String>) -> &mut Self {
        self.rename = Some(name.into());
        self
    }

    pub fn required(&mut self) -> &mut Self {
        self.required = true;
        self
    }

    /// Exclude the field from binding and reporting
    pub fn ignore(&mut self) -> &mut Self {
        self.ignored = true;
        self
    }

    /// Literal used when no source provides a value
    pub fn default(&mut self, literal: impl Into<String>) -> &mut Self {
        self.default = Some(literal.into());
        self
    }

    /// Append comma-separated preprocessor names
    pub fn preprocess(&mut self, names: &str) -> &mut Self {
        self.preprocessors.extend(
            names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        );
        self
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// One registered field, before introspection
pub(crate) struct FieldSpec {
    pub(crate) name: &'static str,
    pub(crate) config: FieldBuilder,
    pub(crate) shape: Shape,
    pub(crate) embedded: bool,
    pub(crate) slot: Slot,
}

/// Field registrations of record `R`, collected by [`Record::describe`]
pub struct Schema<R> {
    specs: Vec<FieldSpec>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Schema<R> {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            _record: PhantomData,
        }
    }

    /// Register a field. `name` is the default external name and JSON key.
    pub fn field<T, F>(&mut self, name: &'static str, access: F) -> &mut FieldBuilder
    where
        T: FieldType,
        F: Fn(&mut R) -> &mut T + Send + Sync + 'static,
    {
        self.push(name, access, false)
    }

    /// Register an embedded record whose fields sit at this record's path
    /// level (no extra JSON path segment)
    pub fn flatten<T, F>(&mut self, name: &'static str, access: F) -> &mut FieldBuilder
    where
        T: Record,
        F: Fn(&mut R) -> &mut T + Send + Sync + 'static,
    {
        self.push(name, access, true)
    }

    fn push<T, F>(&mut self, name: &'static str, access: F, embedded: bool) -> &mut FieldBuilder
    where
        T: FieldType,
        F: Fn(&mut R) -> &mut T + Send + Sync + 'static,
    {
        let slot: Slot = Arc::new(move |record: &mut dyn std::any::Any, bound| {
            if let Some(record) = record.downcast_mut::<R>() {
                access(record).assign(bound);
            }
        });
        self.specs.push(FieldSpec {
            name,
            config: Default::default(),
            shape: T::shape(),
            embedded,
            slot,
        });
        let last = self.specs.len() - 1;
        &mut self.specs[last].config
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub(crate) fn into_specs(self) -> Vec<FieldSpec> {
        self.specs
    }
}
