//! reqbind - bind request input into typed records
//!
//! Headers, query parameters, form fields, path parameters, file
//! attachments and a JSON body are resolved per field, converted through a
//! registry and written into a record. Every failure of one pass is
//! collected into a single error.
//!
//! ```
//! use reqbind::{bind, Record, Request, Schema};
//!
//! #[derive(Debug, Default)]
//! struct Query {
//!     names: Vec<String>,
//!     page: u32,
//!     trace: Option<String>,
//! }
//!
//! impl Record for Query {
//!     fn describe(schema: &mut Schema<Self>) {
//!         schema.field("names", |q| &mut q.names).bind("a,query,req");
//!         schema.field("page", |q| &mut q.page).bind("auto").default("1");
//!         schema.field("trace", |q| &mut q.trace).bind("X-Trace,header");
//!     }
//! }
//!
//! let request = Request::builder().uri("/search?a=a1&a=a2").build();
//! let mut query = Query::default();
//! bind(&request, &mut query).unwrap();
//! assert_eq!(query.names, ["a1", "a2"]);
//! assert_eq!(query.page, 1);
//! assert_eq!(query.trace, None);
//! ```

pub mod binder;
pub mod convert;
pub mod descriptor;
pub mod error;
pub mod introspect;
pub mod jsonpath;
pub mod preprocess;
pub mod report;
pub mod request;
mod resolve;
pub mod schema;
pub mod shape;
pub mod state;

pub use binder::{bind, bind_with_schema, Binder, BinderBuilder};
pub use convert::{register_convertor, Converted, Convertor, ConvertorRegistry, Kind, ScalarType};
pub use descriptor::{
    CollectionDescriptor, CollectionElement, FieldDescriptor, FieldKind, FieldPath,
    RecordDescriptor,
};
pub use error::{BindError, ConvertError, FixSuggestion, PreprocessError};
pub use introspect::{introspect, schema_of};
pub use preprocess::{register_preprocessor, Preprocessor, PreprocessorRegistry};
pub use report::Report;
pub use request::{Cookie, FileHeader, Request, RequestBuilder, RequestSource};
pub use schema::{FieldBuilder, Schema, Sources};
pub use shape::{Bound, Element, ElementShape, FieldType, Record, Shape};
pub use state::{BindResult, BindState};
