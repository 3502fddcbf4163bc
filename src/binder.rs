//! Recursive binder
//!
//! One pass over the descriptor tree. Every field is resolved, converted
//! and assigned; failures only mark the bind state, and the report is built
//! from that state once the pass is over.

use std::any::{Any, TypeId};
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{debug, instrument};

use crate::convert::{self, Converted, ConvertorRegistry, ScalarType};
use crate::descriptor::{CollectionElement, FieldDescriptor, FieldKind, RecordDescriptor};
use crate::error::BindError;
use crate::introspect::schema_of;
use crate::jsonpath;
use crate::preprocess::{self, PreprocessorRegistry};
use crate::report;
use crate::request::RequestSource;
use crate::resolve::{resolve, Context};
use crate::schema::Sources;
use crate::shape::{Bound, Record};
use crate::state::BindState;

/// Binder over the process-wide registries, used by [`bind`]
static DEFAULT: Lazy<Binder> = Lazy::new(Binder::new);

/// Bind `request` into `target` with the cached schema of `R`
pub fn bind<R, S>(request: &S, target: &mut R) -> Result<(), BindError>
where
    R: Record,
    S: RequestSource,
{
    DEFAULT.bind(request, target)
}

/// Bind with a precomputed schema, which must describe `R`
pub fn bind_with_schema<R, S>(
    request: &S,
    target: &mut R,
    schema: &RecordDescriptor,
) -> Result<(), BindError>
where
    R: Record,
    S: RequestSource,
{
    DEFAULT.bind_with_schema(request, target, schema)
}

/// Binds requests using a given pair of registries
#[derive(Clone)]
pub struct Binder {
    convertors: Arc<ConvertorRegistry>,
    preprocessors: Arc<PreprocessorRegistry>,
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl Binder {
    /// A binder over the process-wide registries
    pub fn new() -> Self {
        Self {
            convertors: convert::global(),
            preprocessors: preprocess::global(),
        }
    }

    pub fn builder() -> BinderBuilder {
        BinderBuilder::default()
    }

    pub fn convertors(&self) -> &ConvertorRegistry {
        &self.convertors
    }

    pub fn preprocessors(&self) -> &PreprocessorRegistry {
        &self.preprocessors
    }

    /// Bind `request` into `target` with the cached schema of `R`
    pub fn bind<R, S>(&self, request: &S, target: &mut R) -> Result<(), BindError>
    where
        R: Record,
        S: RequestSource,
    {
        let schema = schema_of::<R>();
        self.bind_with_schema(request, target, &schema)
    }

    /// Bind with a precomputed schema
    ///
    /// Every field is visited before failing; the error carries all of
    /// them. A schema built for another type fails before anything is read.
    #[instrument(name = "bind", skip_all, fields(record = schema.name()))]
    pub fn bind_with_schema<R, S>(
        &self,
        request: &S,
        target: &mut R,
        schema: &RecordDescriptor,
    ) -> Result<(), BindError>
    where
        R: Record,
        S: RequestSource,
    {
        if schema.type_id() != TypeId::of::<R>() {
            return Err(BindError::SchemaMismatch {
                schema: schema.type_name(),
                target: std::any::type_name::<R>(),
            });
        }

        let cx = Context::new(request);
        let mut state = BindState::new(schema);
        let mut indices = Vec::new();
        self.bind_record(&cx, target, schema, &mut state, &mut indices);

        match report::aggregate(schema, &state) {
            Some(report) => {
                debug!(%report, "bind failed");
                Err(BindError::Invalid(report))
            }
            None => Ok(()),
        }
    }

    /// Bind every field of one record instance. Returns whether any field
    /// was set.
    pub(crate) fn bind_record(
        &self,
        cx: &Context<'_>,
        target: &mut dyn Any,
        schema: &RecordDescriptor,
        state: &mut BindState,
        indices: &mut Vec<usize>,
    ) -> bool {
        let mut any_set = false;
        for field in schema.fields() {
            if field.is_ignored() {
                continue;
            }

            let bound = match field.kind() {
                FieldKind::Scalar(ty) => self.bind_scalar(cx, field, ty, state, indices),
                FieldKind::Record(nested) => self.bind_nested(cx, field, nested, state, indices),
                FieldKind::Collection(collection) => match collection.element() {
                    CollectionElement::Scalar(ty) => {
                        self.bind_scalars(cx, field, ty, collection.is_nullable(), state, indices)
                    }
                    CollectionElement::Record(element) => {
                        self.bind_records(cx, field, element, state, indices)
                    }
                },
                FieldKind::File { many } => bind_files(cx, field, *many, state),
            };

            field.assign(target, bound);
            any_set |= !state.result(field.id()).is_unset();
        }
        any_set
    }

    fn bind_scalar(
        &self,
        cx: &Context<'_>,
        field: &FieldDescriptor,
        ty: &ScalarType,
        state: &mut BindState,
        indices: &[usize],
    ) -> Bound {
        let result = state.result_mut(field.id());
        let Some(raw) = resolve(field, cx, indices) else {
            result.mark_unset();
            return Bound::Unset;
        };

        let processed = self.preprocessors.run(field.preprocessors(), raw);
        result.push_preprocess_errors(processed.errors);
        result.mark_value();

        // Everything consumed by preprocessing: zero value, no error
        let Some(first) = processed.values.first() else {
            return Bound::Unset;
        };

        match self.convert(field, ty, first) {
            Some(value) => Bound::Value(value),
            None => {
                if !(field.is_nullable() && first.is_empty()) {
                    result.mark_conversion_error();
                }
                Bound::Unset
            }
        }
    }

    fn bind_nested(
        &self,
        cx: &Context<'_>,
        field: &FieldDescriptor,
        nested: &RecordDescriptor,
        state: &mut BindState,
        indices: &mut Vec<usize>,
    ) -> Bound {
        let mut instance = nested.instantiate();
        let set = self.bind_record(cx, &mut *instance, nested, state, indices);

        let result = state.result_mut(field.id());
        if set {
            result.mark_value();
            Bound::Value(instance)
        } else {
            result.mark_unset();
            Bound::Unset
        }
    }

    fn bind_scalars(
        &self,
        cx: &Context<'_>,
        field: &FieldDescriptor,
        ty: &ScalarType,
        nullable: bool,
        state: &mut BindState,
        indices: &[usize],
    ) -> Bound {
        let result = state.result_mut(field.id());
        let Some(raw) = resolve(field, cx, indices) else {
            result.mark_unset();
            return Bound::Unset;
        };

        let exploded: Vec<String> = raw
            .into_iter()
            .flat_map(|value| jsonpath::explode_array(&value).unwrap_or_else(|| vec![value]))
            .collect();
        let processed = self.preprocessors.run(field.preprocessors(), exploded);
        result.push_preprocess_errors(processed.errors);
        result.mark_value();

        let mut failed = false;
        let items: Vec<Option<Converted>> = processed
            .values
            .iter()
            .map(|value| {
                let converted = self.convert(field, ty, value);
                if converted.is_none() && !(nullable && value.is_empty()) {
                    failed = true;
                }
                converted
            })
            .collect();

        if failed {
            result.mark_conversion_error();
        }
        Bound::Items(items)
    }

    fn bind_records(
        &self,
        cx: &Context<'_>,
        field: &FieldDescriptor,
        element: &RecordDescriptor,
        state: &mut BindState,
        indices: &mut Vec<usize>,
    ) -> Bound {
        // Records only come from a JSON array; an unconfigured field reads it too
        let sources = field.sources();
        let len = if sources.is_empty() || sources.contains(Sources::JSON) {
            cx.json()
                .map_or(0, |body| jsonpath::array_len(body, &field.path().concrete(indices)))
        } else {
            0
        };

        if len == 0 {
            state.result_mut(field.id()).mark_unset();
            return Bound::Unset;
        }

        let mut frames = Vec::with_capacity(len);
        let mut items = Vec::with_capacity(len);
        for index in 0..len {
            let mut frame = BindState::new(element);
            let mut instance = element.instantiate();
            indices.push(index);
            self.bind_record(cx, &mut *instance, element, &mut frame, indices);
            indices.pop();
            frames.push(frame);
            items.push(Some(instance));
        }

        let result = state.result_mut(field.id());
        result.mark_value();
        result.set_elements(frames);
        Bound::Items(items)
    }

    /// Convert one raw value into the field's scalar type
    fn convert(&self, field: &FieldDescriptor, ty: &ScalarType, raw: &str) -> Option<Converted> {
        let Some(convertor) = self.convertors.get(ty) else {
            debug!(field = field.name(), target = ty.type_name(), "no convertor");
            return None;
        };

        match convertor(raw) {
            Ok(value) => ty.rebuild(value),
            Err(e) => {
                debug!(field = field.name(), error = %e, "conversion failed");
                None
            }
        }
    }
}

fn bind_files(cx: &Context<'_>, field: &FieldDescriptor, many: bool, state: &mut BindState) -> Bound {
    let result = state.result_mut(field.id());
    let files = cx
        .request()
        .files(field.external_name())
        .filter(|files| !files.is_empty());
    let Some(files) = files else {
        result.mark_unset();
        return Bound::Unset;
    };

    result.mark_value();
    if many {
        Bound::Items(
            files
                .iter()
                .map(|file| Some(Box::new(file.clone()) as Converted))
                .collect(),
        )
    } else {
        Bound::Value(Box::new(files[0].clone()))
    }
}

/// Fluent builder for a [`Binder`] with its own registries
#[derive(Default)]
pub struct BinderBuilder {
    convertors: Option<Arc<ConvertorRegistry>>,
    preprocessors: Option<Arc<PreprocessorRegistry>>,
}

impl BinderBuilder {
    /// Use `convertors` instead of the process-wide registry
    pub fn convertors(mut self, convertors: Arc<ConvertorRegistry>) -> Self {
        self.convertors = Some(convertors);
        self
    }

    /// Use `preprocessors` instead of the process-wide registry
    pub fn preprocessors(mut self, preprocessors: Arc<PreprocessorRegistry>) -> Self {
        self.preprocessors = Some(preprocessors);
        self
    }

    pub fn build(self) -> Binder {
        Binder {
            convertors: self.convertors.unwrap_or_else(convert::global),
            preprocessors: self.preprocessors.unwrap_or_else(preprocess::global),
        }
    }
}
