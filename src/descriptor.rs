//! Immutable descriptor tree produced by introspection
//!
//! Field ids are preorder indices inside an id space. A record and its
//! inline nested records share one id space; the element record of a
//! collection starts its own at 0, because its bind state is allocated per
//! element at bind time.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::convert::{Converted, ScalarType};
use crate::jsonpath::Segment;
use crate::schema::Sources;
use crate::shape::Bound;

/// Type-erased "write this bound value into that record's field"
pub(crate) type Slot = Arc<dyn Fn(&mut dyn Any, Bound) + Send + Sync>;

// ============================================================================
// FIELD PATH
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Name(String),
    /// Collection index, filled in at bind time
    Placeholder,
}

/// Dot-qualified JSON path template, e.g. `Sites.#.SiteDomain`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Append a name. Dotted names add one segment per part.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(
            name.split('.')
                .filter(|part| !part.is_empty())
                .map(|part| PathSegment::Name(part.to_string())),
        );
        Self { segments }
    }

    /// Append an index placeholder
    pub fn element(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Placeholder);
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Substitute placeholders with `indices`, outermost first
    pub fn concrete(&self, indices: &[usize]) -> Vec<Segment> {
        let mut indices = indices.iter().copied();
        self.segments
            .iter()
            .map(|segment| match segment {
                PathSegment::Name(name) => Segment::Field(name.clone()),
                PathSegment::Placeholder => Segment::Index(indices.next().unwrap_or_default()),
            })
            .collect()
    }

    /// Concrete path as text, e.g. `Sites.2.SiteDomain`
    pub fn render(&self, indices: &[usize]) -> String {
        self.concrete(indices)
            .iter()
            .map(|segment| match segment {
                Segment::Field(name) => name.clone(),
                Segment::Index(index) => index.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .segments
            .iter()
            .map(|segment| match segment {
                PathSegment::Name(name) => name.as_str(),
                PathSegment::Placeholder => "#",
            })
            .collect();
        f.write_str(&parts.join("."))
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// A record type, introspected
#[derive(Clone)]
pub struct RecordDescriptor {
    pub(crate) name: &'static str,
    pub(crate) type_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) slots: usize,
    pub(crate) new: fn() -> Converted,
}

impl RecordDescriptor {
    /// Short type name (`Site`)
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Full type name (`my_app::api::Site`)
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field by declared name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Bind-state slots needed for this record's id space
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// A fresh default instance
    pub(crate) fn instantiate(&self) -> Converted {
        (self.new)()
    }
}

impl PartialEq for RecordDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.slots == other.slots && self.fields == other.fields
    }
}

impl fmt::Debug for RecordDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordDescriptor")
            .field("name", &self.name)
            .field("slots", &self.slots)
            .field("fields", &self.fields)
            .finish()
    }
}

// ============================================================================
// FIELD
// ============================================================================

/// Exactly one classification per field, fixed at introspection
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(ScalarType),
    Record(RecordDescriptor),
    Collection(CollectionDescriptor),
    /// `FileHeader` (`many: false`) or `Vec<FileHeader>`
    File { many: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionElement {
    Scalar(ScalarType),
    /// Element record with its own id space
    Record(RecordDescriptor),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDescriptor {
    pub(crate) element: CollectionElement,
    pub(crate) nullable: bool,
}

impl CollectionDescriptor {
    pub fn element(&self) -> &CollectionElement {
        &self.element
    }

    /// `Vec<Option<T>>`
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// One declared field, introspected
#[derive(Clone)]
pub struct FieldDescriptor {
    pub(crate) id: usize,
    pub(crate) name: &'static str,
    pub(crate) external_name: String,
    pub(crate) path: FieldPath,
    pub(crate) sources: Sources,
    pub(crate) required: bool,
    pub(crate) default: Option<String>,
    pub(crate) preprocessors: Vec<String>,
    pub(crate) nullable: bool,
    pub(crate) ignored: bool,
    pub(crate) embedded: bool,
    pub(crate) kind: FieldKind,
    pub(crate) slot: Slot,
}

impl FieldDescriptor {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Name as registered in `describe`
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Header/query/form/path/file lookup key
    pub fn external_name(&self) -> &str {
        &self.external_name
    }

    /// JSON lookup path template
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn sources(&self) -> Sources {
        self.sources
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn preprocessors(&self) -> &[String] {
        &self.preprocessors
    }

    /// Declared as `Option<T>`
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Flattened into its parent's path
    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Concrete path used in error reports. A flattened field shares its
    /// parent's path, so it reports its declared name under that prefix.
    pub fn display_path(&self, indices: &[usize]) -> String {
        let base = self.path.render(indices);
        if base.is_empty() {
            self.name.to_string()
        } else if self.embedded {
            format!("{base}.{}", self.name)
        } else {
            base
        }
    }

    /// Write `bound` into this field of `record`
    pub(crate) fn assign(&self, record: &mut dyn Any, bound: Bound) {
        (self.slot)(record, bound);
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.external_name == other.external_name
            && self.path == other.path
            && self.sources == other.sources
            && self.required == other.required
            && self.default == other.default
            && self.preprocessors == other.preprocessors
            && self.nullable == other.nullable
            && self.ignored == other.ignored
            && self.embedded == other.embedded
            && self.kind == other.kind
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("external_name", &self.external_name)
            .field("path", &self.path.to_string())
            .field("sources", &self.sources)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("preprocessors", &self.preprocessors)
            .field("nullable", &self.nullable)
            .field("ignored", &self.ignored)
            .field("kind", &self.kind)
            .finish()
    }
}
