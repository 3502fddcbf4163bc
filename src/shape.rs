//! Static classification of bindable types
//!
//! Every field type a record declares implements [`FieldType`]. Its
//! [`Shape`] says how the binder treats it:
//!
//! | Rust type               | Shape                         |
//! |-------------------------|-------------------------------|
//! | `i32`, `String`, ...    | scalar                        |
//! | `R: Record`             | nested record                 |
//! | `Vec<T: Element>`       | collection of scalars/records |
//! | `FileHeader`            | file attachment               |
//! | `Vec<FileHeader>`       | file attachments              |
//! | `Option<T>`             | `T`'s shape, nullable         |
//!
//! User scalars join through the [`scalar!`](crate::scalar) macro.

use std::any::TypeId;
use std::fmt;

use crate::convert::{Converted, ScalarType};
use crate::descriptor::{FieldPath, RecordDescriptor};
use crate::introspect;
use crate::request::FileHeader;
use crate::schema::Schema;

/// A record type the binder can fill
///
/// ```
/// use reqbind::{Record, Schema};
///
/// #[derive(Default)]
/// struct Site {
///     id: i32,
///     domain: String,
/// }
///
/// impl Record for Site {
///     fn describe(schema: &mut Schema<Self>) {
///         schema.field("Id", |s| &mut s.id).bind("auto").default("99");
///         schema.field("SiteDomain", |s| &mut s.domain).bind("auto,req");
///     }
/// }
/// ```
pub trait Record: Default + Send + 'static {
    /// Register every field, in declaration order
    fn describe(schema: &mut Schema<Self>);
}

/// What the binder produced for one field
pub enum Bound {
    /// Nothing usable: the field gets its zero value (`None` if nullable)
    Unset,
    /// A scalar, record instance or file of the field's base type
    Value(Converted),
    /// Collection entries; `None` entries get the element's zero value
    Items(Vec<Option<Converted>>),
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Unset => f.write_str("Unset"),
            Bound::Value(_) => f.write_str("Value(..)"),
            Bound::Items(items) => write!(f, "Items({})", items.len()),
        }
    }
}

/// A type that can be a record field
pub trait FieldType: Default + Send + 'static {
    fn shape() -> Shape;

    /// Overwrite `self` with the binder's output
    fn assign(&mut self, bound: Bound);
}

/// A type that can be the element of a `Vec` field
pub trait Element: Default + Send + 'static {
    fn element() -> ElementShape;

    /// Build one entry; `None` means the entry failed or was empty
    fn from_item(item: Option<Converted>) -> Self;
}

/// How a record type is introspected and instantiated
#[derive(Clone, Copy)]
pub struct RecordShape {
    type_id: TypeId,
    type_name: &'static str,
    describe: fn(&mut usize, &FieldPath) -> RecordDescriptor,
}

impl RecordShape {
    pub fn of<R: Record>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            type_name: std::any::type_name::<R>(),
            describe: introspect::describe::<R>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Introspect the record, numbering fields from `next_id`
    pub(crate) fn describe(&self, next_id: &mut usize, prefix: &FieldPath) -> RecordDescriptor {
        (self.describe)(next_id, prefix)
    }
}

impl fmt::Debug for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordShape").field(&self.type_name).finish()
    }
}

impl PartialEq for RecordShape {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// Classification of a field's declared type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeKind {
    Scalar(ScalarType),
    Record(RecordShape),
    Collection(ElementShape),
    File,
}

/// A field type's shape: its classification plus one level of nullability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    kind: ShapeKind,
    nullable: bool,
}

impl Shape {
    pub fn scalar(ty: ScalarType) -> Self {
        Self {
            kind: ShapeKind::Scalar(ty),
            nullable: false,
        }
    }

    pub fn record<R: Record>() -> Self {
        Self {
            kind: ShapeKind::Record(RecordShape::of::<R>()),
            nullable: false,
        }
    }

    pub fn collection(element: ElementShape) -> Self {
        Self {
            kind: ShapeKind::Collection(element),
            nullable: false,
        }
    }

    pub fn file() -> Self {
        Self {
            kind: ShapeKind::File,
            nullable: false,
        }
    }

    /// Mark as nullable. Applies once: `Option<Option<T>>` is still one level.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Classification of a collection element
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementKind {
    Scalar(ScalarType),
    Record(RecordShape),
    File,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementShape {
    kind: ElementKind,
    nullable: bool,
}

impl ElementShape {
    pub fn scalar(ty: ScalarType) -> Self {
        Self {
            kind: ElementKind::Scalar(ty),
            nullable: false,
        }
    }

    pub fn record<R: Record>() -> Self {
        Self {
            kind: ElementKind::Record(RecordShape::of::<R>()),
            nullable: false,
        }
    }

    pub fn file() -> Self {
        Self {
            kind: ElementKind::File,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

// ============================================================================
// ASSIGNMENT HELPERS
// ============================================================================

/// Overwrite `slot` with a boxed value of type `T`, or its zero value
pub fn assign_value<T: Default + 'static>(slot: &mut T, bound: Bound) {
    *slot = match bound {
        Bound::Value(value) => value.downcast::<T>().map(|v| *v).unwrap_or_default(),
        Bound::Unset | Bound::Items(_) => T::default(),
    };
}

/// Unbox one collection entry of type `T`, or its zero value
pub fn take_item<T: Default + 'static>(item: Option<Converted>) -> T {
    item.and_then(|value| value.downcast::<T>().ok())
        .map(|v| *v)
        .unwrap_or_default()
}

// ============================================================================
// BLANKET IMPLS
// ============================================================================

impl<R: Record> FieldType for R {
    fn shape() -> Shape {
        Shape::record::<R>()
    }

    fn assign(&mut self, bound: Bound) {
        assign_value(self, bound);
    }
}

impl<R: Record> Element for R {
    fn element() -> ElementShape {
        ElementShape::record::<R>()
    }

    fn from_item(item: Option<Converted>) -> Self {
        take_item(item)
    }
}

impl<T: FieldType> FieldType for Option<T> {
    fn shape() -> Shape {
        T::shape().nullable()
    }

    fn assign(&mut self, bound: Bound) {
        *self = match bound {
            Bound::Unset => None,
            bound => {
                let mut value = T::default();
                value.assign(bound);
                Some(value)
            }
        };
    }
}

impl<T: Element> Element for Option<T> {
    fn element() -> ElementShape {
        T::element().nullable()
    }

    fn from_item(item: Option<Converted>) -> Self {
        item.map(|value| T::from_item(Some(value)))
    }
}

impl<T: Element> FieldType for Vec<T> {
    fn shape() -> Shape {
        Shape::collection(T::element())
    }

    fn assign(&mut self, bound: Bound) {
        *self = match bound {
            Bound::Items(items) => items.into_iter().map(T::from_item).collect(),
            Bound::Value(_) | Bound::Unset => Vec::new(),
        };
    }
}

impl FieldType for FileHeader {
    fn shape() -> Shape {
        Shape::file()
    }

    fn assign(&mut self, bound: Bound) {
        assign_value(self, bound);
    }
}

impl Element for FileHeader {
    fn element() -> ElementShape {
        ElementShape::file()
    }

    fn from_item(item: Option<Converted>) -> Self {
        take_item(item)
    }
}

/// Make a type bindable as a scalar field and collection element
///
/// - `scalar!(Millis)`: converted by a convertor registered for `Millis`
/// - `scalar!(Metric as String)`: converted as `String`, then `Metric::from`
///
/// The type must implement `Default`; aliases also need `From<Repr>`.
#[macro_export]
macro_rules! scalar {
    (@impl $ty:ty, $scalar:expr) => {
        impl $crate::FieldType for $ty {
            fn shape() -> $crate::Shape {
                $crate::Shape::scalar($scalar)
            }

            fn assign(&mut self, bound: $crate::Bound) {
                $crate::shape::assign_value(self, bound);
            }
        }

        impl $crate::Element for $ty {
            fn element() -> $crate::ElementShape {
                $crate::ElementShape::scalar($scalar)
            }

            fn from_item(item: ::std::option::Option<$crate::Converted>) -> Self {
                $crate::shape::take_item(item)
            }
        }
    };
    ($ty:ty as $repr:ty) => {
        $crate::scalar!(@impl $ty, $crate::ScalarType::alias::<$ty, $repr>());
    };
    ($($ty:ty),+ $(,)?) => {
        $(
            $crate::scalar!(@impl $ty, $crate::ScalarType::of::<$ty>());
        )+
    };
}

scalar!(String, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
