//! Schema introspection and the per-type schema cache

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::convert::Converted;
use crate::descriptor::{
    CollectionDescriptor, CollectionElement, FieldDescriptor, FieldKind, FieldPath,
    RecordDescriptor,
};
use crate::request::canonical_header_name;
use crate::schema::{FieldSpec, Schema};
use crate::shape::{ElementKind, Record, ShapeKind};

/// Descriptors by record type, built on first use
static SCHEMAS: Lazy<DashMap<TypeId, Arc<RecordDescriptor>>> = Lazy::new(DashMap::new);

/// Introspect `R` into a fresh descriptor tree
pub fn introspect<R: Record>() -> RecordDescriptor {
    let mut next_id = 0;
    let descriptor = describe::<R>(&mut next_id, &FieldPath::root());
    debug!(
        record = descriptor.name(),
        fields = descriptor.field_count(),
        slots = descriptor.slots(),
        "introspected record"
    );
    descriptor
}

/// Cached descriptor of `R`, introspected once per process
pub fn schema_of<R: Record>() -> Arc<RecordDescriptor> {
    let key = TypeId::of::<R>();
    if let Some(cached) = SCHEMAS.get(&key) {
        trace!(record = cached.name(), "schema cache hit");
        return Arc::clone(cached.value());
    }

    let descriptor = Arc::new(introspect::<R>());
    let entry = SCHEMAS.entry(key).or_insert(descriptor);
    Arc::clone(entry.value())
}

/// Describe `R` with ids continuing from `next_id` and paths under `prefix`
pub(crate) fn describe<R: Record>(next_id: &mut usize, prefix: &FieldPath) -> RecordDescriptor {
    let mut schema = Schema::<R>::new();
    R::describe(&mut schema);

    let specs = schema.into_specs();
    let mut fields = Vec::with_capacity(specs.len());
    for spec in specs {
        fields.push(build_field(spec, next_id, prefix));
    }

    let type_name = std::any::type_name::<R>();
    RecordDescriptor {
        name: short_name(type_name),
        type_name,
        type_id: TypeId::of::<R>(),
        fields,
        slots: *next_id,
        new: instantiate::<R>,
    }
}

fn instantiate<R: Record>() -> Converted {
    Box::new(R::default())
}

fn build_field(spec: FieldSpec, next_id: &mut usize, prefix: &FieldPath) -> FieldDescriptor {
    let id = *next_id;
    *next_id += 1;

    let FieldSpec {
        name,
        config,
        shape,
        embedded,
        slot,
    } = spec;

    let local_name = config.rename.as_deref().unwrap_or(name);
    let external_name = if config.header_selected {
        canonical_header_name(local_name)
    } else {
        local_name.to_string()
    };
    let path = if embedded {
        prefix.clone()
    } else {
        prefix.child(local_name)
    };

    let kind = match shape.kind() {
        ShapeKind::Scalar(ty) => FieldKind::Scalar(*ty),
        ShapeKind::Record(record) => FieldKind::Record(record.describe(next_id, &path)),
        ShapeKind::File => FieldKind::File { many: false },
        ShapeKind::Collection(element) => match element.kind() {
            ElementKind::File => FieldKind::File { many: true },
            ElementKind::Scalar(ty) => FieldKind::Collection(CollectionDescriptor {
                element: CollectionElement::Scalar(*ty),
                nullable: element.is_nullable(),
            }),
            ElementKind::Record(record) => {
                let mut element_ids = 0;
                let descriptor = record.describe(&mut element_ids, &path.element());
                FieldKind::Collection(CollectionDescriptor {
                    element: CollectionElement::Record(descriptor),
                    nullable: element.is_nullable(),
                })
            }
        },
    };

    FieldDescriptor {
        id,
        name,
        external_name,
        path,
        sources: config.sources,
        required: config.required,
        default: config.default,
        preprocessors: config.preprocessors,
        nullable: shape.is_nullable(),
        ignored: config.ignored,
        embedded,
        kind,
        slot,
    }
}

/// `my_app::api::Site<T>` → `Site`
fn short_name(type_name: &'static str) -> &'static str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ScalarType;
    use crate::schema::Sources;

    #[derive(Debug, Default)]
    struct Leaf {
        c1: String,
    }

    impl Record for Leaf {
        fn describe(schema: &mut Schema<Self>) {
            schema.field("C1", |s| &mut s.c1).bind("auto,req");
        }
    }

    #[derive(Debug, Default)]
    struct Branch {
        b1: String,
        c: Vec<Leaf>,
    }

    impl Record for Branch {
        fn describe(schema: &mut Schema<Self>) {
            schema.field("B1", |s| &mut s.b1).bind("auto");
            schema.field("C", |s| &mut s.c).bind("auto,req");
        }
    }

    #[derive(Debug, Default)]
    struct Common {
        trace: String,
    }

    impl Record for Common {
        fn describe(schema: &mut Schema<Self>) {
            schema.field("Trace", |s| &mut s.trace).bind("auto");
        }
    }

    #[derive(Debug, Default)]
    struct Root {
        a1: i32,
        inner: Option<Branch>,
        branches: Vec<Branch>,
        request_id: String,
        common: Common,
        secret: String,
    }

    impl Record for Root {
        fn describe(schema: &mut Schema<Self>) {
            schema.field("A1", |s| &mut s.a1).bind("auto").default("7");
            schema.field("Inner", |s| &mut s.inner).bind("auto,req");
            schema.field("B", |s| &mut s.branches).bind("auto");
            schema
                .field("request_id", |s| &mut s.request_id)
                .bind("x_request-id,header");
            schema.flatten("common", |s| &mut s.common);
            schema.field("secret", |s| &mut s.secret).bind("-");
        }
    }

    #[test]
    fn ids_are_preorder_within_an_id_space() {
        let root = introspect::<Root>();
        assert_eq!(root.name(), "Root");
        assert_eq!(root.field_count(), 6);

        let ids: Vec<usize> = root.fields().iter().map(FieldDescriptor::id).collect();
        // Inner (1) owns ids 2..=3, common (6) owns 7
        assert_eq!(ids, vec![0, 1, 4, 5, 6, 8]);
        assert_eq!(root.slots(), 9);

        let FieldKind::Record(inner) = root.fields()[1].kind() else {
            panic!("Inner should be a record");
        };
        assert_eq!(inner.fields()[0].id(), 2);
        assert_eq!(inner.fields()[0].path().to_string(), "Inner.B1");
    }

    #[test]
    fn collection_elements_start_a_new_id_space() {
        let root = introspect::<Root>();
        let field = root.field("B").unwrap();
        let FieldKind::Collection(collection) = field.kind() else {
            panic!("B should be a collection");
        };
        let CollectionElement::Record(branch) = collection.element() else {
            panic!("B elements should be records");
        };
        assert_eq!(branch.fields()[0].id(), 0);
        assert_eq!(branch.slots(), 2);
        assert_eq!(branch.fields()[0].path().to_string(), "B.#.B1");

        let FieldKind::Collection(leaves) = branch.fields()[1].kind() else {
            panic!("C should be a collection");
        };
        let CollectionElement::Record(leaf) = leaves.element() else {
            panic!("C elements should be records");
        };
        assert_eq!(leaf.fields()[0].path().to_string(), "B.#.C.#.C1");
        assert_eq!(leaf.fields()[0].display_path(&[2, 1]), "B.2.C.1.C1");
    }

    #[test]
    fn header_names_are_canonicalized() {
        let root = introspect::<Root>();
        let field = root.field("request_id").unwrap();
        assert_eq!(field.external_name(), "X-Request-Id");
        assert_eq!(field.path().to_string(), "x_request-id");
        assert_eq!(field.sources(), Sources::HEADER);
    }

    #[test]
    fn configuration_is_carried() {
        let root = introspect::<Root>();
        let a1 = root.field("A1").unwrap();
        assert_eq!(a1.default_value(), Some("7"));
        assert_eq!(a1.kind(), &FieldKind::Scalar(ScalarType::of::<i32>()));
        assert!(!a1.is_required());

        let inner = root.field("Inner").unwrap();
        assert!(inner.is_required());
        assert!(inner.is_nullable());

        assert!(root.field("secret").unwrap().is_ignored());
    }

    #[test]
    fn flattened_fields_keep_the_parent_path() {
        let root = introspect::<Root>();
        let common = root.field("common").unwrap();
        assert!(common.is_embedded());
        assert!(common.path().is_empty());
        assert_eq!(common.display_path(&[]), "common");

        let FieldKind::Record(record) = common.kind() else {
            panic!("common should be a record");
        };
        assert_eq!(record.fields()[0].path().to_string(), "Trace");
    }

    #[test]
    fn introspection_is_idempotent() {
        assert_eq!(introspect::<Root>(), introspect::<Root>());
    }

    #[test]
    fn schema_cache_returns_the_same_tree() {
        let first = schema_of::<Branch>();
        let second = schema_of::<Branch>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, introspect::<Branch>());
    }

    #[test]
    fn short_names() {
        assert_eq!(short_name("a::b::Site"), "Site");
        assert_eq!(short_name("Site"), "Site");
        assert_eq!(short_name("a::Wrapper<b::Inner>"), "Wrapper");
    }
}
