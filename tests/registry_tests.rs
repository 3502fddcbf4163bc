//! # Registry Tests
//!
//! - user scalars: primitive aliases, registered types, aliases of
//!   registered types, unregistered types
//! - user preprocessors, including failing ones
//! - binders with isolated registries
//!
//! Every type and preprocessor name here is unique to this file; the
//! process-wide registries are shared by all tests in the binary.

mod common;

use std::sync::Arc;

use common::{init_tracing, message, query};
use reqbind::{
    bind, register_convertor, register_preprocessor, scalar, Binder, ConvertorRegistry,
    PreprocessorRegistry, Record, Request, Schema,
};

#[derive(Debug, Default, Clone, PartialEq)]
struct Metric(String);

impl From<String> for Metric {
    fn from(s: String) -> Self {
        Metric(s)
    }
}

scalar!(Metric as String);

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Celsius(f64);

scalar!(Celsius);

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Reading(Celsius);

impl From<Celsius> for Reading {
    fn from(c: Celsius) -> Self {
        Reading(c)
    }
}

scalar!(Reading as Celsius);

/// Never registered anywhere
#[derive(Debug, Default, Clone, PartialEq)]
struct Opaque(u8);

scalar!(Opaque);

fn register_celsius() {
    register_convertor(|s: &str| {
        s.trim_end_matches('C')
            .parse::<f64>()
            .map(Celsius)
            .map_err(|e| format!("not a temperature: {e}"))
    });
}

// ============================================================================
// CONVERTORS
// ============================================================================

#[derive(Debug, Default)]
struct Probe {
    metric: Metric,
    metrics: Vec<Metric>,
    temp: Celsius,
    temps: Vec<Option<Celsius>>,
    reading: Option<Reading>,
}

impl Record for Probe {
    fn describe(schema: &mut Schema<Self>) {
        schema.field("metric", |p| &mut p.metric).bind("query");
        schema.field("metrics", |p| &mut p.metrics).bind("m,query");
        schema.field("temp", |p| &mut p.temp).bind("query");
        schema.field("temps", |p| &mut p.temps).bind("t,query");
        schema.field("reading", |p| &mut p.reading).bind("query");
    }
}

#[test]
fn alias_of_primitive_needs_no_registration() {
    init_tracing();
    register_celsius();
    let mut recv = Probe::default();
    bind(&query("/?metric=qps&m=p50&m=p99"), &mut recv).unwrap();
    assert_eq!(recv.metric, Metric("qps".into()));
    assert_eq!(recv.metrics, [Metric("p50".into()), Metric("p99".into())]);
}

#[test]
fn registered_type_and_its_alias() {
    init_tracing();
    register_celsius();
    let mut recv = Probe::default();
    bind(
        &query("/?temp=21.5C&t=1&t=&t=3C&reading=-4"),
        &mut recv,
    )
    .unwrap();

    assert_eq!(recv.temp, Celsius(21.5));
    // the empty entry is nullable, so it is dropped to None without an error
    assert_eq!(recv.temps, [Some(Celsius(1.0)), None, Some(Celsius(3.0))]);
    assert_eq!(recv.reading, Some(Reading(Celsius(-4.0))));
}

#[test]
fn registered_convertor_rejection_is_reported() {
    init_tracing();
    register_celsius();
    let mut recv = Probe::default();
    let err = message(bind(&query("/?temp=warm&reading=hot"), &mut recv));
    assert_eq!(
        err,
        "parameter type cannot be converted from string: [temp, reading]"
    );
    assert_eq!(recv.temp, Celsius::default());
    assert_eq!(recv.reading, None);
}

#[derive(Debug, Default)]
struct Sealed {
    value: Opaque,
    maybe: Option<Opaque>,
}

impl Record for Sealed {
    fn describe(schema: &mut Schema<Self>) {
        schema.field("value", |s| &mut s.value).bind("query");
        schema.field("maybe", |s| &mut s.maybe).bind("query");
    }
}

#[test]
fn unregistered_type_fails_conversion() {
    init_tracing();
    let mut recv = Sealed::default();
    let err = message(bind(&query("/?value=1&maybe=2"), &mut recv));
    assert_eq!(
        err,
        "parameter type cannot be converted from string: [value, maybe]"
    );

    // absent values never reach a convertor
    bind(&query("/"), &mut recv).unwrap();
    assert_eq!(recv.maybe, None);
}

#[derive(Debug, Default)]
struct Flags {
    on: bool,
    list: Vec<bool>,
}

impl Record for Flags {
    fn describe(schema: &mut Schema<Self>) {
        schema.field("on", |f| &mut f.on).bind("query");
        schema.field("list", |f| &mut f.list).bind("b,query");
    }
}

#[test]
fn booleans_are_permissive() {
    init_tracing();
    let mut recv = Flags::default();
    bind(&query("/?on=no&b=0&b=false&b=False&b=FALSE&b=&b=1"), &mut recv).unwrap();
    assert!(recv.on);
    assert_eq!(recv.list, [false, false, false, true, false, true]);
}

// ============================================================================
// PREPROCESSORS
// ============================================================================

#[derive(Debug, Default)]
struct Tags {
    tags: Vec<String>,
    ids: Vec<u32>,
}

impl Record for Tags {
    fn describe(schema: &mut Schema<Self>) {
        schema
            .field("tags", |t| &mut t.tags)
            .bind("query")
            .preprocess("split,rt_upper");
        schema
            .field("ids", |t| &mut t.ids)
            .bind("query")
            .preprocess("rt_digits");
    }
}

fn register_tag_preprocessors() {
    register_preprocessor("rt_upper", |s: &str| {
        Ok::<_, String>(vec![s.to_uppercase()])
    });
    register_preprocessor("rt_digits", |s: &str| {
        if s.chars().all(|c| c.is_ascii_digit()) {
            Ok(vec![s.to_string()])
        } else {
            Err(format!("rt_digits: {s:?} is not numeric"))
        }
    });
}

#[test]
fn registered_preprocessor_runs_after_split() {
    init_tracing();
    register_tag_preprocessors();
    let mut recv = Tags::default();
    bind(&query("/?tags=a,b&ids=7&ids=8"), &mut recv).unwrap();
    assert_eq!(recv.tags, ["a", "b", "A,B"]);
    assert_eq!(recv.ids, [7, 8]);
}

#[test]
fn preprocessor_errors_are_reported_verbatim() {
    init_tracing();
    register_tag_preprocessors();
    let mut recv = Tags::default();
    let err = message(bind(&query("/?ids=1&ids=x2&ids=3"), &mut recv));
    assert_eq!(err, r#"rt_digits: "x2" is not numeric"#);
    // the failing value is dropped, the others still bind
    assert_eq!(recv.ids, [1, 3]);
}

// ============================================================================
// ISOLATED BINDERS
// ============================================================================

#[test]
fn isolated_binder_ignores_global_registrations() {
    init_tracing();
    register_celsius();
    register_tag_preprocessors();

    let binder = Binder::builder()
        .convertors(Arc::new(ConvertorRegistry::new()))
        .preprocessors(Arc::new(PreprocessorRegistry::new()))
        .build();
    assert!(binder.convertors().is_empty());
    assert!(binder.preprocessors().contains("split"));
    assert!(!binder.preprocessors().contains("rt_upper"));

    let mut probe = Probe::default();
    let err = message(binder.bind(&query("/?metric=qps&temp=3C"), &mut probe));
    assert_eq!(err, "parameter type cannot be converted from string: [temp]");
    assert_eq!(probe.metric, Metric("qps".into()));

    let mut tags = Tags::default();
    let err = message(binder.bind(&query("/?tags=a,b"), &mut tags));
    assert_eq!(err, "unknown preprocessor `rt_upper`");
    assert_eq!(tags.tags, ["a", "b"]);
}

#[test]
fn isolated_binder_with_its_own_convertor() {
    init_tracing();
    let convertors = Arc::new(ConvertorRegistry::new());
    convertors.register(|s: &str| s.parse::<u8>().map(Opaque));
    let binder = Binder::builder().convertors(convertors).build();

    let mut recv = Sealed::default();
    binder
        .bind(&Request::builder().uri("/?value=5").build(), &mut recv)
        .unwrap();
    assert_eq!(recv.value, Opaque(5));

    // the process-wide registry still knows nothing about Opaque
    assert!(bind(&query("/?value=5"), &mut recv).is_err());
}
