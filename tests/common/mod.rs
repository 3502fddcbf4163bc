//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::Once;

use reqbind::{BindError, Record, Request, Schema};

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once; filter with `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Request carrying only a query string
pub fn query(uri: &str) -> Request {
    Request::builder().uri(uri).build()
}

/// POST request with a JSON body
pub fn json(body: serde_json::Value) -> Request {
    Request::builder()
        .method("POST")
        .json(&body)
        .unwrap()
        .build()
}

/// Text of a failed bind
pub fn message(result: Result<(), BindError>) -> String {
    match result {
        Ok(()) => panic!("bind should have failed"),
        Err(e) => e.to_string(),
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Site {
    pub id: i32,
    pub site_domain: String,
}

impl Record for Site {
    fn describe(schema: &mut Schema<Self>) {
        schema.field("Id", |s| &mut s.id).bind("auto").default("99");
        schema
            .field("SiteDomain", |s| &mut s.site_domain)
            .bind("auto,req");
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Sites {
    pub sites: Vec<Site>,
}

impl Record for Sites {
    fn describe(schema: &mut Schema<Self>) {
        schema.field("Sites", |s| &mut s.sites).bind("auto");
    }
}
