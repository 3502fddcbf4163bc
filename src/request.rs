//! Request input consumed by the binder
//!
//! [`RequestSource`] is the contract: every accessor reads already
//! materialized data. [`Request`] is an in-memory implementation built with
//! [`RequestBuilder`]; transport adapters implement the trait directly.

use std::collections::HashMap;

use heck::ToTrainCase;
use serde::Serialize;

/// Pre-materialized request input
pub trait RequestSource {
    fn method(&self) -> &str;

    /// Values of a header; lookup is case-insensitive
    fn header(&self, name: &str) -> Option<&[String]>;

    fn query(&self, key: &str) -> Option<&[String]>;

    /// Parsed urlencoded or multipart form values
    fn form(&self, key: &str) -> Option<&[String]>;

    /// Raw body bytes; empty when there is no body
    fn body(&self) -> &[u8];

    fn path_param(&self, key: &str) -> Option<&str>;

    fn cookies(&self) -> &[Cookie];

    /// File attachments uploaded under `name`, in order
    fn files(&self, name: &str) -> Option<&[FileHeader]>;

    fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies().iter().find(|cookie| cookie.name == name)
    }
}

/// A name/value cookie pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// An uploaded file, fully read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

impl FileHeader {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            content: content.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Canonical header form: `x_request-id` and `xRequestId` → `X-Request-Id`
pub fn canonical_header_name(name: &str) -> String {
    name.to_train_case()
}

// ============================================================================
// IN-MEMORY REQUEST
// ============================================================================

/// A fully materialized request
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: String,
    headers: HashMap<String, Vec<String>>,
    query: HashMap<String, Vec<String>>,
    form: HashMap<String, Vec<String>>,
    body: Vec<u8>,
    path: HashMap<String, String>,
    cookies: Vec<Cookie>,
    files: HashMap<String, Vec<FileHeader>>,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }
}

impl RequestSource for Request {
    fn method(&self) -> &str {
        &self.method
    }

    fn header(&self, name: &str) -> Option<&[String]> {
        self.headers
            .get(&canonical_header_name(name))
            .map(Vec::as_slice)
    }

    fn query(&self, key: &str) -> Option<&[String]> {
        self.query.get(key).map(Vec::as_slice)
    }

    fn form(&self, key: &str) -> Option<&[String]> {
        self.form.get(key).map(Vec::as_slice)
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn path_param(&self, key: &str) -> Option<&str> {
        self.path.get(key).map(String::as_str)
    }

    fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    fn files(&self, name: &str) -> Option<&[FileHeader]> {
        self.files.get(name).map(Vec::as_slice)
    }
}

/// Fluent builder for [`Request`]
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            request: Request {
                method: "GET".to_string(),
                ..Request::default()
            },
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.request.method = method.into();
        self
    }

    /// Take the query string of `uri` (`/path?a=1&a=2`); the path is ignored
    pub fn uri(mut self, uri: &str) -> Self {
        if let Some((_, query)) = uri.split_once('?') {
            let query = query.split('#').next().unwrap_or_default();
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                push(&mut self.request.query, key.into_owned(), value.into_owned());
            }
        }
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        push(&mut self.request.query, key.into(), value.into());
        self
    }

    /// Append a header value; repeated names keep their order
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        push(&mut self.request.headers, canonical_header_name(name), value.into());
        self
    }

    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        push(&mut self.request.form, key.into(), value.into());
        self
    }

    /// Parse an `application/x-www-form-urlencoded` body into form values
    pub fn form_body(mut self, body: &str) -> Self {
        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            push(&mut self.request.form, key.into_owned(), value.into_owned());
        }
        self.request.body = body.as_bytes().to_vec();
        self.header("Content-Type", "application/x-www-form-urlencoded")
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Serialize `value` as the JSON body
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.request.body = serde_json::to_vec(value)?;
        Ok(self.header("Content-Type", "application/json"))
    }

    pub fn path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.path.insert(key.into(), value.into());
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.cookies.push(Cookie {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Attach a file under `name`; repeated names keep their order
    pub fn file(mut self, name: impl Into<String>, file: FileHeader) -> Self {
        self.request.files.entry(name.into()).or_default().push(file);
        self
    }

    /// Build the request. `Cookie` headers are parsed into cookies.
    pub fn build(mut self) -> Request {
        let from_headers: Vec<Cookie> = self
            .request
            .headers
            .get("Cookie")
            .into_iter()
            .flatten()
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                Some(Cookie {
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                })
            })
            .collect();
        self.request.cookies.extend(from_headers);
        self.request
    }
}

fn push(map: &mut HashMap<String, Vec<String>>, key: String, value: String) {
    map.entry(key).or_default().push(value);
}
