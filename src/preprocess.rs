//! Named text transforms applied to raw values before conversion
//!
//! A field lists preprocessor names (`preprocess("split,trim")`). Every
//! transform runs on every raw value; outputs are flattened transform-first:
//!
//! ```text
//! names = [split, upper], raw = ["a,b", "c"]
//! → split("a,b"), split("c"), upper("a,b"), upper("c")
//! ```
//!
//! A failing transform records its error and the pipeline keeps going.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::error::PreprocessError;

/// A raw string → raw strings transform
pub type Preprocessor = Arc<dyn Fn(&str) -> Result<Vec<String>, PreprocessError> + Send + Sync>;

/// Name of the built-in comma splitter
pub const SPLIT: &str = "split";

/// Output of one pipeline run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Processed {
    pub values: Vec<String>,
    pub errors: Vec<String>,
}

/// Name → transform table
pub struct PreprocessorRegistry {
    table: DashMap<String, Preprocessor>,
}

impl Default for PreprocessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessorRegistry {
    /// Create a registry holding only the built-in `split`
    pub fn new() -> Self {
        let registry = Self {
            table: DashMap::new(),
        };
        registry.register(SPLIT, |raw: &str| {
            Ok::<_, PreprocessError>(raw.split(',').map(str::to_string).collect())
        });
        registry
    }

    /// Add or replace the transform registered under `name`
    pub fn register<E, F>(&self, name: impl Into<String>, transform: F)
    where
        E: fmt::Display,
        F: Fn(&str) -> Result<Vec<String>, E> + Send + Sync + 'static,
    {
        let name = name.into();
        let transform: Preprocessor = Arc::new(move |raw: &str| {
            transform(raw).map_err(|e| PreprocessError::new(e.to_string()))
        });
        tracing::debug!(preprocessor = %name, "registered preprocessor");
        self.table.insert(name, transform);
    }

    pub fn get(&self, name: &str) -> Option<Preprocessor> {
        self.table.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Run `names` over `raw`. With no names the raw values pass through.
    pub fn run(&self, names: &[String], raw: Vec<String>) -> Processed {
        if names.is_empty() {
            return Processed {
                values: raw,
                errors: Vec::new(),
            };
        }

        let mut processed = Processed::default();
        for name in names {
            let Some(transform) = self.get(name) else {
                tracing::debug!(preprocessor = %name, "unknown preprocessor");
                processed
                    .errors
                    .push(format!("unknown preprocessor `{name}`"));
                continue;
            };

            for value in &raw {
                match transform(value) {
                    Ok(outputs) => processed.values.extend(outputs),
                    Err(e) => {
                        tracing::debug!(preprocessor = %name, input = %value, error = %e, "preprocessor failed");
                        processed.errors.push(e.message);
                    }
                }
            }
        }
        processed
    }
}

/// Global registry used by [`bind`](crate::bind) and the default binder
static GLOBAL: Lazy<Arc<PreprocessorRegistry>> =
    Lazy::new(|| Arc::new(PreprocessorRegistry::new()));

/// Handle to the process-wide registry
pub fn global() -> Arc<PreprocessorRegistry> {
    Arc::clone(&GLOBAL)
}

/// Add or replace a preprocessor in the process-wide registry
pub fn register_preprocessor<E, F>(name: impl Into<String>, transform: F)
where
    E: fmt::Display,
    F: Fn(&str) -> Result<Vec<String>, E> + Send + Sync + 'static,
{
    GLOBAL.register(name, transform);
}
