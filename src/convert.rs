//! String → value conversion registry
//!
//! Lookup order for a target scalar type:
//! 1. primitive kind (`String`, `bool`, 8/16/32/64-bit integers, `f32`/`f64`),
//!    including aliases declared with `scalar!(T as Primitive)`
//! 2. a convertor registered for exactly that type
//! 3. a convertor registered for the type the target declares as its
//!    representation (`scalar!(T as Registered)`), when kinds agree
//!
//! The process-wide registry lives behind a `Lazy`; [`ConvertorRegistry`]
//! can also be instantiated for an isolated [`Binder`](crate::Binder).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::error::ConvertError;

/// A converted value, type-erased until the field assigner downcasts it
pub type Converted = Box<dyn Any + Send>;

/// A string → value function
pub type Convertor = Arc<dyn Fn(&str) -> Result<Converted, ConvertError> + Send + Sync>;

/// Primitive kind a scalar type is represented by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    String,
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    /// Not a primitive; only registered convertors apply
    Opaque,
}

impl Kind {
    /// Kind of `T`, by type identity
    pub fn of<T: 'static>() -> Self {
        let id = TypeId::of::<T>();
        let table: [(TypeId, Kind); 14] = [
            (TypeId::of::<String>(), Kind::String),
            (TypeId::of::<bool>(), Kind::Bool),
            (TypeId::of::<i8>(), Kind::I8),
            (TypeId::of::<i16>(), Kind::I16),
            (TypeId::of::<i32>(), Kind::I32),
            (TypeId::of::<i64>(), Kind::I64),
            (TypeId::of::<isize>(), Kind::Isize),
            (TypeId::of::<u8>(), Kind::U8),
            (TypeId::of::<u16>(), Kind::U16),
            (TypeId::of::<u32>(), Kind::U32),
            (TypeId::of::<u64>(), Kind::U64),
            (TypeId::of::<usize>(), Kind::Usize),
            (TypeId::of::<f32>(), Kind::F32),
            (TypeId::of::<f64>(), Kind::F64),
        ];
        table
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map_or(Kind::Opaque, |(_, kind)| *kind)
    }

    pub fn is_primitive(self) -> bool {
        self != Kind::Opaque
    }
}

/// Static description of a scalar field type
#[derive(Clone, Copy)]
pub struct ScalarType {
    type_id: TypeId,
    type_name: &'static str,
    kind: Kind,
    repr: Option<TypeId>,
    rebuild: fn(Converted) -> Option<Converted>,
}

impl ScalarType {
    /// A scalar converted directly into `T`
    pub fn of<T: Send + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind: Kind::of::<T>(),
            repr: None,
            rebuild: rebuild_same::<T>,
        }
    }

    /// A scalar represented by `U`: converted as `U`, then `T::from`
    pub fn alias<T, U>() -> Self
    where
        T: From<U> + Send + 'static,
        U: 'static,
    {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind: Kind::of::<U>(),
            repr: Some(TypeId::of::<U>()),
            rebuild: rebuild_from::<T, U>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Turn a convertor's output into a boxed value of the field type
    pub(crate) fn rebuild(&self, value: Converted) -> Option<Converted> {
        (self.rebuild)(value)
    }
}

impl PartialEq for ScalarType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.kind == other.kind && self.repr == other.repr
    }
}

impl fmt::Debug for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarType")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("alias", &self.repr.is_some())
            .finish()
    }
}

fn rebuild_same<T: Send + 'static>(value: Converted) -> Option<Converted> {
    value.downcast::<T>().ok().map(|v| v as Converted)
}

fn rebuild_from<T, U>(value: Converted) -> Option<Converted>
where
    T: From<U> + Send + 'static,
    U: 'static,
{
    match value.downcast::<T>() {
        Ok(v) => Some(v as Converted),
        Err(value) => value
            .downcast::<U>()
            .ok()
            .map(|u| Box::new(T::from(*u)) as Converted),
    }
}

struct Registered {
    kind: Kind,
    convert: Convertor,
}

/// Registry of user convertors on top of the primitive built-ins
#[derive(Default)]
pub struct ConvertorRegistry {
    custom: DashMap<TypeId, Registered>,
}

impl ConvertorRegistry {
    /// Create a registry with only the primitive built-ins
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the convertor for `T`
    pub fn register<T, E, F>(&self, convert: F)
    where
        T: Send + 'static,
        E: fmt::Display,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
    {
        let target = std::any::type_name::<T>();
        let convert: Convertor = Arc::new(move |input: &str| {
            convert(input)
                .map(|v| Box::new(v) as Converted)
                .map_err(|e| ConvertError::Custom {
                    input: input.to_string(),
                    target,
                    message: e.to_string(),
                })
        });
        tracing::debug!(target_type = target, "registered convertor");
        self.custom.insert(
            TypeId::of::<T>(),
            Registered {
                kind: Kind::of::<T>(),
                convert,
            },
        );
    }

    /// Find the convertor for a scalar type
    pub fn get(&self, ty: &ScalarType) -> Option<Convertor> {
        if let Some(convert) = builtin(ty.kind) {
            return Some(convert);
        }

        if let Some(entry) = self.custom.get(&ty.type_id) {
            return Some(Arc::clone(&entry.convert));
        }

        let repr = ty.repr?;
        let entry = self.custom.get(&repr)?;
        (entry.kind == ty.kind).then(|| Arc::clone(&entry.convert))
    }

    /// Number of user-registered convertors
    pub fn len(&self) -> usize {
        self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.custom.is_empty()
    }
}

/// Global registry used by [`bind`](crate::bind) and the default binder
static GLOBAL: Lazy<Arc<ConvertorRegistry>> = Lazy::new(|| Arc::new(ConvertorRegistry::new()));

/// Handle to the process-wide registry
pub fn global() -> Arc<ConvertorRegistry> {
    Arc::clone(&GLOBAL)
}

/// Register a convertor for `T` in the process-wide registry
///
/// Register before serving binds: concurrent binds see either the old or the
/// new entry, never a torn one, but which one is unspecified.
pub fn register_convertor<T, E, F>(convert: F)
where
    T: Send + 'static,
    E: fmt::Display,
    F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
{
    GLOBAL.register(convert);
}

// ============================================================================
// BUILT-INS
// ============================================================================

static BUILTINS: Lazy<HashMap<Kind, Convertor>> = Lazy::new(|| {
    let mut map: HashMap<Kind, Convertor> = HashMap::new();
    map.insert(
        Kind::String,
        Arc::new(|s: &str| Ok::<Converted, ConvertError>(Box::new(s.to_string()))),
    );
    map.insert(
        Kind::Bool,
        Arc::new(|s: &str| Ok::<Converted, ConvertError>(Box::new(parse_bool(s)))),
    );
    map.insert(Kind::I8, Arc::new(|s: &str| parse_int::<i8>(s, "i8")));
    map.insert(Kind::I16, Arc::new(|s: &str| parse_int::<i16>(s, "i16")));
    map.insert(Kind::I32, Arc::new(|s: &str| parse_int::<i32>(s, "i32")));
    map.insert(Kind::I64, Arc::new(|s: &str| parse_int::<i64>(s, "i64")));
    map.insert(Kind::Isize, Arc::new(|s: &str| parse_int::<isize>(s, "isize")));
    map.insert(Kind::U8, Arc::new(|s: &str| parse_int::<u8>(s, "u8")));
    map.insert(Kind::U16, Arc::new(|s: &str| parse_int::<u16>(s, "u16")));
    map.insert(Kind::U32, Arc::new(|s: &str| parse_int::<u32>(s, "u32")));
    map.insert(Kind::U64, Arc::new(|s: &str| parse_int::<u64>(s, "u64")));
    map.insert(Kind::Usize, Arc::new(|s: &str| parse_int::<usize>(s, "usize")));
    map.insert(Kind::F32, Arc::new(parse_f32));
    map.insert(Kind::F64, Arc::new(parse_f64));
    map
});

fn builtin(kind: Kind) -> Option<Convertor> {
    BUILTINS.get(&kind).cloned()
}

/// Permissive: only "", "0", "false" and "False" are false
pub fn parse_bool(input: &str) -> bool {
    !matches!(input, "" | "0" | "false" | "False")
}

fn parse_int<T>(input: &str, target: &'static str) -> Result<Converted, ConvertError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError> + Send + 'static,
{
    use std::num::IntErrorKind;

    input
        .parse::<T>()
        .map(|v| Box::new(v) as Converted)
        .map_err(|e| match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => ConvertError::Range {
                input: input.to_string(),
                target,
            },
            _ => ConvertError::Parse {
                input: input.to_string(),
                target,
                reason: e.to_string(),
            },
        })
}

fn parse_f64(input: &str) -> Result<Converted, ConvertError> {
    parse_float::<f64>(input, "f64").map(|v| Box::new(v) as Converted)
}

fn parse_f32(input: &str) -> Result<Converted, ConvertError> {
    parse_float::<f32>(input, "f32").map(|v| Box::new(v) as Converted)
}

/// Finite literals that overflow to infinity ("1e400") are range errors
fn parse_float<T>(input: &str, target: &'static str) -> Result<T, ConvertError>
where
    T: std::str::FromStr<Err = std::num::ParseFloatError> + Into<f64> + Copy,
{
    let value = input.parse::<T>().map_err(|e| ConvertError::Parse {
        input: input.to_string(),
        target,
        reason: e.to_string(),
    })?;
    if value.into().is_infinite() && !input.to_ascii_lowercase().contains("inf") {
        return Err(ConvertError::Range {
            input: input.to_string(),
            target,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert<T: Send + Copy + 'static>(input: &str) -> Result<T, ConvertError> {
        let registry = ConvertorRegistry::new();
        let convert = registry.get(&ScalarType::of::<T>()).unwrap();
        convert(input).map(|v| *v.downcast::<T>().unwrap())
    }

    #[derive(Debug, Default, PartialEq)]
    struct Metric(String);

    impl From<String> for Metric {
        fn from(s: String) -> Self {
            Metric(s)
        }
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    struct Millis(u64);

    #[derive(Debug, Default, PartialEq)]
    struct Timeout(Millis);

    impl From<Millis> for Timeout {
        fn from(m: Millis) -> Self {
            Timeout(m)
        }
    }

    #[test]
    fn kind_of_primitives() {
        assert_eq!(Kind::of::<String>(), Kind::String);
        assert_eq!(Kind::of::<u16>(), Kind::U16);
        assert_eq!(Kind::of::<f64>(), Kind::F64);
        assert_eq!(Kind::of::<Metric>(), Kind::Opaque);
        assert!(!Kind::Opaque.is_primitive());
    }

    #[test]
    fn bool_is_permissive() {
        for falsy in ["", "0", "false", "False"] {
            assert!(!parse_bool(falsy), "{falsy:?} should be false");
        }
        for truthy in ["1", "true", "True", "no", "FALSE", "off", "anything"] {
            assert!(parse_bool(truthy), "{truthy:?} should be true");
        }
    }

    #[test]
    fn integers_are_width_checked() {
        assert_eq!(convert::<i8>("-128"), Ok(-128));
        assert!(matches!(convert::<i8>("128"), Err(ConvertError::Range { .. })));
        assert!(matches!(convert::<u8>("-1"), Err(ConvertError::Parse { .. })));
        assert_eq!(convert::<u16>("65535"), Ok(65535));
        assert!(matches!(convert::<u16>("65536"), Err(ConvertError::Range { .. })));
        assert_eq!(convert::<i64>("+42"), Ok(42));
        assert!(matches!(convert::<i32>(""), Err(ConvertError::Parse { .. })));
        assert!(matches!(convert::<i32>("6b"), Err(ConvertError::Parse { .. })));
    }

    #[test]
    fn floats() {
        assert_eq!(convert::<f32>("1.123"), Ok(1.123_f32));
        assert_eq!(convert::<f64>("2.11"), Ok(2.11));
        assert!(matches!(convert::<f32>("1e40"), Err(ConvertError::Range { .. })));
        assert!(matches!(convert::<f64>("1e400"), Err(ConvertError::Range { .. })));
        assert!(matches!(convert::<f64>("-1e400"), Err(ConvertError::Range { .. })));
        assert!(convert::<f64>("-Infinity").unwrap().is_infinite());
        assert!(convert::<f32>("inf").unwrap().is_infinite());
        assert!(matches!(convert::<f64>("abc"), Err(ConvertError::Parse { .. })));
    }

    #[test]
    fn alias_of_primitive_uses_builtin() {
        let registry = ConvertorRegistry::new();
        let ty = ScalarType::alias::<Metric, String>();
        assert_eq!(ty.kind(), Kind::String);

        let convert = registry.get(&ty).unwrap();
        let value = ty.rebuild(convert("qps").unwrap()).unwrap();
        assert_eq!(*value.downcast::<Metric>().unwrap(), Metric("qps".into()));
    }

    #[test]
    fn opaque_without_registration_has_no_convertor() {
        let registry = ConvertorRegistry::new();
        assert!(registry.get(&ScalarType::of::<Millis>()).is_none());
    }

    #[test]
    fn registered_exact_type() {
        let registry = ConvertorRegistry::new();
        registry.register(|s: &str| s.trim_end_matches("ms").parse::<u64>().map(Millis));
        assert_eq!(registry.len(), 1);

        let ty = ScalarType::of::<Millis>();
        let convert = registry.get(&ty).unwrap();
        let value = ty.rebuild(convert("250ms").unwrap()).unwrap();
        assert_eq!(*value.downcast::<Millis>().unwrap(), Millis(250));

        let err = convert("soon").err().unwrap();
        assert!(matches!(err, ConvertError::Custom { .. }));
    }

    #[test]
    fn alias_of_registered_type_falls_back() {
        let registry = ConvertorRegistry::new();
        registry.register(|s: &str| s.parse::<u64>().map(Millis));

        let ty = ScalarType::alias::<Timeout, Millis>();
        let convert = registry.get(&ty).unwrap();
        let value = ty.rebuild(convert("30").unwrap()).unwrap();
        assert_eq!(*value.downcast::<Timeout>().unwrap(), Timeout(Millis(30)));
    }

    #[test]
    fn scalar_type_equality_ignores_rebuild() {
        assert_eq!(ScalarType::of::<i32>(), ScalarType::of::<i32>());
        assert_ne!(ScalarType::of::<i32>(), ScalarType::of::<i64>());
        assert_ne!(
            ScalarType::of::<Metric>(),
            ScalarType::alias::<Metric, String>()
        );
    }
}
