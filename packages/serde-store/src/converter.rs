//! Primitive converters and the ordered registry that selects them.

use std::fmt;
use std::sync::Arc;

use base64::Engine;

/// The primitive shape a value is being read as or written from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    Str,
    Bytes,
    /// The name of a unit enum variant.
    Variant,
}

impl ScalarKind {
    /// True for the signed integer kinds.
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64
        )
    }

    /// True for the unsigned integer kinds.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            ScalarKind::U8 | ScalarKind::U16 | ScalarKind::U32 | ScalarKind::U64
        )
    }

    /// The value read when nothing is stored, if the kind has one.
    pub fn zero(self) -> Option<Scalar> {
        Some(match self {
            ScalarKind::Bool => Scalar::Bool(false),
            k if k.is_signed() => Scalar::Int(0),
            k if k.is_unsigned() => Scalar::UInt(0),
            ScalarKind::F32 | ScalarKind::F64 => Scalar::Float(0.0),
            ScalarKind::Char => Scalar::Char('\0'),
            ScalarKind::Str => Scalar::Str(String::new()),
            ScalarKind::Bytes => Scalar::Bytes(Vec::new()),
            _ => return None,
        })
    }

    /// Whether an empty stored string means "no value" for an optional of
    /// this kind. Text and bytes are identity conversions, so for them the
    /// empty string is a value and "no value" is a null entity instead.
    pub fn empty_is_none(self) -> bool {
        !matches!(self, ScalarKind::Str | ScalarKind::Bytes)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::Char => "char",
            ScalarKind::Str => "string",
            ScalarKind::Bytes => "bytes",
            ScalarKind::Variant => "enum variant",
        };
        f.write_str(name)
    }
}

/// A converted primitive value.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
}

/// A stored string that a converter could not parse, or a value it could
/// not render.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{raw:?} is not a valid {kind}: {message}")]
pub struct ConvertError {
    pub kind: ScalarKind,
    pub raw: String,
    pub message: String,
}

impl ConvertError {
    pub fn new(kind: ScalarKind, raw: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            kind,
            raw: raw.into(),
            message: message.to_string(),
        }
    }

    fn mismatch(kind: ScalarKind, value: &Scalar) -> Self {
        Self::new(kind, format!("{:?}", value), "unexpected scalar for kind")
    }
}

/// Converts one family of primitives to and from their stored string form.
///
/// # Implementing Custom Converters
///
/// ```rust
/// use flatstruct_serde_store::{Converter, ConvertError, Scalar, ScalarKind};
///
/// /// Accepts "yes"/"no" for booleans.
/// struct YesNo;
///
/// impl Converter for YesNo {
///     fn can_convert(&self, kind: ScalarKind) -> bool {
///         kind == ScalarKind::Bool
///     }
///
///     fn read_entity(&self, kind: ScalarKind, raw: &str) -> Result<Scalar, ConvertError> {
///         match raw {
///             "yes" => Ok(Scalar::Bool(true)),
///             "no" => Ok(Scalar::Bool(false)),
///             _ => Err(ConvertError::new(kind, raw, "expected yes or no")),
///         }
///     }
///
///     fn write_entity(&self, kind: ScalarKind, value: &Scalar) -> Result<String, ConvertError> {
///         match value {
///             Scalar::Bool(b) => Ok(if *b { "yes" } else { "no" }.to_string()),
///             other => Err(ConvertError::new(kind, format!("{:?}", other), "not a bool")),
///         }
///     }
/// }
/// ```
pub trait Converter: Send + Sync {
    /// Check if this converter handles `kind`.
    fn can_convert(&self, kind: ScalarKind) -> bool;

    /// Parse a stored string.
    fn read_entity(&self, kind: ScalarKind, raw: &str) -> Result<Scalar, ConvertError>;

    /// Render a value for storage.
    fn write_entity(&self, kind: ScalarKind, value: &Scalar) -> Result<String, ConvertError>;
}

/// Strings and unit enum variant names, stored as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringConverter;

impl Converter for StringConverter {
    fn can_convert(&self, kind: ScalarKind) -> bool {
        matches!(kind, ScalarKind::Str | ScalarKind::Variant)
    }

    fn read_entity(&self, _kind: ScalarKind, raw: &str) -> Result<Scalar, ConvertError> {
        Ok(Scalar::Str(raw.to_string()))
    }

    fn write_entity(&self, kind: ScalarKind, value: &Scalar) -> Result<String, ConvertError> {
        match value {
            Scalar::Str(s) => Ok(s.clone()),
            other => Err(ConvertError::mismatch(kind, other)),
        }
    }
}

/// Signed and unsigned integers in decimal notation.
///
/// Range checks against the target width happen when the value is handed
/// to the target type.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerConverter;

impl Converter for IntegerConverter {
    fn can_convert(&self, kind: ScalarKind) -> bool {
        kind.is_signed() || kind.is_unsigned()
    }

    fn read_entity(&self, kind: ScalarKind, raw: &str) -> Result<Scalar, ConvertError> {
        let text = raw.trim();
        if kind.is_unsigned() {
            text.parse::<u64>()
                .map(Scalar::UInt)
                .map_err(|e| ConvertError::new(kind, raw, e))
        } else {
            text.parse::<i64>()
                .map(Scalar::Int)
                .map_err(|e| ConvertError::new(kind, raw, e))
        }
    }

    fn write_entity(&self, kind: ScalarKind, value: &Scalar) -> Result<String, ConvertError> {
        match value {
            Scalar::Int(i) => Ok(i.to_string()),
            Scalar::UInt(u) => Ok(u.to_string()),
            other => Err(ConvertError::mismatch(kind, other)),
        }
    }
}

/// `true`/`false`, read case-insensitively, written lowercase.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanConverter;

impl Converter for BooleanConverter {
    fn can_convert(&self, kind: ScalarKind) -> bool {
        kind == ScalarKind::Bool
    }

    fn read_entity(&self, kind: ScalarKind, raw: &str) -> Result<Scalar, ConvertError> {
        let text = raw.trim();
        if text.eq_ignore_ascii_case("true") {
            Ok(Scalar::Bool(true))
        } else if text.eq_ignore_ascii_case("false") {
            Ok(Scalar::Bool(false))
        } else {
            Err(ConvertError::new(kind, raw, "expected `true` or `false`"))
        }
    }

    fn write_entity(&self, kind: ScalarKind, value: &Scalar) -> Result<String, ConvertError> {
        match value {
            Scalar::Bool(b) => Ok(b.to_string()),
            other => Err(ConvertError::mismatch(kind, other)),
        }
    }
}

/// Floating point numbers.
///
/// Always uses Rust's locale-independent `Display`/`FromStr` forms, which
/// print the shortest text that parses back to the same value.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalConverter;

impl Converter for DecimalConverter {
    fn can_convert(&self, kind: ScalarKind) -> bool {
        matches!(kind, ScalarKind::F32 | ScalarKind::F64)
    }

    fn read_entity(&self, kind: ScalarKind, raw: &str) -> Result<Scalar, ConvertError> {
        let text = raw.trim();
        let parsed = if kind == ScalarKind::F32 {
            text.parse::<f32>().map(f64::from)
        } else {
            text.parse::<f64>()
        };
        parsed
            .map(Scalar::Float)
            .map_err(|e| ConvertError::new(kind, raw, e))
    }

    fn write_entity(&self, kind: ScalarKind, value: &Scalar) -> Result<String, ConvertError> {
        match value {
            Scalar::Float(f) if kind == ScalarKind::F32 => Ok((*f as f32).to_string()),
            Scalar::Float(f) => Ok(f.to_string()),
            other => Err(ConvertError::mismatch(kind, other)),
        }
    }
}

/// A single character.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharConverter;

impl Converter for CharConverter {
    fn can_convert(&self, kind: ScalarKind) -> bool {
        kind == ScalarKind::Char
    }

    fn read_entity(&self, kind: ScalarKind, raw: &str) -> Result<Scalar, ConvertError> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Scalar::Char(c)),
            _ => Err(ConvertError::new(kind, raw, "expected exactly one character")),
        }
    }

    fn write_entity(&self, kind: ScalarKind, value: &Scalar) -> Result<String, ConvertError> {
        match value {
            Scalar::Char(c) => Ok(c.to_string()),
            other => Err(ConvertError::mismatch(kind, other)),
        }
    }
}

/// Byte strings, stored as standard base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesConverter;

impl Converter for BytesConverter {
    fn can_convert(&self, kind: ScalarKind) -> bool {
        kind == ScalarKind::Bytes
    }

    fn read_entity(&self, kind: ScalarKind, raw: &str) -> Result<Scalar, ConvertError> {
        base64::engine::general_purpose::STANDARD
            .decode(raw.trim())
            .map(Scalar::Bytes)
            .map_err(|e| ConvertError::new(kind, raw, e))
    }

    fn write_entity(&self, kind: ScalarKind, value: &Scalar) -> Result<String, ConvertError> {
        match value {
            Scalar::Bytes(b) => Ok(base64::engine::general_purpose::STANDARD.encode(b)),
            other => Err(ConvertError::mismatch(kind, other)),
        }
    }
}

/// An ordered set of converters.
///
/// Lookups return the first converter whose `can_convert` accepts the kind,
/// so converters added with [`register`](Self::register) take precedence
/// over the defaults.
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: Vec<Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            converters: Vec::new(),
        }
    }

    /// Create a registry holding the built-in converters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.push(StringConverter);
        registry.push(IntegerConverter);
        registry.push(BooleanConverter);
        registry.push(DecimalConverter);
        registry.push(CharConverter);
        registry.push(BytesConverter);
        registry
    }

    /// Add a converter ahead of every existing one.
    pub fn register(&mut self, converter: impl Converter + 'static) {
        self.converters.insert(0, Arc::new(converter));
    }

    /// Add a converter behind every existing one.
    pub fn push(&mut self, converter: impl Converter + 'static) {
        self.converters.push(Arc::new(converter));
    }

    /// Number of registered converters.
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// True if no converter is registered.
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// The first converter that handles `kind`.
    pub fn find(&self, kind: ScalarKind) -> Option<&dyn Converter> {
        self.converters
            .iter()
            .find(|c| c.can_convert(kind))
            .map(|c| c.as_ref())
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converters.len())
            .finish()
    }
}
