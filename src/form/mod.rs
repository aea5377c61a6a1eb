//! Form value parsing and typed targets.
//!
//! A form value is a string field taken from the query string, a URL-encoded
//! body or the text parts of a multipart body. [`FormTarget`] names the closed
//! set of kinds a field can be converted into:
//!
//! 1. a type with a textual parsing capability ([`UnmarshalText`]),
//! 2. one of the fixed kinds: `String`, comma-separated `Vec<String>`,
//!    `isize`, `i64`, `u64`, `bool`,
//! 3. anything else is a programming error and panics.
//!
//! # Example
//!
//! ```rust,ignore
//! use httputil::form::FormTarget;
//!
//! let mut limit: i64 = 20;
//! let mut tags: Vec<String> = Vec::new();
//! let mut since = Timestamp::default(); // implements UnmarshalText
//!
//! ctx.decode_form("limit", &mut limit)?;
//! ctx.decode_form("tags", &mut tags)?;
//! ctx.decode_form("since", FormTarget::text(&mut since))?;
//! ```

mod multipart;
mod parser;

use std::any::Any;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::core::BoxError;

pub use multipart::parse_multipart;
pub use parser::{form_decode, parse_urlencoded};

/// Ordered multi-map of form values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    pairs: Vec<(String, String)>,
}

impl FormValues {
    /// Create an empty set with room for `capacity` pairs.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pairs: Vec::with_capacity(capacity),
        }
    }

    /// Append a pair.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Append every pair of `other` after the existing ones.
    pub fn extend(&mut self, other: FormValues) {
        self.pairs.extend(other.pairs);
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Capability for types that parse themselves from raw text.
pub trait UnmarshalText {
    /// Replace `self` with the value parsed from `text`.
    fn unmarshal_text(&mut self, text: &str) -> Result<(), BoxError>;
}

impl<T: UnmarshalText + ?Sized> UnmarshalText for &mut T {
    fn unmarshal_text(&mut self, text: &str) -> Result<(), BoxError> {
        (**self).unmarshal_text(text)
    }
}

/// Adapter giving any `FromStr` type the textual capability.
struct ParseInto<'a, T>(&'a mut T);

impl<T> UnmarshalText for ParseInto<'_, T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fn unmarshal_text(&mut self, text: &str) -> Result<(), BoxError> {
        *self.0 = text.parse()?;
        Ok(())
    }
}

/// Destination of a form field conversion.
pub enum FormTarget<'a> {
    /// Type with its own textual parser.
    Text(Box<dyn UnmarshalText + 'a>),
    /// Copied verbatim.
    Str(&'a mut String),
    /// Split on `,`.
    List(&'a mut Vec<String>),
    /// Platform-width signed integer.
    Int(&'a mut isize),
    I64(&'a mut i64),
    U64(&'a mut u64),
    Bool(&'a mut bool),
    /// Type-erased value and its type name, resolved against the fixed kinds
    /// at decode time.
    Dynamic(&'a mut dyn Any, &'static str),
}

impl<'a> FormTarget<'a> {
    /// Target a type implementing [`UnmarshalText`].
    pub fn text<T: UnmarshalText + 'a>(target: &'a mut T) -> Self {
        FormTarget::Text(Box::new(target))
    }

    /// Target any `FromStr` type through the textual capability.
    pub fn parse<T>(target: &'a mut T) -> Self
    where
        T: FromStr + 'a,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        FormTarget::Text(Box::new(ParseInto(target)))
    }

    /// Target an erased value.
    ///
    /// Only the fixed kinds can be recognised this way; any other type makes
    /// the conversion panic.
    pub fn dynamic<T: Any>(target: &'a mut T) -> Self {
        FormTarget::Dynamic(target, std::any::type_name::<T>())
    }

    /// Short name of the target kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            FormTarget::Text(_) => "text",
            FormTarget::Str(_) => "string",
            FormTarget::List(_) => "list",
            FormTarget::Int(_) => "isize",
            FormTarget::I64(_) => "i64",
            FormTarget::U64(_) => "u64",
            FormTarget::Bool(_) => "bool",
            FormTarget::Dynamic(..) => "dynamic",
        }
    }

    /// Convert `text` into the target.
    ///
    /// # Panics
    ///
    /// Panics if a `Dynamic` target holds a type outside the fixed kinds. That
    /// is a defect at the call site, not something request data can cause.
    pub fn assign(self, text: &str) -> Result<(), FormValueError> {
        match self {
            FormTarget::Text(mut target) => target
                .unmarshal_text(text)
                .map_err(FormValueError::Text),
            FormTarget::Str(target) => {
                *target = text.to_string();
                Ok(())
            }
            FormTarget::List(target) => {
                *target = text.split(',').map(str::to_string).collect();
                Ok(())
            }
            FormTarget::Int(target) => {
                *target = text.parse()?;
                Ok(())
            }
            FormTarget::I64(target) => {
                *target = text.parse()?;
                Ok(())
            }
            FormTarget::U64(target) => {
                if text.starts_with('+') {
                    return Err(FormValueError::Sign {
                        text: text.to_string(),
                    });
                }
                *target = text.parse()?;
                Ok(())
            }
            FormTarget::Bool(target) => {
                *target = parse_bool(text)?;
                Ok(())
            }
            FormTarget::Dynamic(target, type_name) => {
                resolve_dynamic(target, type_name).assign(text)
            }
        }
    }
}

/// Map an erased value onto a fixed kind, or fail loudly.
fn resolve_dynamic<'a>(target: &'a mut dyn Any, type_name: &str) -> FormTarget<'a> {
    if target.is::<String>() {
        return FormTarget::Str(downcast(target));
    }
    if target.is::<Vec<String>>() {
        return FormTarget::List(downcast(target));
    }
    if target.is::<isize>() {
        return FormTarget::Int(downcast(target));
    }
    if target.is::<i64>() {
        return FormTarget::I64(downcast(target));
    }
    if target.is::<u64>() {
        return FormTarget::U64(downcast(target));
    }
    if target.is::<bool>() {
        return FormTarget::Bool(downcast(target));
    }
    panic!("unsupported form target type {}", type_name);
}

fn downcast<T: 'static>(target: &mut dyn Any) -> &mut T {
    match target.downcast_mut::<T>() {
        Some(value) => value,
        None => unreachable!("type checked before downcast"),
    }
}

impl<'a> From<&'a mut String> for FormTarget<'a> {
    fn from(target: &'a mut String) -> Self {
        FormTarget::Str(target)
    }
}

impl<'a> From<&'a mut Vec<String>> for FormTarget<'a> {
    fn from(target: &'a mut Vec<String>) -> Self {
        FormTarget::List(target)
    }
}

impl<'a> From<&'a mut isize> for FormTarget<'a> {
    fn from(target: &'a mut isize) -> Self {
        FormTarget::Int(target)
    }
}

impl<'a> From<&'a mut i64> for FormTarget<'a> {
    fn from(target: &'a mut i64) -> Self {
        FormTarget::I64(target)
    }
}

impl<'a> From<&'a mut u64> for FormTarget<'a> {
    fn from(target: &'a mut u64) -> Self {
        FormTarget::U64(target)
    }
}

impl<'a> From<&'a mut bool> for FormTarget<'a> {
    fn from(target: &'a mut bool) -> Self {
        FormTarget::Bool(target)
    }
}

impl fmt::Debug for FormTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormTarget::{}", self.kind())
    }
}

/// Parse the boolean spellings accepted in form fields.
pub fn parse_bool(text: &str) -> Result<bool, FormValueError> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(FormValueError::Bool {
            text: text.to_string(),
        }),
    }
}

/// Failure converting form text into a target kind.
#[derive(Debug)]
pub enum FormValueError {
    /// Malformed or out-of-range integer.
    Int(ParseIntError),
    /// Sign on an unsigned integer.
    Sign { text: String },
    /// Unrecognised boolean spelling.
    Bool { text: String },
    /// Error from a textual capability.
    Text(BoxError),
}

impl fmt::Display for FormValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormValueError::Int(e) => write!(f, "invalid integer: {}", e),
            FormValueError::Sign { text } => write!(f, "invalid unsigned integer {:?}", text),
            FormValueError::Bool { text } => write!(f, "invalid boolean {:?}", text),
            FormValueError::Text(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FormValueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormValueError::Int(e) => Some(e),
            FormValueError::Text(e) => Some(e.as_ref()),
            FormValueError::Sign { .. } | FormValueError::Bool { .. } => None,
        }
    }
}

impl From<ParseIntError> for FormValueError {
    fn from(e: ParseIntError) -> Self {
        FormValueError::Int(e)
    }
}
