//! JSON body encoding.

use std::fmt;

use serde::ser::{self, Impossible, Serialize, Serializer};
use serde_json::ser::PrettyFormatter;

/// Top-level shape of a serializable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Sequence with a known length.
    Seq(usize),
    /// Mapping with a known length.
    Map(usize),
    /// Anything else, including sequences of unknown length.
    Other,
}

/// Inspect the top-level shape of `value` without serializing it.
///
/// `Option::Some` is looked through. Only the outermost container is
/// inspected; the probe stops as soon as it is known.
pub fn shape_of<T: Serialize + ?Sized>(value: &T) -> Shape {
    match value.serialize(ShapeProbe) {
        Ok(shape) | Err(Probe::Found(shape)) => shape,
        Err(Probe::Custom) => Shape::Other,
    }
}

/// Serialize `value` as tab-indented JSON followed by a newline.
///
/// Empty top-level sequences and mappings are written as the literal `[]` and
/// `{}` tokens.
pub fn to_body<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    match shape_of(value) {
        Shape::Seq(0) => return Ok(b"[]\n".to_vec()),
        Shape::Map(0) => return Ok(b"{}\n".to_vec()),
        _ => {}
    }

    let mut buf = Vec::with_capacity(128);
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Serializer that only reports what the outermost value is.
///
/// Compound serializers never get constructed: the shape travels back through
/// the error channel as soon as a container begins.
struct ShapeProbe;

#[derive(Debug)]
enum Probe {
    Found(Shape),
    Custom,
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Found(shape) => write!(f, "shape {:?}", shape),
            Probe::Custom => f.write_str("probe failed"),
        }
    }
}

impl std::error::Error for Probe {}

impl ser::Error for Probe {
    fn custom<T: fmt::Display>(_msg: T) -> Self {
        Probe::Custom
    }
}

type Done = Result<Shape, Probe>;

fn seq(len: Option<usize>) -> Probe {
    Probe::Found(len.map_or(Shape::Other, Shape::Seq))
}

fn map(len: Option<usize>) -> Probe {
    Probe::Found(len.map_or(Shape::Other, Shape::Map))
}

impl Serializer for ShapeProbe {
    type Ok = Shape;
    type Error = Probe;
    type SerializeSeq = Impossible<Shape, Probe>;
    type SerializeTuple = Impossible<Shape, Probe>;
    type SerializeTupleStruct = Impossible<Shape, Probe>;
    type SerializeTupleVariant = Impossible<Shape, Probe>;
    type SerializeMap = Impossible<Shape, Probe>;
    type SerializeStruct = Impossible<Shape, Probe>;
    type SerializeStructVariant = Impossible<Shape, Probe>;

    fn serialize_bool(self, _v: bool) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_i8(self, _v: i8) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_i16(self, _v: i16) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_i32(self, _v: i32) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_i64(self, _v: i64) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_u8(self, _v: u8) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_u16(self, _v: u16) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_u32(self, _v: u32) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_u64(self, _v: u64) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_f32(self, _v: f32) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_f64(self, _v: f64) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_char(self, _v: char) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_str(self, _v: &str) -> Done {
        Ok(Shape::Other)
    }

    // serde_json writes bytes as an array of numbers
    fn serialize_bytes(self, v: &[u8]) -> Done {
        Ok(Shape::Seq(v.len()))
    }

    fn serialize_none(self) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Done {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Done {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Done {
        Ok(Shape::Other)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Probe> {
        Err(seq(len))
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Probe> {
        Err(seq(Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Probe> {
        Err(seq(Some(len)))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Probe> {
        Err(Probe::Found(Shape::Other))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Probe> {
        Err(map(len))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Probe> {
        Err(Probe::Found(Shape::Other))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Probe> {
        Err(Probe::Found(Shape::Other))
    }
}
