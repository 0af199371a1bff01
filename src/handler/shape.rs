//! Registration-time inspection of a request type's serde shape.
//!
//! A probing deserializer records which `deserialize_*` entry point the type
//! asks for and stops immediately. Derived structs ask for a struct,
//! `Box<T>` and newtype wrappers forward to their inner type.

use std::fmt;

use serde::de::{self, DeserializeOwned, Visitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Struct,
    Map,
    Other(&'static str),
}

impl Shape {
    pub(crate) fn is_struct_like(&self) -> bool {
        matches!(self, Shape::Struct | Shape::Map)
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Shape::Struct => "a struct",
            Shape::Map => "a map",
            Shape::Other(found) => found,
        }
    }
}

/// Probe the shape `T` deserializes as.
pub(crate) fn probe<T: DeserializeOwned>() -> Shape {
    let mut probe = Probe { found: None };
    let _ = T::deserialize(&mut probe);
    probe.found.unwrap_or(Shape::Other("an unknown type"))
}

struct Probe {
    found: Option<Shape>,
}

impl Probe {
    fn stop<T>(&mut self, shape: Shape) -> Result<T, Stop> {
        self.found.get_or_insert(shape);
        Err(Stop)
    }
}

#[derive(Debug)]
struct Stop;

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("shape probe stopped")
    }
}

impl std::error::Error for Stop {}

impl de::Error for Stop {
    fn custom<T: fmt::Display>(_msg: T) -> Self {
        Stop
    }
}

macro_rules! reject {
    ($($method:ident => $found:literal),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Stop> {
                self.stop(Shape::Other($found))
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for &mut Probe {
    type Error = Stop;

    reject! {
        deserialize_any => "a self-describing type",
        deserialize_bool => "a bool",
        deserialize_i8 => "an integer",
        deserialize_i16 => "an integer",
        deserialize_i32 => "an integer",
        deserialize_i64 => "an integer",
        deserialize_i128 => "an integer",
        deserialize_u8 => "an integer",
        deserialize_u16 => "an integer",
        deserialize_u32 => "an integer",
        deserialize_u64 => "an integer",
        deserialize_u128 => "an integer",
        deserialize_f32 => "a float",
        deserialize_f64 => "a float",
        deserialize_char => "a char",
        deserialize_str => "a string",
        deserialize_string => "a string",
        deserialize_bytes => "bytes",
        deserialize_byte_buf => "bytes",
        deserialize_option => "an option",
        deserialize_unit => "unit",
        deserialize_seq => "a sequence",
        deserialize_identifier => "an identifier",
        deserialize_ignored_any => "an ignored value",
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Stop> {
        self.stop(Shape::Other("a unit struct"))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Stop> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value, Stop> {
        self.stop(Shape::Other("a tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Stop> {
        self.stop(Shape::Other("a tuple struct"))
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Stop> {
        self.stop(Shape::Map)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Stop> {
        self.stop(Shape::Struct)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Stop> {
        self.stop(Shape::Other("an enum"))
    }
}
