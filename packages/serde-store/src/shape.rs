//! The static shape of a type, traced through its `Deserialize` impl.
//!
//! A `None` carries no type information through serde, yet what gets
//! stored for it depends on what the `Some` payload would have been: a
//! nullable primitive stores an empty string, a null composite or
//! collection stores nothing. Both directions trace the target type once
//! and carry the resulting [`Shape`] alongside the key.

use serde::de::value::StrDeserializer;
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, Visitor};

use crate::converter::ScalarKind;
use crate::Error;

/// Recursive types are traced this many levels deep.
const MAX_DEPTH: usize = 16;

static UNKNOWN: Shape = Shape::Unknown;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Shape {
    /// Not traced, or driven by `deserialize_any`.
    Unknown,
    Scalar(ScalarKind),
    Option(Box<Shape>),
    /// One entry per tuple position; a sequence has a single entry shared
    /// by every element.
    Seq(Vec<Shape>),
    Map(Box<Shape>),
    Struct(Vec<(&'static str, Shape)>),
}

impl Shape {
    /// Trace `T`. Whatever was traced before a failure is kept; the rest
    /// stays [`Shape::Unknown`].
    pub(crate) fn of<T: DeserializeOwned>() -> Shape {
        let mut shape = Shape::Unknown;
        if let Err(error) = T::deserialize(Tracer {
            slot: &mut shape,
            depth: 0,
        }) {
            tracing::trace!(ty = std::any::type_name::<T>(), %error, "shape traced partially");
        }
        shape
    }

    pub(crate) fn option_inner(&self) -> &Shape {
        match self {
            Shape::Option(inner) => &**inner,
            _ => &UNKNOWN,
        }
    }

    pub(crate) fn element(&self, index: usize) -> &Shape {
        match self {
            Shape::Seq(items) => items.get(index).or(items.last()).unwrap_or(&UNKNOWN),
            _ => &UNKNOWN,
        }
    }

    pub(crate) fn value(&self) -> &Shape {
        match self {
            Shape::Map(value) => &**value,
            _ => &UNKNOWN,
        }
    }

    pub(crate) fn field(&self, name: &str) -> &Shape {
        match self {
            Shape::Struct(members) => members
                .iter()
                .find(|(member, _)| *member == name)
                .map_or(&UNKNOWN, |(_, shape)| shape),
            _ => &UNKNOWN,
        }
    }

    /// Whether a stored empty string reads as "no value" for this shape.
    pub(crate) fn empty_is_none(&self) -> bool {
        match self {
            Shape::Scalar(kind) => kind.empty_is_none(),
            _ => true,
        }
    }
}

fn too_deep() -> Error {
    Error::Custom("type nests too deeply to trace".to_string())
}

/// Produces a placeholder value for every request and records what was
/// requested into `slot`.
struct Tracer<'s> {
    slot: &'s mut Shape,
    depth: usize,
}

macro_rules! trace_scalar {
    ($($method:ident => $kind:ident, $visit:ident($value:expr),)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
                *self.slot = Shape::Scalar(ScalarKind::$kind);
                visitor.$visit($value)
            }
        )*
    };
}

impl<'de, 's> de::Deserializer<'de> for Tracer<'s> {
    type Error = Error;

    trace_scalar! {
        deserialize_bool => Bool, visit_bool(false),
        deserialize_i8 => I8, visit_i8(0),
        deserialize_i16 => I16, visit_i16(0),
        deserialize_i32 => I32, visit_i32(0),
        deserialize_i64 => I64, visit_i64(0),
        deserialize_u8 => U8, visit_u8(0),
        deserialize_u16 => U16, visit_u16(0),
        deserialize_u32 => U32, visit_u32(0),
        deserialize_u64 => U64, visit_u64(0),
        deserialize_f32 => F32, visit_f32(0.0),
        deserialize_f64 => F64, visit_f64(0.0),
        deserialize_char => Char, visit_char('\0'),
        deserialize_str => Str, visit_str(""),
        deserialize_string => Str, visit_string(String::new()),
        deserialize_identifier => Str, visit_str(""),
        deserialize_bytes => Bytes, visit_bytes(&[]),
        deserialize_byte_buf => Bytes, visit_byte_buf(Vec::new()),
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        *self.slot = Shape::Unknown;
        visitor.visit_unit()
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let depth = self.depth + 1;
        let mut inner = Shape::Unknown;
        let result = if depth > MAX_DEPTH {
            visitor.visit_none()
        } else {
            visitor.visit_some(Tracer {
                slot: &mut inner,
                depth,
            })
        };
        *self.slot = Shape::Option(Box::new(inner));
        result
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        *self.slot = Shape::Unknown;
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let depth = self.depth + 1;
        // One element is enough to learn the element shape; none once too deep.
        let mut items = vec![Shape::Unknown; usize::from(depth <= MAX_DEPTH)];
        let result = visitor.visit_seq(SeqTracer {
            items: items.iter_mut(),
            depth,
        });
        *self.slot = Shape::Seq(items);
        result
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, Error> {
        let depth = self.depth + 1;
        if depth > MAX_DEPTH {
            return Err(too_deep());
        }
        let mut items = vec![Shape::Unknown; len];
        let result = visitor.visit_seq(SeqTracer {
            items: items.iter_mut(),
            depth,
        });
        *self.slot = Shape::Seq(items);
        result
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let depth = self.depth + 1;
        let mut value = Shape::Unknown;
        let result = visitor.visit_map(MapTracer {
            key: Shape::Unknown,
            value: (depth <= MAX_DEPTH).then_some(&mut value),
            key_given: false,
            depth,
        });
        *self.slot = Shape::Map(Box::new(value));
        result
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        let depth = self.depth + 1;
        let mut members: Vec<(&'static str, Shape)> =
            fields.iter().map(|name| (*name, Shape::Unknown)).collect();
        let result = if depth > MAX_DEPTH {
            Err(too_deep())
        } else {
            visitor.visit_map(StructTracer {
                members: members.iter_mut(),
                pending: None,
                depth,
            })
        };
        *self.slot = Shape::Struct(members);
        result
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        *self.slot = Shape::Scalar(ScalarKind::Variant);
        let first = variants
            .first()
            .ok_or_else(|| Error::Custom("enum has no variants".to_string()))?;
        let access: StrDeserializer<Error> = (*first).into_deserializer();
        visitor.visit_enum(access)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }
}

struct SeqTracer<'x> {
    items: std::slice::IterMut<'x, Shape>,
    depth: usize,
}

impl<'de, 'x> de::SeqAccess<'de> for SeqTracer<'x> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Error> {
        match self.items.next() {
            Some(slot) => seed
                .deserialize(Tracer {
                    slot,
                    depth: self.depth,
                })
                .map(Some),
            None => Ok(None),
        }
    }
}

/// A single entry; the key's shape is discarded.
struct MapTracer<'x> {
    key: Shape,
    value: Option<&'x mut Shape>,
    key_given: bool,
    depth: usize,
}

impl<'de, 'x> de::MapAccess<'de> for MapTracer<'x> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Error> {
        if self.key_given || self.value.is_none() {
            return Ok(None);
        }
        self.key_given = true;
        seed.deserialize(Tracer {
            slot: &mut self.key,
            depth: self.depth,
        })
        .map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Error> {
        let slot = self
            .value
            .take()
            .ok_or_else(|| Error::Custom("map value requested before its key".to_string()))?;
        seed.deserialize(Tracer {
            slot,
            depth: self.depth,
        })
    }
}

struct StructTracer<'x> {
    members: std::slice::IterMut<'x, (&'static str, Shape)>,
    pending: Option<&'x mut Shape>,
    depth: usize,
}

impl<'de, 'x> de::MapAccess<'de> for StructTracer<'x> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Error> {
        let Some((name, slot)) = self.members.next() else {
            return Ok(None);
        };
        self.pending = Some(slot);
        let field: StrDeserializer<Error> = (*name).into_deserializer();
        seed.deserialize(field).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Error> {
        let slot = self
            .pending
            .take()
            .ok_or_else(|| Error::Custom("member value requested before its name".to_string()))?;
        seed.deserialize(Tracer {
            slot,
            depth: self.depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Inner {
        host: String,
    }

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Outer {
        name: String,
        inner: Option<Inner>,
        limit: Option<u32>,
        alias: Option<String>,
        tags: Vec<Option<u8>>,
        by_name: BTreeMap<String, Inner>,
    }

    #[test]
    fn traces_members_and_options() {
        let shape = Shape::of::<Outer>();

        assert_eq!(shape.field("name"), &Shape::Scalar(ScalarKind::Str));
        assert!(matches!(shape.field("inner").option_inner(), Shape::Struct(_)));
        assert_eq!(
            shape.field("limit").option_inner(),
            &Shape::Scalar(ScalarKind::U32)
        );
        assert!(!shape.field("alias").option_inner().empty_is_none());
        assert_eq!(
            shape.field("tags").element(7).option_inner(),
            &Shape::Scalar(ScalarKind::U8)
        );
        assert_eq!(
            shape.field("by_name").value().field("host"),
            &Shape::Scalar(ScalarKind::Str)
        );
        assert_eq!(shape.field("missing"), &Shape::Unknown);
    }

    #[test]
    fn tuples_keep_each_position() {
        let shape = Shape::of::<(bool, Option<i64>)>();
        assert_eq!(shape.element(0), &Shape::Scalar(ScalarKind::Bool));
        assert_eq!(
            shape.element(1).option_inner(),
            &Shape::Scalar(ScalarKind::I64)
        );
    }

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Node {
        label: String,
        next: Option<Box<Node>>,
        children: Vec<Node>,
    }

    #[test]
    fn recursive_types_terminate() {
        let shape = Shape::of::<Node>();
        assert_eq!(shape.field("label"), &Shape::Scalar(ScalarKind::Str));
        assert!(matches!(
            shape.field("next").option_inner().field("next"),
            Shape::Option(_)
        ));
    }

    #[test]
    fn dynamic_targets_are_unknown() {
        assert_eq!(Shape::of::<serde_json::Value>(), Shape::Unknown);
        assert!(Shape::Unknown.empty_is_none());
    }
}
