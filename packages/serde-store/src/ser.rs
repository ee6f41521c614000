//! The write path: a serde `Serializer` that flattens a value into entities
//! under a key.
//!
//! Collections and composites first delete whatever is stored under their
//! prefix, then write their parts one key at a time. The caller owns the
//! transaction; nothing here commits or rolls back.
//!
//! What a `None` stores depends on the payload type, taken from the traced
//! [`Shape`] of `T`:
//! - a primitive payload stores "no value" at the key: an empty string, or
//!   a null entity for text and bytes
//! - a composite or collection payload deletes everything beneath the key;
//!   only at the top-level key does it also leave a null entity behind

use flatstruct_core_store::{key, Store};
use serde::de::DeserializeOwned;
use serde::ser::{self, Impossible, Serialize};

use crate::config::Configuration;
use crate::converter::{Scalar, ScalarKind};
use crate::shape::Shape;
use crate::Error;

/// Flatten `value` into the store under `key`.
pub fn to_store<S, T>(
    store: &mut S,
    config: &dyn Configuration,
    key: &str,
    value: &T,
) -> Result<(), Error>
where
    S: Store + ?Sized,
    T: Serialize + DeserializeOwned,
{
    let shape = Shape::of::<T>();
    value.serialize(KeySerializer {
        store,
        config,
        key: key.to_string(),
        shape: &shape,
        top: true,
    })
}

/// Delete every entity under `prefix`. Returns how many were removed.
pub(crate) fn delete_under<S: Store + ?Sized>(store: &mut S, prefix: &str) -> Result<usize, Error> {
    let mut deleted = 0;
    for entity in store.get_entities(prefix)? {
        if store.delete_entity(&entity)? {
            deleted += 1;
        }
    }
    if deleted > 0 {
        tracing::trace!(prefix, deleted, "deleted descendants");
    }
    Ok(deleted)
}

fn render(
    config: &dyn Configuration,
    key: &str,
    kind: ScalarKind,
    scalar: Scalar,
) -> Result<String, Error> {
    let converter = config
        .converters()
        .find(kind)
        .ok_or(Error::NoConverter(kind))?;
    converter
        .write_entity(kind, &scalar)
        .map_err(|source| Error::Conversion {
            key: key.to_string(),
            source,
        })
}

struct KeySerializer<'a, S: Store + ?Sized> {
    store: &'a mut S,
    config: &'a dyn Configuration,
    key: String,
    shape: &'a Shape,
    top: bool,
}

impl<'a, S: Store + ?Sized> KeySerializer<'a, S> {
    fn upsert(self, value: Option<String>) -> Result<(), Error> {
        let mut entity = match self.store.get_entity(&self.key)? {
            Some(existing) => existing,
            None => {
                let mut created = self.store.create_entity();
                created.key = self.key;
                created
            }
        };
        entity.value = value;
        self.store.upsert_entity(entity)?;
        Ok(())
    }

    fn scalar(self, kind: ScalarKind, scalar: Scalar) -> Result<(), Error> {
        let raw = render(self.config, &self.key, kind, scalar)?;
        self.upsert(Some(raw))
    }

    /// Null composite or collection: drop the subtree. The top-level key
    /// keeps a null entity.
    fn clear(self) -> Result<(), Error> {
        delete_under(&mut *self.store, &key::members_prefix(&self.key))?;
        delete_under(&mut *self.store, &key::indices_prefix(&self.key))?;
        if self.top {
            return self.upsert(None);
        }
        Ok(())
    }

    fn sequence(self) -> Result<SeqWriter<'a, S>, Error> {
        delete_under(&mut *self.store, &key::indices_prefix(&self.key))?;
        Ok(SeqWriter {
            store: self.store,
            config: self.config,
            key: self.key,
            shape: self.shape,
            next: 0,
        })
    }
}

impl<'a, S: Store + ?Sized> ser::Serializer for KeySerializer<'a, S> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = SeqWriter<'a, S>;
    type SerializeTuple = SeqWriter<'a, S>;
    type SerializeTupleStruct = SeqWriter<'a, S>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = MapWriter<'a, S>;
    type SerializeStruct = StructWriter<'a, S>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn serialize_bool(self, v: bool) -> Result<(), Error> {
        self.scalar(ScalarKind::Bool, Scalar::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<(), Error> {
        self.scalar(ScalarKind::I8, Scalar::Int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<(), Error> {
        self.scalar(ScalarKind::I16, Scalar::Int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<(), Error> {
        self.scalar(ScalarKind::I32, Scalar::Int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<(), Error> {
        self.scalar(ScalarKind::I64, Scalar::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<(), Error> {
        self.scalar(ScalarKind::U8, Scalar::UInt(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<(), Error> {
        self.scalar(ScalarKind::U16, Scalar::UInt(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<(), Error> {
        self.scalar(ScalarKind::U32, Scalar::UInt(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<(), Error> {
        self.scalar(ScalarKind::U64, Scalar::UInt(v))
    }

    fn serialize_f32(self, v: f32) -> Result<(), Error> {
        self.scalar(ScalarKind::F32, Scalar::Float(v.into()))
    }

    fn serialize_f64(self, v: f64) -> Result<(), Error> {
        self.scalar(ScalarKind::F64, Scalar::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<(), Error> {
        self.scalar(ScalarKind::Char, Scalar::Char(v))
    }

    fn serialize_str(self, v: &str) -> Result<(), Error> {
        self.scalar(ScalarKind::Str, Scalar::Str(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), Error> {
        self.scalar(ScalarKind::Bytes, Scalar::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<(), Error> {
        let shape: &'a Shape = self.shape;
        match shape.option_inner() {
            Shape::Scalar(kind) if kind.empty_is_none() => self.upsert(Some(String::new())),
            Shape::Scalar(_) => self.upsert(None),
            _ => self.clear(),
        }
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), Error> {
        let shape: &'a Shape = self.shape;
        value.serialize(KeySerializer {
            shape: shape.option_inner(),
            ..self
        })
    }

    fn serialize_unit(self) -> Result<(), Error> {
        self.clear()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), Error> {
        self.clear()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<(), Error> {
        self.scalar(ScalarKind::Variant, Scalar::Str(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _index: u32,
        variant: &'static str,
        _value: &T,
    ) -> Result<(), Error> {
        Err(Error::Unsupported(format!(
            "enum variant {}::{} carries data",
            name, variant
        )))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqWriter<'a, S>, Error> {
        self.sequence()
    }

    fn serialize_tuple(self, _len: usize) -> Result<SeqWriter<'a, S>, Error> {
        self.sequence()
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<SeqWriter<'a, S>, Error> {
        self.sequence()
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Error> {
        Err(Error::Unsupported(format!(
            "enum variant {}::{} carries data",
            name, variant
        )))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapWriter<'a, S>, Error> {
        delete_under(&mut *self.store, &key::indices_prefix(&self.key))?;
        Ok(MapWriter {
            store: self.store,
            config: self.config,
            key: self.key,
            shape: self.shape,
            pending: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<StructWriter<'a, S>, Error> {
        delete_under(&mut *self.store, &key::members_prefix(&self.key))?;
        Ok(StructWriter {
            store: self.store,
            config: self.config,
            key: self.key,
            shape: self.shape,
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Error> {
        Err(Error::Unsupported(format!(
            "enum variant {}::{} carries data",
            name, variant
        )))
    }
}

/// Writes elements at `key[0]`, `key[1]`, ...
struct SeqWriter<'a, S: Store + ?Sized> {
    store: &'a mut S,
    config: &'a dyn Configuration,
    key: String,
    shape: &'a Shape,
    next: usize,
}

impl<'a, S: Store + ?Sized> SeqWriter<'a, S> {
    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let key = key::index(&self.key, self.next);
        let shape = self.shape.element(self.next);
        self.next += 1;
        value.serialize(KeySerializer {
            store: &mut *self.store,
            config: self.config,
            key,
            shape,
            top: false,
        })
    }
}

impl<'a, S: Store + ?Sized> ser::SerializeSeq for SeqWriter<'a, S> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.element(value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

impl<'a, S: Store + ?Sized> ser::SerializeTuple for SeqWriter<'a, S> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.element(value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

impl<'a, S: Store + ?Sized> ser::SerializeTupleStruct for SeqWriter<'a, S> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.element(value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

/// Writes each value at `key[mapKey]`.
struct MapWriter<'a, S: Store + ?Sized> {
    store: &'a mut S,
    config: &'a dyn Configuration,
    key: String,
    shape: &'a Shape,
    pending: Option<String>,
}

impl<'a, S: Store + ?Sized> ser::SerializeMap for MapWriter<'a, S> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, map_key: &T) -> Result<(), Error> {
        let text = map_key.serialize(MapKeySerializer {
            config: self.config,
            key: &self.key,
        })?;
        if !key::is_balanced(&text) {
            return Err(Error::InvalidMapKey(text));
        }
        self.pending = Some(text);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let map_key = self
            .pending
            .take()
            .ok_or_else(|| Error::Custom("map value serialized before its key".to_string()))?;
        value.serialize(KeySerializer {
            store: &mut *self.store,
            config: self.config,
            key: key::index(&self.key, map_key),
            shape: self.shape.value(),
            top: false,
        })
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

/// Writes each member at `key.member`.
struct StructWriter<'a, S: Store + ?Sized> {
    store: &'a mut S,
    config: &'a dyn Configuration,
    key: String,
    shape: &'a Shape,
}

impl<'a, S: Store + ?Sized> ser::SerializeStruct for StructWriter<'a, S> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        value.serialize(KeySerializer {
            store: &mut *self.store,
            config: self.config,
            key: key::member(&self.key, name),
            shape: self.shape.field(name),
            top: false,
        })
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

/// Renders a map key to the text placed between brackets.
struct MapKeySerializer<'a> {
    config: &'a dyn Configuration,
    key: &'a str,
}

impl<'a> MapKeySerializer<'a> {
    fn scalar(self, kind: ScalarKind, scalar: Scalar) -> Result<String, Error> {
        render(self.config, self.key, kind, scalar)
    }

    fn unsupported(what: &str) -> Error {
        Error::Unsupported(format!("{} as a map key", what))
    }
}

impl<'a> ser::Serializer for MapKeySerializer<'a> {
    type Ok = String;
    type Error = Error;

    type SerializeSeq = Impossible<String, Error>;
    type SerializeTuple = Impossible<String, Error>;
    type SerializeTupleStruct = Impossible<String, Error>;
    type SerializeTupleVariant = Impossible<String, Error>;
    type SerializeMap = Impossible<String, Error>;
    type SerializeStruct = Impossible<String, Error>;
    type SerializeStructVariant = Impossible<String, Error>;

    fn serialize_bool(self, v: bool) -> Result<String, Error> {
        self.scalar(ScalarKind::Bool, Scalar::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<String, Error> {
        self.scalar(ScalarKind::I8, Scalar::Int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<String, Error> {
        self.scalar(ScalarKind::I16, Scalar::Int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<String, Error> {
        self.scalar(ScalarKind::I32, Scalar::Int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<String, Error> {
        self.scalar(ScalarKind::I64, Scalar::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<String, Error> {
        self.scalar(ScalarKind::U8, Scalar::UInt(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<String, Error> {
        self.scalar(ScalarKind::U16, Scalar::UInt(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<String, Error> {
        self.scalar(ScalarKind::U32, Scalar::UInt(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<String, Error> {
        self.scalar(ScalarKind::U64, Scalar::UInt(v))
    }

    fn serialize_f32(self, v: f32) -> Result<String, Error> {
        self.scalar(ScalarKind::F32, Scalar::Float(v.into()))
    }

    fn serialize_f64(self, v: f64) -> Result<String, Error> {
        self.scalar(ScalarKind::F64, Scalar::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<String, Error> {
        self.scalar(ScalarKind::Char, Scalar::Char(v))
    }

    fn serialize_str(self, v: &str) -> Result<String, Error> {
        self.scalar(ScalarKind::Str, Scalar::Str(v.to_string()))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, Error> {
        Err(Self::unsupported("bytes"))
    }

    fn serialize_none(self) -> Result<String, Error> {
        Err(Self::unsupported("none"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<String, Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<String, Error> {
        Err(Self::unsupported("unit"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<String, Error> {
        Err(Self::unsupported(name))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String, Error> {
        self.scalar(ScalarKind::Variant, Scalar::Str(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _value: &T,
    ) -> Result<String, Error> {
        Err(Self::unsupported(variant))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Error> {
        Err(Self::unsupported("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Error> {
        Err(Self::unsupported("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Error> {
        Err(Self::unsupported(name))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Error> {
        Err(Self::unsupported(variant))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Error> {
        Err(Self::unsupported("map"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Error> {
        Err(Self::unsupported(name))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Error> {
        Err(Self::unsupported(variant))
    }
}
