//! The read path: a serde `Deserializer` that reconstructs a value from the
//! entities under a key.
//!
//! The target type's `Deserialize` impl drives classification. Primitive
//! requests read the single entity at the key through the converter
//! registry; sequences and maps group the `key[...]` entities by their
//! enclosing index; structs resolve every field at `key.field`.
//!
//! The top-level key reads from the store. Everything below it reads from
//! the snapshot fetched by the enclosing scan, and goes back to the store
//! only when the snapshot has nothing for it and the resolver chain may
//! supply a fallback key.

use std::collections::BTreeSet;

use flatstruct_core_store::key::{self, IndexGroup};
use flatstruct_core_store::{Entity, Store};
use serde::de::value::{StrDeserializer, StringDeserializer};
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, Visitor};

use crate::config::Configuration;
use crate::converter::{Scalar, ScalarKind};
use crate::resolve::resolve_chain;
use crate::shape::Shape;
use crate::Error;

/// Read a `T` from the entities under `key`.
pub fn from_store<T: DeserializeOwned>(
    store: &dyn Store,
    config: &dyn Configuration,
    key: &str,
    use_resolvers: bool,
) -> Result<T, Error> {
    let shape = Shape::of::<T>();
    let ctx = Context {
        store,
        config,
        use_resolvers,
    };
    T::deserialize(KeyDeserializer {
        ctx: &ctx,
        key: key.to_string(),
        source: Source::Store,
        shape: &shape,
    })
}

struct Context<'a> {
    store: &'a dyn Store,
    config: &'a dyn Configuration,
    use_resolvers: bool,
}

#[derive(Clone, Copy)]
enum Source<'a> {
    Store,
    Snapshot(&'a [Entity]),
}

/// Convert a stored string, or produce the zero value when nothing is stored.
fn convert(
    config: &dyn Configuration,
    key: &str,
    kind: ScalarKind,
    raw: Option<&str>,
) -> Result<Scalar, Error> {
    let Some(raw) = raw else {
        return kind.zero().ok_or_else(|| Error::MissingValue {
            key: key.to_string(),
        });
    };

    let converter = config
        .converters()
        .find(kind)
        .ok_or(Error::NoConverter(kind))?;
    converter
        .read_entity(kind, raw)
        .map_err(|source| Error::Conversion {
            key: key.to_string(),
            source,
        })
}

fn visit_scalar<'de, V: Visitor<'de>>(scalar: Scalar, visitor: V) -> Result<V::Value, Error> {
    match scalar {
        Scalar::Bool(b) => visitor.visit_bool(b),
        Scalar::Int(i) => visitor.visit_i64(i),
        Scalar::UInt(u) => visitor.visit_u64(u),
        Scalar::Float(f) => visitor.visit_f64(f),
        Scalar::Char(c) => visitor.visit_char(c),
        Scalar::Str(s) => visitor.visit_string(s),
        Scalar::Bytes(b) => visitor.visit_byte_buf(b),
    }
}

fn visit_variant<'de, V: Visitor<'de>>(scalar: Scalar, visitor: V) -> Result<V::Value, Error> {
    match scalar {
        Scalar::Str(name) => {
            let access: StringDeserializer<Error> = name.into_deserializer();
            visitor.visit_enum(access)
        }
        other => Err(Error::Custom(format!(
            "enum variant converter produced {:?}",
            other
        ))),
    }
}

struct KeyDeserializer<'a> {
    ctx: &'a Context<'a>,
    key: String,
    source: Source<'a>,
    shape: &'a Shape,
}

impl<'a> KeyDeserializer<'a> {
    /// The value stored exactly at the key. Zero or several matches, or a
    /// tombstone, are "no value".
    fn leaf(&self) -> Result<Option<String>, Error> {
        let found = match self.source {
            Source::Store => resolve_chain(
                self.ctx.config,
                &self.key,
                self.ctx.use_resolvers,
                |k| Ok(self.ctx.store.get_entity(k)?),
            )?,
            Source::Snapshot(entities) => {
                let mut matching = entities.iter().filter(|e| e.key == self.key);
                match (matching.next(), matching.next()) {
                    (Some(entity), None) => return Ok(entity.value.clone()),
                    (Some(_), Some(_)) => return Ok(None),
                    (None, _) => self.fallback(|k| Ok(self.ctx.store.get_entity(k)?))?,
                }
            }
        };
        Ok(found.and_then(|(_, entity)| entity.value))
    }

    /// Every entity under `prefix_of(key)`, with keys expressed relative to
    /// the requested key even when an alias satisfied the scan.
    fn scan(&self, prefix_of: fn(&str) -> String) -> Result<Vec<Entity>, Error> {
        let under = |k: &str| -> Result<Option<Vec<Entity>>, Error> {
            let entities = self.ctx.store.get_entities(&prefix_of(k))?;
            Ok((!entities.is_empty()).then_some(entities))
        };
        let found = match self.source {
            Source::Store => {
                resolve_chain(self.ctx.config, &self.key, self.ctx.use_resolvers, under)?
            }
            Source::Snapshot(entities) => {
                let prefix = prefix_of(&self.key);
                let matching: Vec<Entity> = entities
                    .iter()
                    .filter(|e| e.key.starts_with(&prefix))
                    .cloned()
                    .collect();
                if !matching.is_empty() {
                    return Ok(matching);
                }
                self.fallback(under)?
            }
        };
        Ok(match found {
            Some((resolved, entities)) if resolved != self.key => entities
                .into_iter()
                .map(|mut entity| {
                    entity.key = key::rewrite_prefix(&entity.key, &resolved, &self.key);
                    entity
                })
                .collect(),
            Some((_, entities)) => entities,
            None => Vec::new(),
        })
    }

    /// Resolve a nested key the snapshot has nothing for. The key itself is
    /// already known to be missing, so only resolved keys hit the store.
    fn fallback<T>(
        &self,
        mut lookup: impl FnMut(&str) -> Result<Option<T>, Error>,
    ) -> Result<Option<(String, T)>, Error> {
        if !self.ctx.use_resolvers {
            return Ok(None);
        }
        resolve_chain(self.ctx.config, &self.key, true, |k| {
            if k == self.key {
                Ok(None)
            } else {
                lookup(k)
            }
        })
    }

    fn scalar(&self, kind: ScalarKind) -> Result<Scalar, Error> {
        let raw = self.leaf()?;
        convert(self.ctx.config, &self.key, kind, raw.as_deref())
    }

    /// Whether an optional at this key holds a value. An empty string counts
    /// as a value only when the payload is text or bytes.
    fn is_present(&self, payload: &Shape) -> Result<bool, Error> {
        match self.leaf()? {
            Some(v) if !v.is_empty() || !payload.empty_is_none() => return Ok(true),
            _ => {}
        }
        Ok(!self.scan(key::members_prefix)?.is_empty()
            || !self.scan(key::indices_prefix)?.is_empty())
    }
}

macro_rules! deserialize_scalar {
    ($($method:ident => $kind:ident,)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
                visit_scalar(self.scalar(ScalarKind::$kind)?, visitor)
            }
        )*
    };
}

impl<'de, 'a> de::Deserializer<'de> for KeyDeserializer<'a> {
    type Error = Error;

    deserialize_scalar! {
        deserialize_bool => Bool,
        deserialize_i8 => I8,
        deserialize_i16 => I16,
        deserialize_i32 => I32,
        deserialize_i64 => I64,
        deserialize_u8 => U8,
        deserialize_u16 => U16,
        deserialize_u32 => U32,
        deserialize_u64 => U64,
        deserialize_f32 => F32,
        deserialize_f64 => F64,
        deserialize_char => Char,
        deserialize_str => Str,
        deserialize_string => Str,
        deserialize_identifier => Str,
        deserialize_bytes => Bytes,
        deserialize_byte_buf => Bytes,
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        if let Some(raw) = self.leaf()? {
            return visitor.visit_string(raw);
        }

        let members = self.scan(key::members_prefix)?;
        if !members.is_empty() {
            let mut names = BTreeSet::new();
            for entity in &members {
                names.insert(key::member_name(&self.key, &entity.key)?.to_string());
            }
            return visitor.visit_map(StructReader {
                ctx: self.ctx,
                parent: &self.key,
                entities: &members,
                shape: self.shape,
                names: names.into_iter().collect::<Vec<_>>().into_iter(),
                pending: None,
            });
        }

        let indexed = self.scan(key::indices_prefix)?;
        if !indexed.is_empty() {
            let groups = key::index_groups(&self.key, indexed.iter().map(|e| e.key.as_str()))?;
            return if groups.iter().all(|g| g.ordinal().is_some()) {
                visitor.visit_seq(SeqReader {
                    ctx: self.ctx,
                    entities: &indexed,
                    shape: self.shape,
                    groups: groups.into_iter().enumerate(),
                })
            } else {
                visitor.visit_map(MapReader {
                    ctx: self.ctx,
                    entities: &indexed,
                    shape: self.shape,
                    groups: groups.into_iter(),
                    pending: None,
                })
            };
        }

        visitor.visit_unit()
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let shape: &'a Shape = self.shape;
        let payload = shape.option_inner();
        if self.is_present(payload)? {
            visitor.visit_some(KeyDeserializer {
                shape: payload,
                ..self
            })
        } else {
            visitor.visit_none()
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let entities = self.scan(key::indices_prefix)?;
        let groups = key::sequence_groups(&self.key, entities.iter().map(|e| e.key.as_str()))?;
        visitor.visit_seq(SeqReader {
            ctx: self.ctx,
            entities: &entities,
            shape: self.shape,
            groups: groups.into_iter().enumerate(),
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let entities = self.scan(key::indices_prefix)?;
        let groups = key::index_groups(&self.key, entities.iter().map(|e| e.key.as_str()))?;
        visitor.visit_map(MapReader {
            ctx: self.ctx,
            entities: &entities,
            shape: self.shape,
            groups: groups.into_iter(),
            pending: None,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        let entities = self.scan(key::members_prefix)?;
        let names: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        visitor.visit_map(StructReader {
            ctx: self.ctx,
            parent: &self.key,
            entities: &entities,
            shape: self.shape,
            names: names.into_iter(),
            pending: None,
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        let raw = self.leaf()?;
        let variant = convert(self.ctx.config, &self.key, ScalarKind::Variant, raw.as_deref())?;
        visit_variant(variant, visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }
}

/// Elements of a sequence, one per index group.
struct SeqReader<'a> {
    ctx: &'a Context<'a>,
    entities: &'a [Entity],
    shape: &'a Shape,
    groups: std::iter::Enumerate<std::vec::IntoIter<IndexGroup>>,
}

impl<'de, 'a> de::SeqAccess<'de> for SeqReader<'a> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Error> {
        let Some((position, group)) = self.groups.next() else {
            return Ok(None);
        };
        seed.deserialize(KeyDeserializer {
            ctx: self.ctx,
            key: group.key,
            source: Source::Snapshot(self.entities),
            shape: self.shape.element(position),
        })
        .map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.groups.len())
    }
}

/// Entries of a map: the bracket text is the map key.
struct MapReader<'a> {
    ctx: &'a Context<'a>,
    entities: &'a [Entity],
    shape: &'a Shape,
    groups: std::vec::IntoIter<IndexGroup>,
    pending: Option<IndexGroup>,
}

impl<'de, 'a> de::MapAccess<'de> for MapReader<'a> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Error> {
        let Some(group) = self.groups.next() else {
            return Ok(None);
        };
        let map_key = seed.deserialize(MapKeyDeserializer {
            config: self.ctx.config,
            key: &group.key,
            raw: &group.index,
        })?;
        self.pending = Some(group);
        Ok(Some(map_key))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Error> {
        let group = self
            .pending
            .take()
            .ok_or_else(|| Error::Custom("map value requested before its key".to_string()))?;
        seed.deserialize(KeyDeserializer {
            ctx: self.ctx,
            key: group.key,
            source: Source::Snapshot(self.entities),
            shape: self.shape.value(),
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.groups.len())
    }
}

/// Named members of a composite, each resolved at `parent.name`.
struct StructReader<'a> {
    ctx: &'a Context<'a>,
    parent: &'a str,
    entities: &'a [Entity],
    shape: &'a Shape,
    names: std::vec::IntoIter<String>,
    pending: Option<String>,
}

impl<'de, 'a> de::MapAccess<'de> for StructReader<'a> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Error> {
        let Some(name) = self.names.next() else {
            return Ok(None);
        };
        let field: StrDeserializer<Error> = name.as_str().into_deserializer();
        let value = seed.deserialize(field)?;
        self.pending = Some(name);
        Ok(Some(value))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Error> {
        let name = self
            .pending
            .take()
            .ok_or_else(|| Error::Custom("member value requested before its name".to_string()))?;
        seed.deserialize(KeyDeserializer {
            ctx: self.ctx,
            key: key::member(self.parent, &name),
            source: Source::Snapshot(self.entities),
            shape: self.shape.field(&name),
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.names.len())
    }
}

/// Deserializes the bracket text of a map entry as the map's key type.
struct MapKeyDeserializer<'a> {
    config: &'a dyn Configuration,
    key: &'a str,
    raw: &'a str,
}

impl<'a> MapKeyDeserializer<'a> {
    fn scalar(&self, kind: ScalarKind) -> Result<Scalar, Error> {
        convert(self.config, self.key, kind, Some(self.raw))
    }
}

impl<'de, 'a> de::Deserializer<'de> for MapKeyDeserializer<'a> {
    type Error = Error;

    deserialize_scalar! {
        deserialize_bool => Bool,
        deserialize_i8 => I8,
        deserialize_i16 => I16,
        deserialize_i32 => I32,
        deserialize_i64 => I64,
        deserialize_u8 => U8,
        deserialize_u16 => U16,
        deserialize_u32 => U32,
        deserialize_u64 => U64,
        deserialize_f32 => F32,
        deserialize_f64 => F64,
        deserialize_char => Char,
        deserialize_str => Str,
        deserialize_string => Str,
        deserialize_identifier => Str,
        deserialize_bytes => Bytes,
        deserialize_byte_buf => Bytes,
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_string(self.raw.to_string())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        visit_variant(self.scalar(ScalarKind::Variant)?, visitor)
    }

    serde::forward_to_deserialize_any! {
        unit unit_struct seq tuple tuple_struct map struct ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapperConfig;
    use crate::resolve::AliasResolver;
    use flatstruct_stores::InMemoryStore;
    use serde::Deserialize;
    use std::collections::{BTreeMap, HashMap};

    fn store(rows: &[(&str, Option<&str>)]) -> InMemoryStore {
        InMemoryStore::with_entries(
            rows.iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string))),
        )
    }

    fn read<T: DeserializeOwned>(store: &InMemoryStore, key: &str) -> Result<T, Error> {
        from_store(store, &MapperConfig::new(), key, true)
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Endpoint {
        host: String,
        port: u16,
        secure: Option<bool>,
    }

    #[test]
    fn reads_primitives() {
        let s = store(&[
            ("n", Some("42")),
            ("flag", Some("true")),
            ("ratio", Some("0.25")),
            ("name", Some("Ada")),
            ("letter", Some("z")),
        ]);
        assert_eq!(read::<i32>(&s, "n").unwrap(), 42);
        assert_eq!(read::<u64>(&s, "n").unwrap(), 42);
        assert!(read::<bool>(&s, "flag").unwrap());
        assert_eq!(read::<f64>(&s, "ratio").unwrap(), 0.25);
        assert_eq!(read::<String>(&s, "name").unwrap(), "Ada");
        assert_eq!(read::<char>(&s, "letter").unwrap(), 'z');
    }

    #[test]
    fn missing_primitives_are_zero() {
        let s = store(&[("tomb", None)]);
        assert_eq!(read::<i32>(&s, "nothing").unwrap(), 0);
        assert_eq!(read::<String>(&s, "nothing").unwrap(), "");
        assert!(!read::<bool>(&s, "tomb").unwrap());
        assert_eq!(read::<Option<i32>>(&s, "nothing").unwrap(), None);
        assert_eq!(read::<Option<i32>>(&s, "tomb").unwrap(), None);
    }

    #[test]
    fn empty_string_is_none_for_nullable_primitives() {
        let s = store(&[("n", Some(""))]);
        assert_eq!(read::<Option<i32>>(&s, "n").unwrap(), None);
        assert_eq!(read::<Option<bool>>(&s, "n").unwrap(), None);
        assert_eq!(read::<Option<f64>>(&s, "n").unwrap(), None);
        assert_eq!(read::<Option<Endpoint>>(&s, "n").unwrap(), None);
        assert_eq!(read::<String>(&s, "n").unwrap(), "");
    }

    #[test]
    fn empty_string_is_a_value_for_optional_text() {
        let s = store(&[("n", Some("")), ("tomb", None)]);
        assert_eq!(read::<Option<String>>(&s, "n").unwrap(), Some(String::new()));
        assert_eq!(read::<Option<String>>(&s, "tomb").unwrap(), None);
        assert_eq!(read::<Option<String>>(&s, "nothing").unwrap(), None);

        let s = store(&[("svc.host", Some("")), ("svc.secure", Some(""))]);
        #[derive(Debug, PartialEq, Deserialize)]
        struct Labelled {
            host: Option<String>,
            secure: Option<bool>,
        }
        assert_eq!(
            read::<Labelled>(&s, "svc").unwrap(),
            Labelled {
                host: Some(String::new()),
                secure: None,
            }
        );
    }

    #[test]
    fn conversion_failures_propagate() {
        let s = store(&[("n", Some("abc")), ("big", Some("300"))]);
        assert!(matches!(
            read::<i32>(&s, "n"),
            Err(Error::Conversion { ref key, .. }) if key == "n"
        ));
        assert!(read::<u8>(&s, "big").is_err());
    }

    #[test]
    fn reads_composite() {
        let s = store(&[
            ("svc.host", Some("mail.example.com")),
            ("svc.port", Some("587")),
            ("svc.unrelated", Some("ignored")),
        ]);
        let endpoint: Endpoint = read(&s, "svc").unwrap();
        assert_eq!(
            endpoint,
            Endpoint {
                host: "mail.example.com".to_string(),
                port: 587,
                secure: None,
            }
        );
    }

    #[test]
    fn absent_composite_is_none_or_zero() {
        let s = store(&[]);
        assert_eq!(read::<Option<Endpoint>>(&s, "svc").unwrap(), None);
        assert_eq!(
            read::<Endpoint>(&s, "svc").unwrap(),
            Endpoint {
                host: String::new(),
                port: 0,
                secure: None,
            }
        );
    }

    #[test]
    fn sequences_follow_numeric_order() {
        let s = store(&[
            ("list[33]", Some("d")),
            ("list[2]", Some("c")),
            ("list[10]", Some("x")),
            ("list[0]", Some("a")),
            ("list[1]", Some("b")),
        ]);
        let list: Vec<String> = read(&s, "list").unwrap();
        assert_eq!(list, vec!["a", "b", "c", "x", "d"]);
    }

    #[test]
    fn sequence_of_composites_groups_members() {
        let s = store(&[
            ("eps[1].host", Some("b")),
            ("eps[0].host", Some("a")),
            ("eps[0].port", Some("1")),
            ("eps[1].port", Some("2")),
        ]);
        let eps: Vec<Endpoint> = read(&s, "eps").unwrap();
        assert_eq!(eps.len(), 2);
        assert_eq!(eps[0].host, "a");
        assert_eq!(eps[1].port, 2);
    }

    #[test]
    fn non_integer_sequence_index_is_malformed() {
        let s = store(&[("list[zero]", Some("a"))]);
        assert!(matches!(
            read::<Vec<String>>(&s, "list"),
            Err(Error::Key(_))
        ));

        let s = store(&[("list[0", Some("a"))]);
        assert!(matches!(
            read::<Vec<String>>(&s, "list"),
            Err(Error::Key(_))
        ));
    }

    #[test]
    fn reads_maps_with_text_keys() {
        let s = store(&[
            ("ports[smtp]", Some("25")),
            ("ports[imap]", Some("143")),
            ("ports[weird[1]]", Some("1")),
        ]);
        let ports: BTreeMap<String, u16> = read(&s, "ports").unwrap();
        assert_eq!(ports.get("smtp"), Some(&25));
        assert_eq!(ports.get("imap"), Some(&143));
        assert_eq!(ports.get("weird[1]"), Some(&1));
    }

    #[test]
    fn map_keys_convert_to_key_type() {
        let s = store(&[("byid[7].host", Some("seven")), ("byid[3].host", Some("three"))]);
        let by_id: HashMap<u32, Endpoint> = read(&s, "byid").unwrap();
        assert_eq!(by_id[&7].host, "seven");
        assert_eq!(by_id[&3].host, "three");
    }

    #[test]
    fn missing_collections_are_empty() {
        let s = store(&[]);
        assert!(read::<Vec<String>>(&s, "nothing").unwrap().is_empty());
        assert!(read::<HashMap<String, i32>>(&s, "nothing")
            .unwrap()
            .is_empty());
    }

    #[derive(Debug, PartialEq, Deserialize)]
    enum Mode {
        Plain,
        Tls,
    }

    #[test]
    fn unit_enums_read_by_name() {
        let s = store(&[("mode", Some("Tls")), ("bad", Some("Carrier"))]);
        assert_eq!(read::<Mode>(&s, "mode").unwrap(), Mode::Tls);
        assert_eq!(read::<Option<Mode>>(&s, "none").unwrap(), None);
        assert!(read::<Mode>(&s, "bad").is_err());
        assert!(matches!(
            read::<Mode>(&s, "none"),
            Err(Error::MissingValue { .. })
        ));
    }

    #[test]
    fn resolver_applies_to_leaf_and_rewrites_scans() {
        let s = store(&[
            ("B", Some("fallback")),
            ("New[0].host", Some("h")),
            ("New[0].port", Some("9")),
        ]);
        let config = MapperConfig::new().with_resolver(
            AliasResolver::new()
                .alias("A", "B")
                .prefix_alias("Old", "New"),
        );

        let value: String = from_store(&s, &config, "A", true).unwrap();
        assert_eq!(value, "fallback");
        let none: Option<String> = from_store(&s, &config, "A", false).unwrap();
        assert_eq!(none, None);

        let eps: Vec<Endpoint> = from_store(&s, &config, "Old", true).unwrap();
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].port, 9);
    }

    #[test]
    fn members_fall_back_through_resolvers() {
        let s = store(&[
            ("A.host", Some("mail")),
            ("Defaults.port", Some("25")),
            ("Defaults.secure", Some("true")),
        ]);
        let config = MapperConfig::new().with_resolver(
            AliasResolver::new()
                .alias("A.port", "Defaults.port")
                .alias("A.secure", "Defaults.secure"),
        );

        let endpoint: Endpoint = from_store(&s, &config, "A", true).unwrap();
        assert_eq!(
            endpoint,
            Endpoint {
                host: "mail".to_string(),
                port: 25,
                secure: Some(true),
            }
        );

        let unresolved: Endpoint = from_store(&s, &config, "A", false).unwrap();
        assert_eq!(unresolved.port, 0);
        assert_eq!(unresolved.secure, None);
    }

    #[test]
    fn nested_collections_fall_back_with_rewritten_keys() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Relay {
            name: String,
            upstream: Vec<Endpoint>,
        }

        let s = store(&[
            ("R.name", Some("edge")),
            ("Shared[0].host", Some("a")),
            ("Shared[0].port", Some("1")),
        ]);
        let config = MapperConfig::new()
            .with_resolver(AliasResolver::new().prefix_alias("R.upstream", "Shared"));

        let relay: Relay = from_store(&s, &config, "R", true).unwrap();
        assert_eq!(relay.name, "edge");
        assert_eq!(
            relay.upstream,
            vec![Endpoint {
                host: "a".to_string(),
                port: 1,
                secure: None,
            }]
        );
    }

    #[test]
    fn ambiguous_snapshot_leaf_is_no_value() {
        let entities = vec![
            Entity::new("p.port", Some("1".to_string())),
            Entity::new("p.port", Some("2".to_string())),
        ];
        let s = store(&[]);
        let config = MapperConfig::new();
        let unknown = Shape::Unknown;
        let ctx = Context {
            store: &s,
            config: &config,
            use_resolvers: true,
        };
        let de = KeyDeserializer {
            ctx: &ctx,
            key: "p.port".to_string(),
            source: Source::Snapshot(&entities),
            shape: &unknown,
        };
        assert_eq!(u16::deserialize(de).unwrap(), 0);
    }

    #[test]
    fn dynamic_reads_build_json() {
        let s = store(&[
            ("cfg.name", Some("relay")),
            ("cfg.hosts[0]", Some("a")),
            ("cfg.hosts[1]", Some("b")),
            ("cfg.limits[daily]", Some("10")),
        ]);
        let value: serde_json::Value = read(&s, "cfg").unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "name": "relay",
                "hosts": ["a", "b"],
                "limits": { "daily": "10" }
            })
        );

        let nothing: serde_json::Value = read(&s, "absent").unwrap();
        assert_eq!(nothing, serde_json::Value::Null);
    }
}
