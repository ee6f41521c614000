//! Mapper configuration: converters, key resolvers, and resolver policy.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::converter::{Converter, ConverterRegistry};
use crate::resolve::{AliasResolver, KeyResolver};
use crate::Error;

/// Policy supplied to the mapping engine.
pub trait Configuration: Send + Sync {
    /// Converters, in selection order.
    fn converters(&self) -> &ConverterRegistry;

    /// Fallback key for a key that yielded no entities.
    fn resolve_default_key(&self, key: &str) -> Option<String>;

    /// Maximum number of resolver hops per lookup. `None` is unbounded.
    fn resolver_limit(&self) -> Option<usize> {
        None
    }
}

/// The standard [`Configuration`]: a converter registry plus a chain of
/// key resolvers, consulted in order until one returns a key.
///
/// # Example
///
/// ```rust
/// use flatstruct_serde_store::{AliasResolver, Configuration, MapperConfig};
///
/// let config = MapperConfig::new()
///     .with_resolver(AliasResolver::new().alias("Old", "New"))
///     .with_resolver_limit(16);
///
/// assert_eq!(config.resolve_default_key("Old").as_deref(), Some("New"));
/// ```
#[derive(Clone, Default)]
pub struct MapperConfig {
    converters: ConverterRegistry,
    resolvers: Vec<Arc<dyn KeyResolver>>,
    resolver_limit: Option<usize>,
}

impl MapperConfig {
    /// Default converters, no resolvers, unbounded resolver chains.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from loaded options.
    pub fn from_options(options: MapperOptions) -> Self {
        let mut aliases = AliasResolver::new();
        for (from, to) in options.aliases {
            aliases = aliases.alias(from, to);
        }
        for (from, to) in options.prefix_aliases {
            aliases = aliases.prefix_alias(from, to);
        }

        let mut config = Self::new();
        if !aliases.is_empty() {
            config = config.with_resolver(aliases);
        }
        config.resolver_limit = options.resolver_limit;
        config
    }

    /// Replace the converter registry.
    #[must_use]
    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    /// Add a converter ahead of the existing ones.
    #[must_use]
    pub fn with_converter(mut self, converter: impl Converter + 'static) -> Self {
        self.converters.register(converter);
        self
    }

    /// Append a resolver to the chain.
    #[must_use]
    pub fn with_resolver(mut self, resolver: impl KeyResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// Fail a lookup once its resolver chain exceeds `limit` hops.
    #[must_use]
    pub fn with_resolver_limit(mut self, limit: usize) -> Self {
        self.resolver_limit = Some(limit);
        self
    }
}

impl Configuration for MapperConfig {
    fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    fn resolve_default_key(&self, key: &str) -> Option<String> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve_default_key(key))
    }

    fn resolver_limit(&self) -> Option<usize> {
        self.resolver_limit
    }
}

impl std::fmt::Debug for MapperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperConfig")
            .field("converters", &self.converters)
            .field("resolvers", &self.resolvers.len())
            .field("resolver_limit", &self.resolver_limit)
            .finish()
    }
}

/// Declarative mapper settings, loadable from JSON.
///
/// ```json
/// {
///     "aliases": { "Smtp.Host": "Mail.Host" },
///     "prefix_aliases": { "Legacy": "Current" },
///     "resolver_limit": 32
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperOptions {
    pub aliases: BTreeMap<String, String>,
    pub prefix_aliases: BTreeMap<String, String>,
    pub resolver_limit: Option<usize>,
}

impl MapperOptions {
    /// Parse options from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Config {
            message: e.to_string(),
        })
    }

    /// Read options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{ConvertError, Scalar, ScalarKind};

    #[test]
    fn resolvers_are_consulted_in_order() {
        let config = MapperConfig::new()
            .with_resolver(|key: &str| (key == "a").then(|| "first".to_string()))
            .with_resolver(|_: &str| Some("second".to_string()));

        assert_eq!(config.resolve_default_key("a").as_deref(), Some("first"));
        assert_eq!(config.resolve_default_key("b").as_deref(), Some("second"));
        assert_eq!(config.resolver_limit(), None);
    }

    #[test]
    fn no_resolvers_means_no_fallback() {
        assert_eq!(MapperConfig::new().resolve_default_key("a"), None);
    }

    struct AlwaysSeven;

    impl Converter for AlwaysSeven {
        fn can_convert(&self, kind: ScalarKind) -> bool {
            kind == ScalarKind::I32
        }

        fn read_entity(&self, _kind: ScalarKind, _raw: &str) -> Result<Scalar, ConvertError> {
            Ok(Scalar::Int(7))
        }

        fn write_entity(&self, _kind: ScalarKind, _value: &Scalar) -> Result<String, ConvertError> {
            Ok("7".to_string())
        }
    }

    #[test]
    fn with_converter_takes_precedence() {
        let config = MapperConfig::new().with_converter(AlwaysSeven);
        let converter = config.converters().find(ScalarKind::I32).unwrap();
        assert_eq!(
            converter.read_entity(ScalarKind::I32, "1").unwrap(),
            Scalar::Int(7)
        );
        assert_eq!(config.converters().len(), 7);
    }

    #[test]
    fn options_from_json() {
        let options = MapperOptions::from_json_str(
            r#"{
                "aliases": { "A": "B" },
                "prefix_aliases": { "Legacy": "Current" },
                "resolver_limit": 4
            }"#,
        )
        .unwrap();

        let config = MapperConfig::from_options(options);
        assert_eq!(config.resolve_default_key("A").as_deref(), Some("B"));
        assert_eq!(
            config.resolve_default_key("Legacy.Port").as_deref(),
            Some("Current.Port")
        );
        assert_eq!(config.resolver_limit(), Some(4));
    }

    #[test]
    fn options_default_when_fields_missing() {
        let options = MapperOptions::from_json_str("{}").unwrap();
        assert_eq!(options, MapperOptions::default());
    }

    #[test]
    fn options_reject_unknown_fields() {
        let result = MapperOptions::from_json_str(r#"{ "alias": {} }"#);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn options_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapper.json");
        std::fs::write(&path, r#"{ "aliases": { "x": "y" } }"#).unwrap();

        let options = MapperOptions::load(&path).unwrap();
        assert_eq!(options.aliases.get("x").map(String::as_str), Some("y"));

        let missing = MapperOptions::load(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(Error::Config { .. })));
    }
}
