//! Key resolution: alternate keys to try when a lookup finds nothing.

use std::collections::BTreeMap;

use flatstruct_core_store::key::{INDEX_OPEN, MEMBER};

use crate::config::Configuration;
use crate::Error;

/// Supplies a fallback key for a key that yielded no entities.
///
/// Returning `None` ends the chain. The engine keeps asking with each
/// returned key until something is found, so a resolver that maps keys in
/// a cycle never terminates unless the configuration sets a resolver limit.
pub trait KeyResolver: Send + Sync {
    fn resolve_default_key(&self, key: &str) -> Option<String>;
}

impl<F> KeyResolver for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn resolve_default_key(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// Never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl KeyResolver for NoResolver {
    fn resolve_default_key(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Declared key aliases.
///
/// Exact aliases map one whole key to another. Prefix aliases rewrite the
/// leading part of a key when it ends on a segment boundary, so
/// `Legacy -> Current` turns `Legacy.Port` into `Current.Port` but leaves
/// `LegacyPort` alone. Exact aliases are checked first; among prefix
/// aliases the longest match wins.
///
/// # Example
///
/// ```rust
/// use flatstruct_serde_store::{AliasResolver, KeyResolver};
///
/// let resolver = AliasResolver::new()
///     .alias("Smtp.Host", "Mail.Host")
///     .prefix_alias("Legacy", "Current");
///
/// assert_eq!(resolver.resolve_default_key("Smtp.Host").as_deref(), Some("Mail.Host"));
/// assert_eq!(resolver.resolve_default_key("Legacy[0].Port").as_deref(), Some("Current[0].Port"));
/// assert_eq!(resolver.resolve_default_key("LegacyPort"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    exact: BTreeMap<String, String>,
    prefixes: BTreeMap<String, String>,
}

impl AliasResolver {
    /// Create a resolver with no aliases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact alias `from -> to`.
    #[must_use]
    pub fn alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.exact.insert(from.into(), to.into());
        self
    }

    /// Add a prefix alias `from -> to`.
    #[must_use]
    pub fn prefix_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.prefixes.insert(from.into(), to.into());
        self
    }

    /// True if no alias is declared.
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    fn on_boundary(key: &str, prefix: &str) -> bool {
        match key.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with([MEMBER, INDEX_OPEN]),
            None => false,
        }
    }
}

impl KeyResolver for AliasResolver {
    fn resolve_default_key(&self, key: &str) -> Option<String> {
        if let Some(to) = self.exact.get(key) {
            return Some(to.clone());
        }

        self.prefixes
            .iter()
            .filter(|(from, _)| Self::on_boundary(key, from))
            .max_by_key(|(from, _)| from.len())
            .map(|(from, to)| format!("{}{}", to, &key[from.len()..]))
    }
}

/// Run `lookup` on `key`, then on each resolved key in turn, until it finds
/// something or the resolver chain ends.
///
/// Returns the key that satisfied the lookup together with its result.
pub(crate) fn resolve_chain<T>(
    config: &dyn Configuration,
    key: &str,
    use_resolvers: bool,
    mut lookup: impl FnMut(&str) -> Result<Option<T>, Error>,
) -> Result<Option<(String, T)>, Error> {
    let mut current = key.to_string();
    let mut hops = 0usize;

    loop {
        if let Some(found) = lookup(&current)? {
            return Ok(Some((current, found)));
        }
        if !use_resolvers {
            return Ok(None);
        }

        let Some(next) = config.resolve_default_key(&current) else {
            return Ok(None);
        };

        hops += 1;
        if let Some(limit) = config.resolver_limit() {
            if hops > limit {
                return Err(Error::ResolverLimit {
                    key: key.to_string(),
                    limit,
                });
            }
        }

        tracing::debug!(from = %current, to = %next, hops, "resolved default key");
        current = next;
    }
}
