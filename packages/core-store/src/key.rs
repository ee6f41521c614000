//! Key paths: `.` member access and `[...]` indexed access.
//!
//! Keys are opaque strings to the store. The helpers here derive structure
//! from them procedurally:
//!
//! ```text
//! path  := segment ("." segment | "[" index "]")*
//! index := integer | text with balanced brackets
//! ```
//!
//! `TestClasses[1].Ports[0]` is element 0 of `Ports` of element 1 of
//! `TestClasses`.

use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Separator for member access.
pub const MEMBER: char = '.';
/// Opens an indexed segment.
pub const INDEX_OPEN: char = '[';
/// Closes an indexed segment.
pub const INDEX_CLOSE: char = ']';

/// Errors raised when a stored key does not follow the key grammar.
///
/// These indicate a corrupted store or a hand-written key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// An indexed segment is never closed.
    #[error("key `{key}` has an unterminated index segment")]
    Unterminated { key: String },

    /// A closing bracket has no matching opening bracket.
    #[error("key `{key}` has an index segment without an opening bracket")]
    MissingOpen { key: String },

    /// A sequence index is not an integer.
    #[error("key `{key}` has non-integer sequence index `{index}`")]
    InvalidIndex { key: String, index: String },

    /// The key is not a descendant of the expected parent.
    #[error("key `{key}` is not under `{prefix}`")]
    NotUnder { key: String, prefix: String },
}

/// `key.name`
pub fn member(key: &str, name: &str) -> String {
    format!("{}{}{}", key, MEMBER, name)
}

/// `key[index]`
pub fn index(key: &str, index: impl std::fmt::Display) -> String {
    format!("{}{}{}{}", key, INDEX_OPEN, index, INDEX_CLOSE)
}

/// Scan prefix for every member of `key`.
pub fn members_prefix(key: &str) -> String {
    format!("{}{}", key, MEMBER)
}

/// Scan prefix for every indexed element of `key`.
pub fn indices_prefix(key: &str) -> String {
    format!("{}{}", key, INDEX_OPEN)
}

/// True if every `]` in `text` closes an earlier `[` and none stay open.
pub fn is_balanced(text: &str) -> bool {
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            INDEX_OPEN => depth += 1,
            INDEX_CLOSE => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

/// Replace a leading `from` with `to`. Keys that do not start with `from`
/// are returned unchanged.
pub fn rewrite_prefix(key: &str, from: &str, to: &str) -> String {
    match key.strip_prefix(from) {
        Some(rest) => format!("{}{}", to, rest),
        None => key.to_string(),
    }
}

/// The indexed segment of `parent` that encloses `key`.
///
/// Both `a[3].X` and `a[3].Y` belong to group `a[3]` of parent `a`. The
/// closing bracket is found by depth counting, so bracketed text inside an
/// index stays part of it.
pub fn group_of<'k>(parent: &str, key: &'k str) -> Result<&'k str, KeyError> {
    let rest = key
        .strip_prefix(parent)
        .and_then(|r| r.strip_prefix(INDEX_OPEN))
        .ok_or_else(|| KeyError::NotUnder {
            key: key.to_string(),
            prefix: indices_prefix(parent),
        })?;

    let mut depth = 1usize;
    for (i, c) in rest.char_indices() {
        match c {
            INDEX_OPEN => depth += 1,
            INDEX_CLOSE => {
                depth -= 1;
                if depth == 0 {
                    let end = parent.len() + INDEX_OPEN.len_utf8() + i + c.len_utf8();
                    return Ok(&key[..end]);
                }
            }
            _ => {}
        }
    }

    Err(KeyError::Unterminated {
        key: key.to_string(),
    })
}

/// The text inside the trailing `[...]` of a group key.
///
/// Scans backward from the final `]` to its matching `[`.
pub fn index_segment(group: &str) -> Result<&str, KeyError> {
    let body = group
        .strip_suffix(INDEX_CLOSE)
        .ok_or_else(|| KeyError::Unterminated {
            key: group.to_string(),
        })?;

    let mut depth = 1usize;
    for (i, c) in body.char_indices().rev() {
        match c {
            INDEX_CLOSE => depth += 1,
            INDEX_OPEN => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&body[i + c.len_utf8()..]);
                }
            }
            _ => {}
        }
    }

    Err(KeyError::MissingOpen {
        key: group.to_string(),
    })
}

/// The member of `parent` that `key` lives under: `name` for both
/// `parent.name` and `parent.name[0].x`.
pub fn member_name<'k>(parent: &str, key: &'k str) -> Result<&'k str, KeyError> {
    let rest = key
        .strip_prefix(parent)
        .and_then(|r| r.strip_prefix(MEMBER))
        .ok_or_else(|| KeyError::NotUnder {
            key: key.to_string(),
            prefix: members_prefix(parent),
        })?;
    let end = rest.find([MEMBER, INDEX_OPEN]).unwrap_or(rest.len());
    Ok(&rest[..end])
}

/// One distinct indexed child of a parent key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexGroup {
    /// Full key of the group, e.g. `a[3]`.
    pub key: String,
    /// Text between the brackets, e.g. `3`.
    pub index: String,
    ordinal: Option<i64>,
}

impl IndexGroup {
    fn new(key: String) -> Result<Self, KeyError> {
        let index = index_segment(&key)?.to_string();
        let ordinal = index.parse::<i64>().ok();
        Ok(Self {
            key,
            index,
            ordinal,
        })
    }

    /// The index parsed as an integer, if it is one.
    pub fn ordinal(&self) -> Option<i64> {
        self.ordinal
    }
}

// Integer indices first, ascending; ties and non-integer indices fall back
// to comparing the full group key.
impl Ord for IndexGroup {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.ordinal, other.ordinal) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.key.cmp(&other.key)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.key.cmp(&other.key),
        }
    }
}

impl PartialOrd for IndexGroup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Distinct indexed children of `parent` among `keys`, in read order.
///
/// Every key must start with `parent[`.
pub fn index_groups<'k>(
    parent: &str,
    keys: impl IntoIterator<Item = &'k str>,
) -> Result<Vec<IndexGroup>, KeyError> {
    let mut distinct = BTreeSet::new();
    for key in keys {
        distinct.insert(group_of(parent, key)?);
    }

    let mut groups = distinct
        .into_iter()
        .map(|g| IndexGroup::new(g.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    groups.sort();
    Ok(groups)
}

/// Like [`index_groups`], but every index must be an integer.
pub fn sequence_groups<'k>(
    parent: &str,
    keys: impl IntoIterator<Item = &'k str>,
) -> Result<Vec<IndexGroup>, KeyError> {
    let groups = index_groups(parent, keys)?;
    if let Some(bad) = groups.iter().find(|g| g.ordinal.is_none()) {
        return Err(KeyError::InvalidIndex {
            key: bad.key.clone(),
            index: bad.index.clone(),
        });
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_keys() {
        assert_eq!(member("a", "b"), "a.b");
        assert_eq!(index("a", 3), "a[3]");
        assert_eq!(index("a.b", "x y"), "a.b[x y]");
        assert_eq!(members_prefix("a"), "a.");
        assert_eq!(indices_prefix("a"), "a[");
    }

    #[test]
    fn balanced_brackets() {
        assert!(is_balanced("plain"));
        assert!(is_balanced("a[b]c"));
        assert!(is_balanced("[[x]]"));
        assert!(!is_balanced("a]"));
        assert!(!is_balanced("a[b"));
        assert!(!is_balanced("]["));
    }

    #[test]
    fn rewrite_only_touches_matching_prefix() {
        assert_eq!(rewrite_prefix("B[0].x", "B", "A"), "A[0].x");
        assert_eq!(rewrite_prefix("C[0]", "B", "A"), "C[0]");
    }

    #[test]
    fn group_of_finds_enclosing_segment() {
        assert_eq!(group_of("a", "a[3]").unwrap(), "a[3]");
        assert_eq!(group_of("a", "a[3].X").unwrap(), "a[3]");
        assert_eq!(group_of("a", "a[3].Y[1]").unwrap(), "a[3]");
        assert_eq!(group_of("x.y", "x.y[key one].z").unwrap(), "x.y[key one]");
        assert_eq!(group_of("a", "a[m[1]].z").unwrap(), "a[m[1]]");
    }

    #[test]
    fn group_of_rejects_malformed_keys() {
        assert_eq!(
            group_of("a", "a[3"),
            Err(KeyError::Unterminated {
                key: "a[3".to_string()
            })
        );
        assert!(matches!(
            group_of("a", "b[0]"),
            Err(KeyError::NotUnder { .. })
        ));
        assert!(matches!(
            group_of("a", "a.b"),
            Err(KeyError::NotUnder { .. })
        ));
    }

    #[test]
    fn index_segment_scans_backward() {
        assert_eq!(index_segment("a[3]").unwrap(), "3");
        assert_eq!(index_segment("a[1].b[hello]").unwrap(), "hello");
        assert_eq!(index_segment("a[m[1]]").unwrap(), "m[1]");
        assert_eq!(index_segment("a[]").unwrap(), "");
        assert!(matches!(
            index_segment("a[3"),
            Err(KeyError::Unterminated { .. })
        ));
        assert!(matches!(
            index_segment("a3]"),
            Err(KeyError::MissingOpen { .. })
        ));
    }

    #[test]
    fn member_name_stops_at_next_operator() {
        assert_eq!(member_name("a", "a.b").unwrap(), "b");
        assert_eq!(member_name("a", "a.b.c").unwrap(), "b");
        assert_eq!(member_name("a", "a.list[0]").unwrap(), "list");
        assert!(member_name("a", "a[0]").is_err());
    }

    #[test]
    fn groups_sort_numerically() {
        let keys = ["a[33]", "a[2].x", "a[0]", "a[1].y", "a[2].z"];
        let groups = index_groups("a", keys).unwrap();
        let order: Vec<&str> = groups.iter().map(|g| g.index.as_str()).collect();
        assert_eq!(order, vec!["0", "1", "2", "33"]);
        assert_eq!(groups[3].ordinal(), Some(33));
    }

    #[test]
    fn groups_tie_break_on_key() {
        let groups = index_groups("a", ["a[01]", "a[1]", "a[001]"]).unwrap();
        let order: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(order, vec!["a[001]", "a[01]", "a[1]"]);
    }

    #[test]
    fn groups_put_numbers_before_text() {
        let groups = index_groups("m", ["m[zeta]", "m[10]", "m[alpha]", "m[9]"]).unwrap();
        let order: Vec<&str> = groups.iter().map(|g| g.index.as_str()).collect();
        assert_eq!(order, vec!["9", "10", "alpha", "zeta"]);
    }

    #[test]
    fn sequence_groups_require_integers() {
        assert!(sequence_groups("a", ["a[0]", "a[1]"]).is_ok());
        assert_eq!(
            sequence_groups("a", ["a[0]", "a[x]"]),
            Err(KeyError::InvalidIndex {
                key: "a[x]".to_string(),
                index: "x".to_string()
            })
        );
    }
}
