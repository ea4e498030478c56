//! Per-machine table identifier derivation.
//!
//! Every machine gets its own sample relation. The relation name is derived
//! from `(system_name, location)` and doubles as the durable join key between
//! the registry and the sample storage, so derivation must be stable across
//! processes and releases.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Prefix shared by every per-machine relation.
pub const TABLE_PREFIX: &str = "machine_";

/// Maximum relation name length, within PostgreSQL's 63-byte identifier limit.
pub const MAX_TABLE_NAME_LEN: usize = 60;

/// PostgreSQL's identifier limit (`NAMEDATALEN - 1`); longer names are
/// silently truncated, so two distinct index names could collapse into one.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Hex characters of the name digest carried by a shortened index name.
const INDEX_DIGEST_LEN: usize = 8;

/// Anything outside the storage-safe alphabet.
static UNSAFE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid regex"));

/// Characters dropped when sanitizing an externally supplied identifier.
static NON_IDENT_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]").expect("valid regex"));

/// Storage-safe identifier of a machine's sample relation.
///
/// Only constructible through [`TableName::derive`] or
/// [`TableName::sanitize`], so the inner string is always lowercase
/// `[a-z0-9_]` and at most [`MAX_TABLE_NAME_LEN`] characters long. This is
/// what makes it safe to splice into DDL and DML.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    /// Derive the identifier for a `(system_name, location)` pair.
    ///
    /// Convention: `machine_{system_name}_{location}`, every character
    /// outside `[A-Za-z0-9_]` replaced with `_`, lowercased, truncated to
    /// 60 characters. Empty inputs are accepted.
    ///
    /// # Examples
    ///
    /// ```
    /// use fleetwatch_core::identifier::TableName;
    ///
    /// assert_eq!(TableName::derive("alpha", "lab1").as_str(), "machine_alpha_lab1");
    /// assert_eq!(TableName::derive("Web-01", "Paris HQ").as_str(), "machine_web_01_paris_hq");
    /// assert_eq!(TableName::derive("", "").as_str(), "machine__");
    /// ```
    pub fn derive(system_name: &str, location: &str) -> Self {
        let raw = format!("{TABLE_PREFIX}{system_name}_{location}");
        let safe = UNSAFE_CHARS_RE.replace_all(&raw, "_").to_lowercase();
        Self(safe.chars().take(MAX_TABLE_NAME_LEN).collect())
    }

    /// Clean an identifier received from outside (e.g. a URL path segment).
    ///
    /// Drops every character outside `[a-z0-9_]` rather than replacing it.
    /// Returns `None` when nothing usable remains.
    pub fn sanitize(raw: &str) -> Option<Self> {
        let clean: String = NON_IDENT_CHARS_RE
            .replace_all(raw, "")
            .chars()
            .take(MAX_TABLE_NAME_LEN)
            .collect();
        if clean.is_empty() {
            None
        } else {
            Some(Self(clean))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the descending timestamp index on this relation.
    ///
    /// `idx_{table}_ts` when that fits in [`MAX_IDENTIFIER_LEN`]. Longer
    /// tables keep a prefix of their name followed by a digest of the whole
    /// name, so relations sharing a long prefix still get distinct indexes.
    pub fn ts_index_name(&self) -> String {
        let plain = format!("idx_{}_ts", self.0);
        if plain.len() <= MAX_IDENTIFIER_LEN {
            return plain;
        }

        let digest: String = Sha256::digest(self.0.as_bytes())
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();
        let keep = MAX_IDENTIFIER_LEN - "idx__".len() - INDEX_DIGEST_LEN - "_ts".len();
        format!(
            "idx_{}_{}_ts",
            &self.0[..keep],
            &digest[..INDEX_DIGEST_LEN]
        )
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
