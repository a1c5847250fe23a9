//! Cache key codec.
//!
//! Maps `(domain, ordered parts)` to a stable key string of the form
//! `rankboard:<domain>:<part>|<part>|...`. Every part carries a type tag and
//! text is percent-escaped, so no argument can forge a separator or collide
//! with a differently-typed argument of the same spelling.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::Date;

/// Leading segment shared by every key this crate produces.
pub const KEY_NAMESPACE: &str = "rankboard";

/// Encoded keys longer than this are replaced by a digest of their body.
pub const DEFAULT_MAX_KEY_LEN: usize = 256;

const SECTION_SEPARATOR: char = ':';
const PART_SEPARATOR: char = '|';
const SET_SEPARATOR: char = ',';

/// Logical query domain. Each domain owns a key prefix and a TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDomain {
    Player,
    Comparison,
    HeadToHead,
    ScoreDuel,
    ScoreSearch,
    BeatmapSearch,
    Analytics,
}

impl CacheDomain {
    pub const ALL: [CacheDomain; 7] = [
        CacheDomain::Player,
        CacheDomain::Comparison,
        CacheDomain::HeadToHead,
        CacheDomain::ScoreDuel,
        CacheDomain::ScoreSearch,
        CacheDomain::BeatmapSearch,
        CacheDomain::Analytics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheDomain::Player => "player",
            CacheDomain::Comparison => "comparison",
            CacheDomain::HeadToHead => "head_to_head",
            CacheDomain::ScoreDuel => "score_duel",
            CacheDomain::ScoreSearch => "score_search",
            CacheDomain::BeatmapSearch => "beatmap_search",
            CacheDomain::Analytics => "analytics",
        }
    }

    /// Prefix shared by every key in this domain, usable for namespace invalidation.
    pub fn prefix(self) -> String {
        format!(
            "{KEY_NAMESPACE}{SECTION_SEPARATOR}{}{SECTION_SEPARATOR}",
            self.as_str()
        )
    }
}

impl fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed argument of a logical query.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(String),
    Date(Date),
    /// Order-insensitive collection; normalized by [`KeyPart::set`].
    Set(Vec<String>),
    Null,
}

impl KeyPart {
    /// Case- and whitespace-insensitive text, for identifiers such as usernames.
    pub fn folded(text: &str) -> Self {
        KeyPart::Text(text.trim().to_lowercase())
    }

    /// Sorted, de-duplicated set of values.
    pub fn set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        values.sort();
        values.dedup();
        KeyPart::Set(values)
    }

    fn encode_into(&self, out: &mut String) {
        match self {
            KeyPart::Int(value) => {
                out.push_str("i=");
                out.push_str(&value.to_string());
            }
            KeyPart::UInt(value) => {
                out.push_str("u=");
                out.push_str(&value.to_string());
            }
            KeyPart::Float(value) => {
                out.push_str("f=");
                out.push_str(&encode_float(*value));
            }
            KeyPart::Bool(value) => {
                out.push_str(if *value { "b=1" } else { "b=0" });
            }
            KeyPart::Text(value) => {
                out.push_str("s=");
                escape_into(value, out);
            }
            KeyPart::Date(value) => {
                out.push_str("d=");
                out.push_str(&value.to_string());
            }
            KeyPart::Set(values) => {
                out.push_str("S=");
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        out.push(SET_SEPARATOR);
                    }
                    escape_into(value, out);
                }
            }
            KeyPart::Null => out.push('n'),
        }
    }
}

fn encode_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == 0.0 {
        // Folds -0.0 into 0.0.
        "0".to_string()
    } else {
        value.to_string()
    }
}

fn escape_into(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '|' => out.push_str("%7C"),
            ',' => out.push_str("%2C"),
            other => out.push(other),
        }
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        KeyPart::Int(value.into())
    }
}

impl From<u64> for KeyPart {
    fn from(value: u64) -> Self {
        KeyPart::UInt(value)
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::UInt(value.into())
    }
}

impl From<f64> for KeyPart {
    fn from(value: f64) -> Self {
        KeyPart::Float(value)
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Text(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Text(value)
    }
}

impl From<Date> for KeyPart {
    fn from(value: Date) -> Self {
        KeyPart::Date(value)
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyPart::Null, Into::into)
    }
}

/// Encoded cache key together with the domain it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    domain: CacheDomain,
    value: String,
}

impl CacheKey {
    pub fn domain(&self) -> CacheDomain {
        self.domain
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Builds cache keys, digesting bodies that would exceed `max_len`.
#[derive(Debug, Clone, Copy)]
pub struct KeyCodec {
    max_len: usize,
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEY_LEN)
    }
}

impl KeyCodec {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    pub fn make_key(&self, domain: CacheDomain, parts: &[KeyPart]) -> CacheKey {
        let mut value = domain.prefix();
        let mut body = String::new();
        for (index, part) in parts.iter().enumerate() {
            if index > 0 {
                body.push(PART_SEPARATOR);
            }
            part.encode_into(&mut body);
        }

        if value.len() + body.len() > self.max_len {
            let mut hasher = Sha256::new();
            hasher.update(body.as_bytes());
            value.push('#');
            value.push_str(&hex::encode(hasher.finalize()));
        } else {
            value.push_str(&body);
        }

        CacheKey { domain, value }
    }
}

/// Build a key with the default codec.
pub fn make_key(domain: CacheDomain, parts: &[KeyPart]) -> CacheKey {
    KeyCodec::default().make_key(domain, parts)
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn identical_requests_produce_identical_keys() {
        let parts = [KeyPart::from(42_i64), KeyPart::from("hr"), KeyPart::Null];
        let first = make_key(CacheDomain::ScoreSearch, &parts);
        let second = make_key(CacheDomain::ScoreSearch, &parts);
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "rankboard:score_search:i=42|s=hr|n");
    }

    #[test]
    fn domains_never_share_keys() {
        let parts = [KeyPart::from(7_i64), KeyPart::from(9_i64)];
        let keys: Vec<CacheKey> = CacheDomain::ALL
            .iter()
            .map(|domain| make_key(*domain, &parts))
            .collect();
        for (i, left) in keys.iter().enumerate() {
            for right in &keys[i + 1..] {
                assert_ne!(left, right);
            }
        }
    }

    #[test]
    fn separator_in_text_cannot_forge_a_second_part() {
        let forged = make_key(CacheDomain::Player, &[KeyPart::from("a|s=b")]);
        let genuine = make_key(
            CacheDomain::Player,
            &[KeyPart::from("a"), KeyPart::from("b")],
        );
        assert_ne!(forged, genuine);
        assert!(forged.as_str().ends_with("s=a%7Cs=b"));
    }

    #[test]
    fn colon_in_text_is_escaped() {
        let key = make_key(CacheDomain::Player, &[KeyPart::from("x:y")]);
        assert_eq!(key.as_str(), "rankboard:player:s=x%3Ay");
    }

    #[test]
    fn type_tags_separate_numbers_from_text() {
        let number = make_key(CacheDomain::Player, &[KeyPart::from(1_i64)]);
        let text = make_key(CacheDomain::Player, &[KeyPart::from("1")]);
        let float = make_key(CacheDomain::Player, &[KeyPart::from(1.0_f64)]);
        assert_ne!(number, text);
        assert_ne!(number, float);
        assert_ne!(text, float);
    }

    #[test]
    fn argument_order_is_significant() {
        let ab = make_key(
            CacheDomain::Comparison,
            &[KeyPart::from(1_i64), KeyPart::from(2_i64)],
        );
        let ba = make_key(
            CacheDomain::Comparison,
            &[KeyPart::from(2_i64), KeyPart::from(1_i64)],
        );
        assert_ne!(ab, ba);
    }

    #[test]
    fn sets_are_order_insensitive() {
        let first = make_key(CacheDomain::ScoreSearch, &[KeyPart::set(["HD", "DT", "HD"])]);
        let second = make_key(CacheDomain::ScoreSearch, &[KeyPart::set(["DT", "HD"])]);
        assert_eq!(first, second);
    }

    #[test]
    fn folded_text_ignores_case_and_padding() {
        assert_eq!(KeyPart::folded("  Cookiezi "), KeyPart::folded("cookiezi"));
    }

    #[test]
    fn negative_zero_matches_zero() {
        let zero = make_key(CacheDomain::ScoreSearch, &[KeyPart::from(0.0_f64)]);
        let negative = make_key(CacheDomain::ScoreSearch, &[KeyPart::from(-0.0_f64)]);
        assert_eq!(zero, negative);
    }

    #[test]
    fn options_encode_as_null_or_value() {
        let none: Option<i64> = None;
        assert_eq!(KeyPart::from(none), KeyPart::Null);
        assert_eq!(KeyPart::from(Some(3_i64)), KeyPart::Int(3));
        assert_eq!(
            KeyPart::from(date!(2024 - 03 - 01)),
            KeyPart::Date(date!(2024 - 03 - 01))
        );
    }

    #[test]
    fn long_bodies_are_digested_but_keep_domain_prefix() {
        let codec = KeyCodec::new(48);
        let long = "x".repeat(200);
        let key = codec.make_key(CacheDomain::BeatmapSearch, &[KeyPart::from(long.as_str())]);
        assert!(key.as_str().starts_with(&CacheDomain::BeatmapSearch.prefix()));
        assert!(key.as_str().contains('#'));
        assert_eq!(
            key,
            codec.make_key(CacheDomain::BeatmapSearch, &[KeyPart::from(long.as_str())])
        );
        let other = codec.make_key(CacheDomain::BeatmapSearch, &[KeyPart::from("y".repeat(200))]);
        assert_ne!(key, other);
    }
}
