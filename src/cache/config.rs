//! Cache configuration.
//!
//! Controls the in-memory store bounds and the per-domain TTLs via
//! `rankboard.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use super::keys::{CacheDomain, DEFAULT_MAX_KEY_LEN, KeyCodec};

const DEFAULT_CAPACITY: usize = 10_000;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_PLAYER_TTL_SECS: u64 = 600;
const DEFAULT_COMPARISON_TTL_SECS: u64 = 600;
const DEFAULT_HEAD_TO_HEAD_TTL_SECS: u64 = 600;
const DEFAULT_SCORE_DUEL_TTL_SECS: u64 = 600;
const DEFAULT_SEARCH_TTL_SECS: u64 = 600;
const DEFAULT_ANALYTICS_TTL_SECS: u64 = 1800;

/// Time-to-live, in seconds, for each cache domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DomainTtls {
    pub player: u64,
    pub comparison: u64,
    pub head_to_head: u64,
    pub score_duel: u64,
    pub score_search: u64,
    pub beatmap_search: u64,
    pub analytics: u64,
}

impl Default for DomainTtls {
    fn default() -> Self {
        Self {
            player: DEFAULT_PLAYER_TTL_SECS,
            comparison: DEFAULT_COMPARISON_TTL_SECS,
            head_to_head: DEFAULT_HEAD_TO_HEAD_TTL_SECS,
            score_duel: DEFAULT_SCORE_DUEL_TTL_SECS,
            score_search: DEFAULT_SEARCH_TTL_SECS,
            beatmap_search: DEFAULT_SEARCH_TTL_SECS,
            analytics: DEFAULT_ANALYTICS_TTL_SECS,
        }
    }
}

impl DomainTtls {
    pub fn seconds(&self, domain: CacheDomain) -> u64 {
        match domain {
            CacheDomain::Player => self.player,
            CacheDomain::Comparison => self.comparison,
            CacheDomain::HeadToHead => self.head_to_head,
            CacheDomain::ScoreDuel => self.score_duel,
            CacheDomain::ScoreSearch => self.score_search,
            CacheDomain::BeatmapSearch => self.beatmap_search,
            CacheDomain::Analytics => self.analytics,
        }
    }
}

/// Cache configuration from `rankboard.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve and populate the read-through cache.
    pub enabled: bool,
    /// Maximum live entries in the in-memory store.
    pub capacity: usize,
    /// Interval of the expired-entry sweep; zero disables the sweeper.
    pub sweep_interval_secs: u64,
    /// Encoded keys above this length are digested.
    pub max_key_len: usize,
    /// Per-domain TTLs.
    pub ttl: DomainTtls,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            max_key_len: DEFAULT_MAX_KEY_LEN,
            ttl: DomainTtls::default(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
            sweep_interval_secs: settings.sweep_interval.map_or(0, |every| every.as_secs()),
            max_key_len: settings.max_key_len,
            ttl: settings.ttl.clone(),
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn ttl_for(&self, domain: CacheDomain) -> Duration {
        Duration::from_secs(self.ttl.seconds(domain))
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn key_codec(&self) -> KeyCodec {
        KeyCodec::new(self.max_key_len)
    }
}
