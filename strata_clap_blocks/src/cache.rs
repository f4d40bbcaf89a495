use std::{num::NonZeroUsize, time::Duration};

use strata_cache::CacheStrategy;

/// How backend responses are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CacheStrategyKind {
    /// Never cache
    #[default]
    None,
    /// Cache by query for `--cache-ttl`
    Ttl,
    /// Cache by query and the segments it reads
    LocalSignature,
    /// Cache by query and the backend's version token
    Etag,
}

#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct CacheConfig {
    /// Which caching strategy to apply to backend responses.
    #[clap(
        long = "cache-strategy",
        env = "STRATA_CACHE_STRATEGY",
        default_value = "none",
        value_enum,
        action
    )]
    pub strategy: CacheStrategyKind,

    /// How long a cached response stays valid with the `ttl` strategy.
    #[clap(
        long = "cache-ttl",
        env = "STRATA_CACHE_TTL",
        default_value = "1h",
        value_parser = humantime::parse_duration,
        action
    )]
    pub ttl: Duration,

    /// Most responses held in memory; expired entries, then the oldest, make room for new ones.
    #[clap(
        long = "cache-max-entries",
        env = "STRATA_CACHE_MAX_ENTRIES",
        default_value = "10000",
        action
    )]
    pub max_entries: NonZeroUsize,
}

impl CacheConfig {
    pub fn strategy(&self) -> CacheStrategy {
        match self.strategy {
            CacheStrategyKind::None => CacheStrategy::NoCache,
            CacheStrategyKind::Ttl => CacheStrategy::Ttl(self.ttl),
            CacheStrategyKind::LocalSignature => CacheStrategy::LocalSignature,
            CacheStrategyKind::Etag => CacheStrategy::ETag,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn default_is_no_cache() {
        let config = CacheConfig::try_parse_from(["strata"]).unwrap();
        assert_eq!(config.strategy(), CacheStrategy::NoCache);
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.max_entries.get(), 10_000);
    }

    #[test]
    fn max_entries_must_be_positive() {
        let config = CacheConfig::try_parse_from(["strata", "--cache-max-entries", "5"]).unwrap();
        assert_eq!(config.max_entries.get(), 5);

        assert!(CacheConfig::try_parse_from(["strata", "--cache-max-entries", "0"]).is_err());
    }

    #[test]
    fn ttl_strategy_uses_ttl() {
        let config = CacheConfig::try_parse_from([
            "strata",
            "--cache-strategy",
            "ttl",
            "--cache-ttl",
            "90s",
        ])
        .unwrap();
        assert_eq!(config.strategy(), CacheStrategy::Ttl(Duration::from_secs(90)));

        let config =
            CacheConfig::try_parse_from(["strata", "--cache-strategy", "local-signature"]).unwrap();
        assert_eq!(config.strategy(), CacheStrategy::LocalSignature);

        assert!(CacheConfig::try_parse_from(["strata", "--cache-strategy", "lru"]).is_err());
    }
}
