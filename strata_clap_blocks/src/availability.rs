use std::time::Duration;

use strata_availability::RefreshConfig;

/// Fetching segment metadata from the backend.
#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct AvailabilityConfig {
    /// Limit on a single metadata request for one table.
    #[clap(
        long = "metadata-timeout",
        env = "STRATA_METADATA_TIMEOUT",
        default_value = "10s",
        value_parser = humantime::parse_duration,
        action
    )]
    pub timeout: Duration,

    /// Retries of a failed metadata request before the table is marked unavailable.
    #[clap(
        long = "metadata-retries",
        env = "STRATA_METADATA_RETRIES",
        default_value = "3",
        action
    )]
    pub retries: usize,

    /// Delay before the first retry; doubles on each further retry.
    #[clap(
        long = "metadata-backoff",
        env = "STRATA_METADATA_BACKOFF",
        default_value = "100ms",
        value_parser = humantime::parse_duration,
        action
    )]
    pub backoff: Duration,

    /// How often availability is refreshed in the background.
    #[clap(
        long = "availability-refresh-interval",
        env = "STRATA_AVAILABILITY_REFRESH_INTERVAL",
        default_value = "1m",
        value_parser = humantime::parse_duration,
        action
    )]
    pub refresh_interval: Duration,
}

impl AvailabilityConfig {
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            timeout: self.timeout,
            retries: self.retries,
            initial_backoff: self.backoff,
        }
    }
}
