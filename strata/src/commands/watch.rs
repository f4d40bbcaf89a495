use std::{sync::Arc, time::Duration};

use observability_deps::tracing::{info, warn};
use strata_availability::{AvailabilityStore, FileMetadataSource};
use tokio_util::sync::CancellationToken;

use super::common::{Result, SourceConfig, load_catalog};

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    pub(crate) logging_config: trogging::cli::LoggingConfig,

    #[clap(flatten)]
    sources: SourceConfig,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let catalog = load_catalog(&config.sources.catalog)?;
    let tables: Vec<_> = catalog
        .physical_tables()
        .map(|t| Arc::clone(t.name()))
        .collect();
    let refresh = config.sources.availability_config;
    let store = Arc::new(AvailabilityStore::new(refresh.refresh_config()));
    let source = Arc::new(FileMetadataSource::new(&config.sources.availability));

    let shutdown = CancellationToken::new();
    let handle = store.spawn_refresh_loop(
        source,
        tables,
        refresh.refresh_interval,
        shutdown.clone(),
    );
    info!(interval = ?refresh.refresh_interval, "watching availability, ctrl-c to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "unable to listen for ctrl-c, stopping");
    }
    shutdown.cancel();
    // the loop only exits on cancellation
    if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
        warn!("availability refresh did not stop in time");
    }
    Ok(())
}
