use std::path::PathBuf;

use super::common::{Result, load_catalog};

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    /// Catalog definition file (JSON)
    #[clap(long = "catalog", env = "STRATA_CATALOG")]
    catalog: PathBuf,
}

pub(crate) fn command(config: Config) -> Result<()> {
    let catalog = load_catalog(&config.catalog)?;
    println!("dimensions: {}", catalog.dimensions().count());
    println!("metric makers: {}", catalog.makers().len());
    println!("metrics: {}", catalog.metrics().len());
    println!("physical tables: {}", catalog.physical_tables().count());
    println!("logical tables: {}", catalog.logical_tables().count());
    Ok(())
}
