use strata_resolver::TableResolver;

#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct ResolverConfig {
    /// Accept physical tables whose columns only partially cover the requested interval.
    #[clap(
        long = "allow-partial-data",
        env = "STRATA_ALLOW_PARTIAL_DATA",
        default_value_t = false,
        action
    )]
    pub allow_partial_data: bool,
}

impl ResolverConfig {
    pub fn resolver(&self) -> TableResolver {
        TableResolver::new(self.allow_partial_data)
    }
}
