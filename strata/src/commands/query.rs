use std::{path::PathBuf, sync::Arc};

use serde_json::json;

use super::common::{ReplayExecutor, Result, RouterConfig};

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    pub(crate) router: RouterConfig,

    /// Directory of recorded backend responses, one `<physical table>.json` per table
    #[clap(long = "responses", env = "STRATA_RESPONSES")]
    responses: PathBuf,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let executor = Arc::new(ReplayExecutor::new(config.responses));
    let (router, request) = config.router.build(executor).await?;
    for result in router.execute(&request).await? {
        let line = json!({
            "table": result.table.as_ref(),
            "endpoint": result.endpoint.as_ref(),
            "cached": result.cached,
            "body": String::from_utf8_lossy(&result.body),
        });
        println!("{line}");
    }
    Ok(())
}
