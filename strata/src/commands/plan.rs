use std::{path::PathBuf, sync::Arc};

use serde_json::{Value, json};
use strata_router::QueryPlan;

use super::common::{ReplayExecutor, Result, RouterConfig};

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    pub(crate) router: RouterConfig,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    // Planning never reaches the backend.
    let executor = Arc::new(ReplayExecutor::new(PathBuf::new()));
    let (router, request) = config.router.build(executor).await?;
    let plan = router.plan(&request).await?;
    println!("{}", serde_json::to_string(&plan_json(&plan)?)?);
    Ok(())
}

fn plan_json(plan: &QueryPlan) -> Result<Value> {
    let queries = plan
        .queries
        .iter()
        .map(|q| -> Result<Value> {
            let metrics: Vec<&str> = q
                .constraint
                .metric_names()
                .iter()
                .map(AsRef::as_ref)
                .collect();
            Ok(json!({
                "table": q.table.name().as_ref(),
                "metrics": metrics,
                "endpoint": q.endpoint.as_ref(),
                "cacheKey": q.cache_key.as_ref().map(|k| k.as_str()),
                "query": serde_json::from_str::<Value>(&q.query)?,
            }))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(json!({
        "table": plan.table.to_string(),
        "interval": plan.interval.to_string(),
        "split": plan.split,
        "queries": queries,
    }))
}
