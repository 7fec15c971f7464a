//! `costscope analyze` — run an inventory query from the command line.

use std::sync::Arc;

use super::AnalyzeArgs;
use crate::config::Config;
use crate::core::collector::ResourceCollector;
use crate::core::router::run_inventory_query;
use crate::error::Result;
use crate::remote::{ArmClient, Credential, RemoteQueryClient, arm};

/// Execute the analyze command.
///
/// # Errors
///
/// Returns error on invalid request, missing credential, or a failed
/// collection.
pub async fn execute(args: &AnalyzeArgs, pretty: bool) -> Result<()> {
    let request = args.to_request()?;

    let config = Config::load()?;
    config.validate()?;
    let credential = Credential::from_env()?;
    let http = arm::build_client(config.timeout())?;
    let client: Arc<dyn RemoteQueryClient> =
        Arc::new(ArmClient::new(http, credential, config.api_base()));

    let collector = ResourceCollector::new(client, config.batch_executor());
    let report = run_inventory_query(&collector, &request).await?;
    super::print_json(&serde_json::to_value(report)?, pretty)
}
