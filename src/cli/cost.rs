//! `costscope cost` — run a cost query from the command line.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::CostArgs;
use crate::config::Config;
use crate::core::cost::CostAggregator;
use crate::core::router::{parse_cost_request, run_cost_query};
use crate::error::{CostscopeError, Result};
use crate::remote::{ArmClient, Credential, RemoteQueryClient, arm};

/// Execute the cost command.
///
/// # Errors
///
/// Returns error on invalid request or missing credential; remote failures
/// after retries are reported in the JSON body like the HTTP operation does.
pub async fn execute(args: &CostArgs, pretty: bool) -> Result<()> {
    let request = args.to_request()?;
    // Validate before touching credentials so request mistakes fail fast.
    let intent = parse_cost_request(&request, Utc::now())?;

    let config = Config::load()?;
    config.validate()?;
    let credential = Credential::from_env()?;
    let http = arm::build_client(config.timeout())?;
    let client: Arc<dyn RemoteQueryClient> =
        Arc::new(ArmClient::new(http, credential, config.api_base()));

    let aggregator = CostAggregator::new(
        client,
        config.batch_executor(),
        intent.subscription_id.clone(),
    );

    let body = match run_cost_query(&aggregator, &intent).await {
        Ok(response) => serde_json::to_value(response)?,
        Err(CostscopeError::Remote(remote)) => json!({
            "subscription_id": intent.subscription_id,
            "error": remote.to_string(),
        }),
        Err(other) => return Err(other),
    };
    super::print_json(&body, pretty)
}
