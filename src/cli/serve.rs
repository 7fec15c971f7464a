//! `costscope serve` — run the HTTP API server.

use std::sync::Arc;

use super::ServeArgs;
use crate::config::Config;
use crate::error::{CostscopeError, Result};
use crate::remote::{ArmClient, Credential, RemoteQueryClient, arm};
use crate::server::{AppState, serve};

/// Execute the serve command.
///
/// # Errors
///
/// Returns error on configuration or credential problems, or when the
/// listener cannot be bound.
pub async fn execute(args: &ServeArgs) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let addr = match &args.bind {
        Some(raw) => raw
            .parse()
            .map_err(|_| CostscopeError::Config(format!("invalid bind address '{raw}'")))?,
        None => config.bind_addr()?,
    };

    let credential = Credential::from_env()?;
    let http = arm::build_client(config.timeout())?;
    let client: Arc<dyn RemoteQueryClient> =
        Arc::new(ArmClient::new(http, credential, config.api_base()));

    let state = AppState {
        client,
        config: Arc::new(config),
    };
    serve(addr, state).await
}
