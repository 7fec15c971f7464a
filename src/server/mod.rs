//! JSON-over-HTTP boundary.
//!
//! Two operations: `POST /analyze` for inventory queries and
//! `POST /cost-analysis` for cost queries, plus static example documents.
//! One task per connection; each request builds its own collector or
//! aggregator so concurrent requests stay isolated and share only the
//! immutable credential inside the remote client.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::core::collector::ResourceCollector;
use crate::core::cost::CostAggregator;
use crate::core::router::{
    CostRequest, InventoryRequest, parse_cost_request, run_cost_query, run_inventory_query,
};
use crate::error::{CostscopeError, Result};
use crate::remote::RemoteQueryClient;

/// Shared, immutable per-process state.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn RemoteQueryClient>,
    pub config: Arc<Config>,
}

/// Serve the API until the process is stopped.
///
/// # Errors
///
/// Returns error when the listener cannot be bound.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "costscope listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!(%peer, "accepted connection");
        let io = TokioIo::new(stream);
        let state = state.clone();
        tokio::task::spawn(async move {
            let service = service_fn(move |request| route(request, state.clone()));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(error = %err, "connection closed with error");
            }
        });
    }
}

async fn route(
    request: Request<Incoming>,
    state: AppState,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = match (&method, path.as_str()) {
        (&Method::POST, "/analyze") => handle_analyze(request, &state).await,
        (&Method::POST, "/cost-analysis") => handle_cost(request, &state).await,
        (&Method::GET, "/example") => Ok(inventory_examples()),
        (&Method::GET, "/cost-example") => Ok(cost_examples()),
        _ => Err(CostscopeError::InvalidRequest(format!(
            "no route for {method} {path}"
        ))),
    };

    let rendered = match response {
        Ok(body) => json_response(StatusCode::OK, &body),
        Err(err) => {
            let status = if matches!((&method, path.as_str()), (&Method::POST, "/analyze" | "/cost-analysis")) {
                StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            } else {
                StatusCode::NOT_FOUND
            };
            tracing::error!(%method, %path, error = %err, "request failed");
            json_response(status, &json!({ "error": err.to_string() }))
        }
    };
    Ok(rendered)
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(bytes)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

async fn read_body(request: Request<Incoming>) -> Result<Bytes> {
    let collected = request
        .into_body()
        .collect()
        .await
        .map_err(|e| CostscopeError::InvalidRequest(format!("could not read body: {e}")))?;
    Ok(collected.to_bytes())
}

async fn handle_analyze(
    request: Request<Incoming>,
    state: &AppState,
) -> Result<serde_json::Value> {
    let body = read_body(request).await?;
    let inventory_request: InventoryRequest = serde_json::from_slice(&body)
        .map_err(|e| CostscopeError::InvalidRequest(format!("invalid JSON body: {e}")))?;
    tracing::info!(
        subscription = inventory_request.subscription_id.as_deref().unwrap_or("<tenant>"),
        "inventory query"
    );

    let collector = ResourceCollector::new(
        Arc::clone(&state.client),
        state.config.batch_executor(),
    );
    let report = run_inventory_query(&collector, &inventory_request).await?;
    Ok(serde_json::to_value(report)?)
}

async fn handle_cost(request: Request<Incoming>, state: &AppState) -> Result<serde_json::Value> {
    let body = read_body(request).await?;
    let cost_request: CostRequest = serde_json::from_slice(&body)
        .map_err(|e| CostscopeError::InvalidRequest(format!("invalid JSON body: {e}")))?;

    let intent = parse_cost_request(&cost_request, Utc::now())?;
    let aggregator = CostAggregator::new(
        Arc::clone(&state.client),
        state.config.batch_executor(),
        intent.subscription_id.clone(),
    );

    // A remote failure after retries is a per-scope outcome, not a transport
    // failure: report it in the body alongside the subscription id.
    match run_cost_query(&aggregator, &intent).await {
        Ok(response) => Ok(serde_json::to_value(response)?),
        Err(CostscopeError::Remote(remote)) => Ok(json!({
            "subscription_id": intent.subscription_id,
            "error": remote.to_string(),
        })),
        Err(other) => Err(other),
    }
}

// =============================================================================
// Example Documents
// =============================================================================

fn inventory_examples() -> serde_json::Value {
    json!({
        "single_subscription_analysis": {
            "subscription_id": "your-subscription-id",
            "resource_types": ["Public IP", "Managed Disk", "Snapshot", "Network Interface"],
            "resource_group": "my-resource-group",
            "location": "eastus"
        },
        "tenant_wide_analysis": {
            "resource_types": ["Public IP", "Managed Disk"],
            "location": "eastus",
            "subscription_name": "Production Subscription"
        },
        "all_resources_all_subscriptions": {
            "description": "Analyze all resource types across all subscriptions in the tenant"
        }
    })
}

fn cost_examples() -> serde_json::Value {
    json!({
        "subscription_costs": {
            "subscription_id": "your-subscription-id",
            "query_type": "subscription",
            "start_date": "2026-07-01T00:00:00Z",
            "end_date": "2026-07-31T23:59:59Z",
            "granularity": "Daily"
        },
        "resource_group_costs": {
            "subscription_id": "your-subscription-id",
            "query_type": "resource_group",
            "resource_group": "my-resource-group",
            "start_date": "2026-07-01",
            "end_date": "2026-07-31"
        },
        "service_costs": {
            "subscription_id": "your-subscription-id",
            "query_type": "service",
            "service_names": ["Virtual Machines", "Storage", "Networking"],
            "start_date": "2026-07-01",
            "end_date": "2026-07-31"
        },
        "top_resources": {
            "subscription_id": "your-subscription-id",
            "query_type": "top_resources",
            "top_n": 10
        },
        "specific_resources": {
            "subscription_id": "your-subscription-id",
            "query_type": "specific_resources",
            "resource_ids": [
                "/subscriptions/xxx/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1",
                "/subscriptions/xxx/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/storage1"
            ]
        },
        "budget_analysis": {
            "subscription_id": "your-subscription-id",
            "query_type": "budget"
        },
        "location_costs": {
            "subscription_id": "your-subscription-id",
            "query_type": "location"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_documents_cover_every_query_type() {
        let examples = cost_examples();
        for key in [
            "subscription_costs",
            "resource_group_costs",
            "service_costs",
            "top_resources",
            "specific_resources",
            "budget_analysis",
            "location_costs",
        ] {
            assert!(examples.get(key).is_some(), "missing example {key}");
        }
    }

    #[test]
    fn json_response_sets_content_type() {
        let response = json_response(StatusCode::OK, &json!({ "ok": true }));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[hyper::header::CONTENT_TYPE],
            "application/json"
        );
    }
}
