//! Request parsing and dispatch.
//!
//! Turns raw JSON request bodies into validated query intents and routes
//! them to the resource collector or the cost aggregator. Intents are
//! constructed once per request and read-only afterward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::collector::ResourceCollector;
use super::cost::{
    BudgetReport, CostAggregator, CostQueryResult, Granularity, SpecificResourcesReport,
};
use super::models::{
    InventoryFilter, InventoryReport, ScopeRef, apply_filter, summarize,
};
use crate::error::{CostscopeError, Result};
use crate::util::time::{DateRange, resolve_range};

// =============================================================================
// Inventory Path
// =============================================================================

/// Body of an inventory query request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryRequest {
    /// Absent means tenant-wide analysis.
    pub subscription_id: Option<String>,
    pub resource_types: Option<Vec<String>>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub subscription_name: Option<String>,
}

impl InventoryRequest {
    fn filter(&self) -> InventoryFilter {
        InventoryFilter {
            resource_types: self.resource_types.clone(),
            resource_group: self.resource_group.clone(),
            location: self.location.clone(),
            subscription_name: self.subscription_name.clone(),
        }
    }
}

/// Run a full inventory query: collect, filter, and re-summarize.
///
/// Filters apply after full collection; the summary is recomputed from the
/// filtered list so it always agrees with `resources`.
pub async fn run_inventory_query(
    collector: &ResourceCollector,
    request: &InventoryRequest,
) -> Result<InventoryReport> {
    let scope = ScopeRef::from_subscription(request.subscription_id.as_deref());
    let mut report = collector.analyze(&scope).await?;

    let filter = request.filter();
    if !filter.is_empty() {
        report.resources = apply_filter(report.resources, &filter);
        report.summary = summarize(&report.resources);
    }
    Ok(report)
}

// =============================================================================
// Cost Path
// =============================================================================

/// Body of a cost query request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostRequest {
    pub subscription_id: Option<String>,
    pub query_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub resource_group: Option<String>,
    pub service_names: Option<Vec<String>>,
    pub resource_ids: Option<Vec<String>>,
    pub top_n: Option<u32>,
    pub granularity: Option<String>,
}

/// The cost query kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostQueryKind {
    Subscription,
    ResourceGroup,
    Service,
    TopResources,
    Budget,
    Location,
    SpecificResources,
}

impl CostQueryKind {
    /// Request-facing names, in the order shown to callers.
    pub const VALID_TYPES: &'static str =
        "subscription, resource_group, service, top_resources, budget, location, specific_resources";

    /// Parse an explicit `query_type` value.
    #[must_use]
    pub fn from_arg(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "subscription" => Some(Self::Subscription),
            "resource_group" => Some(Self::ResourceGroup),
            "service" => Some(Self::Service),
            "top_resources" => Some(Self::TopResources),
            "budget" => Some(Self::Budget),
            "location" => Some(Self::Location),
            "specific_resources" => Some(Self::SpecificResources),
            _ => None,
        }
    }

    /// Infer the kind from which parameters are present, in priority order.
    #[must_use]
    pub fn infer(request: &CostRequest) -> Self {
        if request.resource_ids.is_some() {
            Self::SpecificResources
        } else if request.resource_group.is_some() {
            Self::ResourceGroup
        } else if request.service_names.is_some() {
            Self::Service
        } else if request.top_n.is_some() {
            Self::TopResources
        } else {
            Self::Subscription
        }
    }
}

/// Default row limit for top-resources queries.
pub const DEFAULT_TOP_N: u32 = 10;

/// A parsed, validated cost query. Read-only after construction.
#[derive(Debug, Clone)]
pub struct CostQueryIntent {
    pub subscription_id: String,
    pub kind: CostQueryKind,
    pub range: DateRange,
    pub granularity: Granularity,
    pub resource_group: Option<String>,
    pub service_names: Option<Vec<String>>,
    pub resource_ids: Option<Vec<String>>,
    pub top_n: u32,
}

/// Parse and validate a cost request.
///
/// `now` is the caller's single clock reading, used when the date range is
/// omitted.
///
/// # Errors
///
/// Returns [`CostscopeError::InvalidRequest`] for a missing subscription id,
/// an unknown query type, a bad date or granularity, or a kind-specific
/// parameter that is required but absent.
pub fn parse_cost_request(
    request: &CostRequest,
    now: DateTime<Utc>,
) -> Result<CostQueryIntent> {
    let subscription_id = request
        .subscription_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            CostscopeError::InvalidRequest("subscription_id is required".to_string())
        })?
        .to_string();

    let kind = match request.query_type.as_deref() {
        Some(value) => CostQueryKind::from_arg(value).ok_or_else(|| {
            CostscopeError::InvalidRequest(format!(
                "unknown query_type '{value}'; valid types: {}",
                CostQueryKind::VALID_TYPES
            ))
        })?,
        None => CostQueryKind::infer(request),
    };

    let range = resolve_range(
        request.start_date.as_deref(),
        request.end_date.as_deref(),
        now,
    )?;

    let granularity = match request.granularity.as_deref() {
        Some(value) => Granularity::from_arg(value).ok_or_else(|| {
            CostscopeError::InvalidRequest(format!(
                "unknown granularity '{value}'; valid values: Daily, Monthly, None"
            ))
        })?,
        None => Granularity::Daily,
    };

    let require = |field: &Option<Vec<String>>, name: &str| -> Result<Vec<String>> {
        match field {
            Some(values) if !values.is_empty() => Ok(values.clone()),
            _ => Err(CostscopeError::InvalidRequest(format!(
                "{name} list is required for {} query",
                kind_name(kind)
            ))),
        }
    };

    let mut intent = CostQueryIntent {
        subscription_id,
        kind,
        range,
        granularity,
        resource_group: None,
        service_names: None,
        resource_ids: None,
        top_n: request.top_n.unwrap_or(DEFAULT_TOP_N),
    };

    match kind {
        CostQueryKind::ResourceGroup => {
            intent.resource_group = Some(
                request
                    .resource_group
                    .as_deref()
                    .map(str::trim)
                    .filter(|group| !group.is_empty())
                    .ok_or_else(|| {
                        CostscopeError::InvalidRequest(
                            "resource_group is required for resource_group query".to_string(),
                        )
                    })?
                    .to_string(),
            );
        }
        CostQueryKind::Service => {
            intent.service_names = Some(require(&request.service_names, "service_names")?);
        }
        CostQueryKind::SpecificResources => {
            intent.resource_ids = Some(require(&request.resource_ids, "resource_ids")?);
        }
        CostQueryKind::Subscription
        | CostQueryKind::TopResources
        | CostQueryKind::Budget
        | CostQueryKind::Location => {}
    }

    Ok(intent)
}

const fn kind_name(kind: CostQueryKind) -> &'static str {
    match kind {
        CostQueryKind::Subscription => "subscription",
        CostQueryKind::ResourceGroup => "resource_group",
        CostQueryKind::Service => "service",
        CostQueryKind::TopResources => "top_resources",
        CostQueryKind::Budget => "budget",
        CostQueryKind::Location => "location",
        CostQueryKind::SpecificResources => "specific_resources",
    }
}

/// Response of a cost query; the shape depends on the query kind.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CostResponse {
    Table(CostQueryResult),
    Budget(Box<BudgetReport>),
    Specific(SpecificResourcesReport),
}

/// Dispatch a validated intent to the aggregator.
pub async fn run_cost_query(
    aggregator: &CostAggregator,
    intent: &CostQueryIntent,
) -> Result<CostResponse> {
    tracing::info!(
        subscription = %intent.subscription_id,
        query_type = kind_name(intent.kind),
        "executing cost query"
    );

    match intent.kind {
        CostQueryKind::Subscription => aggregator
            .subscription_costs(intent.range, intent.granularity)
            .await
            .map(CostResponse::Table),
        CostQueryKind::ResourceGroup => {
            let group = intent.resource_group.as_deref().unwrap_or_default();
            aggregator
                .resource_group_costs(group, intent.range, intent.granularity)
                .await
                .map(CostResponse::Table)
        }
        CostQueryKind::Service => {
            let names = intent.service_names.clone().unwrap_or_default();
            aggregator
                .costs_by_service(names, intent.range)
                .await
                .map(CostResponse::Table)
        }
        CostQueryKind::TopResources => aggregator
            .top_cost_resources(intent.range, intent.top_n)
            .await
            .map(CostResponse::Table),
        CostQueryKind::Budget => aggregator
            .budget_analysis(intent.range)
            .await
            .map(|report| CostResponse::Budget(Box::new(report))),
        CostQueryKind::Location => aggregator
            .cost_by_location(intent.range)
            .await
            .map(CostResponse::Table),
        CostQueryKind::SpecificResources => {
            let ids = intent.resource_ids.clone().unwrap_or_default();
            let report = aggregator.specific_resources_cost(ids, intent.range).await;
            Ok(CostResponse::Specific(report))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
