//! Cost query aggregation.
//!
//! Translates a cost query intent into one or more tabular queries against
//! the billing API and reduces them to totals and breakdowns. Queries are
//! described by a typed [`QuerySpec`] builder; the remote client owns the
//! translation to its wire format.
//!
//! The per-resource path is the batch-executor use case: the billing API is
//! only accurate when asked about one resource id at a time, so each id
//! becomes a paced, retried batch item.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::executor::{BatchExecutor, ItemOutcome};
use crate::error::Result;
use crate::remote::{BudgetInfo, CostTable, RemoteQueryClient};
use crate::util::time::DateRange;

/// Currency reported by the billing API for aggregated costs.
pub const CURRENCY: &str = "USD";

// =============================================================================
// Query Spec
// =============================================================================

/// Time-bucketing of a cost query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Granularity {
    #[default]
    Daily,
    Monthly,
    None,
}

impl Granularity {
    /// Wire name used by the billing API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Monthly => "Monthly",
            Self::None => "None",
        }
    }

    /// Parse from a request string (case-insensitive).
    #[must_use]
    pub fn from_arg(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "monthly" => Some(Self::Monthly),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Grouping/filter dimensions understood by the billing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    ServiceName,
    ResourceLocation,
    ResourceId,
}

impl Dimension {
    /// Wire name used by the billing API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServiceName => "ServiceName",
            Self::ResourceLocation => "ResourceLocation",
            Self::ResourceId => "ResourceId",
        }
    }
}

/// An `In` filter on one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionFilter {
    pub dimension: Dimension,
    pub values: Vec<String>,
}

/// A validated tabular cost query: actual cost summed over `[from, to]`,
/// bucketed, grouped, optionally filtered, sorted, and limited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub range: DateRange,
    pub granularity: Granularity,
    pub grouping: Vec<Dimension>,
    pub filter: Option<DimensionFilter>,
    pub sort_by_cost_desc: bool,
    pub top: Option<u32>,
}

impl QuerySpec {
    /// Start building an actual-cost query over a period.
    #[must_use]
    pub const fn actual_cost(range: DateRange) -> Self {
        Self {
            range,
            granularity: Granularity::Daily,
            grouping: Vec::new(),
            filter: None,
            sort_by_cost_desc: false,
            top: None,
        }
    }

    /// Set the time bucketing.
    #[must_use]
    pub const fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Add a grouping dimension.
    #[must_use]
    pub fn group_by(mut self, dimension: Dimension) -> Self {
        self.grouping.push(dimension);
        self
    }

    /// Restrict to rows whose dimension value is in the list.
    #[must_use]
    pub fn filter_in(mut self, dimension: Dimension, values: Vec<String>) -> Self {
        self.filter = Some(DimensionFilter { dimension, values });
        self
    }

    /// Sort rows by cost, highest first.
    #[must_use]
    pub const fn sorted_by_cost_desc(mut self) -> Self {
        self.sort_by_cost_desc = true;
        self
    }

    /// Keep only the first `n` rows.
    #[must_use]
    pub const fn top(mut self, n: u32) -> Self {
        self.top = Some(n);
        self
    }
}

// =============================================================================
// Results
// =============================================================================

/// One reduced row: the cost plus the remaining column values verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostRow {
    pub cost: f64,
    pub dimension_values: Vec<serde_json::Value>,
}

/// Reduced tabular result for the aggregate query kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostQueryResult {
    pub subscription_id: String,
    pub analysis_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub total_cost: f64,
    pub currency: String,
    pub columns: Vec<String>,
    pub rows: Vec<CostRow>,
}

/// One date bucket of a per-resource cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyCost {
    pub date: String,
    pub cost: f64,
}

/// Per-resource entry in a specific-resources report.
///
/// Successful entries carry a total and daily breakdown; failed or skipped
/// entries carry only the error and are excluded from the report total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCostEntry {
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_costs: Option<Vec<DailyCost>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of the per-resource batch path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecificResourcesReport {
    pub subscription_id: String,
    pub period: DateRange,
    pub resources: Vec<ResourceCostEntry>,
    pub total_cost: f64,
    /// True when the throttling circuit breaker cut the run short.
    pub aborted: bool,
}

/// Budget-versus-actual analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetReport {
    pub subscription_id: String,
    pub period: DateRange,
    pub actual_costs: CostQueryResult,
    pub budgets: Vec<BudgetInfo>,
    pub analysis_date: chrono::DateTime<Utc>,
}

/// Reduce a raw table: the first column is the cost, the rest are kept
/// verbatim for caller-side interpretation.
#[must_use]
pub fn reduce_table(table: &CostTable) -> (f64, Vec<CostRow>) {
    let mut total = 0.0;
    let mut rows = Vec::with_capacity(table.rows.len());
    for raw in &table.rows {
        let Some((first, rest)) = raw.split_first() else {
            continue;
        };
        let cost = first.as_f64().unwrap_or(0.0);
        total += cost;
        rows.push(CostRow {
            cost,
            dimension_values: rest.to_vec(),
        });
    }
    (total, rows)
}

fn date_label(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

// =============================================================================
// Cost Aggregator
// =============================================================================

/// Issues cost queries for one subscription and reduces the results.
pub struct CostAggregator {
    client: Arc<dyn RemoteQueryClient>,
    executor: BatchExecutor,
    subscription_id: String,
}

impl CostAggregator {
    /// Create an aggregator scoped to one subscription.
    #[must_use]
    pub fn new(
        client: Arc<dyn RemoteQueryClient>,
        executor: BatchExecutor,
        subscription_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            executor,
            subscription_id: subscription_id.into(),
        }
    }

    fn subscription_scope(&self) -> String {
        format!("/subscriptions/{}", self.subscription_id)
    }

    /// Run one tabular query with the standard retry handling.
    async fn query(&self, scope: String, spec: QuerySpec) -> Result<CostTable> {
        let client = Arc::clone(&self.client);
        let spec = Arc::new(spec);
        let table = self
            .executor
            .call_with_retry(move || {
                let client = Arc::clone(&client);
                let scope = scope.clone();
                let spec = Arc::clone(&spec);
                Box::pin(async move { client.run_cost_query(&scope, &spec).await })
            })
            .await?;
        Ok(table)
    }

    fn reduced(
        &self,
        table: &CostTable,
        analysis_type: &str,
        metadata: Option<serde_json::Value>,
    ) -> CostQueryResult {
        let (total_cost, rows) = reduce_table(table);
        CostQueryResult {
            subscription_id: self.subscription_id.clone(),
            analysis_type: analysis_type.to_string(),
            metadata,
            total_cost,
            currency: CURRENCY.to_string(),
            columns: table.columns.clone(),
            rows,
        }
    }

    /// Total subscription costs grouped by service and location.
    pub async fn subscription_costs(
        &self,
        range: DateRange,
        granularity: Granularity,
    ) -> Result<CostQueryResult> {
        let spec = QuerySpec::actual_cost(range)
            .granularity(granularity)
            .group_by(Dimension::ServiceName)
            .group_by(Dimension::ResourceLocation);
        let table = self.query(self.subscription_scope(), spec).await?;
        Ok(self.reduced(&table, "subscription", None))
    }

    /// Costs for one resource group, grouped by resource and service.
    pub async fn resource_group_costs(
        &self,
        resource_group: &str,
        range: DateRange,
        granularity: Granularity,
    ) -> Result<CostQueryResult> {
        let scope = format!(
            "{}/resourceGroups/{resource_group}",
            self.subscription_scope()
        );
        let spec = QuerySpec::actual_cost(range)
            .granularity(granularity)
            .group_by(Dimension::ResourceId)
            .group_by(Dimension::ServiceName);
        let table = self.query(scope, spec).await?;
        Ok(self.reduced(
            &table,
            "resource_group",
            Some(serde_json::Value::String(resource_group.to_string())),
        ))
    }

    /// Costs filtered to the named services.
    pub async fn costs_by_service(
        &self,
        service_names: Vec<String>,
        range: DateRange,
    ) -> Result<CostQueryResult> {
        let metadata = serde_json::to_value(&service_names)?;
        let spec = QuerySpec::actual_cost(range)
            .granularity(Granularity::Daily)
            .filter_in(Dimension::ServiceName, service_names)
            .group_by(Dimension::ResourceId)
            .group_by(Dimension::ServiceName)
            .group_by(Dimension::ResourceLocation);
        let table = self.query(self.subscription_scope(), spec).await?;
        Ok(self.reduced(&table, "service_filter", Some(metadata)))
    }

    /// The `top_n` most expensive resources over the period.
    pub async fn top_cost_resources(
        &self,
        range: DateRange,
        top_n: u32,
    ) -> Result<CostQueryResult> {
        let spec = QuerySpec::actual_cost(range)
            .granularity(Granularity::None)
            .group_by(Dimension::ResourceId)
            .group_by(Dimension::ServiceName)
            .sorted_by_cost_desc()
            .top(top_n);
        let table = self.query(self.subscription_scope(), spec).await?;
        Ok(self.reduced(&table, "top_resources", Some(top_n.into())))
    }

    /// Costs broken down by region, highest first.
    pub async fn cost_by_location(&self, range: DateRange) -> Result<CostQueryResult> {
        let spec = QuerySpec::actual_cost(range)
            .granularity(Granularity::None)
            .group_by(Dimension::ResourceLocation)
            .group_by(Dimension::ServiceName)
            .sorted_by_cost_desc();
        let table = self.query(self.subscription_scope(), spec).await?;
        Ok(self.reduced(&table, "by_location", None))
    }

    /// Actual spend plus any configured budgets for the scope.
    ///
    /// A budget-listing failure degrades to an empty budget list; the actual
    /// cost half is still reported.
    pub async fn budget_analysis(&self, range: DateRange) -> Result<BudgetReport> {
        let actual_costs = self
            .subscription_costs(range, Granularity::Monthly)
            .await?;

        let client = Arc::clone(&self.client);
        let scope = self.subscription_scope();
        let budgets = match self
            .executor
            .call_with_retry(move || {
                let client = Arc::clone(&client);
                let scope = scope.clone();
                Box::pin(async move { client.list_budgets(&scope).await })
            })
            .await
        {
            Ok(budgets) => budgets,
            Err(err) => {
                tracing::warn!(error = %err, "could not fetch budgets");
                Vec::new()
            }
        };

        Ok(BudgetReport {
            subscription_id: self.subscription_id.clone(),
            period: range,
            actual_costs,
            budgets,
            analysis_date: Utc::now(),
        })
    }

    /// Per-resource costs, one billing query per id through the executor.
    ///
    /// Ids whose execution outcome is error or skipped are recorded with an
    /// `error` field and excluded from `total_cost`.
    pub async fn specific_resources_cost(
        &self,
        resource_ids: Vec<String>,
        range: DateRange,
    ) -> SpecificResourcesReport {
        tracing::info!(
            count = resource_ids.len(),
            "querying per-resource costs individually for accuracy"
        );

        let scope = self.subscription_scope();
        let report = self
            .executor
            .run(resource_ids, |resource_id| {
                let client = Arc::clone(&self.client);
                let scope = scope.clone();
                let spec = QuerySpec::actual_cost(range)
                    .granularity(Granularity::Daily)
                    .filter_in(Dimension::ResourceId, vec![resource_id.clone()]);
                Box::pin(async move { client.run_cost_query(&scope, &spec).await })
            })
            .await;

        let aborted = report.aborted;
        let mut entries = Vec::with_capacity(report.outcomes.len());
        let mut total_cost = 0.0;

        for item in report.outcomes {
            let resource_id = item.item;
            match item.outcome {
                ItemOutcome::Success(table) => {
                    let mut resource_total = 0.0;
                    let mut daily_costs = Vec::with_capacity(table.rows.len());
                    for row in &table.rows {
                        let cost = row.first().and_then(serde_json::Value::as_f64).unwrap_or(0.0);
                        resource_total += cost;
                        daily_costs.push(DailyCost {
                            date: date_label(row.get(1)),
                            cost,
                        });
                    }
                    total_cost += resource_total;
                    entries.push(ResourceCostEntry {
                        resource_id,
                        total_cost: Some(resource_total),
                        daily_costs: Some(daily_costs),
                        error: None,
                    });
                }
                ItemOutcome::Error { message, .. } => {
                    entries.push(ResourceCostEntry {
                        resource_id,
                        total_cost: None,
                        daily_costs: None,
                        error: Some(message),
                    });
                }
                ItemOutcome::Skipped { reason } => {
                    entries.push(ResourceCostEntry {
                        resource_id,
                        total_cost: None,
                        daily_costs: None,
                        error: Some(reason),
                    });
                }
            }
        }

        SpecificResourcesReport {
            subscription_id: self.subscription_id.clone(),
            period: range,
            resources: entries,
            total_cost,
            aborted,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
