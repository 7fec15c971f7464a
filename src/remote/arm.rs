//! Management REST API client.
//!
//! Implements [`RemoteQueryClient`] over the provider's resource-manager
//! endpoints with a shared reqwest client. Every method is a single remote
//! call: failures come back as [`RemoteError`] with the HTTP status
//! preserved so the executor can classify them.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;

use super::{
    BudgetInfo, CostTable, Credential, DiskInventory, ImageReference, NicInventory, OsType,
    PublicIpInventory, RecommendationInventory, RemoteError, RemoteQueryClient, RemoteResult,
    SnapshotInventory, SubscriptionInfo, VmInventory,
};
use crate::core::cost::QuerySpec;

/// Default management API endpoint.
pub const DEFAULT_API_BASE: &str = "https://management.azure.com";

/// Default timeout for management API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
const NETWORK_API_VERSION: &str = "2023-09-01";
const COMPUTE_API_VERSION: &str = "2023-07-01";
const ADVISOR_API_VERSION: &str = "2023-01-01";
const COST_API_VERSION: &str = "2023-11-01";
const BUDGETS_API_VERSION: &str = "2023-05-01";

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> crate::error::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("costscope/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| crate::error::CostscopeError::Config(format!("HTTP client: {e}")))
}

// =============================================================================
// Client
// =============================================================================

/// reqwest-backed implementation of the remote capability.
pub struct ArmClient {
    http: reqwest::Client,
    credential: Credential,
    base_url: String,
}

impl ArmClient {
    /// Create a client against a base URL (tests point this at a mock
    /// server).
    #[must_use]
    pub fn new(http: reqwest::Client, credential: Credential, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            credential,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client with a freshly built HTTP client and the default
    /// endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client construction fails.
    pub fn with_defaults(credential: Credential) -> crate::error::Result<Self> {
        Ok(Self::new(
            build_client(DEFAULT_TIMEOUT)?,
            credential,
            DEFAULT_API_BASE,
        ))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read_json(response: reqwest::Response) -> RemoteResult<serde_json::Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else if body.len() > 512 {
                body.chars().take(512).collect()
            } else {
                body
            };
            return Err(RemoteError::with_status(status.as_u16(), detail));
        }
        response
            .json()
            .await
            .map_err(|e| RemoteError::message(format!("malformed response body: {e}")))
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> RemoteResult<serde_json::Value> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(self.credential.bearer())
            .query(query)
            .send()
            .await
            .map_err(|e| RemoteError::message(e.to_string()))?;
        Self::read_json(response).await
    }

    async fn post_cost_query(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> RemoteResult<serde_json::Value> {
        // The billing API throttles generic clients hard; a custom
        // ClientType header selects a more generous quota tier.
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(self.credential.bearer())
            .query(&[("api-version", COST_API_VERSION)])
            .header("ClientType", "costscope")
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::message(e.to_string()))?;
        Self::read_json(response).await
    }

    fn parse_list<T: serde::de::DeserializeOwned>(
        value: serde_json::Value,
    ) -> RemoteResult<Vec<T>> {
        let envelope: ListEnvelope<T> = serde_json::from_value(value)
            .map_err(|e| RemoteError::message(format!("malformed response body: {e}")))?;
        Ok(envelope.value)
    }
}

// =============================================================================
// Wire Shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSubscription {
    subscription_id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireSku {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePublicIp {
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    sku: Option<WireSku>,
    #[serde(default)]
    properties: WirePublicIpProps,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePublicIpProps {
    public_ip_allocation_method: Option<String>,
    ip_configuration: Option<WireRef>,
    nat_gateway: Option<WireRef>,
    #[serde(default)]
    load_balancer_frontend_ip_configurations: Vec<WireRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDisk {
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    sku: Option<WireSku>,
    #[serde(default)]
    properties: WireDiskProps,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDiskProps {
    #[serde(default)]
    disk_state: String,
    #[serde(rename = "diskSizeGB")]
    disk_size_gb: Option<i64>,
    time_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNic {
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    properties: WireNicProps,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNicProps {
    virtual_machine: Option<WireRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVm {
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    properties: WireVmProps,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVmProps {
    hardware_profile: Option<WireHardwareProfile>,
    storage_profile: Option<WireStorageProfile>,
    license_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHardwareProfile {
    vm_size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStorageProfile {
    os_disk: Option<WireOsDisk>,
    image_reference: Option<WireImageReference>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOsDisk {
    os_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireImageReference {
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    offer: String,
    #[serde(default)]
    sku: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecommendation {
    id: String,
    name: String,
    #[serde(default)]
    properties: WireRecommendationProps,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecommendationProps {
    #[serde(default)]
    category: String,
    impact: Option<String>,
    risk: Option<String>,
    short_description: Option<WireShortDescription>,
    impacted_value: Option<String>,
    resource_metadata: Option<WireResourceMetadata>,
    #[serde(default)]
    extended_properties: HashMap<String, String>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireShortDescription {
    problem: Option<String>,
    solution: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResourceMetadata {
    resource_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCostResult {
    #[serde(default)]
    properties: WireCostProps,
}

#[derive(Debug, Default, Deserialize)]
struct WireCostProps {
    #[serde(default)]
    columns: Vec<WireCostColumn>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct WireCostColumn {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireBudget {
    name: String,
    #[serde(default)]
    properties: WireBudgetProps,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBudgetProps {
    #[serde(default)]
    amount: f64,
    current_spend: Option<WireSpend>,
    forecast_spend: Option<WireSpend>,
    time_grain: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSpend {
    #[serde(default)]
    amount: f64,
}

// =============================================================================
// Wire Translation
// =============================================================================

/// Translate a [`QuerySpec`] into the billing API's request body. This is
/// the only place that knows the wire format.
fn cost_query_body(spec: &QuerySpec) -> serde_json::Value {
    let mut dataset = json!({
        "granularity": spec.granularity.as_str(),
        "aggregation": {
            "totalCost": { "name": "Cost", "function": "Sum" }
        },
    });

    if !spec.grouping.is_empty() {
        dataset["grouping"] = spec
            .grouping
            .iter()
            .map(|dimension| json!({ "type": "Dimension", "name": dimension.as_str() }))
            .collect();
    }
    if let Some(filter) = &spec.filter {
        dataset["filter"] = json!({
            "dimensions": {
                "name": filter.dimension.as_str(),
                "operator": "In",
                "values": filter.values,
            }
        });
    }
    if spec.sort_by_cost_desc {
        dataset["sorting"] = json!([{ "direction": "Descending", "name": "Cost" }]);
    }

    let mut body = json!({
        "type": "ActualCost",
        "timeframe": "Custom",
        "timePeriod": {
            "from": spec.range.start.to_rfc3339(),
            "to": spec.range.end.to_rfc3339(),
        },
        "dataset": dataset,
    });
    if let Some(top) = spec.top {
        body["top"] = top.into();
    }
    body
}

fn os_type_from_wire(value: Option<&str>) -> Option<OsType> {
    match value.map(str::to_lowercase).as_deref() {
        Some("windows") => Some(OsType::Windows),
        Some("linux") => Some(OsType::Linux),
        _ => None,
    }
}

// =============================================================================
// Capability Implementation
// =============================================================================

impl RemoteQueryClient for ArmClient {
    fn list_subscriptions(&self) -> BoxFuture<'_, RemoteResult<Vec<SubscriptionInfo>>> {
        Box::pin(async move {
            let value = self
                .get_json(
                    "/subscriptions",
                    &[("api-version", SUBSCRIPTIONS_API_VERSION)],
                )
                .await?;
            let subscriptions: Vec<WireSubscription> = ArmClient::parse_list(value)?;
            Ok(subscriptions
                .into_iter()
                .map(|s| SubscriptionInfo {
                    subscription_id: s.subscription_id,
                    display_name: s.display_name,
                    state: s.state,
                    tenant_id: s.tenant_id.unwrap_or_else(|| "Unknown".to_string()),
                })
                .collect())
        })
    }

    fn list_public_ips<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<PublicIpInventory>>> {
        Box::pin(async move {
            let path = format!(
                "/subscriptions/{subscription_id}/providers/Microsoft.Network/publicIPAddresses"
            );
            let value = self
                .get_json(&path, &[("api-version", NETWORK_API_VERSION)])
                .await?;
            let ips: Vec<WirePublicIp> = ArmClient::parse_list(value)?;
            Ok(ips
                .into_iter()
                .map(|ip| PublicIpInventory {
                    id: ip.id,
                    name: ip.name,
                    location: ip.location,
                    sku: ip.sku.map(|sku| sku.name),
                    allocation_method: ip.properties.public_ip_allocation_method,
                    ip_configuration: ip.properties.ip_configuration.map(|r| r.id),
                    nat_gateway: ip.properties.nat_gateway.map(|r| r.id),
                    load_balancer_frontends: ip
                        .properties
                        .load_balancer_frontend_ip_configurations
                        .into_iter()
                        .map(|r| r.id)
                        .collect(),
                    tags: ip.tags,
                })
                .collect())
        })
    }

    fn list_disks<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<DiskInventory>>> {
        Box::pin(async move {
            let path =
                format!("/subscriptions/{subscription_id}/providers/Microsoft.Compute/disks");
            let value = self
                .get_json(&path, &[("api-version", COMPUTE_API_VERSION)])
                .await?;
            let disks: Vec<WireDisk> = ArmClient::parse_list(value)?;
            Ok(disks
                .into_iter()
                .map(|disk| DiskInventory {
                    id: disk.id,
                    name: disk.name,
                    location: disk.location,
                    disk_state: disk.properties.disk_state,
                    disk_size_gb: disk.properties.disk_size_gb,
                    sku: disk.sku.map(|sku| sku.name),
                    tags: disk.tags,
                })
                .collect())
        })
    }

    fn list_snapshots<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<SnapshotInventory>>> {
        Box::pin(async move {
            let path =
                format!("/subscriptions/{subscription_id}/providers/Microsoft.Compute/snapshots");
            let value = self
                .get_json(&path, &[("api-version", COMPUTE_API_VERSION)])
                .await?;
            let snapshots: Vec<WireDisk> = ArmClient::parse_list(value)?;
            Ok(snapshots
                .into_iter()
                .filter_map(|snapshot| {
                    let Some(time_created) = snapshot.properties.time_created else {
                        tracing::warn!(id = %snapshot.id, "snapshot without creation time");
                        return None;
                    };
                    Some(SnapshotInventory {
                        id: snapshot.id,
                        name: snapshot.name,
                        location: snapshot.location,
                        disk_size_gb: snapshot.properties.disk_size_gb,
                        time_created,
                        tags: snapshot.tags,
                    })
                })
                .collect())
        })
    }

    fn list_network_interfaces<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<NicInventory>>> {
        Box::pin(async move {
            let path = format!(
                "/subscriptions/{subscription_id}/providers/Microsoft.Network/networkInterfaces"
            );
            let value = self
                .get_json(&path, &[("api-version", NETWORK_API_VERSION)])
                .await?;
            let nics: Vec<WireNic> = ArmClient::parse_list(value)?;
            Ok(nics
                .into_iter()
                .map(|nic| NicInventory {
                    id: nic.id,
                    name: nic.name,
                    location: nic.location,
                    virtual_machine: nic.properties.virtual_machine.map(|r| r.id),
                    tags: nic.tags,
                })
                .collect())
        })
    }

    fn list_virtual_machines<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<VmInventory>>> {
        Box::pin(async move {
            let path = format!(
                "/subscriptions/{subscription_id}/providers/Microsoft.Compute/virtualMachines"
            );
            let value = self
                .get_json(&path, &[("api-version", COMPUTE_API_VERSION)])
                .await?;
            let vms: Vec<WireVm> = ArmClient::parse_list(value)?;
            Ok(vms
                .into_iter()
                .map(|vm| {
                    let storage = vm.properties.storage_profile.unwrap_or_default();
                    VmInventory {
                        id: vm.id,
                        name: vm.name,
                        location: vm.location,
                        vm_size: vm
                            .properties
                            .hardware_profile
                            .and_then(|profile| profile.vm_size),
                        os_type: os_type_from_wire(
                            storage
                                .os_disk
                                .as_ref()
                                .and_then(|disk| disk.os_type.as_deref()),
                        ),
                        image: storage.image_reference.map(|image| ImageReference {
                            publisher: image.publisher,
                            offer: image.offer,
                            sku: image.sku,
                        }),
                        license_type: vm.properties.license_type,
                        tags: vm.tags,
                    }
                })
                .collect())
        })
    }

    fn list_cost_recommendations<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<RecommendationInventory>>> {
        Box::pin(async move {
            let path = format!(
                "/subscriptions/{subscription_id}/providers/Microsoft.Advisor/recommendations"
            );
            let value = self
                .get_json(
                    &path,
                    &[
                        ("api-version", ADVISOR_API_VERSION),
                        ("$filter", "Category eq 'Cost'"),
                    ],
                )
                .await?;
            let recommendations: Vec<WireRecommendation> = ArmClient::parse_list(value)?;
            Ok(recommendations
                .into_iter()
                .map(|rec| {
                    let props = rec.properties;
                    let (problem, solution) = props
                        .short_description
                        .map_or((None, None), |d| (d.problem, d.solution));
                    RecommendationInventory {
                        id: rec.id,
                        name: rec.name,
                        category: props.category,
                        impact: props.impact,
                        risk: props.risk,
                        problem,
                        solution,
                        impacted_resource: props.impacted_value,
                        resource_id: props
                            .resource_metadata
                            .and_then(|metadata| metadata.resource_id),
                        extended_properties: props.extended_properties,
                        last_updated: props.last_updated,
                    }
                })
                .collect())
        })
    }

    fn run_cost_query<'a>(
        &'a self,
        scope: &'a str,
        spec: &'a QuerySpec,
    ) -> BoxFuture<'a, RemoteResult<CostTable>> {
        Box::pin(async move {
            let path = format!("{scope}/providers/Microsoft.CostManagement/query");
            let body = cost_query_body(spec);
            let value = self.post_cost_query(&path, &body).await?;
            let result: WireCostResult = serde_json::from_value(value)
                .map_err(|e| RemoteError::message(format!("malformed response body: {e}")))?;
            Ok(CostTable {
                columns: result
                    .properties
                    .columns
                    .into_iter()
                    .map(|column| column.name)
                    .collect(),
                rows: result.properties.rows,
            })
        })
    }

    fn list_budgets<'a>(
        &'a self,
        scope: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<BudgetInfo>>> {
        Box::pin(async move {
            let path = format!("{scope}/providers/Microsoft.Consumption/budgets");
            let value = self
                .get_json(&path, &[("api-version", BUDGETS_API_VERSION)])
                .await?;
            let budgets: Vec<WireBudget> = ArmClient::parse_list(value)?;
            Ok(budgets
                .into_iter()
                .map(|budget| BudgetInfo {
                    name: budget.name,
                    amount: budget.properties.amount,
                    current_spend: budget
                        .properties
                        .current_spend
                        .map_or(0.0, |spend| spend.amount),
                    forecasted_spend: budget
                        .properties
                        .forecast_spend
                        .map_or(0.0, |spend| spend.amount),
                    time_grain: budget.properties.time_grain,
                    category: budget.properties.category,
                })
                .collect())
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cost::{Dimension, Granularity};
    use crate::util::time::DateRange;
    use chrono::TimeZone;

    fn sample_range() -> DateRange {
        DateRange {
            start: Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 7, 31, 23, 59, 59).unwrap(),
        }
    }

    #[test]
    fn cost_query_body_includes_grouping_and_sorting() {
        let spec = QuerySpec::actual_cost(sample_range())
            .granularity(Granularity::None)
            .group_by(Dimension::ResourceId)
            .group_by(Dimension::ServiceName)
            .sorted_by_cost_desc()
            .top(10);
        let body = cost_query_body(&spec);

        assert_eq!(body["type"], "ActualCost");
        assert_eq!(body["timeframe"], "Custom");
        assert_eq!(body["dataset"]["granularity"], "None");
        assert_eq!(body["dataset"]["grouping"][0]["name"], "ResourceId");
        assert_eq!(body["dataset"]["grouping"][1]["name"], "ServiceName");
        assert_eq!(body["dataset"]["sorting"][0]["direction"], "Descending");
        assert_eq!(body["top"], 10);
        assert!(body["dataset"].get("filter").is_none());
    }

    #[test]
    fn cost_query_body_includes_dimension_filter() {
        let spec = QuerySpec::actual_cost(sample_range())
            .filter_in(Dimension::ResourceId, vec!["/some/id".to_string()]);
        let body = cost_query_body(&spec);

        assert_eq!(body["dataset"]["filter"]["dimensions"]["name"], "ResourceId");
        assert_eq!(body["dataset"]["filter"]["dimensions"]["operator"], "In");
        assert_eq!(
            body["dataset"]["filter"]["dimensions"]["values"][0],
            "/some/id"
        );
        assert!(body.get("top").is_none());
    }

    #[test]
    fn os_type_parsing_is_case_insensitive() {
        assert_eq!(os_type_from_wire(Some("Windows")), Some(OsType::Windows));
        assert_eq!(os_type_from_wire(Some("LINUX")), Some(OsType::Linux));
        assert_eq!(os_type_from_wire(Some("beos")), None);
        assert_eq!(os_type_from_wire(None), None);
    }

    #[test]
    fn wire_public_ip_deserializes_nested_properties() {
        let raw = serde_json::json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/ip1",
            "name": "ip1",
            "location": "eastus",
            "sku": { "name": "Standard" },
            "properties": {
                "publicIPAllocationMethod": "Static",
                "ipConfiguration": { "id": "/nic/ipconfig" }
            }
        });
        let ip: WirePublicIp = serde_json::from_value(raw).unwrap();
        assert_eq!(ip.sku.unwrap().name, "Standard");
        assert_eq!(ip.properties.ip_configuration.unwrap().id, "/nic/ipconfig");
        assert!(ip.properties.nat_gateway.is_none());
    }
}
