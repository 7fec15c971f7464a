//! Core data models for inventory reporting.
//!
//! [`ResourceRecord`] is the uniform envelope every resource kind collapses
//! into; it is never mutated after creation. Summaries are always derived
//! from the record list, never cached.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Scope
// =============================================================================

/// A billing/management scope: one subscription or everything the credential
/// can reach. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeRef {
    /// A single subscription id.
    Subscription(String),
    /// All accessible subscriptions.
    Tenant,
}

impl ScopeRef {
    /// Resolve from an optional subscription id: absent means tenant-wide.
    #[must_use]
    pub fn from_subscription(subscription_id: Option<&str>) -> Self {
        match subscription_id {
            Some(id) if !id.trim().is_empty() => Self::Subscription(id.trim().to_string()),
            _ => Self::Tenant,
        }
    }
}

// =============================================================================
// Resource Types
// =============================================================================

/// The resource kinds the collector reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "Public IP")]
    PublicIp,
    #[serde(rename = "Managed Disk")]
    ManagedDisk,
    #[serde(rename = "Snapshot")]
    Snapshot,
    #[serde(rename = "Network Interface")]
    NetworkInterface,
    #[serde(rename = "VM without AHB")]
    VmWithoutHybridBenefit,
    #[serde(rename = "Advisor Recommendation")]
    AdvisorRecommendation,
}

impl ResourceType {
    /// All resource types in report order.
    pub const ALL: &'static [Self] = &[
        Self::PublicIp,
        Self::ManagedDisk,
        Self::Snapshot,
        Self::NetworkInterface,
        Self::VmWithoutHybridBenefit,
        Self::AdvisorRecommendation,
    ];

    /// Wire label, as it appears in responses and filter values.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PublicIp => "Public IP",
            Self::ManagedDisk => "Managed Disk",
            Self::Snapshot => "Snapshot",
            Self::NetworkInterface => "Network Interface",
            Self::VmWithoutHybridBenefit => "VM without AHB",
            Self::AdvisorRecommendation => "Advisor Recommendation",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// =============================================================================
// Resource Record
// =============================================================================

/// Extract the resource group segment from a full resource id.
///
/// Ids look like `/subscriptions/<sub>/resourceGroups/<rg>/providers/...`;
/// anything shorter yields an empty group.
#[must_use]
pub fn resource_group_from_id(resource_id: &str) -> String {
    resource_id
        .split('/')
        .nth(4)
        .unwrap_or_default()
        .to_string()
}

/// Uniform envelope for one reported resource.
///
/// Kind-specific fields (disk size, snapshot age, savings estimates) live in
/// the flattened `details` map so every kind serializes to the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub name: String,
    pub location: String,
    pub resource_group: String,
    pub subscription_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_name: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl ResourceRecord {
    /// Create a record, deriving the resource group from the id.
    #[must_use]
    pub fn new(
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        subscription_id: impl Into<String>,
    ) -> Self {
        let resource_id = resource_id.into();
        let resource_group = resource_group_from_id(&resource_id);
        Self {
            resource_type,
            resource_id,
            name: name.into(),
            location: location.into(),
            resource_group,
            subscription_id: subscription_id.into(),
            subscription_name: None,
            details: serde_json::Map::new(),
            tags: HashMap::new(),
        }
    }

    /// Attach a kind-specific detail field.
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Attach resource tags.
    #[must_use]
    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Read a numeric detail field, if present.
    #[must_use]
    pub fn detail_f64(&self, key: &str) -> Option<f64> {
        self.details.get(key).and_then(serde_json::Value::as_f64)
    }
}

// =============================================================================
// Filtering
// =============================================================================

/// Post-collection filters, all optional and AND-combined.
///
/// Matching is exact and case-insensitive; `resource_types` is a membership
/// test against the wire labels.
#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    pub resource_types: Option<Vec<String>>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub subscription_name: Option<String>,
}

impl InventoryFilter {
    /// Whether any filter is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.resource_types.is_none()
            && self.resource_group.is_none()
            && self.location.is_none()
            && self.subscription_name.is_none()
    }

    /// Whether a record passes every configured filter.
    #[must_use]
    pub fn matches(&self, record: &ResourceRecord) -> bool {
        if let Some(types) = &self.resource_types {
            let label = record.resource_type.label();
            if !types.iter().any(|t| t.eq_ignore_ascii_case(label)) {
                return false;
            }
        }
        if let Some(group) = &self.resource_group {
            if !record.resource_group.eq_ignore_ascii_case(group) {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if !record.location.eq_ignore_ascii_case(location) {
                return false;
            }
        }
        if let Some(name) = &self.subscription_name {
            match &record.subscription_name {
                Some(actual) if actual.eq_ignore_ascii_case(name) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Apply a filter to a record list, preserving order.
#[must_use]
pub fn apply_filter(
    resources: Vec<ResourceRecord>,
    filter: &InventoryFilter,
) -> Vec<ResourceRecord> {
    if filter.is_empty() {
        return resources;
    }
    resources
        .into_iter()
        .filter(|record| filter.matches(record))
        .collect()
}

// =============================================================================
// Summary
// =============================================================================

/// Summary statistics, always recomputed from the (filtered) record list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventorySummary {
    pub total_resources: usize,
    pub by_type: BTreeMap<String, usize>,
    pub total_potential_savings: f64,
}

/// Compute summary statistics for a record list.
///
/// Potential savings only come from advisory recommendations; the other
/// kinds have no priced estimate.
#[must_use]
pub fn summarize(resources: &[ResourceRecord]) -> InventorySummary {
    let mut by_type = BTreeMap::new();
    let mut total_potential_savings = 0.0;

    for record in resources {
        *by_type
            .entry(record.resource_type.label().to_string())
            .or_insert(0) += 1;
        if record.resource_type == ResourceType::AdvisorRecommendation {
            total_potential_savings += record.detail_f64("potential_savings").unwrap_or(0.0);
        }
    }

    InventorySummary {
        total_resources: resources.len(),
        by_type,
        total_potential_savings,
    }
}

// =============================================================================
// Inventory Report
// =============================================================================

/// Whether a run covered one subscription or the whole tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisScope {
    #[serde(rename = "single_subscription")]
    SingleSubscription,
    #[serde(rename = "tenant_wide")]
    TenantWide,
}

/// Per-subscription collection outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionOutcome {
    pub subscription_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_name: Option<String>,
    pub resources_found: usize,
}

/// Full inventory query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReport {
    pub analysis_date: DateTime<Utc>,
    pub analysis_scope: AnalysisScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    pub resources: Vec<ResourceRecord>,
    pub subscriptions_analyzed: Vec<SubscriptionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_subscriptions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful_subscriptions: Option<usize>,
    pub summary: InventorySummary,
}

// =============================================================================
// Tests
// =============================================================================
