//! Shared test fixtures: a scripted fake remote client and a recording
//! sleeper so executor runs complete instantly while still exposing every
//! delay they would have served.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::BoxFuture;
use serde_json::json;

use costscope::core::cost::QuerySpec;
use costscope::core::executor::Sleeper;
use costscope::remote::{
    BudgetInfo, CostTable, DiskInventory, NicInventory, PublicIpInventory,
    RecommendationInventory, RemoteError, RemoteQueryClient, RemoteResult, SnapshotInventory,
    SubscriptionInfo, VmInventory,
};

// =============================================================================
// Recording Sleeper
// =============================================================================

/// Records every requested delay and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.recorded().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.sleeps.lock().unwrap().push(duration);
        Box::pin(async {})
    }
}

// =============================================================================
// Inventory Builders
// =============================================================================

pub fn subscription(id: &str, name: &str) -> SubscriptionInfo {
    SubscriptionInfo {
        subscription_id: id.to_string(),
        display_name: name.to_string(),
        state: "Enabled".to_string(),
        tenant_id: "tenant-1".to_string(),
    }
}

pub fn unattached_disk(subscription: &str, name: &str, size_gb: i64) -> DiskInventory {
    DiskInventory {
        id: format!(
            "/subscriptions/{subscription}/resourceGroups/rg-data/providers/Microsoft.Compute/disks/{name}"
        ),
        name: name.to_string(),
        location: "eastus".to_string(),
        disk_state: "Unattached".to_string(),
        disk_size_gb: Some(size_gb),
        sku: Some("Premium_LRS".to_string()),
        tags: HashMap::new(),
    }
}

pub fn attached_disk(subscription: &str, name: &str, size_gb: i64) -> DiskInventory {
    DiskInventory {
        disk_state: "Attached".to_string(),
        ..unattached_disk(subscription, name, size_gb)
    }
}

pub fn orphaned_ip(subscription: &str, name: &str) -> PublicIpInventory {
    PublicIpInventory {
        id: format!(
            "/subscriptions/{subscription}/resourceGroups/rg-net/providers/Microsoft.Network/publicIPAddresses/{name}"
        ),
        name: name.to_string(),
        location: "eastus".to_string(),
        sku: Some("Standard".to_string()),
        allocation_method: Some("Static".to_string()),
        ..Default::default()
    }
}

pub fn snapshot(subscription: &str, name: &str, age_days: i64) -> SnapshotInventory {
    SnapshotInventory {
        id: format!(
            "/subscriptions/{subscription}/resourceGroups/rg-data/providers/Microsoft.Compute/snapshots/{name}"
        ),
        name: name.to_string(),
        location: "eastus".to_string(),
        disk_size_gb: Some(64),
        time_created: Utc::now() - ChronoDuration::days(age_days),
        tags: HashMap::new(),
    }
}

pub fn orphaned_nic(subscription: &str, name: &str) -> NicInventory {
    NicInventory {
        id: format!(
            "/subscriptions/{subscription}/resourceGroups/rg-net/providers/Microsoft.Network/networkInterfaces/{name}"
        ),
        name: name.to_string(),
        location: "eastus".to_string(),
        ..Default::default()
    }
}

pub fn cost_recommendation(subscription: &str, name: &str, savings: f64) -> RecommendationInventory {
    let mut extended_properties = HashMap::new();
    extended_properties.insert("annualSavingsAmount".to_string(), savings.to_string());
    RecommendationInventory {
        id: format!(
            "/subscriptions/{subscription}/resourceGroups/rg/providers/Microsoft.Advisor/recommendations/{name}"
        ),
        name: name.to_string(),
        category: "Cost".to_string(),
        extended_properties,
        ..Default::default()
    }
}

/// A cost table with one daily row per (date, cost) pair.
pub fn daily_cost_table(rows: &[(&str, f64)]) -> CostTable {
    CostTable {
        columns: vec!["Cost".to_string(), "UsageDate".to_string()],
        rows: rows
            .iter()
            .map(|(date, cost)| vec![json!(cost), json!(date)])
            .collect(),
    }
}

pub fn throttled() -> RemoteError {
    RemoteError::with_status(429, "Too many requests")
}

// =============================================================================
// Fake Remote Client
// =============================================================================

/// Scripted behavior for one cost-query key.
#[derive(Clone)]
pub enum CostBehavior {
    Ok(CostTable),
    Err(RemoteError),
}

/// In-memory [`RemoteQueryClient`] with per-subscription inventories and
/// scripted cost responses.
///
/// Cost queries are keyed by the first dimension-filter value when present
/// (the per-resource path) and by the scope otherwise, so tests can script
/// each resource id independently. Every call is counted.
#[derive(Default)]
pub struct FakeRemote {
    pub subscriptions: Vec<SubscriptionInfo>,
    /// Subscriptions whose listing calls fail with the given error.
    pub broken_subscriptions: HashMap<String, RemoteError>,
    pub public_ips: HashMap<String, Vec<PublicIpInventory>>,
    pub disks: HashMap<String, Vec<DiskInventory>>,
    pub snapshots: HashMap<String, Vec<SnapshotInventory>>,
    pub nics: HashMap<String, Vec<NicInventory>>,
    pub vms: HashMap<String, Vec<VmInventory>>,
    pub recommendations: HashMap<String, Vec<RecommendationInventory>>,
    pub budgets: Vec<BudgetInfo>,
    pub cost_behaviors: HashMap<String, CostBehavior>,
    cost_calls: Mutex<Vec<String>>,
    listing_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription with its display name.
    pub fn with_subscription(mut self, id: &str, name: &str) -> Self {
        self.subscriptions.push(subscription(id, name));
        self
    }

    /// Make every listing call for a subscription fail.
    pub fn with_broken_subscription(mut self, id: &str, error: RemoteError) -> Self {
        self.broken_subscriptions.insert(id.to_string(), error);
        self
    }

    pub fn with_disks(mut self, subscription: &str, disks: Vec<DiskInventory>) -> Self {
        self.disks.insert(subscription.to_string(), disks);
        self
    }

    pub fn with_public_ips(mut self, subscription: &str, ips: Vec<PublicIpInventory>) -> Self {
        self.public_ips.insert(subscription.to_string(), ips);
        self
    }

    pub fn with_snapshots(
        mut self,
        subscription: &str,
        snapshots: Vec<SnapshotInventory>,
    ) -> Self {
        self.snapshots.insert(subscription.to_string(), snapshots);
        self
    }

    pub fn with_nics(mut self, subscription: &str, nics: Vec<NicInventory>) -> Self {
        self.nics.insert(subscription.to_string(), nics);
        self
    }

    pub fn with_recommendations(
        mut self,
        subscription: &str,
        recommendations: Vec<RecommendationInventory>,
    ) -> Self {
        self.recommendations
            .insert(subscription.to_string(), recommendations);
        self
    }

    /// Script the response for a cost-query key (resource id or scope).
    pub fn with_cost_behavior(mut self, key: &str, behavior: CostBehavior) -> Self {
        self.cost_behaviors.insert(key.to_string(), behavior);
        self
    }

    /// Keys of every cost query issued, in order.
    pub fn cost_calls(&self) -> Vec<String> {
        self.cost_calls.lock().unwrap().clone()
    }

    /// Total number of listing calls issued.
    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    fn listing<T: Clone>(
        &self,
        map: &HashMap<String, Vec<T>>,
        subscription_id: &str,
    ) -> RemoteResult<Vec<T>> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.broken_subscriptions.get(subscription_id) {
            return Err(error.clone());
        }
        Ok(map.get(subscription_id).cloned().unwrap_or_default())
    }
}

impl RemoteQueryClient for FakeRemote {
    fn list_subscriptions(&self) -> BoxFuture<'_, RemoteResult<Vec<SubscriptionInfo>>> {
        Box::pin(async move { Ok(self.subscriptions.clone()) })
    }

    fn list_public_ips<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<PublicIpInventory>>> {
        Box::pin(async move { self.listing(&self.public_ips, subscription_id) })
    }

    fn list_disks<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<DiskInventory>>> {
        Box::pin(async move { self.listing(&self.disks, subscription_id) })
    }

    fn list_snapshots<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<SnapshotInventory>>> {
        Box::pin(async move { self.listing(&self.snapshots, subscription_id) })
    }

    fn list_network_interfaces<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<NicInventory>>> {
        Box::pin(async move { self.listing(&self.nics, subscription_id) })
    }

    fn list_virtual_machines<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<VmInventory>>> {
        Box::pin(async move { self.listing(&self.vms, subscription_id) })
    }

    fn list_cost_recommendations<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<RecommendationInventory>>> {
        Box::pin(async move { self.listing(&self.recommendations, subscription_id) })
    }

    fn run_cost_query<'a>(
        &'a self,
        scope: &'a str,
        spec: &'a QuerySpec,
    ) -> BoxFuture<'a, RemoteResult<CostTable>> {
        Box::pin(async move {
            let key = spec
                .filter
                .as_ref()
                .and_then(|filter| filter.values.first().cloned())
                .unwrap_or_else(|| scope.to_string());
            self.cost_calls.lock().unwrap().push(key.clone());

            match self.cost_behaviors.get(&key) {
                Some(CostBehavior::Ok(table)) => Ok(table.clone()),
                Some(CostBehavior::Err(error)) => Err(error.clone()),
                None => Ok(CostTable::default()),
            }
        })
    }

    fn list_budgets<'a>(
        &'a self,
        _scope: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<BudgetInfo>>> {
        Box::pin(async move { Ok(self.budgets.clone()) })
    }
}
