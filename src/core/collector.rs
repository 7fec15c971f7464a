//! Orphaned-resource collection.
//!
//! Enumerates candidate resources per kind and classifies which are
//! orphaned with pure predicates over already-fetched inventory. A single
//! scope is collected sequentially; tenant-wide runs fan out one batch item
//! per subscription through the executor, so throttling on one subscription
//! is paced, retried, and circuit-broken without aborting the others.

use std::sync::Arc;

use chrono::Utc;

use super::executor::{BatchExecutor, ItemOutcome};
use super::license;
use super::models::{
    AnalysisScope, InventoryReport, ResourceRecord, ResourceType, ScopeRef, SubscriptionOutcome,
    summarize,
};
use crate::error::Result;
use crate::remote::{
    DiskInventory, NicInventory, OsType, PublicIpInventory, RecommendationInventory,
    RemoteQueryClient, RemoteResult, SnapshotInventory, SubscriptionInfo, VmInventory,
};

/// Extended-property keys that may carry a savings estimate, in priority
/// order.
const SAVINGS_KEYS: &[&str] = &["annualSavingsAmount", "savingsAmount", "estimatedSavings"];

// =============================================================================
// Predicates
// =============================================================================

/// A public IP is orphaned when nothing references it: no NIC ip
/// configuration, no NAT gateway, no load-balancer frontend.
#[must_use]
pub fn is_orphaned_ip(ip: &PublicIpInventory) -> bool {
    ip.ip_configuration.is_none()
        && ip.nat_gateway.is_none()
        && ip.load_balancer_frontends.is_empty()
}

/// A managed disk is orphaned when the API reports it unattached.
#[must_use]
pub fn is_orphaned_disk(disk: &DiskInventory) -> bool {
    disk.disk_state == "Unattached"
}

/// A network interface is orphaned when no virtual machine owns it.
#[must_use]
pub fn is_orphaned_nic(nic: &NicInventory) -> bool {
    nic.virtual_machine.is_none()
}

/// Pull a savings estimate out of a recommendation's extended properties.
#[must_use]
pub fn extract_savings(properties: &std::collections::HashMap<String, String>) -> f64 {
    for key in SAVINGS_KEYS {
        if let Some(raw) = properties.get(*key) {
            if let Ok(value) = raw.parse::<f64>() {
                return value;
            }
        }
    }
    0.0
}

// =============================================================================
// Record Mapping
// =============================================================================

fn ip_record(ip: PublicIpInventory, subscription_id: &str) -> ResourceRecord {
    ResourceRecord::new(
        ResourceType::PublicIp,
        ip.id,
        ip.name,
        ip.location,
        subscription_id,
    )
    .with_detail("sku", ip.sku.unwrap_or_else(|| "Basic".to_string()))
    .with_detail(
        "allocation_method",
        ip.allocation_method.unwrap_or_default(),
    )
    .with_tags(ip.tags)
}

fn disk_record(disk: DiskInventory, subscription_id: &str) -> ResourceRecord {
    ResourceRecord::new(
        ResourceType::ManagedDisk,
        disk.id,
        disk.name,
        disk.location,
        subscription_id,
    )
    .with_detail("disk_size_gb", disk.disk_size_gb.unwrap_or_default())
    .with_detail("sku", disk.sku.unwrap_or_else(|| "Unknown".to_string()))
    .with_tags(disk.tags)
}

fn snapshot_record(snapshot: SnapshotInventory, subscription_id: &str) -> ResourceRecord {
    let age_days = Utc::now()
        .signed_duration_since(snapshot.time_created)
        .num_days();
    ResourceRecord::new(
        ResourceType::Snapshot,
        snapshot.id,
        snapshot.name,
        snapshot.location,
        subscription_id,
    )
    .with_detail("disk_size_gb", snapshot.disk_size_gb.unwrap_or_default())
    .with_detail("age_days", age_days)
    .with_detail("created_date", snapshot.time_created.to_rfc3339())
    .with_tags(snapshot.tags)
}

fn nic_record(nic: NicInventory, subscription_id: &str) -> ResourceRecord {
    ResourceRecord::new(
        ResourceType::NetworkInterface,
        nic.id,
        nic.name,
        nic.location,
        subscription_id,
    )
    .with_tags(nic.tags)
}

fn vm_record(vm: VmInventory, subscription_id: &str) -> ResourceRecord {
    let os_info = license::os_info(&vm);
    let os_type = match vm.os_type {
        Some(OsType::Windows) => "Windows",
        Some(OsType::Linux) => "Linux",
        None => "Unknown",
    };
    ResourceRecord::new(
        ResourceType::VmWithoutHybridBenefit,
        vm.id,
        vm.name,
        vm.location,
        subscription_id,
    )
    .with_detail("vm_size", vm.vm_size.unwrap_or_default())
    .with_detail("os_type", os_type)
    .with_detail("os_info", os_info)
    .with_tags(vm.tags)
}

fn recommendation_record(
    rec: RecommendationInventory,
    subscription_id: &str,
) -> ResourceRecord {
    let savings = extract_savings(&rec.extended_properties);
    // Advisory entries point at another resource; keep the recommendation id
    // separately so the impacted resource stays addressable.
    ResourceRecord::new(
        ResourceType::AdvisorRecommendation,
        rec.resource_id.unwrap_or_else(|| rec.id.clone()),
        rec.name,
        "global",
        subscription_id,
    )
    .with_detail("recommendation_id", rec.id)
    .with_detail("category", rec.category)
    .with_detail("impact", rec.impact.unwrap_or_default())
    .with_detail("risk", rec.risk.unwrap_or_default())
    .with_detail("short_description", rec.problem.unwrap_or_default())
    .with_detail("solution", rec.solution.unwrap_or_default())
    .with_detail("impacted_resource", rec.impacted_resource.unwrap_or_default())
    .with_detail("potential_savings", savings)
    .with_detail(
        "last_updated",
        rec.last_updated.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
    )
}

// =============================================================================
// Per-Subscription Collection
// =============================================================================

/// Collect every resource kind for one subscription.
///
/// The listing calls run sequentially; any failure (other than the lenient
/// recommendation listing) aborts this subscription and surfaces to the
/// caller, which decides whether that is fatal.
async fn collect_subscription(
    client: Arc<dyn RemoteQueryClient>,
    subscription_id: String,
    subscription_name: Option<String>,
) -> RemoteResult<Vec<ResourceRecord>> {
    let mut resources = Vec::new();

    let ips = client.list_public_ips(&subscription_id).await?;
    resources.extend(
        ips.into_iter()
            .filter(is_orphaned_ip)
            .map(|ip| ip_record(ip, &subscription_id)),
    );

    let disks = client.list_disks(&subscription_id).await?;
    resources.extend(
        disks
            .into_iter()
            .filter(is_orphaned_disk)
            .map(|disk| disk_record(disk, &subscription_id)),
    );

    let snapshots = client.list_snapshots(&subscription_id).await?;
    resources.extend(
        snapshots
            .into_iter()
            .map(|snapshot| snapshot_record(snapshot, &subscription_id)),
    );

    let nics = client.list_network_interfaces(&subscription_id).await?;
    resources.extend(
        nics.into_iter()
            .filter(is_orphaned_nic)
            .map(|nic| nic_record(nic, &subscription_id)),
    );

    let vms = client.list_virtual_machines(&subscription_id).await?;
    resources.extend(
        vms.into_iter()
            .filter(license::is_missing_hybrid_benefit)
            .map(|vm| vm_record(vm, &subscription_id)),
    );

    // Advisory listings are best-effort: a failure here degrades the report
    // instead of failing the subscription.
    match client.list_cost_recommendations(&subscription_id).await {
        Ok(recommendations) => resources.extend(
            recommendations
                .into_iter()
                .map(|rec| recommendation_record(rec, &subscription_id)),
        ),
        Err(err) => {
            tracing::warn!(
                subscription = %subscription_id,
                error = %err,
                "skipping cost recommendations"
            );
        }
    }

    if let Some(name) = subscription_name {
        for record in &mut resources {
            record.subscription_name = Some(name.clone());
        }
    }

    Ok(resources)
}

// =============================================================================
// Resource Collector
// =============================================================================

/// Produces the full set of [`ResourceRecord`]s for one or many scopes.
pub struct ResourceCollector {
    client: Arc<dyn RemoteQueryClient>,
    executor: BatchExecutor,
}

impl ResourceCollector {
    /// Create a collector over a remote client and executor.
    #[must_use]
    pub fn new(client: Arc<dyn RemoteQueryClient>, executor: BatchExecutor) -> Self {
        Self { client, executor }
    }

    /// Run the full analysis for a scope.
    ///
    /// # Errors
    ///
    /// Single-subscription runs fail when the subscription cannot be
    /// collected at all; tenant-wide runs only fail when the subscription
    /// listing itself does.
    pub async fn analyze(&self, scope: &ScopeRef) -> Result<InventoryReport> {
        match scope {
            ScopeRef::Subscription(subscription_id) => {
                self.analyze_single(subscription_id).await
            }
            ScopeRef::Tenant => self.analyze_tenant().await,
        }
    }

    /// Collect orphaned disks for one subscription.
    pub async fn get_orphaned_disks(&self, subscription_id: &str) -> Result<Vec<ResourceRecord>> {
        let disks = self.client.list_disks(subscription_id).await.map_err(
            crate::error::CostscopeError::from,
        )?;
        Ok(disks
            .into_iter()
            .filter(is_orphaned_disk)
            .map(|disk| disk_record(disk, subscription_id))
            .collect())
    }

    /// Collect orphaned public IPs for one subscription.
    pub async fn get_orphaned_public_ips(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<ResourceRecord>> {
        let ips = self.client.list_public_ips(subscription_id).await.map_err(
            crate::error::CostscopeError::from,
        )?;
        Ok(ips
            .into_iter()
            .filter(is_orphaned_ip)
            .map(|ip| ip_record(ip, subscription_id))
            .collect())
    }

    async fn analyze_single(&self, subscription_id: &str) -> Result<InventoryReport> {
        tracing::info!(subscription = %subscription_id, "analyzing single subscription");

        let client = Arc::clone(&self.client);
        let owned_id = subscription_id.to_string();
        let resources = self
            .executor
            .call_with_retry(move || {
                let client = Arc::clone(&client);
                let subscription_id = owned_id.clone();
                Box::pin(collect_subscription(client, subscription_id, None))
            })
            .await?;

        let analyzed = SubscriptionOutcome {
            subscription_id: subscription_id.to_string(),
            subscription_name: None,
            resources_found: resources.len(),
        };
        let summary = summarize(&resources);

        Ok(InventoryReport {
            analysis_date: Utc::now(),
            analysis_scope: AnalysisScope::SingleSubscription,
            subscription_id: Some(subscription_id.to_string()),
            resources,
            subscriptions_analyzed: vec![analyzed],
            total_subscriptions: None,
            successful_subscriptions: None,
            summary,
        })
    }

    async fn analyze_tenant(&self) -> Result<InventoryReport> {
        let client = Arc::clone(&self.client);
        let subscriptions: Vec<SubscriptionInfo> = self
            .executor
            .call_with_retry(move || {
                let client = Arc::clone(&client);
                Box::pin(async move { client.list_subscriptions().await })
            })
            .await?;

        let total_subscriptions = subscriptions.len();
        tracing::info!(
            total_subscriptions,
            "starting tenant-wide analysis"
        );

        let report = self
            .executor
            .run(subscriptions, |subscription| {
                let client = Arc::clone(&self.client);
                let subscription_id = subscription.subscription_id.clone();
                let subscription_name = subscription.display_name.clone();
                Box::pin(collect_subscription(
                    client,
                    subscription_id,
                    Some(subscription_name),
                ))
            })
            .await;

        let mut resources = Vec::new();
        let mut analyzed = Vec::new();

        for entry in report.outcomes {
            let subscription = entry.item;
            match entry.outcome {
                ItemOutcome::Success(found) => {
                    tracing::info!(
                        subscription = %subscription.subscription_id,
                        name = %subscription.display_name,
                        resources_found = found.len(),
                        "subscription analyzed"
                    );
                    analyzed.push(SubscriptionOutcome {
                        subscription_id: subscription.subscription_id,
                        subscription_name: Some(subscription.display_name),
                        resources_found: found.len(),
                    });
                    resources.extend(found);
                }
                ItemOutcome::Error { message, .. } => {
                    tracing::error!(
                        subscription = %subscription.subscription_id,
                        name = %subscription.display_name,
                        error = %message,
                        "subscription analysis failed"
                    );
                }
                ItemOutcome::Skipped { reason } => {
                    tracing::warn!(
                        subscription = %subscription.subscription_id,
                        name = %subscription.display_name,
                        reason = %reason,
                        "subscription analysis skipped"
                    );
                }
            }
        }

        let successful_subscriptions = analyzed.len();
        tracing::info!(
            total_resources = resources.len(),
            successful_subscriptions,
            total_subscriptions,
            "tenant-wide analysis completed"
        );

        let summary = summarize(&resources);
        Ok(InventoryReport {
            analysis_date: Utc::now(),
            analysis_scope: AnalysisScope::TenantWide,
            subscription_id: None,
            resources,
            subscriptions_analyzed: analyzed,
            total_subscriptions: Some(total_subscriptions),
            successful_subscriptions: Some(successful_subscriptions),
            summary,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn ip_predicate_checks_all_attachment_kinds() {
        let mut ip = PublicIpInventory {
            id: "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/ip"
                .to_string(),
            ..Default::default()
        };
        assert!(is_orphaned_ip(&ip));

        ip.ip_configuration = Some("nic-config".to_string());
        assert!(!is_orphaned_ip(&ip));

        ip.ip_configuration = None;
        ip.nat_gateway = Some("nat".to_string());
        assert!(!is_orphaned_ip(&ip));

        ip.nat_gateway = None;
        ip.load_balancer_frontends = vec!["frontend".to_string()];
        assert!(!is_orphaned_ip(&ip));
    }

    #[test]
    fn disk_predicate_requires_unattached_state() {
        let mut disk = DiskInventory {
            disk_state: "Unattached".to_string(),
            ..Default::default()
        };
        assert!(is_orphaned_disk(&disk));

        disk.disk_state = "Attached".to_string();
        assert!(!is_orphaned_disk(&disk));

        disk.disk_state = "Reserved".to_string();
        assert!(!is_orphaned_disk(&disk));
    }

    #[test]
    fn nic_predicate_requires_no_vm() {
        let mut nic = NicInventory::default();
        assert!(is_orphaned_nic(&nic));

        nic.virtual_machine = Some("/vm".to_string());
        assert!(!is_orphaned_nic(&nic));
    }

    #[test]
    fn savings_extraction_prefers_annual_amount() {
        let mut properties = HashMap::new();
        properties.insert("savingsAmount".to_string(), "10.5".to_string());
        properties.insert("annualSavingsAmount".to_string(), "126".to_string());
        assert!((extract_savings(&properties) - 126.0).abs() < f64::EPSILON);

        properties.remove("annualSavingsAmount");
        assert!((extract_savings(&properties) - 10.5).abs() < f64::EPSILON);

        properties.insert("savingsAmount".to_string(), "not-a-number".to_string());
        assert!((extract_savings(&properties) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ip_record_defaults_sku_to_basic() {
        let ip = PublicIpInventory {
            id: "/subscriptions/s/resourceGroups/net/providers/Microsoft.Network/publicIPAddresses/ip1"
                .to_string(),
            name: "ip1".to_string(),
            location: "eastus".to_string(),
            ..Default::default()
        };
        let record = ip_record(ip, "s");
        assert_eq!(record.details["sku"], "Basic");
        assert_eq!(record.resource_group, "net");
    }
}
