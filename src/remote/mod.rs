//! Remote management API capability.
//!
//! The core never constructs HTTP requests itself. It consumes the
//! [`RemoteQueryClient`] capability defined here and classifies its
//! failures. The concrete REST implementation lives in [`arm`]; tests
//! substitute scripted fakes.

pub mod arm;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::core::cost::QuerySpec;

pub use arm::ArmClient;

// =============================================================================
// Credential
// =============================================================================

/// Environment variable holding the management API bearer token.
pub const ENV_ACCESS_TOKEN: &str = "COSTSCOPE_ACCESS_TOKEN";
/// Fallback environment variable for the bearer token.
pub const ENV_ACCESS_TOKEN_FALLBACK: &str = "AZURE_ACCESS_TOKEN";

/// Opaque credential handle for the management API.
///
/// Obtained once at startup, immutable thereafter, and injected into the
/// remote client rather than referenced as ambient global state.
#[derive(Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Create a credential from a raw bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read the credential from the environment.
    ///
    /// Checks `COSTSCOPE_ACCESS_TOKEN` first, then `AZURE_ACCESS_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CostscopeError::CredentialMissing`] when
    /// neither variable is set to a non-empty value.
    pub fn from_env() -> crate::error::Result<Self> {
        for var in [ENV_ACCESS_TOKEN, ENV_ACCESS_TOKEN_FALLBACK] {
            if let Ok(value) = std::env::var(var) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return Ok(Self::new(trimmed));
                }
            }
        }
        Err(crate::error::CostscopeError::CredentialMissing(format!(
            "set {ENV_ACCESS_TOKEN} (or {ENV_ACCESS_TOKEN_FALLBACK}) to a management API token"
        )))
    }

    /// The bearer token value.
    #[must_use]
    pub fn bearer(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").field("token", &"***").finish()
    }
}

// =============================================================================
// Remote Error
// =============================================================================

/// A failure reported by the remote management API.
///
/// Carries the HTTP status when one is available; transport-level failures
/// (timeouts, connection errors) and body parse failures have no status.
/// This is the single value the retry classification operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// HTTP status code, when the remote responded at all.
    pub status: Option<u16>,
    /// Error detail, suitable for logs and per-item error fields.
    pub message: String,
}

impl RemoteError {
    /// Error with an HTTP status attached.
    #[must_use]
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Error without a status (transport or parse failure).
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Whether retrying could help: 429 or a transient 5xx.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.status, Some(429 | 500 | 502 | 503 | 504))
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Result type alias for remote calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

// =============================================================================
// Inventory Models
// =============================================================================

/// A subscription the credential can access.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub subscription_id: String,
    pub display_name: String,
    pub state: String,
    pub tenant_id: String,
}

/// A public IP address with its attachment references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicIpInventory {
    pub id: String,
    pub name: String,
    pub location: String,
    /// SKU name; absent means the basic tier.
    pub sku: Option<String>,
    pub allocation_method: Option<String>,
    /// Resource id of the attached NIC ip configuration, if any.
    pub ip_configuration: Option<String>,
    /// Resource id of the attached NAT gateway, if any.
    pub nat_gateway: Option<String>,
    /// Load balancer frontend configurations referencing this address.
    #[serde(default)]
    pub load_balancer_frontends: Vec<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// A managed disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskInventory {
    pub id: String,
    pub name: String,
    pub location: String,
    /// Attachment state as reported by the API (e.g. "Attached",
    /// "Unattached", "Reserved").
    pub disk_state: String,
    pub disk_size_gb: Option<i64>,
    pub sku: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// A disk snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotInventory {
    pub id: String,
    pub name: String,
    pub location: String,
    pub disk_size_gb: Option<i64>,
    pub time_created: DateTime<Utc>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// A network interface with its VM attachment reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NicInventory {
    pub id: String,
    pub name: String,
    pub location: String,
    /// Resource id of the attached virtual machine, if any.
    pub virtual_machine: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Operating system family of a virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsType {
    Windows,
    Linux,
}

/// Marketplace image reference of a virtual machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageReference {
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub offer: String,
    #[serde(default)]
    pub sku: String,
}

/// A virtual machine with the fields needed for license analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmInventory {
    pub id: String,
    pub name: String,
    pub location: String,
    pub vm_size: Option<String>,
    pub os_type: Option<OsType>,
    pub image: Option<ImageReference>,
    /// Hybrid-license type; empty or absent means no benefit applied.
    pub license_type: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// A cost optimization recommendation from the advisory service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationInventory {
    pub id: String,
    pub name: String,
    pub category: String,
    pub impact: Option<String>,
    pub risk: Option<String>,
    pub problem: Option<String>,
    pub solution: Option<String>,
    pub impacted_resource: Option<String>,
    pub resource_id: Option<String>,
    /// Free-form properties; savings amounts hide in here under several
    /// possible keys depending on the recommendation type.
    #[serde(default)]
    pub extended_properties: HashMap<String, String>,
    pub last_updated: Option<DateTime<Utc>>,
}

// =============================================================================
// Cost Models
// =============================================================================

/// Raw tabular result of a cost query.
///
/// The first column is the aggregated cost; remaining columns are the
/// grouping dimensions (and the date bucket for daily granularity).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// A configured budget for a scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetInfo {
    pub name: String,
    pub amount: f64,
    pub current_spend: f64,
    pub forecasted_spend: f64,
    pub time_grain: Option<String>,
    pub category: Option<String>,
}

// =============================================================================
// Remote Query Client
// =============================================================================

/// Capability the core needs from the management API.
///
/// One typed listing method per resource kind, plus scope discovery and the
/// cost-management tabular query. All methods are single remote calls;
/// retries, pacing, and circuit breaking happen in the caller.
pub trait RemoteQueryClient: Send + Sync {
    /// List all subscriptions accessible to the credential.
    fn list_subscriptions(&self) -> BoxFuture<'_, RemoteResult<Vec<SubscriptionInfo>>>;

    /// List public IP addresses in a subscription.
    fn list_public_ips<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<PublicIpInventory>>>;

    /// List managed disks in a subscription.
    fn list_disks<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<DiskInventory>>>;

    /// List snapshots in a subscription.
    fn list_snapshots<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<SnapshotInventory>>>;

    /// List network interfaces in a subscription.
    fn list_network_interfaces<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<NicInventory>>>;

    /// List virtual machines in a subscription.
    fn list_virtual_machines<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<VmInventory>>>;

    /// List cost optimization recommendations for a subscription.
    fn list_cost_recommendations<'a>(
        &'a self,
        subscription_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<RecommendationInventory>>>;

    /// Run a tabular cost query against a billing scope.
    fn run_cost_query<'a>(
        &'a self,
        scope: &'a str,
        spec: &'a QuerySpec,
    ) -> BoxFuture<'a, RemoteResult<CostTable>>;

    /// List configured budgets for a billing scope.
    fn list_budgets<'a>(
        &'a self,
        scope: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<BudgetInfo>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_redacts_token() {
        let credential = Credential::new("super-secret");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn remote_error_display_includes_status() {
        let err = RemoteError::with_status(429, "Too many requests");
        assert_eq!(err.to_string(), "HTTP 429: Too many requests");

        let err = RemoteError::message("connection reset");
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn remote_error_retryability() {
        assert!(RemoteError::with_status(429, "").is_retryable());
        assert!(RemoteError::with_status(503, "").is_retryable());
        assert!(!RemoteError::with_status(404, "").is_retryable());
        assert!(!RemoteError::message("timeout").is_retryable());
    }
}
