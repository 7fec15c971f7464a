//! Hybrid-license benefit eligibility.
//!
//! Pure predicates over already-fetched VM inventory. A VM is eligible when
//! it runs a Windows Server family image (server offer, not a client SKU) or
//! a RHEL/SLES image; eligible VMs with an empty or absent license type are
//! the ones worth reporting.

use crate::remote::{OsType, VmInventory};

/// Windows Server marketplace offers that qualify.
const WINDOWS_SERVER_OFFERS: &[&str] = &[
    "windowsserver",
    "windows-server",
    "windowsserver-gen2",
    "windows_server",
    "microsoftwindowsserver",
];

/// Windows client SKUs that disqualify even when the offer looks serverish.
const WINDOWS_CLIENT_SKUS: &[&str] = &[
    "windows-10",
    "windows-11",
    "win10",
    "win11",
    "rs5-pro",
    "rs5-ent",
    "19h1-pro",
    "19h1-ent",
    "20h1-pro",
    "20h2-pro",
    "21h1-pro",
];

const RHEL_OFFERS: &[&str] = &["rhel", "rhel-byos", "rhel-ha", "rhel-sap-ha"];
const RHEL_PUBLISHERS: &[&str] = &["redhat", "red-hat"];
const SLES_OFFERS: &[&str] = &["sles", "sles-byos", "sles-sap", "sles-for-sap"];
const SLES_PUBLISHERS: &[&str] = &["suse", "suse-byos"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Whether the VM's image qualifies for the hybrid-license benefit.
#[must_use]
pub fn is_hybrid_benefit_eligible(vm: &VmInventory) -> bool {
    match vm.os_type {
        Some(OsType::Windows) => match &vm.image {
            Some(image) => {
                let offer = image.offer.to_lowercase();
                let sku = image.sku.to_lowercase();
                contains_any(&offer, WINDOWS_SERVER_OFFERS)
                    && !contains_any(&sku, WINDOWS_CLIENT_SKUS)
            }
            // Custom images carry no marketplace reference; assume eligible
            // rather than silently dropping them from the report.
            None => true,
        },
        Some(OsType::Linux) => vm.image.as_ref().is_some_and(|image| {
            let offer = image.offer.to_lowercase();
            let publisher = image.publisher.to_lowercase();
            let is_rhel = contains_any(&offer, RHEL_OFFERS)
                || contains_any(&publisher, RHEL_PUBLISHERS);
            let is_sles = contains_any(&offer, SLES_OFFERS)
                || contains_any(&publisher, SLES_PUBLISHERS);
            is_rhel || is_sles
        }),
        None => false,
    }
}

/// Whether an eligible VM is missing the benefit.
#[must_use]
pub fn is_missing_hybrid_benefit(vm: &VmInventory) -> bool {
    is_hybrid_benefit_eligible(vm)
        && vm
            .license_type
            .as_deref()
            .is_none_or(|license| license.is_empty())
}

/// `publisher/offer/sku` string for reporting, or a placeholder for custom
/// images.
#[must_use]
pub fn os_info(vm: &VmInventory) -> String {
    vm.image.as_ref().map_or_else(
        || "Custom/Unknown Image".to_string(),
        |image| format!("{}/{}/{}", image.publisher, image.offer, image.sku),
    )
}
