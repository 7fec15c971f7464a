//! Core query orchestration.
//!
//! Leaf to root: [`retry`] decides, [`executor`] paces and circuit-breaks,
//! [`collector`] and [`cost`] assemble results, [`router`] parses and
//! dispatches.

pub mod collector;
pub mod cost;
pub mod executor;
pub mod license;
pub mod logging;
pub mod models;
pub mod retry;
pub mod router;

pub use collector::ResourceCollector;
pub use cost::CostAggregator;
pub use executor::{BatchExecutor, ExecutionReport, ItemOutcome};
pub use models::{InventoryReport, ResourceRecord, ResourceType, ScopeRef};
pub use retry::{ErrorClass, RetryPolicy};
