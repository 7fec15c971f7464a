//! CLI argument definitions using clap.
//!
//! The `analyze` and `cost` commands accept either a JSON request document
//! (the same body the HTTP operations take) or individual flags, and print
//! the same JSON the HTTP operations return.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::router::{CostRequest, InventoryRequest};

/// Cloud cost and orphaned resource reporting service.
#[derive(Parser, Debug)]
#[command(name = "costscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSON logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server
    Serve(ServeArgs),

    /// Run an inventory query and print the JSON response
    Analyze(AnalyzeArgs),

    /// Run a cost query and print the JSON response
    Cost(CostArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Bind address (overrides config)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Arguments for the `analyze` command.
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// JSON request document ("-" for stdin); flags below are ignored
    #[arg(long, value_name = "FILE")]
    pub request: Option<PathBuf>,

    /// Subscription to analyze (omit for tenant-wide)
    #[arg(long, value_name = "ID")]
    pub subscription_id: Option<String>,

    /// Resource type filter (repeatable)
    #[arg(long = "resource-type", value_name = "TYPE")]
    pub resource_types: Vec<String>,

    /// Resource group filter
    #[arg(long, value_name = "GROUP")]
    pub resource_group: Option<String>,

    /// Location filter
    #[arg(long, value_name = "LOCATION")]
    pub location: Option<String>,

    /// Subscription name filter (tenant-wide runs)
    #[arg(long, value_name = "NAME")]
    pub subscription_name: Option<String>,
}

impl AnalyzeArgs {
    /// Build the request body this command submits.
    ///
    /// # Errors
    ///
    /// Returns error when the request document cannot be read or parsed.
    pub fn to_request(&self) -> crate::error::Result<InventoryRequest> {
        if let Some(path) = &self.request {
            return super::read_request_document(path);
        }
        Ok(InventoryRequest {
            subscription_id: self.subscription_id.clone(),
            resource_types: if self.resource_types.is_empty() {
                None
            } else {
                Some(self.resource_types.clone())
            },
            resource_group: self.resource_group.clone(),
            location: self.location.clone(),
            subscription_name: self.subscription_name.clone(),
        })
    }
}

/// Arguments for the `cost` command.
#[derive(Parser, Debug)]
pub struct CostArgs {
    /// JSON request document ("-" for stdin); flags below are ignored
    #[arg(long, value_name = "FILE")]
    pub request: Option<PathBuf>,

    /// Subscription to query (required)
    #[arg(long, value_name = "ID")]
    pub subscription_id: Option<String>,

    /// Query type (inferred from parameters when omitted)
    #[arg(long, value_name = "TYPE")]
    pub query_type: Option<String>,

    /// Period start (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE")]
    pub start_date: Option<String>,

    /// Period end (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE")]
    pub end_date: Option<String>,

    /// Resource group (for resource_group queries)
    #[arg(long, value_name = "GROUP")]
    pub resource_group: Option<String>,

    /// Service name (repeatable, for service queries)
    #[arg(long = "service-name", value_name = "NAME")]
    pub service_names: Vec<String>,

    /// Resource id (repeatable, for specific_resources queries)
    #[arg(long = "resource-id", value_name = "ID")]
    pub resource_ids: Vec<String>,

    /// Number of top resources (for top_resources queries)
    #[arg(long, value_name = "N")]
    pub top_n: Option<u32>,

    /// Granularity (Daily, Monthly, None)
    #[arg(long, value_name = "GRANULARITY")]
    pub granularity: Option<String>,
}

impl CostArgs {
    /// Build the request body this command submits.
    ///
    /// # Errors
    ///
    /// Returns error when the request document cannot be read or parsed.
    pub fn to_request(&self) -> crate::error::Result<CostRequest> {
        if let Some(path) = &self.request {
            return super::read_request_document(path);
        }
        Ok(CostRequest {
            subscription_id: self.subscription_id.clone(),
            query_type: self.query_type.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            resource_group: self.resource_group.clone(),
            service_names: if self.service_names.is_empty() {
                None
            } else {
                Some(self.service_names.clone())
            },
            resource_ids: if self.resource_ids.is_empty() {
                None
            } else {
                Some(self.resource_ids.clone())
            },
            top_n: self.top_n,
            granularity: self.granularity.clone(),
        })
    }
}
