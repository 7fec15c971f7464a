//! Command-line interface.

pub mod args;

mod analyze;
mod cost;
mod serve;

use std::io::Read;
use std::path::Path;

pub use args::{AnalyzeArgs, Cli, Commands, CostArgs, ServeArgs};

pub use analyze::execute as execute_analyze;
pub use cost::execute as execute_cost;
pub use serve::execute as execute_serve;

use crate::error::{CostscopeError, Result};

/// Read and parse a JSON request document; "-" reads stdin.
pub(crate) fn read_request_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };
    serde_json::from_str(&content).map_err(|e| {
        CostscopeError::InvalidRequest(format!("invalid request document: {e}"))
    })
}

/// Print a JSON value to stdout, pretty or compact.
pub(crate) fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}
