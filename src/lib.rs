//! costscope - Cloud cost and orphaned resource reporting service
//!
//! Queries cloud management APIs for unattached or cost-inefficient
//! resources and the billing API for spend breakdowns, tolerating throttled
//! and eventually-consistent remotes with explicit retry policies, paced
//! batches, and a circuit breaker.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod remote;
pub mod server;
pub mod util;

pub use error::{CostscopeError, ExitCode, Result};
