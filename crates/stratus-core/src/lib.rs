//! stratus-core: shared vocabulary for the Stratus lifecycle layer.
//!
//! - **`tenant`**: encodes (project, environment, commit) into resource
//!   names and tags, and filters resources back out of list results
//! - **`types`**: provider descriptions and the refs handed to callers
//! - **`error`**: the `StratusError` taxonomy
//! - **`config`**: `stratus.toml` parsing

pub mod config;
pub mod error;
pub mod tenant;
pub mod types;

pub use config::StratusConfig;
pub use error::{StratusError, StratusResult};
pub use tenant::{Environment, ResourceIdentity, TenantFilter, TenantKey};
pub use types::*;
