//! stratus-provider: the boundary to the compute-orchestration API.
//!
//! - **`api`**: the `CloudApi` trait every lifecycle module calls through
//! - **`memory`**: `MemoryCloud`, an in-process provider for tests and
//!   the `stratus simulate` command

pub mod api;
pub mod memory;

pub use api::{CloudApi, SharedCloud};
pub use memory::{MemoryCloud, MemoryCloudConfig};
