//! stratus-converge: waiting out an eventually-consistent provider.
//!
//! # Components
//!
//! - **`retry`**: re-issue a failed call with back-off (tag-after-create)
//! - **`poller`**: re-observe state until a classifier reports a terminal verdict
//! - **`classify`**: service readiness and drain classifiers
//! - **`cancel`**: cooperative cancellation shared by both loops

pub mod cancel;
pub mod classify;
pub mod poller;
pub mod retry;

pub use cancel::{cancellation, CancelHandle, Cancellation};
pub use poller::{Poll, Poller};
pub use retry::{Classifier, Retry, RetryPolicy};
