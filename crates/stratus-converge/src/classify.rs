//! Service classifiers for the two waits the orchestrator performs.

use tracing::debug;

use stratus_core::{ServiceDescription, ServiceStatus, StratusError};

use crate::poller::Poll;

/// Event text the readiness rule looks for.
pub const STEADY_STATE_MARKER: &str = "steady state";

/// Readiness over a one-element service list.
///
/// - empty list: the service vanished, `Failed`
/// - any event mentions "steady state": `Done`
/// - otherwise: `Pending`
///
/// The whole event log is searched, not just the newest entry, which is how
/// deployed tooling has always behaved. That is likely a defect: a service
/// that reached steady state on an earlier rollout reports ready again at
/// once, before the new revision has settled. Narrowing it to events newer
/// than the rollout changes how long deploys block, so it needs product
/// sign-off first.
pub fn readiness(services: Vec<ServiceDescription>) -> Poll<Vec<ServiceDescription>> {
    let Some(first) = services.first() else {
        return Poll::Failed(StratusError::Convergence(
            "service disappeared while waiting for it to become ready".to_string(),
        ));
    };

    let steady = first.events.iter().any(|event| {
        debug!(service = %first.service_name, message = %event.message, "readiness event");
        event.message.contains(STEADY_STATE_MARKER)
    });

    if steady { Poll::Done(services) } else { Poll::Pending }
}

/// Drain over a service list: `Done` once the first service is INACTIVE.
///
/// An empty list also counts as drained; a service the provider no longer
/// reports has nothing left to stop.
pub fn drained(services: Vec<ServiceDescription>) -> Poll<()> {
    match services.first() {
        None => Poll::Done(()),
        Some(svc) if svc.status == ServiceStatus::Inactive => Poll::Done(()),
        Some(svc) => {
            debug!(
                service = %svc.service_name,
                status = %svc.status,
                running = svc.running_count,
                "service still draining"
            );
            Poll::Pending
        }
    }
}
