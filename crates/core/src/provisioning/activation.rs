use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::domain::outcome::{NotRoutableReason, ProvisioningOutcome};
use crate::domain::phone_number::{AllocatedResource, ProvisioningRequest, ResourceId};
use crate::provisioning::{ActivationPolicy, Provisioner};

/// Where polling stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ActivationPoll {
    Routable(AllocatedResource),
    /// Deadline passed; carries the last snapshot seen.
    TimedOut(AllocatedResource),
}

impl Provisioner {
    /// Polls `resource` until it carries a routable number or `policy.deadline`
    /// elapses. On timeout the number is released (one attempt) and the last
    /// snapshot is returned either way.
    pub async fn await_activation(
        &self,
        request: &ProvisioningRequest,
        resource: AllocatedResource,
        policy: &ActivationPolicy,
    ) -> ProvisioningOutcome {
        match self.poll_activation(request, resource, policy).await {
            ActivationPoll::Routable(resource) => ProvisioningOutcome::Provisioned { resource },
            ActivationPoll::TimedOut(latest) => self.release_unrouted(request, latest).await,
        }
    }

    /// The polling half of `await_activation`. Dropping it never leaves a
    /// delete half-sent, so callers may race it against cancellation.
    pub(crate) async fn poll_activation(
        &self,
        request: &ProvisioningRequest,
        resource: AllocatedResource,
        policy: &ActivationPolicy,
    ) -> ActivationPoll {
        let started = Instant::now();
        let resource_id = resource.id.clone();
        let mut latest = resource;
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            match self.api.get_resource(&resource_id).await {
                Ok(snapshot) if snapshot.is_routable() => {
                    info!(
                        event_name = "provisioning.activation.routable",
                        correlation_id = %request.correlation_id(),
                        resource_id = %resource_id,
                        polls,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "phone number is routable"
                    );
                    return ActivationPoll::Routable(snapshot);
                }
                Ok(snapshot) => {
                    debug!(
                        event_name = "provisioning.activation.pending",
                        correlation_id = %request.correlation_id(),
                        resource_id = %resource_id,
                        polls,
                        status = ?snapshot.status,
                        "phone number not routable yet"
                    );
                    latest = snapshot;
                }
                Err(error) => {
                    warn!(
                        event_name = "provisioning.activation.poll_failed",
                        correlation_id = %request.correlation_id(),
                        resource_id = %resource_id,
                        polls,
                        error = %error,
                        "status poll failed; keeping previous snapshot"
                    );
                }
            }

            let remaining = policy.deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            sleep(policy.poll_interval.min(remaining)).await;
            if started.elapsed() >= policy.deadline {
                break;
            }
        }

        warn!(
            event_name = "provisioning.activation.timed_out",
            correlation_id = %request.correlation_id(),
            resource_id = %resource_id,
            polls,
            deadline_ms = policy.deadline.as_millis() as u64,
            "phone number did not become routable before the deadline"
        );
        ActivationPoll::TimedOut(latest)
    }

    pub(crate) async fn release_unrouted(
        &self,
        request: &ProvisioningRequest,
        latest: AllocatedResource,
    ) -> ProvisioningOutcome {
        let released = self.release(request, &latest.id).await;
        ProvisioningOutcome::ProvisionedButNotRoutable {
            resource: latest,
            reason: NotRoutableReason::Timeout,
            released,
        }
    }

    /// Single best-effort delete; failures are logged and reported as `false`.
    pub(crate) async fn release(&self, request: &ProvisioningRequest, id: &ResourceId) -> bool {
        match self.api.delete_resource(id).await {
            Ok(()) => {
                info!(
                    event_name = "provisioning.cleanup.released",
                    correlation_id = %request.correlation_id(),
                    resource_id = %id,
                    "released unactivated phone number"
                );
                true
            }
            Err(error) => {
                warn!(
                    event_name = "provisioning.cleanup.failed",
                    correlation_id = %request.correlation_id(),
                    resource_id = %id,
                    error = %error,
                    "could not release unactivated phone number"
                );
                false
            }
        }
    }
}
