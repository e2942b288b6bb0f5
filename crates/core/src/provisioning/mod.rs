//! Phone number provisioning against an eventually-consistent upstream.
//!
//! One invocation runs two phases in sequence:
//! 1. **Allocation** (`allocator`) walks a growable list of candidate area
//!    codes, feeding alternatives named in rejection bodies (`hints`) back into
//!    the list, until one create call succeeds.
//! 2. **Activation** (`activation`) polls the allocated number until the
//!    platform reports it routable, releasing it again if the deadline passes.
//!
//! Each invocation owns at most one live number. It is either handed back to
//! the caller inside a `Provisioned*` outcome or deleted.

pub mod activation;
pub mod allocator;
pub mod hints;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::ProvisioningConfig;
use crate::domain::outcome::{FailureReason, ProvisioningOutcome};
use crate::domain::phone_number::{AllocatedResource, Candidate, ProvisioningRequest, ResourceId};
use crate::errors::{AllocationApiError, AllocationExhausted};

use self::activation::ActivationPoll;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Create/get/delete surface of the upstream phone number platform.
#[async_trait]
pub trait AllocationApi: Send + Sync {
    async fn create_resource(
        &self,
        request: &ProvisioningRequest,
        candidate: &Candidate,
    ) -> Result<AllocatedResource, AllocationApiError>;

    async fn get_resource(&self, id: &ResourceId) -> Result<AllocatedResource, AllocationApiError>;

    async fn delete_resource(&self, id: &ResourceId) -> Result<(), AllocationApiError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationPolicy {
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(10), deadline: Duration::from_secs(180) }
    }
}

impl ActivationPolicy {
    fn with_overrides(&self, poll_interval: Option<Duration>, deadline: Option<Duration>) -> Self {
        Self {
            poll_interval: poll_interval.unwrap_or(self.poll_interval).max(MIN_POLL_INTERVAL),
            deadline: deadline.unwrap_or(self.deadline),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisioningPolicy {
    /// Tried in order when the caller supplies no seed candidates.
    pub fallback_candidates: Vec<Candidate>,
    pub activation: ActivationPolicy,
}

impl Default for ProvisioningPolicy {
    fn default() -> Self {
        Self::from(&ProvisioningConfig::default())
    }
}

impl From<&ProvisioningConfig> for ProvisioningPolicy {
    fn from(config: &ProvisioningConfig) -> Self {
        let fallback_candidates = config
            .default_area_code
            .iter()
            .chain(config.fallback_area_codes.iter())
            .map(Candidate::new)
            .collect();

        Self {
            fallback_candidates,
            activation: ActivationPolicy {
                poll_interval: Duration::from_secs(config.poll_interval_secs),
                deadline: Duration::from_secs(config.deadline_secs),
            },
        }
    }
}

/// Per-call knobs; unset values fall back to the provisioner's policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub seed_candidates: Vec<Candidate>,
    pub poll_interval: Option<Duration>,
    pub deadline: Option<Duration>,
}

pub struct Provisioner {
    api: Arc<dyn AllocationApi>,
    policy: ProvisioningPolicy,
}

impl Provisioner {
    pub fn new(api: Arc<dyn AllocationApi>, policy: ProvisioningPolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> &ProvisioningPolicy {
        &self.policy
    }

    pub async fn provision(
        &self,
        request: &ProvisioningRequest,
        options: ProvisionOptions,
    ) -> ProvisioningOutcome {
        self.provision_until(request, options, std::future::pending::<()>()).await
    }

    /// Runs allocation then activation, abandoning the flow as soon as
    /// `cancel` resolves. A create already in flight is allowed to finish, and
    /// whatever number the flow holds at that point is released with a single
    /// delete attempt. A deadline release that has started is never interrupted.
    pub async fn provision_until<F>(
        &self,
        request: &ProvisioningRequest,
        options: ProvisionOptions,
        cancel: F,
    ) -> ProvisioningOutcome
    where
        F: Future<Output = ()>,
    {
        let activation = self.policy.activation.with_overrides(options.poll_interval, options.deadline);
        tokio::pin!(cancel);

        info!(
            event_name = "provisioning.start",
            correlation_id = %request.correlation_id(),
            assistant_id = %request.owner().0,
            seed_count = options.seed_candidates.len(),
            poll_interval_ms = activation.poll_interval.as_millis() as u64,
            deadline_ms = activation.deadline.as_millis() as u64,
            "starting phone number provisioning"
        );

        let stop = AtomicBool::new(false);
        let allocation = self.allocate_until_stopped(request, &options.seed_candidates, &stop);
        tokio::pin!(allocation);

        let allocated = tokio::select! {
            result = &mut allocation => result,
            () = &mut cancel => {
                stop.store(true, Ordering::Release);
                return self.cancel_allocation(request, allocation.await).await;
            }
        };

        let resource = match allocated {
            Ok(resource) => resource,
            Err(exhausted) => {
                error!(
                    event_name = "provisioning.allocation_exhausted",
                    correlation_id = %request.correlation_id(),
                    attempts = exhausted.attempts,
                    error = %exhausted,
                    "no candidate area code could be allocated"
                );
                return exhausted.into();
            }
        };

        let resource_id = resource.id.clone();
        let polled = tokio::select! {
            polled = self.poll_activation(request, resource, &activation) => polled,
            () = &mut cancel => {
                warn!(
                    event_name = "provisioning.cancelled",
                    correlation_id = %request.correlation_id(),
                    resource_id = %resource_id,
                    phase = "activation",
                    "provisioning cancelled while waiting for activation"
                );
                let released = self.release(request, &resource_id).await;
                return ProvisioningOutcome::Failed {
                    reason: FailureReason::Cancelled,
                    detail: format!(
                        "cancelled while activating number `{resource_id}` (released: {released})"
                    ),
                };
            }
        };

        match polled {
            ActivationPoll::Routable(resource) => ProvisioningOutcome::Provisioned { resource },
            ActivationPoll::TimedOut(latest) => self.release_unrouted(request, latest).await,
        }
    }

    /// Settles a cancellation that arrived mid-allocation. `allocated` is what
    /// the in-flight create produced once allowed to finish.
    async fn cancel_allocation(
        &self,
        request: &ProvisioningRequest,
        allocated: Result<AllocatedResource, AllocationExhausted>,
    ) -> ProvisioningOutcome {
        let Ok(resource) = allocated else {
            warn!(
                event_name = "provisioning.cancelled",
                correlation_id = %request.correlation_id(),
                phase = "allocation",
                "provisioning cancelled before a number was allocated"
            );
            return ProvisioningOutcome::Failed {
                reason: FailureReason::Cancelled,
                detail: "cancelled during allocation; no number was allocated".to_owned(),
            };
        };

        warn!(
            event_name = "provisioning.cancelled",
            correlation_id = %request.correlation_id(),
            resource_id = %resource.id,
            phase = "allocation",
            "provisioning cancelled while a create was in flight"
        );
        let released = self.release(request, &resource.id).await;
        ProvisioningOutcome::Failed {
            reason: FailureReason::Cancelled,
            detail: format!(
                "cancelled during allocation; number `{}` was allocated (released: {released})",
                resource.id
            ),
        }
    }
}
