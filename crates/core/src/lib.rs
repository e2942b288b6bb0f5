//! Pheona core - phone number provisioning for hosted voice assistants
//!
//! - **Domain** (`domain`) - candidates, allocated numbers, terminal outcomes
//! - **Provisioning** (`provisioning`) - retry loop, hint extraction, activation poller
//! - **Config** (`config`) - layered defaults → file → env → overrides
//!
//! The upstream platform sits behind the `AllocationApi` trait so the
//! orchestrator can be driven by any client, including scripted fakes.

pub mod config;
pub mod domain;
pub mod errors;
pub mod provisioning;

pub use domain::outcome::{FailureReason, NotRoutableReason, ProvisioningOutcome};
pub use domain::phone_number::{
    AllocatedResource, AssistantId, Candidate, ProvisioningRequest, ResourceId, ResourceStatus,
};
pub use errors::{AllocationApiError, AllocationExhausted};
pub use provisioning::{
    ActivationPolicy, AllocationApi, ProvisionOptions, Provisioner, ProvisioningPolicy,
};
