use serde::Serialize;

use crate::domain::phone_number::AllocatedResource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotRoutableReason {
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    AllocationExhausted,
    TransportError,
    Cancelled,
}

/// Terminal result of one provisioning invocation.
///
/// `ProvisionedButNotRoutable` carries whatever snapshot was fetched last, so
/// `routable_identifier` may be absent on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProvisioningOutcome {
    Provisioned { resource: AllocatedResource },
    ProvisionedButNotRoutable {
        resource: AllocatedResource,
        reason: NotRoutableReason,
        released: bool,
    },
    Failed { reason: FailureReason, detail: String },
}

impl ProvisioningOutcome {
    pub fn resource(&self) -> Option<&AllocatedResource> {
        match self {
            Self::Provisioned { resource } | Self::ProvisionedButNotRoutable { resource, .. } => {
                Some(resource)
            }
            Self::Failed { .. } => None,
        }
    }

    pub fn routable_identifier(&self) -> Option<&str> {
        match self {
            Self::Provisioned { resource } => resource.routable_identifier.as_deref(),
            _ => None,
        }
    }
}
