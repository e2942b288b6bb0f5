use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the assistant a phone number gets bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssistantId(pub String);

/// Upstream-assigned handle of an allocated phone number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub String);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value proposed to the allocation API to select which number gets created
/// (a US area code for the voice platform).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate(pub String);

impl Candidate {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key used for duplicate detection inside one worklist.
    pub fn dedup_key(&self) -> String {
        self.0.trim().to_ascii_lowercase()
    }

    pub fn is_area_code(value: &str) -> bool {
        value.len() == 3 && value.bytes().all(|byte| byte.is_ascii_digit())
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Pending,
    Active,
}

/// Snapshot of a phone number as last reported by the upstream platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedResource {
    pub id: ResourceId,
    pub status: ResourceStatus,
    pub routable_identifier: Option<String>,
}

impl AllocatedResource {
    pub fn pending(id: impl Into<String>) -> Self {
        Self { id: ResourceId(id.into()), status: ResourceStatus::Pending, routable_identifier: None }
    }

    pub fn active(id: impl Into<String>, routable_identifier: impl Into<String>) -> Self {
        Self {
            id: ResourceId(id.into()),
            status: ResourceStatus::Active,
            routable_identifier: Some(routable_identifier.into()),
        }
    }

    pub fn is_routable(&self) -> bool {
        self.routable_identifier.as_deref().map(|value| !value.trim().is_empty()).unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisioningRequest {
    owner: AssistantId,
    display_label: Option<String>,
    correlation_id: String,
}

impl ProvisioningRequest {
    pub fn new(owner: AssistantId, display_label: Option<String>) -> Self {
        let display_label = display_label.filter(|label| !label.trim().is_empty());
        Self { owner, display_label, correlation_id: Uuid::new_v4().to_string() }
    }

    pub fn owner(&self) -> &AssistantId {
        &self.owner
    }

    pub fn display_label(&self) -> Option<&str> {
        self.display_label.as_deref()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}
