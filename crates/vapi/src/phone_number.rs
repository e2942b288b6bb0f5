use async_trait::async_trait;
use pheona_core::{
    AllocatedResource, AllocationApi, AllocationApiError, Candidate, ProvisioningRequest,
    ResourceId, ResourceStatus,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{VapiClient, VapiError};

const PHONE_NUMBER_PATH: &str = "/phone-number";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePhoneNumberBody<'a> {
    provider: &'static str,
    assistant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    number_desired_area_code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhoneNumberPayload {
    id: String,
    #[serde(default)]
    number: Option<String>,
}

impl From<PhoneNumberPayload> for AllocatedResource {
    fn from(payload: PhoneNumberPayload) -> Self {
        let number = payload.number.filter(|number| !number.trim().is_empty());
        let status = if number.is_some() { ResourceStatus::Active } else { ResourceStatus::Pending };
        Self { id: ResourceId(payload.id), status, routable_identifier: number }
    }
}

impl From<VapiError> for AllocationApiError {
    fn from(error: VapiError) -> Self {
        match error {
            VapiError::Upstream { status, body } => Self::Rejected { status, body },
            other => Self::Transport(other.to_string()),
        }
    }
}

impl VapiClient {
    fn phone_number_url(&self, id: &ResourceId) -> String {
        self.url(&format!("{PHONE_NUMBER_PATH}/{}", id.0))
    }

    async fn decode(response: reqwest::Response) -> Result<AllocatedResource, AllocationApiError> {
        let payload: PhoneNumberPayload = response.json().await.map_err(|error| {
            AllocationApiError::Transport(format!("invalid phone number payload: {error}"))
        })?;
        Ok(payload.into())
    }
}

#[async_trait]
impl AllocationApi for VapiClient {
    async fn create_resource(
        &self,
        request: &ProvisioningRequest,
        candidate: &Candidate,
    ) -> Result<AllocatedResource, AllocationApiError> {
        let body = CreatePhoneNumberBody {
            provider: "vapi",
            assistant_id: &request.owner().0,
            name: request.display_label(),
            number_desired_area_code: candidate.as_str(),
        };
        let builder = self.http.post(self.url(PHONE_NUMBER_PATH)).json(&body);
        let response = self.execute(builder, "phone_number.create").await?;
        Self::decode(response).await
    }

    async fn get_resource(&self, id: &ResourceId) -> Result<AllocatedResource, AllocationApiError> {
        let builder = self.http.get(self.phone_number_url(id));
        let response = self.execute(builder, "phone_number.get").await?;
        Self::decode(response).await
    }

    async fn delete_resource(&self, id: &ResourceId) -> Result<(), AllocationApiError> {
        let builder = self.http.delete(self.phone_number_url(id));
        match self.execute(builder, "phone_number.delete").await {
            Ok(_) => Ok(()),
            // Already gone counts as released.
            Err(VapiError::Upstream { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }
}
