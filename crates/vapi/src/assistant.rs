use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{VapiClient, VapiError};

/// Voice preference from the agent form. `Auto` leaves the platform default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceGender {
    Male,
    Female,
    #[default]
    Auto,
}

impl FromStr for VoiceGender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "auto" | "" => Ok(Self::Auto),
            other => Err(format!("unsupported voice `{other}` (expected male|female|auto)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSelection {
    pub provider: &'static str,
    pub voice_id: &'static str,
}

impl VoiceGender {
    // Curated voice ids are case-sensitive.
    pub fn voice(self) -> Option<VoiceSelection> {
        match self {
            Self::Female => Some(VoiceSelection { provider: "vapi", voice_id: "Hana" }),
            Self::Male => Some(VoiceSelection { provider: "vapi", voice_id: "Harry" }),
            Self::Auto => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssistantDraft {
    pub name: String,
    pub system_prompt: String,
    pub first_message: String,
    pub voice: VoiceGender,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Assistant {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAssistantBody<'a> {
    name: &'a str,
    first_message: &'a str,
    model: ModelBody<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<VoiceSelection>,
}

#[derive(Debug, Serialize)]
struct ModelBody<'a> {
    provider: &'a str,
    model: &'a str,
    messages: [MessageBody<'a>; 1],
}

#[derive(Debug, Serialize)]
struct MessageBody<'a> {
    role: &'static str,
    content: &'a str,
}

impl VapiClient {
    pub async fn create_assistant(&self, draft: &AssistantDraft) -> Result<Assistant, VapiError> {
        let body = CreateAssistantBody {
            name: &draft.name,
            first_message: &draft.first_message,
            model: ModelBody {
                provider: &self.model.provider,
                model: &self.model.name,
                messages: [MessageBody { role: "system", content: &draft.system_prompt }],
            },
            voice: draft.voice.voice(),
        };

        let builder = self.http.post(self.url("/assistant")).json(&body);
        let response = self.execute(builder, "assistant.create").await?;
        let assistant: Assistant = response.json().await.map_err(VapiError::Transport)?;
        if assistant.id.trim().is_empty() {
            return Err(VapiError::MissingField("id"));
        }

        info!(
            event_name = "vapi.assistant.created",
            assistant_id = %assistant.id,
            voice = ?draft.voice,
            "assistant created"
        );
        Ok(assistant)
    }
}
