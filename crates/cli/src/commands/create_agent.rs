use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use pheona_core::config::{AppConfig, ConfigOverrides};
use pheona_core::{
    AssistantId, Candidate, ProvisionOptions, Provisioner, ProvisioningOutcome,
    ProvisioningPolicy, ProvisioningRequest,
};
use pheona_vapi::assistant::{Assistant, AssistantDraft, VoiceGender};
use pheona_vapi::{VapiClient, VapiError};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::commands::{
    build_runtime, interrupted, load_config, outcome_data, parse_area_codes, CommandResult,
    EXIT_CONFIG, EXIT_PROVISIONING_FAILED, EXIT_UPSTREAM,
};
use crate::logging;

const COMMAND: &str = "create-agent";

#[derive(Debug, Clone)]
pub struct CreateAgentArgs {
    pub config_path: Option<PathBuf>,
    pub name: String,
    pub system_prompt: String,
    pub first_message: String,
    pub voice: VoiceGender,
    pub area_codes: Vec<String>,
    pub attach_phone: bool,
}

struct AgentCreated {
    assistant: Assistant,
    phone: Option<ProvisioningOutcome>,
}

pub fn run(args: CreateAgentArgs) -> CommandResult {
    let config = match load_config(args.config_path.clone(), ConfigOverrides::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };
    logging::init(&config.logging);

    let draft = match draft_from(&args) {
        Ok(draft) => draft,
        Err(message) => {
            return CommandResult::failure(COMMAND, "invalid_input", message, EXIT_CONFIG);
        }
    };
    let seeds = match parse_area_codes(&args.area_codes) {
        Ok(seeds) => seeds,
        Err(message) => {
            return CommandResult::failure(COMMAND, "invalid_input", message, EXIT_CONFIG);
        }
    };

    match execute(&config, &draft, args.attach_phone.then_some(seeds)) {
        Ok(Ok(created)) => created_result(created),
        Ok(Err(error)) => CommandResult::failure(
            COMMAND,
            "upstream_assistant",
            format!("assistant creation failed: {error}"),
            EXIT_UPSTREAM,
        ),
        Err(error) => CommandResult::failure(
            COMMAND,
            "runtime_init",
            format!("{error:#}"),
            EXIT_PROVISIONING_FAILED,
        ),
    }
}

fn draft_from(args: &CreateAgentArgs) -> Result<AssistantDraft, String> {
    let name = args.name.trim();
    if name.is_empty() {
        return Err("agent name must not be empty".to_string());
    }
    let system_prompt = args.system_prompt.trim();
    if system_prompt.is_empty() {
        return Err("system prompt must not be empty".to_string());
    }

    Ok(AssistantDraft {
        name: name.to_string(),
        system_prompt: system_prompt.to_string(),
        first_message: args.first_message.trim().to_string(),
        voice: args.voice,
    })
}

/// The outer error covers local setup; the inner one is the assistant call.
/// Phone provisioning never fails the command once the assistant exists.
fn execute(
    config: &AppConfig,
    draft: &AssistantDraft,
    phone_seeds: Option<Vec<Candidate>>,
) -> anyhow::Result<Result<AgentCreated, VapiError>> {
    let runtime = build_runtime().context("failed to initialize async runtime")?;
    let client =
        Arc::new(VapiClient::from_config(&config.vapi).context("failed to build vapi client")?);

    Ok(runtime.block_on(create_and_attach(client, config, draft, phone_seeds)))
}

async fn create_and_attach(
    client: Arc<VapiClient>,
    config: &AppConfig,
    draft: &AssistantDraft,
    phone_seeds: Option<Vec<Candidate>>,
) -> Result<AgentCreated, VapiError> {
    let assistant = client.create_assistant(draft).await?;
    let Some(seeds) = phone_seeds else {
        return Ok(AgentCreated { assistant, phone: None });
    };

    let label = format!("{} Line", draft.name);
    let request = ProvisioningRequest::new(AssistantId(assistant.id.clone()), Some(label));
    info!(
        event_name = "cli.create_agent.provision",
        correlation_id = %request.correlation_id(),
        assistant_id = %assistant.id,
        "attaching phone number to new assistant"
    );
    let provisioner = Provisioner::new(client, ProvisioningPolicy::from(&config.provisioning));
    let options = ProvisionOptions { seed_candidates: seeds, ..ProvisionOptions::default() };
    let outcome = provisioner.provision_until(&request, options, interrupted()).await;
    if outcome.routable_identifier().is_none() {
        warn!(
            event_name = "cli.create_agent.phone_unavailable",
            correlation_id = %request.correlation_id(),
            assistant_id = %assistant.id,
            "assistant created without a routable phone number"
        );
    }

    Ok(AgentCreated { assistant, phone: Some(outcome) })
}

fn created_result(created: AgentCreated) -> CommandResult {
    let message = match created.phone.as_ref() {
        None => format!("assistant {} created", created.assistant.id),
        Some(outcome) => match outcome.routable_identifier() {
            Some(number) => {
                format!("assistant {} created with phone number {number}", created.assistant.id)
            }
            None => format!(
                "assistant {} created; phone number is not available yet",
                created.assistant.id
            ),
        },
    };

    let data = json!({
        "assistant": {
            "id": created.assistant.id,
            "name": created.assistant.name,
        },
        "phone": created.phone.as_ref().map(outcome_data).unwrap_or(Value::Null),
    });
    CommandResult::success_with_data(COMMAND, message, data)
}

#[cfg(test)]
mod tests {
    use pheona_vapi::assistant::VoiceGender;

    use super::{draft_from, CreateAgentArgs};

    fn args(name: &str, system_prompt: &str) -> CreateAgentArgs {
        CreateAgentArgs {
            config_path: None,
            name: name.to_string(),
            system_prompt: system_prompt.to_string(),
            first_message: "  Hi there!  ".to_string(),
            voice: VoiceGender::Female,
            area_codes: Vec::new(),
            attach_phone: true,
        }
    }

    #[test]
    fn draft_trims_inputs() {
        let draft = draft_from(&args(" Front Desk ", " Be helpful. ")).expect("valid draft");
        assert_eq!(draft.name, "Front Desk");
        assert_eq!(draft.system_prompt, "Be helpful.");
        assert_eq!(draft.first_message, "Hi there!");
        assert_eq!(draft.voice, VoiceGender::Female);
    }

    #[test]
    fn draft_requires_name_and_prompt() {
        assert!(draft_from(&args("  ", "Be helpful.")).is_err());
        assert!(draft_from(&args("Front Desk", "")).is_err());
    }
}
