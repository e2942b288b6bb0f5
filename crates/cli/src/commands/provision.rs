use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use pheona_core::config::{AppConfig, ConfigOverrides};
use pheona_core::{
    AssistantId, Candidate, FailureReason, ProvisionOptions, Provisioner, ProvisioningOutcome,
    ProvisioningPolicy, ProvisioningRequest,
};
use pheona_vapi::VapiClient;
use tracing::info;

use crate::commands::{
    build_runtime, interrupted, load_config, outcome_data, parse_area_codes, CommandResult,
    EXIT_CONFIG, EXIT_NOT_ROUTABLE, EXIT_PROVISIONING_FAILED,
};
use crate::logging;

const COMMAND: &str = "provision";

#[derive(Debug, Clone, Default)]
pub struct ProvisionArgs {
    pub config_path: Option<PathBuf>,
    pub assistant_id: String,
    pub label: Option<String>,
    pub area_codes: Vec<String>,
    pub poll_interval_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
}

pub fn run(args: ProvisionArgs) -> CommandResult {
    let overrides = ConfigOverrides {
        poll_interval_secs: args.poll_interval_secs,
        deadline_secs: args.deadline_secs,
        ..ConfigOverrides::default()
    };
    let config = match load_config(args.config_path, overrides) {
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

    if args.assistant_id.trim().is_empty() {
        return CommandResult::failure(
            COMMAND,
            "invalid_input",
            "assistant id must not be empty",
            EXIT_CONFIG,
        );
    }
    let seeds = match parse_area_codes(&args.area_codes) {
        Ok(seeds) => seeds,
        Err(message) => {
            return CommandResult::failure(COMMAND, "invalid_input", message, EXIT_CONFIG);
        }
    };

    let request =
        ProvisioningRequest::new(AssistantId(args.assistant_id.trim().to_string()), args.label);
    let outcome = match execute(&config, &request, seeds) {
        Ok(outcome) => outcome,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("{error:#}"),
                EXIT_PROVISIONING_FAILED,
            );
        }
    };

    outcome_result(COMMAND, &outcome)
}

fn execute(
    config: &AppConfig,
    request: &ProvisioningRequest,
    seeds: Vec<Candidate>,
) -> anyhow::Result<ProvisioningOutcome> {
    let runtime = build_runtime().context("failed to initialize async runtime")?;
    let client = VapiClient::from_config(&config.vapi).context("failed to build vapi client")?;
    let provisioner =
        Provisioner::new(Arc::new(client), ProvisioningPolicy::from(&config.provisioning));

    info!(
        event_name = "cli.provision.start",
        correlation_id = %request.correlation_id(),
        assistant_id = %request.owner().0,
        "provisioning phone number"
    );
    let options = ProvisionOptions { seed_candidates: seeds, ..ProvisionOptions::default() };
    Ok(runtime.block_on(provisioner.provision_until(request, options, interrupted())))
}

/// Maps an outcome onto the command payload and its exit code.
pub(crate) fn outcome_result(command: &str, outcome: &ProvisioningOutcome) -> CommandResult {
    let data = outcome_data(outcome);
    match outcome {
        ProvisioningOutcome::Provisioned { resource } => CommandResult::success_with_data(
            command,
            format!(
                "phone number {} is routable",
                resource.routable_identifier.as_deref().unwrap_or_default()
            ),
            data,
        ),
        ProvisioningOutcome::ProvisionedButNotRoutable { resource, released, .. } => {
            CommandResult::failure_with_data(
                command,
                "not_routable",
                format!(
                    "phone number `{}` did not become routable before the deadline \
                     (released: {released})",
                    resource.id
                ),
                EXIT_NOT_ROUTABLE,
                data,
            )
        }
        ProvisioningOutcome::Failed { reason, detail } => CommandResult::failure_with_data(
            command,
            failure_class(*reason),
            detail.clone(),
            EXIT_PROVISIONING_FAILED,
            data,
        ),
    }
}

fn failure_class(reason: FailureReason) -> &'static str {
    match reason {
        FailureReason::AllocationExhausted => "allocation_exhausted",
        FailureReason::TransportError => "transport_error",
        FailureReason::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use pheona_core::{AllocatedResource, FailureReason, NotRoutableReason, ProvisioningOutcome};
    use serde_json::Value;

    use super::outcome_result;

    fn payload(output: &str) -> Value {
        serde_json::from_str(output).expect("payload should be JSON")
    }

    #[test]
    fn provisioned_outcome_exits_zero_with_number() {
        let result = outcome_result(
            "provision",
            &ProvisioningOutcome::Provisioned {
                resource: AllocatedResource::active("pn-1", "+15105550100"),
            },
        );

        assert_eq!(result.exit_code, 0);
        let payload = payload(&result.output);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["outcome"], "provisioned");
        assert_eq!(payload["data"]["resource"]["routable_identifier"], "+15105550100");
    }

    #[test]
    fn not_routable_outcome_exits_four() {
        let result = outcome_result(
            "provision",
            &ProvisioningOutcome::ProvisionedButNotRoutable {
                resource: AllocatedResource::pending("pn-2"),
                reason: NotRoutableReason::Timeout,
                released: false,
            },
        );

        assert_eq!(result.exit_code, 4);
        let payload = payload(&result.output);
        assert_eq!(payload["error_class"], "not_routable");
        assert_eq!(payload["data"]["released"], false);
    }

    #[test]
    fn failed_outcome_uses_reason_as_error_class() {
        let result = outcome_result(
            "provision",
            &ProvisioningOutcome::Failed {
                reason: FailureReason::TransportError,
                detail: "connection refused".to_string(),
            },
        );

        assert_eq!(result.exit_code, 3);
        let payload = payload(&result.output);
        assert_eq!(payload["error_class"], "transport_error");
        assert_eq!(payload["message"], "connection refused");
    }
}
