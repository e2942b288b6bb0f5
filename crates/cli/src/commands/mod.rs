pub mod config;
pub mod create_agent;
pub mod provision;

use std::path::PathBuf;

use pheona_core::config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
use pheona_core::{Candidate, ProvisioningOutcome};
use serde::Serialize;
use serde_json::Value;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_PROVISIONING_FAILED: u8 = 3;
pub const EXIT_NOT_ROUTABLE: u8 = 4;
pub const EXIT_UPSTREAM: u8 = 5;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::render(0, command, "ok", None, message.into(), None)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Value) -> Self {
        Self::render(0, command, "ok", None, message.into(), Some(data))
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::render(exit_code, command, "error", Some(error_class), message.into(), None)
    }

    pub fn failure_with_data(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        data: Value,
    ) -> Self {
        Self::render(exit_code, command, "error", Some(error_class), message.into(), Some(data))
    }

    fn render(
        exit_code: u8,
        command: &str,
        status: &str,
        error_class: Option<&str>,
        message: String,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: status.to_string(),
            error_class: error_class.map(str::to_string),
            message,
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(
    config_path: Option<PathBuf>,
    overrides: ConfigOverrides,
) -> Result<AppConfig, ConfigError> {
    AppConfig::load(LoadOptions {
        require_file: config_path.is_some(),
        config_path,
        overrides,
    })
}

/// Validates operator supplied area codes before any request goes out.
pub(crate) fn parse_area_codes(values: &[String]) -> Result<Vec<Candidate>, String> {
    values
        .iter()
        .map(|value| {
            let trimmed = value.trim();
            if Candidate::is_area_code(trimmed) {
                Ok(Candidate::new(trimmed))
            } else {
                Err(format!("`{value}` is not a three digit area code"))
            }
        })
        .collect()
}

pub(crate) fn outcome_data(outcome: &ProvisioningOutcome) -> Value {
    serde_json::to_value(outcome).unwrap_or(Value::Null)
}

pub(crate) fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}

/// Resolves when the operator hits Ctrl-C. If the handler cannot be installed
/// the future never resolves.
pub(crate) async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
