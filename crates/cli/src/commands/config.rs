use std::env;
use std::fs;
use std::path::Path;

use pheona_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

struct Field {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let options = LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let config_file_path = resolve_config_path(config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let provisioning = &config.provisioning;

    let fields = [
        Field {
            key_path: "vapi.api_key",
            value: redact_secret(config.vapi.api_key.expose_secret()),
            env_keys: &["PHEONA_VAPI_API_KEY", "VAPI_API_KEY"],
        },
        Field {
            key_path: "vapi.base_url",
            value: config.vapi.base_url.clone(),
            env_keys: &["PHEONA_VAPI_BASE_URL", "VAPI_BASE_URL"],
        },
        Field {
            key_path: "vapi.timeout_secs",
            value: config.vapi.timeout_secs.to_string(),
            env_keys: &["PHEONA_VAPI_TIMEOUT_SECS"],
        },
        Field {
            key_path: "vapi.model_provider",
            value: config.vapi.model_provider.clone(),
            env_keys: &["PHEONA_VAPI_MODEL_PROVIDER"],
        },
        Field {
            key_path: "vapi.model_name",
            value: config.vapi.model_name.clone(),
            env_keys: &["PHEONA_VAPI_MODEL_NAME"],
        },
        Field {
            key_path: "provisioning.poll_interval_secs",
            value: provisioning.poll_interval_secs.to_string(),
            env_keys: &["PHEONA_PROVISIONING_POLL_INTERVAL_SECS"],
        },
        Field {
            key_path: "provisioning.deadline_secs",
            value: provisioning.deadline_secs.to_string(),
            env_keys: &["PHEONA_PROVISIONING_DEADLINE_SECS"],
        },
        Field {
            key_path: "provisioning.fallback_area_codes",
            value: provisioning.fallback_area_codes.join(","),
            env_keys: &["PHEONA_PROVISIONING_FALLBACK_AREA_CODES"],
        },
        Field {
            key_path: "provisioning.default_area_code",
            value: provisioning.default_area_code.as_deref().unwrap_or("<unset>").to_string(),
            env_keys: &["PHEONA_PROVISIONING_DEFAULT_AREA_CODE", "VAPI_DEFAULT_AREACODE"],
        },
        Field {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["PHEONA_LOGGING_LEVEL", "PHEONA_LOG_LEVEL"],
        },
        Field {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format).to_lowercase(),
            env_keys: &["PHEONA_LOGGING_FORMAT", "PHEONA_LOG_FORMAT"],
        },
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the last four characters so operators can tell keys apart.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn redaction_keeps_only_a_short_tail() {
        assert_eq!(redact_secret("  "), "<empty>");
        assert_eq!(redact_secret("short"), "<redacted>");
        assert_eq!(redact_secret("4f1c2d3e-aaaa-bbbb-cccc-1234abcd9876"), "***9876");
    }

    #[test]
    fn nested_key_lookup_follows_dotted_path() {
        let doc: Value = "[provisioning]\ndeadline_secs = 60\n".parse().expect("valid toml");
        assert!(contains_path(&doc, "provisioning.deadline_secs"));
        assert!(!contains_path(&doc, "provisioning.poll_interval_secs"));
        assert!(!contains_path(&doc, "vapi.api_key"));
    }
}
