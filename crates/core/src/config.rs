use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::phone_number::Candidate;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub vapi: VapiConfig,
    pub provisioning: ProvisioningConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct VapiConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub timeout_secs: u64,
    pub model_provider: String,
    pub model_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub poll_interval_secs: u64,
    pub deadline_secs: u64,
    pub fallback_area_codes: Vec<String>,
    pub default_area_code: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub vapi_api_key: Option<String>,
    pub vapi_base_url: Option<String>,
    pub log_level: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
    pub default_area_code: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_FALLBACK_AREA_CODES: [&str; 6] = ["415", "510", "628", "650", "669", "925"];

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            deadline_secs: 180,
            fallback_area_codes: DEFAULT_FALLBACK_AREA_CODES
                .iter()
                .map(|code| code.to_string())
                .collect(),
            default_area_code: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vapi: VapiConfig {
                api_key: String::new().into(),
                base_url: "https://api.vapi.ai".to_string(),
                timeout_secs: 30,
                model_provider: "openai".to_string(),
                model_name: "gpt-4o-mini".to_string(),
            },
            provisioning: ProvisioningConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pheona.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(vapi) = patch.vapi {
            if let Some(vapi_api_key_value) = vapi.api_key {
                self.vapi.api_key = secret_value(vapi_api_key_value);
            }
            if let Some(base_url) = vapi.base_url {
                self.vapi.base_url = base_url;
            }
            if let Some(timeout_secs) = vapi.timeout_secs {
                self.vapi.timeout_secs = timeout_secs;
            }
            if let Some(model_provider) = vapi.model_provider {
                self.vapi.model_provider = model_provider;
            }
            if let Some(model_name) = vapi.model_name {
                self.vapi.model_name = model_name;
            }
        }

        if let Some(provisioning) = patch.provisioning {
            if let Some(poll_interval_secs) = provisioning.poll_interval_secs {
                self.provisioning.poll_interval_secs = poll_interval_secs;
            }
            if let Some(deadline_secs) = provisioning.deadline_secs {
                self.provisioning.deadline_secs = deadline_secs;
            }
            if let Some(fallback_area_codes) = provisioning.fallback_area_codes {
                self.provisioning.fallback_area_codes = fallback_area_codes;
            }
            if let Some(default_area_code) = provisioning.default_area_code {
                self.provisioning.default_area_code = Some(default_area_code);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let api_key = read_env("PHEONA_VAPI_API_KEY").or_else(|| read_env("VAPI_API_KEY"));
        if let Some(value) = api_key {
            self.vapi.api_key = secret_value(value);
        }
        let base_url = read_env("PHEONA_VAPI_BASE_URL").or_else(|| read_env("VAPI_BASE_URL"));
        if let Some(value) = base_url {
            self.vapi.base_url = value;
        }
        if let Some(value) = read_env("PHEONA_VAPI_TIMEOUT_SECS") {
            self.vapi.timeout_secs = parse_u64("PHEONA_VAPI_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PHEONA_VAPI_MODEL_PROVIDER") {
            self.vapi.model_provider = value;
        }
        if let Some(value) = read_env("PHEONA_VAPI_MODEL_NAME") {
            self.vapi.model_name = value;
        }

        if let Some(value) = read_env("PHEONA_PROVISIONING_POLL_INTERVAL_SECS") {
            self.provisioning.poll_interval_secs =
                parse_u64("PHEONA_PROVISIONING_POLL_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("PHEONA_PROVISIONING_DEADLINE_SECS") {
            self.provisioning.deadline_secs =
                parse_u64("PHEONA_PROVISIONING_DEADLINE_SECS", &value)?;
        }
        if let Some(value) = read_env("PHEONA_PROVISIONING_FALLBACK_AREA_CODES") {
            self.provisioning.fallback_area_codes = parse_list(&value);
        }
        let default_area_code = read_env("PHEONA_PROVISIONING_DEFAULT_AREA_CODE")
            .or_else(|| read_env("VAPI_DEFAULT_AREACODE"));
        if let Some(value) = default_area_code {
            self.provisioning.default_area_code = Some(value.trim().to_string());
        }

        let log_level = read_env("PHEONA_LOGGING_LEVEL").or_else(|| read_env("PHEONA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PHEONA_LOGGING_FORMAT").or_else(|| read_env("PHEONA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(vapi_api_key) = overrides.vapi_api_key {
            self.vapi.api_key = secret_value(vapi_api_key);
        }
        if let Some(vapi_base_url) = overrides.vapi_base_url {
            self.vapi.base_url = vapi_base_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(poll_interval_secs) = overrides.poll_interval_secs {
            self.provisioning.poll_interval_secs = poll_interval_secs;
        }
        if let Some(deadline_secs) = overrides.deadline_secs {
            self.provisioning.deadline_secs = deadline_secs;
        }
        if let Some(default_area_code) = overrides.default_area_code {
            self.provisioning.default_area_code = Some(default_area_code);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_vapi(&self.vapi)?;
        validate_provisioning(&self.provisioning)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Config file lookup order: explicit path, `PHEONA_CONFIG`, then the
/// working-directory defaults.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }
    if let Some(path) = read_env("PHEONA_CONFIG") {
        let path = PathBuf::from(path);
        return path.exists().then_some(path);
    }

    [PathBuf::from("pheona.toml"), PathBuf::from("config/pheona.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_vapi(vapi: &VapiConfig) -> Result<(), ConfigError> {
    if vapi.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "vapi.api_key is required. Get it from https://dashboard.vapi.ai > Organization > API Keys (private key)".to_string(),
        ));
    }

    let base_url = vapi.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "vapi.base_url must start with http:// or https://".to_string(),
        ));
    }

    if vapi.timeout_secs == 0 || vapi.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "vapi.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if vapi.model_provider.trim().is_empty() || vapi.model_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "vapi.model_provider and vapi.model_name must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_provisioning(provisioning: &ProvisioningConfig) -> Result<(), ConfigError> {
    if provisioning.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "provisioning.poll_interval_secs must be greater than zero".to_string(),
        ));
    }

    if provisioning.deadline_secs == 0 || provisioning.deadline_secs > 3600 {
        return Err(ConfigError::Validation(
            "provisioning.deadline_secs must be in range 1..=3600".to_string(),
        ));
    }

    if provisioning.fallback_area_codes.is_empty() {
        return Err(ConfigError::Validation(
            "provisioning.fallback_area_codes must list at least one area code".to_string(),
        ));
    }

    let invalid = provisioning
        .fallback_area_codes
        .iter()
        .chain(provisioning.default_area_code.iter())
        .find(|code| !Candidate::is_area_code(code));
    if let Some(code) = invalid {
        return Err(ConfigError::Validation(format!(
            "provisioning area code `{code}` must be exactly three digits"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    vapi: Option<VapiPatch>,
    provisioning: Option<ProvisioningPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct VapiPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    model_provider: Option<String>,
    model_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProvisioningPatch {
    poll_interval_secs: Option<u64>,
    deadline_secs: Option<u64>,
    fallback_area_codes: Option<Vec<String>>,
    default_area_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PHEONA_VAPI_KEY", "vapi-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pheona.toml");
            fs::write(
                &path,
                r#"
[vapi]
api_key = "${TEST_PHEONA_VAPI_KEY}"

[provisioning]
fallback_area_codes = ["212", "646"]
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.vapi.api_key.expose_secret() == "vapi-from-env",
                "api key should be interpolated from environment",
            )?;
            ensure(
                config.provisioning.fallback_area_codes == vec!["212", "646"],
                "fallback area codes should come from the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_PHEONA_VAPI_KEY"]);
        result
    }

    #[test]
    fn unset_interpolation_variable_fails() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("pheona.toml");
        fs::write(&path, "[vapi]\napi_key = \"${PHEONA_TEST_UNSET_VARIABLE}\"\n")
            .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected interpolation failure".to_string()),
                Err(error) => error,
            };
        ensure(
            matches!(error, ConfigError::MissingEnvInterpolation { ref var } if var == "PHEONA_TEST_UNSET_VARIABLE"),
            "error should name the missing variable",
        )
    }

    #[test]
    fn env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("VAPI_API_KEY", "vapi-alias");
        env::set_var("VAPI_DEFAULT_AREACODE", "415");
        env::set_var("PHEONA_LOG_LEVEL", "warn");
        env::set_var("PHEONA_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.vapi.api_key.expose_secret() == "vapi-alias", "alias key should load")?;
            ensure(
                config.provisioning.default_area_code.as_deref() == Some("415"),
                "default area code alias should load",
            )?;
            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["VAPI_API_KEY", "VAPI_DEFAULT_AREACODE", "PHEONA_LOG_LEVEL", "PHEONA_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PHEONA_VAPI_API_KEY", "vapi-from-env");
        env::set_var("PHEONA_PROVISIONING_POLL_INTERVAL_SECS", "7");
        env::set_var("PHEONA_PROVISIONING_FALLBACK_AREA_CODES", "305, 786");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pheona.toml");
            fs::write(
                &path,
                r#"
[vapi]
api_key = "vapi-from-file"
base_url = "http://localhost:9999"

[provisioning]
poll_interval_secs = 3
deadline_secs = 90

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    deadline_secs: Some(45),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.provisioning.deadline_secs == 45, "override deadline should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.provisioning.poll_interval_secs == 7, "env poll interval should win")?;
            ensure(
                config.provisioning.fallback_area_codes == vec!["305", "786"],
                "env fallback list should be split on commas",
            )?;
            ensure(
                config.vapi.api_key.expose_secret() == "vapi-from-env",
                "env api key should win over file and defaults",
            )?;
            ensure(config.vapi.base_url == "http://localhost:9999", "file base url should apply")?;
            Ok(())
        })();

        clear_vars(&[
            "PHEONA_VAPI_API_KEY",
            "PHEONA_PROVISIONING_POLL_INTERVAL_SECS",
            "PHEONA_PROVISIONING_FALLBACK_AREA_CODES",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => {
                return Err("expected validation failure but config load succeeded".to_string())
            }
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("vapi.api_key")),
            "validation failure should mention vapi.api_key",
        )
    }

    #[test]
    fn malformed_area_code_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                vapi_api_key: Some("vapi-test".to_string()),
                default_area_code: Some("41".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected area code validation failure".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("`41`")),
            "validation failure should name the bad area code",
        )
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PHEONA_VAPI_API_KEY", "vapi-test");
        env::set_var("PHEONA_PROVISIONING_DEADLINE_SECS", "soon");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected env override failure".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "PHEONA_PROVISIONING_DEADLINE_SECS"),
                "error should name the bad env var",
            ),
        };

        clear_vars(&["PHEONA_VAPI_API_KEY", "PHEONA_PROVISIONING_DEADLINE_SECS"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PHEONA_VAPI_API_KEY", "vapi-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("vapi-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            ensure(config.provisioning.poll_interval_secs == 10, "default poll interval is 10s")?;
            ensure(config.provisioning.deadline_secs == 180, "default deadline is 180s")?;
            Ok(())
        })();

        clear_vars(&["PHEONA_VAPI_API_KEY"]);
        result
    }
}
