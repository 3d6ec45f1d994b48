// Configuration loading and parsing (mockup.toml, credentials.toml, environment).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::llm::prompt::VARIANT_COUNT;
use crate::protocol::ModelType;

/// Environment variables checked, in order, for the Gemini API key.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub generation: GenerationConfig,
    pub output: OutputConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// mockup.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire mockup.toml file.
#[derive(Debug, Clone, Deserialize)]
struct MockupFile {
    gemini: GeminiConfig,
    generation: GenerationConfig,
    output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub model: String,
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Minimum number of variants that must yield an image for the run to
    /// succeed.
    pub required_successes: usize,
    #[serde(default)]
    pub default_model: ModelType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub dir: String,
    #[serde(default = "default_timestamped_runs")]
    pub timestamped_runs: bool,
}

fn default_timestamped_runs() -> bool {
    true
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub gemini_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/mockup.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Environment overrides are not applied here; see [`apply_env_overrides`].
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- mockup.toml (required) ---
    let mockup_path = config_dir.join("mockup.toml");
    let mockup_text = read_file(&mockup_path)?;
    let mockup_file: MockupFile =
        toml::from_str(&mockup_text).map_err(|e| ConfigError::ParseError {
            path: mockup_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        gemini: mockup_file.gemini,
        generation: mockup_file.generation,
        output: mockup_file.output,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Replace the configured API key with the first non-empty value found in
/// [`API_KEY_ENV_VARS`], using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let from_env = API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|v| !v.trim().is_empty());
    if let Some(key) = from_env {
        config.credentials.gemini_api_key = Some(key.trim().to_string());
    }
}

/// Config files shipped under `defaults/` and copied into `config/` on first
/// run. `credentials.toml` is never copied; users create it from the
/// `.example` template themselves.
pub const SHIPPED_CONFIG_FILES: [&str; 1] = ["mockup.toml"];

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Copy each of [`SHIPPED_CONFIG_FILES`] from `defaults/` into `config/`
/// unless a user copy already exists. Returns the paths that were created.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(vec![]);
        }
        return Err(copy_error(format!(
            "neither defaults/ nor config/ directory found in {}; \
             run from the project root or ensure defaults/ is present",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("failed to create config directory: {e}")))?;

    let mut copied = Vec::new();
    for name in SHIPPED_CONFIG_FILES {
        let source = defaults_dir.join(name);
        let target = config_dir.join(name);
        if !source.is_file() {
            tracing::warn!("defaults/{} is missing; not copying it", name);
            continue;
        }

        // Claim the target first so an existing user file is never replaced.
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(copy_error(format!(
                    "failed to create {}: {e}",
                    target.display()
                )))
            }
        }

        std::fs::copy(&source, &target).map_err(|e| {
            copy_error(format!(
                "failed to copy {} to {}: {e}",
                source.display(),
                target.display()
            ))
        })?;
        tracing::info!("Copied default config to {}", target.display());
        copied.push(target);
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working
/// directory, copying defaults first and applying environment overrides.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    let mut config = load_config_from(&cwd)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let gemini = &config.gemini;
    if gemini.model.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "gemini.model".into(),
            message: "must not be empty".into(),
        });
    }

    if !(gemini.endpoint.starts_with("https://") || gemini.endpoint.starts_with("http://")) {
        return Err(ConfigError::ValidationError {
            field: "gemini.endpoint".into(),
            message: format!("must be an http(s) URL, got `{}`", gemini.endpoint),
        });
    }

    if gemini.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "gemini.request_timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    let required = config.generation.required_successes;
    if !(1..=VARIANT_COUNT).contains(&required) {
        return Err(ConfigError::ValidationError {
            field: "generation.required_successes".into(),
            message: format!("must be between 1 and {VARIANT_COUNT} inclusive, got {required}"),
        });
    }

    if config.output.dir.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "output.dir".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
