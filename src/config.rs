use crate::error::ChatError;
use crate::models::ChatConfig;
use keyring::Entry;

// --- API Key Retrieval ---

const KEYRING_SERVICE: &str = "routerchat_api_key";
const KEYRING_USER: &str = "openrouter";
pub const KEYRING_REF: &str = "keyring";
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Checks the configuration is complete enough to send a request and
/// returns the resolved API key.
pub fn checked_api_key(config: &ChatConfig) -> Result<String, ChatError> {
    ensure_endpoint(config)?;
    resolve_api_key(config)
}

/// Model and base URL presence, without touching the key.
pub fn ensure_endpoint(config: &ChatConfig) -> Result<(), ChatError> {
    if config.model.trim().is_empty() {
        return Err(ChatError::MissingConfig("model"));
    }
    if config.base_url.trim().is_empty() {
        return Err(ChatError::MissingConfig("base URL"));
    }
    Ok(())
}

/// Resolves the configured API key.
/// `env:NAME` reads an environment variable, `keyring` reads the OS keyring,
/// anything else is the key itself. A blank key falls back to `OPENROUTER_API_KEY`.
pub fn resolve_api_key(config: &ChatConfig) -> Result<String, ChatError> {
    resolve_with_fallback(config, std::env::var(API_KEY_ENV).ok())
}

fn resolve_with_fallback(config: &ChatConfig, fallback: Option<String>) -> Result<String, ChatError> {
    let key_ref = config.api_key.trim();
    match key_ref {
        "" => fallback
            .filter(|key| !key.trim().is_empty())
            .ok_or(ChatError::MissingConfig("API key")),
        KEYRING_REF => {
            let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)
                .map_err(|e| ChatError::Credential(format!("Failed to open keyring entry: {}", e)))?;
            log::debug!("Retrieving API key from keyring for service: {}", KEYRING_SERVICE);
            entry.get_password().map_err(|e| {
                ChatError::Credential(format!("Failed to get API key from keyring: {}", e))
            })
        }
        other if other.starts_with("env:") => {
            let env_var_name = other.trim_start_matches("env:");
            log::debug!("Retrieving API key from environment variable: {}", env_var_name);
            std::env::var(env_var_name).map_err(|_| {
                ChatError::Credential(format!("Environment variable '{}' is not set", env_var_name))
            })
        }
        literal => Ok(literal.to_string()),
    }
}

/// Stores an API key in the OS keyring and points the config at it.
pub fn store_api_key_in_keyring(config: &mut ChatConfig, api_key: &str) -> Result<(), ChatError> {
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)
        .map_err(|e| ChatError::Credential(format!("Failed to open keyring entry: {}", e)))?;
    log::info!("Setting API key in keyring for service: {}", KEYRING_SERVICE);
    entry
        .set_password(api_key.trim())
        .map_err(|e| ChatError::Credential(format!("Failed to set API key in keyring: {}", e)))?;
    config.api_key = KEYRING_REF.to_string();
    Ok(())
}

/// Masks a key for display, keeping references readable.
pub fn display_api_key(config: &ChatConfig) -> String {
    let key = config.api_key.trim();
    if key.is_empty() {
        return format!("(not set, falls back to ${})", API_KEY_ENV);
    }
    if key == KEYRING_REF || key.starts_with("env:") {
        return key.to_string();
    }
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{}", tail)
}
