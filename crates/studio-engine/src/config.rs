use std::env;
use std::fmt;

use studio_contracts::prompts::UpscalePolicy;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "imagen-4.0-generate-001";
pub const DEFAULT_EDIT_MODEL: &str = "gemini-2.5-flash-image-preview";

const API_KEY_VARS: [&str; 3] = ["API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("API_KEY environment variable not set")]
    MissingApiKey,
    #[error("invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub struct StudioConfig {
    pub api_key: String,
    pub api_base: String,
    pub text_model: String,
    pub edit_model: String,
    pub upscale_policy: UpscalePolicy,
}

impl fmt::Debug for StudioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudioConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("text_model", &self.text_model)
            .field("edit_model", &self.edit_model)
            .field("upscale_policy", &self.upscale_policy)
            .finish()
    }
}

impl StudioConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(non_empty_env)
    }

    /// Resolves the configuration from any key lookup. Values are expected
    /// to be trimmed and non-empty already.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = API_KEY_VARS
            .iter()
            .find_map(|key| lookup(key))
            .ok_or(ConfigError::MissingApiKey)?;
        let api_base = lookup("STUDIO_API_BASE")
            .or_else(|| lookup("GEMINI_API_BASE"))
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let upscale_policy = match lookup("STUDIO_UPSCALE_POLICY") {
            Some(raw) => raw
                .parse::<UpscalePolicy>()
                .map_err(|reason| ConfigError::Invalid {
                    key: "STUDIO_UPSCALE_POLICY",
                    value: raw.clone(),
                    reason,
                })?,
            None => UpscalePolicy::default(),
        };

        Ok(Self {
            api_key,
            api_base,
            text_model: lookup("STUDIO_TEXT_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            edit_model: lookup("STUDIO_EDIT_MODEL")
                .unwrap_or_else(|| DEFAULT_EDIT_MODEL.to_string()),
            upscale_policy,
        })
    }

    pub fn with_upscale_policy(mut self, policy: UpscalePolicy) -> Self {
        self.upscale_policy = policy;
        self
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use studio_contracts::prompts::UpscalePolicy;

    use super::{
        ConfigError, StudioConfig, DEFAULT_API_BASE, DEFAULT_EDIT_MODEL, DEFAULT_TEXT_MODEL,
    };

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: BTreeMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| values.get(key).cloned()
    }

    #[test]
    fn missing_credential_is_fatal() {
        let err = StudioConfig::from_lookup(lookup_from(&[("STUDIO_TEXT_MODEL", "x")]));
        assert_eq!(err, Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() -> anyhow::Result<()> {
        let config = StudioConfig::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "g-key")]))?;
        assert_eq!(config.api_key, "g-key");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(config.edit_model, DEFAULT_EDIT_MODEL);
        assert_eq!(config.upscale_policy, UpscalePolicy::Preserve);
        Ok(())
    }

    #[test]
    fn api_key_takes_precedence_and_overrides_apply() -> anyhow::Result<()> {
        let config = StudioConfig::from_lookup(lookup_from(&[
            ("API_KEY", "primary"),
            ("GEMINI_API_KEY", "secondary"),
            ("GEMINI_API_BASE", "http://localhost:9000/v1beta/"),
            ("STUDIO_EDIT_MODEL", "gemini-2.5-flash-image"),
            ("STUDIO_UPSCALE_POLICY", "enhance"),
        ]))?;
        assert_eq!(config.api_key, "primary");
        assert_eq!(config.api_base, "http://localhost:9000/v1beta");
        assert_eq!(config.edit_model, "gemini-2.5-flash-image");
        assert_eq!(config.upscale_policy, UpscalePolicy::Enhance);
        assert!(!format!("{config:?}").contains("primary"));
        Ok(())
    }

    #[test]
    fn invalid_upscale_policy_is_reported() {
        let err = StudioConfig::from_lookup(lookup_from(&[
            ("API_KEY", "k"),
            ("STUDIO_UPSCALE_POLICY", "sharpen"),
        ]));
        assert!(matches!(
            err,
            Err(ConfigError::Invalid {
                key: "STUDIO_UPSCALE_POLICY",
                ..
            })
        ));
    }
}
