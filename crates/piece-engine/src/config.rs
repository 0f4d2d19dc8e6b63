use std::env;
use std::fmt;
use std::time::Duration;

use anyhow::{bail, Result};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

#[derive(Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    /// `None` leaves the request unbounded.
    pub request_timeout: Option<Duration>,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let Some(api_key) = API_KEY_VARS.iter().find_map(|key| non_empty(*key)) else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY or API_KEY not set");
        };

        let mut config = Self::new(api_key);
        if let Some(base) = non_empty("GEMINI_API_BASE") {
            config = config.with_api_base(&base);
        }
        if let Some(model) = non_empty("PIECE_FINDER_MODEL") {
            config = config.with_model(&model);
        }
        if let Some(raw) = non_empty("PIECE_FINDER_REQUEST_TIMEOUT_S") {
            let Ok(seconds) = raw.parse::<f64>() else {
                bail!("PIECE_FINDER_REQUEST_TIMEOUT_S must be a number of seconds, got {raw:?}");
            };
            if seconds > 0.0 && seconds.is_finite() {
                config.request_timeout = Some(Duration::from_secs_f64(seconds));
            }
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        let trimmed = api_base.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            self.api_base = trimmed.to_string();
        }
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        let trimmed = model.trim();
        if !trimmed.is_empty() {
            self.model = trimmed.to_string();
        }
        self
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{GeminiConfig, DEFAULT_GEMINI_API_BASE, DEFAULT_MODEL};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() -> anyhow::Result<()> {
        let config = GeminiConfig::from_lookup(lookup(&[("API_KEY", "k-1")]))?;
        assert_eq!(config.api_key, "k-1");
        assert_eq!(config.api_base, DEFAULT_GEMINI_API_BASE);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.request_timeout, None);
        Ok(())
    }

    #[test]
    fn gemini_key_wins_over_fallbacks() -> anyhow::Result<()> {
        let config = GeminiConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "  "),
            ("GOOGLE_API_KEY", "google"),
            ("API_KEY", "generic"),
        ]))?;
        assert_eq!(config.api_key, "google");
        Ok(())
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = GeminiConfig::from_lookup(lookup(&[]))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(err, "GEMINI_API_KEY or GOOGLE_API_KEY or API_KEY not set");
    }

    #[test]
    fn overrides_are_normalized() -> anyhow::Result<()> {
        let config = GeminiConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_API_BASE", "http://127.0.0.1:8080/v1beta/"),
            ("PIECE_FINDER_MODEL", " gemini-2.5-pro "),
            ("PIECE_FINDER_REQUEST_TIMEOUT_S", "12.5"),
        ]))?;
        assert_eq!(config.api_base, "http://127.0.0.1:8080/v1beta");
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.request_timeout, Some(Duration::from_millis(12_500)));

        assert!(GeminiConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("PIECE_FINDER_REQUEST_TIMEOUT_S", "soon"),
        ]))
        .is_err());
        Ok(())
    }

    #[test]
    fn debug_redacts_api_key() {
        let debug = format!("{:?}", GeminiConfig::new("secret-key"));
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }
}
