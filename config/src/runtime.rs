//! Typed runtime configuration layered on top of the merged environment.
//!
//! [`PlannerConfig::load`] calls [`crate::load_and_apply`] first (so `.env`/XDG values land
//! in the process environment), then reads the well-known keys the core needs: LLM
//! connection settings, the optional external collaborators (vector service, research
//! fetcher, prefab gateway), and the multilingual prompt selection. Every key is
//! overridable via environment variable with a fixed prefix (default `PLANNER_`).

use std::path::Path;
use std::time::Duration;

use crate::LoadError;

/// LLM connection and call-shape settings (spec §6 "Configuration keys").
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            timeout: Duration::from_secs(120),
            max_retries: 3,
        }
    }
}

/// Multilingual prompt-store selection: a default language plus the set the caller
/// is allowed to request (spec §6).
#[derive(Clone, Debug)]
pub struct MultilingualConfig {
    pub default_language: String,
    pub supported_languages: Vec<String>,
}

impl Default for MultilingualConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            supported_languages: vec!["en".to_string(), "zh".to_string()],
        }
    }
}

/// Full runtime configuration for the planning agent core and its optional
/// external collaborators.
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    pub llm: LlmConfig,
    pub multilingual: MultilingualConfig,
    pub vector_service_base_url: Option<String>,
    pub vector_service_timeout: Duration,
    pub prefab_gateway_base_url: Option<String>,
    pub prefab_gateway_timeout: Duration,
    pub jina_api_key: Option<String>,
    pub agent_builder_api_key: Option<String>,
}

fn env_var(prefix: &str, key: &str) -> Option<String> {
    std::env::var(format!("{prefix}{key}")).ok()
}

fn env_f32(prefix: &str, key: &str, default: f32) -> f32 {
    env_var(prefix, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(prefix: &str, key: &str, default: u32) -> u32 {
    env_var(prefix, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(prefix: &str, key: &str, default: u64) -> Duration {
    let secs = env_var(prefix, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

impl PlannerConfig {
    /// Loads `.env`/XDG config into the process environment (via
    /// [`crate::load_and_apply`]) then reads the typed configuration from env vars
    /// prefixed with `prefix` (e.g. `"PLANNER_"` yields `PLANNER_LLM_API_KEY`).
    ///
    /// `app_name` selects the XDG config directory (`~/.config/<app_name>/config.toml`);
    /// `override_dir` overrides where `.env` is read from (tests pass a tempdir).
    pub fn load(
        app_name: &str,
        prefix: &str,
        override_dir: Option<&Path>,
    ) -> Result<Self, LoadError> {
        crate::load_and_apply(app_name, override_dir)?;
        Ok(Self::from_env(prefix))
    }

    /// Reads configuration directly from the current process environment, without
    /// touching `.env`/XDG. Useful in tests that set env vars directly.
    pub fn from_env(prefix: &str) -> Self {
        let llm = LlmConfig {
            api_key: env_var(prefix, "LLM_API_KEY").unwrap_or_default(),
            base_url: env_var(prefix, "LLM_BASE_URL"),
            model: env_var(prefix, "LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            temperature: env_f32(prefix, "LLM_TEMPERATURE", 0.7),
            timeout: env_secs(prefix, "LLM_TIMEOUT_SECS", 120),
            max_retries: env_u32(prefix, "LLM_MAX_RETRIES", 3),
        };
        let multilingual = MultilingualConfig {
            default_language: env_var(prefix, "DEFAULT_LANGUAGE").unwrap_or_else(|| "en".to_string()),
            supported_languages: env_var(prefix, "SUPPORTED_LANGUAGES")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| vec!["en".to_string(), "zh".to_string()]),
        };
        Self {
            llm,
            multilingual,
            vector_service_base_url: env_var(prefix, "VECTOR_SERVICE_BASE_URL"),
            vector_service_timeout: env_secs(prefix, "VECTOR_SERVICE_TIMEOUT_SECS", 30),
            prefab_gateway_base_url: env_var(prefix, "PREFAB_GATEWAY_BASE_URL"),
            // spec §5 "Timeouts": prefab gateway functions may run up to 20 minutes.
            prefab_gateway_timeout: env_secs(prefix, "PREFAB_GATEWAY_TIMEOUT_SECS", 20 * 60),
            jina_api_key: env_var(prefix, "JINA_API_KEY"),
            agent_builder_api_key: env_var(prefix, "AGENT_BUILDER_API_KEY"),
        }
    }

    /// Whether `research` can run (requires a research API key).
    pub fn research_enabled(&self) -> bool {
        self.jina_api_key.is_some()
    }

    /// Whether `prefab_recommend` can run (requires a reachable vector service).
    pub fn prefab_recommend_enabled(&self) -> bool {
        self.vector_service_base_url.is_some()
    }

    /// Whether `call_prefab_function` can run (requires the prefab gateway and key).
    pub fn call_prefab_function_enabled(&self) -> bool {
        self.prefab_gateway_base_url.is_some() && self.agent_builder_api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear(prefix: &str) {
        for key in [
            "LLM_API_KEY",
            "LLM_BASE_URL",
            "LLM_MODEL",
            "LLM_TEMPERATURE",
            "LLM_TIMEOUT_SECS",
            "LLM_MAX_RETRIES",
            "DEFAULT_LANGUAGE",
            "SUPPORTED_LANGUAGES",
            "VECTOR_SERVICE_BASE_URL",
            "JINA_API_KEY",
            "AGENT_BUILDER_API_KEY",
            "PREFAB_GATEWAY_BASE_URL",
        ] {
            env::remove_var(format!("{prefix}{key}"));
        }
    }

    #[test]
    fn defaults_when_unset() {
        clear("TEST1_");
        let cfg = PlannerConfig::from_env("TEST1_");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.max_retries, 3);
        assert!(!cfg.research_enabled());
        assert!(!cfg.prefab_recommend_enabled());
    }

    #[test]
    fn reads_overridden_values() {
        clear("TEST2_");
        env::set_var("TEST2_LLM_API_KEY", "sk-test");
        env::set_var("TEST2_LLM_MODEL", "gpt-4.1");
        env::set_var("TEST2_LLM_TEMPERATURE", "0.2");
        env::set_var("TEST2_JINA_API_KEY", "jina-key");
        env::set_var("TEST2_SUPPORTED_LANGUAGES", "en, zh, ja");

        let cfg = PlannerConfig::from_env("TEST2_");
        assert_eq!(cfg.llm.api_key, "sk-test");
        assert_eq!(cfg.llm.model, "gpt-4.1");
        assert!((cfg.llm.temperature - 0.2).abs() < f32::EPSILON);
        assert!(cfg.research_enabled());
        assert_eq!(
            cfg.multilingual.supported_languages,
            vec!["en", "zh", "ja"]
        );

        clear("TEST2_");
    }

    #[test]
    fn call_prefab_function_needs_both_keys() {
        clear("TEST3_");
        env::set_var("TEST3_PREFAB_GATEWAY_BASE_URL", "https://gw.example");
        let cfg = PlannerConfig::from_env("TEST3_");
        assert!(!cfg.call_prefab_function_enabled());

        env::set_var("TEST3_AGENT_BUILDER_API_KEY", "key");
        let cfg = PlannerConfig::from_env("TEST3_");
        assert!(cfg.call_prefab_function_enabled());

        clear("TEST3_");
    }
}
