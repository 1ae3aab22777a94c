//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chat_api::{ChatApiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const DEFAULT_FAST_MODEL: &str = "gemini-2.5-flash";
const STATE_DIR_NAME: &str = ".skill_agent";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SKILL_AGENT_API_KEY (or GEMINI_API_KEY) must be set")]
    MissingApiKey,
    #[error("SKILL_AGENT_TIMEOUT_SEC must be a positive integer, got '{0}'")]
    InvalidTimeout(String),
    #[error("cannot determine a home directory; set SKILL_AGENT_HOME")]
    NoHomeDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub fast_model: String,
    /// Holds `agent.log` and the `outputs/` sidecar directory.
    pub state_dir: PathBuf,
    pub core_skills: PathBuf,
    pub timeout: Option<Duration>,
    pub color: bool,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_string_opt("SKILL_AGENT_API_KEY")
            .or_else(|| env_string_opt("GEMINI_API_KEY"))
            .ok_or(ConfigError::MissingApiKey)?;

        let state_dir = match env_string_opt("SKILL_AGENT_HOME") {
            Some(home) => PathBuf::from(home),
            None => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join(STATE_DIR_NAME),
        };
        let core_skills = env_string_opt("SKILL_AGENT_CORE_SKILLS")
            .map(PathBuf::from)
            .unwrap_or_else(|| state_dir.join("core_skills"));

        let timeout = match env_string_opt("SKILL_AGENT_TIMEOUT_SEC") {
            Some(raw) => Some(parse_timeout(&raw)?),
            None => None,
        };

        Ok(Self {
            api_key,
            base_url: env_string_opt("SKILL_AGENT_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: env_string_opt("SKILL_AGENT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            fast_model: env_string_opt("SKILL_AGENT_FAST_MODEL")
                .unwrap_or_else(|| DEFAULT_FAST_MODEL.to_string()),
            state_dir,
            core_skills,
            timeout,
            color: !env_flag("SKILL_AGENT_NO_COLOR"),
        })
    }

    #[must_use]
    pub fn outputs_dir(&self) -> PathBuf {
        self.state_dir.join("outputs")
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("agent.log")
    }

    #[must_use]
    pub fn chat_api(&self) -> ChatApiConfig {
        let mut config = ChatApiConfig::new(self.api_key.clone())
            .with_base_url(self.base_url.clone())
            .with_model(self.model.clone());
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        config
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{AgentConfig, ConfigError, DEFAULT_FAST_MODEL};
    use chat_api::DEFAULT_MODEL;
    use std::env;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    const KEYS: [&str; 9] = [
        "SKILL_AGENT_API_KEY",
        "GEMINI_API_KEY",
        "SKILL_AGENT_BASE_URL",
        "SKILL_AGENT_MODEL",
        "SKILL_AGENT_FAST_MODEL",
        "SKILL_AGENT_HOME",
        "SKILL_AGENT_CORE_SKILLS",
        "SKILL_AGENT_TIMEOUT_SEC",
        "SKILL_AGENT_NO_COLOR",
    ];

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    fn clear_all() -> Vec<EnvGuard> {
        KEYS.iter().map(|key| set_env_guard(key, None)).collect()
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let _lock = env_lock();
        let _cleared = clear_all();

        assert_eq!(AgentConfig::from_env(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let _lock = env_lock();
        let _cleared = clear_all();
        let _key = set_env_guard("GEMINI_API_KEY", Some("k"));
        let _home = set_env_guard("SKILL_AGENT_HOME", Some("/tmp/agent-home"));

        let config = AgentConfig::from_env().expect("config");
        assert_eq!(config.api_key, "k");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.fast_model, DEFAULT_FAST_MODEL);
        assert_eq!(config.core_skills, PathBuf::from("/tmp/agent-home/core_skills"));
        assert_eq!(config.outputs_dir(), PathBuf::from("/tmp/agent-home/outputs"));
        assert_eq!(config.timeout, None);
        assert!(config.color);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let _lock = env_lock();
        let _cleared = clear_all();
        let _g1 = set_env_guard("SKILL_AGENT_API_KEY", Some("primary"));
        let _g2 = set_env_guard("GEMINI_API_KEY", Some("fallback"));
        let _g3 = set_env_guard("SKILL_AGENT_HOME", Some("/tmp/agent-home"));
        let _g4 = set_env_guard("SKILL_AGENT_CORE_SKILLS", Some("/opt/core"));
        let _g5 = set_env_guard("SKILL_AGENT_TIMEOUT_SEC", Some("90"));
        let _g6 = set_env_guard("SKILL_AGENT_NO_COLOR", Some("1"));
        let _g7 = set_env_guard("SKILL_AGENT_MODEL", Some("big"));

        let config = AgentConfig::from_env().expect("config");
        assert_eq!(config.api_key, "primary");
        assert_eq!(config.model, "big");
        assert_eq!(config.core_skills, PathBuf::from("/opt/core"));
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
        assert!(!config.color);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let _lock = env_lock();
        let _cleared = clear_all();
        let _key = set_env_guard("SKILL_AGENT_API_KEY", Some("k"));
        let _home = set_env_guard("SKILL_AGENT_HOME", Some("/tmp/agent-home"));
        let _timeout = set_env_guard("SKILL_AGENT_TIMEOUT_SEC", Some("0"));

        assert_eq!(
            AgentConfig::from_env(),
            Err(ConfigError::InvalidTimeout("0".to_string()))
        );
    }

    #[test]
    fn blank_values_are_ignored() {
        let _lock = env_lock();
        let _cleared = clear_all();
        let _key = set_env_guard("SKILL_AGENT_API_KEY", Some("k"));
        let _home = set_env_guard("SKILL_AGENT_HOME", Some("/tmp/agent-home"));
        let _model = set_env_guard("SKILL_AGENT_MODEL", Some("   "));

        assert_eq!(AgentConfig::from_env().expect("config").model, DEFAULT_MODEL);
    }
}
