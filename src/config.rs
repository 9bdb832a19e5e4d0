//! Process-wide configuration, read once from the environment at startup

use crate::llm::LlmConfig;
use crate::state_machine::LoopContext;
use crate::tools::{CancelPolicy, DispatchOptions};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;

/// Limits applied to every session
#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    pub max_iterations: u32,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub tool_timeout: Duration,
    pub cancel_policy: CancelPolicy,
    pub max_tokens: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        let context = LoopContext::new("", "");
        let dispatch = DispatchOptions::default();
        Self {
            max_iterations: context.max_iterations,
            max_retries: context.max_retries,
            retry_base_delay: context.retry_base_delay,
            tool_timeout: dispatch.timeout,
            cancel_policy: dispatch.cancel_policy,
            max_tokens: None,
        }
    }
}

impl LoopConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: parse_var(&lookup, "TOOLRELAY_MAX_ITERATIONS")
                .unwrap_or(defaults.max_iterations),
            max_retries: parse_var(&lookup, "TOOLRELAY_MAX_RETRIES")
                .unwrap_or(defaults.max_retries),
            retry_base_delay: parse_var(&lookup, "TOOLRELAY_RETRY_BASE_MS")
                .map_or(defaults.retry_base_delay, Duration::from_millis),
            tool_timeout: parse_var(&lookup, "TOOLRELAY_TOOL_TIMEOUT_SECS")
                .map_or(defaults.tool_timeout, Duration::from_secs),
            cancel_policy: parse_var(&lookup, "TOOLRELAY_CANCEL_POLICY")
                .unwrap_or(defaults.cancel_policy),
            max_tokens: parse_var(&lookup, "TOOLRELAY_MAX_TOKENS").or(defaults.max_tokens),
        }
    }

    /// Identity and limits for one session
    pub fn context(&self, session_id: &str, model_id: &str) -> LoopContext {
        LoopContext {
            max_iterations: self.max_iterations,
            max_retries: self.max_retries,
            retry_base_delay: self.retry_base_delay,
            ..LoopContext::new(session_id, model_id)
        }
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            timeout: self.tool_timeout,
            cancel_policy: self.cancel_policy,
        }
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Read a variable, keeping the default (with a warning) when it doesn't parse
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "Ignoring invalid configuration value");
            None
        }
    }
}

/// Everything `main` needs, built once
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub loop_config: LoopConfig,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            llm: LlmConfig::from_env(),
            loop_config: LoopConfig::from_env(),
            port: parse_var(&env_lookup, "TOOLRELAY_PORT")
                .unwrap_or(DEFAULT_PORT),
        }
    }
}
