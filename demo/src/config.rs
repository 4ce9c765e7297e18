//! 演示程序配置（环境变量驱动）

use anyhow::{Context, Result};
use monolith_application::eventing::{DEFAULT_MAX_DEPTH, DispatcherConfig};
use monolith_application::transaction::RetryPolicy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// 单次 flush 的事件深度上限
    pub dispatcher: DispatcherConfig,

    /// 读写事务的冲突重试策略
    pub retry: RetryPolicy,

    /// 日志级别（trace, debug, info, warn, error），`RUST_LOG` 优先
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            retry: RetryPolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取，缺省项取默认值
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_depth: usize = var("MONOLITH_MAX_EVENT_DEPTH")
            .map(|v| v.parse())
            .transpose()
            .context("MONOLITH_MAX_EVENT_DEPTH must be a positive integer.")?
            .unwrap_or(DEFAULT_MAX_DEPTH)
            .max(1);

        let defaults = RetryPolicy::default();

        let max_attempts: u32 = var("MONOLITH_TX_MAX_ATTEMPTS")
            .map(|v| v.parse())
            .transpose()
            .context("MONOLITH_TX_MAX_ATTEMPTS must be a positive integer.")?
            .unwrap_or(defaults.max_attempts)
            .max(1);

        let initial_backoff = var("MONOLITH_TX_BACKOFF_MS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("MONOLITH_TX_BACKOFF_MS must be an integer (milliseconds).")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.initial_backoff);

        let log_level = var("MONOLITH_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            dispatcher: DispatcherConfig { max_depth },
            retry: RetryPolicy {
                max_attempts,
                initial_backoff,
                max_backoff: defaults.max_backoff.max(initial_backoff),
            },
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_variables_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.dispatcher.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.retry.max_attempts, RetryPolicy::default().max_attempts);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn variables_override_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("MONOLITH_MAX_EVENT_DEPTH", "4"),
            ("MONOLITH_TX_MAX_ATTEMPTS", "0"),
            ("MONOLITH_TX_BACKOFF_MS", "250"),
            ("MONOLITH_LOG_LEVEL", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.dispatcher.max_depth, 4);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(250));
        assert!(config.retry.max_backoff >= config.retry.initial_backoff);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = Config::from_lookup(lookup(&[("MONOLITH_MAX_EVENT_DEPTH", "ten")])).unwrap_err();
        assert!(err.to_string().contains("MONOLITH_MAX_EVENT_DEPTH"));
    }
}
