use std::env;
use std::time::Duration;

/// Process configuration, sourced from the environment with sane defaults.
///
/// Every knob here is read once at startup via [`Config::from_env`]; nothing
/// in the request path re-reads the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub chunk_size: usize,
    pub listener_queue_maxsize: usize,
    pub idle_timeout: Duration,
    pub silence_path: Option<String>,
    pub bind_addr: String,
    pub registry_config_path: String,
    pub poll_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            listener_queue_maxsize: 256,
            idle_timeout: Duration::from_secs(600),
            silence_path: None,
            bind_addr: "0.0.0.0:8000".to_string(),
            registry_config_path: "registry.yaml".to_string(),
            poll_timeout: Duration::from_millis(2000),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunk_size: env_parse("CHUNK_SIZE", defaults.chunk_size),
            listener_queue_maxsize: env_parse(
                "LISTENER_QUEUE_MAXSIZE",
                defaults.listener_queue_maxsize,
            ),
            idle_timeout: Duration::from_secs(env_parse(
                "IDLE_TIMEOUT",
                defaults.idle_timeout.as_secs(),
            )),
            silence_path: env::var("SILENCE_PATH").ok(),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            registry_config_path: env::var("REGISTRY_CONFIG_PATH")
                .unwrap_or(defaults.registry_config_path),
            poll_timeout: Duration::from_millis(env_parse(
                "TRANSCODER_POLL_TIMEOUT_MS",
                defaults.poll_timeout.as_millis() as u64,
            )),
        }
    }

    /// Config suitable for tests: short idle timeout and poll interval so
    /// tests don't wait on production-scale timers.
    pub fn for_tests() -> Self {
        Self {
            chunk_size: 64,
            listener_queue_maxsize: 8,
            idle_timeout: Duration::from_millis(200),
            silence_path: None,
            bind_addr: "127.0.0.1:0".to_string(),
            registry_config_path: "registry.yaml".to_string(),
            poll_timeout: Duration::from_millis(50),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.chunk_size, 1024);
        assert_eq!(cfg.listener_queue_maxsize, 256);
        assert_eq!(cfg.idle_timeout, Duration::from_secs(600));
        assert!(cfg.silence_path.is_none());
    }

    #[test]
    fn test_env_parse_falls_back_on_missing() {
        let value: usize = env_parse("AIRCAST_DEFINITELY_UNSET_VAR", 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_env_parse_falls_back_on_invalid() {
        env::set_var("AIRCAST_TEST_BAD_NUMBER", "not-a-number");
        let value: usize = env_parse("AIRCAST_TEST_BAD_NUMBER", 7);
        assert_eq!(value, 7);
        env::remove_var("AIRCAST_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_env_parse_uses_set_value() {
        env::set_var("AIRCAST_TEST_GOOD_NUMBER", "99");
        let value: usize = env_parse("AIRCAST_TEST_GOOD_NUMBER", 7);
        assert_eq!(value, 99);
        env::remove_var("AIRCAST_TEST_GOOD_NUMBER");
    }

    #[test]
    fn test_for_tests_uses_short_timers() {
        let cfg = Config::for_tests();
        assert!(cfg.idle_timeout < Duration::from_secs(1));
        assert!(cfg.poll_timeout < Duration::from_secs(1));
    }
}
