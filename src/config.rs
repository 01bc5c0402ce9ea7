//! Runtime configuration, read from `LINKNOTES_*` environment variables.

use std::env;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:3001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Some sites reject requests without a browser user agent.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub fetch: FetchConfig,
}

/// Settings for outbound metadata requests.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            allow_private_hosts: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            fetch: FetchConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Unset or
    /// unparseable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind) = lookup("LINKNOTES_BIND").filter(|v| !v.trim().is_empty()) {
            config.bind_addr = bind.trim().to_string();
        }
        if let Some(agent) = lookup("LINKNOTES_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            config.fetch.user_agent = agent;
        }
        if let Some(secs) = lookup("LINKNOTES_TIMEOUT_SECS").and_then(|v| v.trim().parse().ok()) {
            config.fetch.timeout = Duration::from_secs(secs);
        }
        if let Some(flag) = lookup("LINKNOTES_ALLOW_PRIVATE") {
            config.fetch.allow_private_hosts =
                matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }

        config
    }
}
