//! Engine configuration.

/// Default `User-Agent` identifying the platform on outbound calls.
pub const DEFAULT_USER_AGENT: &str = "Flowdesk-Integrations/1.0";

/// Default `metadata.source` value stamped into webhook envelopes.
pub const DEFAULT_SOURCE: &str = "flowdesk";

/// Configuration shared by the dispatchers.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Sent as `User-Agent` on every outbound request.
    pub user_agent: String,
    /// Stamped into webhook envelope metadata as `source`.
    pub source: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            source: DEFAULT_SOURCE.to_string(),
        }
    }
}

impl DispatchConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults.
    ///
    /// | Variable              | Default                     |
    /// |-----------------------|-----------------------------|
    /// | `FLOWDESK_USER_AGENT` | `Flowdesk-Integrations/1.0` |
    /// | `FLOWDESK_SOURCE`     | `flowdesk`                  |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            user_agent: std::env::var("FLOWDESK_USER_AGENT").unwrap_or(defaults.user_agent),
            source: std::env::var("FLOWDESK_SOURCE").unwrap_or(defaults.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = DispatchConfig::default();
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.source, DEFAULT_SOURCE);
    }
}
