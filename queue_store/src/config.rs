use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Queue store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStoreConfig {
    /// How long a received message stays invisible to other receivers.
    #[serde(with = "humantime_serde", default = "default_visibility_timeout")]
    pub visibility_timeout: Duration,

    /// Time-to-live of newly sent messages.
    #[serde(with = "humantime_serde", default = "default_message_ttl")]
    pub message_ttl: Duration,

    /// Visibility used when messages are received only to obtain a pop
    /// receipt, e.g. to delete one message by id.
    #[serde(with = "humantime_serde", default = "default_lookup_visibility_timeout")]
    pub lookup_visibility_timeout: Duration,
}

fn default_visibility_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_message_ttl() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_lookup_visibility_timeout() -> Duration {
    Duration::from_secs(1)
}

impl Default for QueueStoreConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: default_visibility_timeout(),
            message_ttl: default_message_ttl(),
            lookup_visibility_timeout: default_lookup_visibility_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humantime_durations() {
        let config: QueueStoreConfig =
            serde_json::from_str(r#"{"visibility_timeout": "2m", "message_ttl": "1day"}"#)
                .unwrap();
        assert_eq!(config.visibility_timeout, Duration::from_secs(120));
        assert_eq!(config.message_ttl, Duration::from_secs(86400));
        assert_eq!(config.lookup_visibility_timeout, Duration::from_secs(1));
    }
}
