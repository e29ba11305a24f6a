use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Network listener and per-connection limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// How long a connection may stay silent before it is detached.
    pub idle_timeout_ms: u64,
    /// Upper bound on a single socket write.
    pub send_timeout_ms: u64,
    /// Outbound messages buffered per connection before deliveries fail.
    pub max_send_queue: usize,
    /// Base URL handed out by `/generate-websocket`. Derived from host and
    /// port when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            idle_timeout_ms: 60_000,
            send_timeout_ms: 5_000,
            max_send_queue: 256,
            public_url: None,
        }
    }
}

impl ServerSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// `ws://` base used to build session links.
    pub fn websocket_base(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = if self.host == "0.0.0.0" {
                    "localhost"
                } else {
                    self.host.as_str()
                };
                format!("ws://{host}:{}", self.port)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.idle_timeout(), Duration::from_secs(60));
        assert_eq!(s.send_timeout(), Duration::from_secs(5));
        assert_eq!(s.max_send_queue, 256);
    }

    #[test]
    fn websocket_base_from_host() {
        let s = ServerSettings {
            port: 9100,
            ..ServerSettings::default()
        };
        assert_eq!(s.websocket_base(), "ws://localhost:9100");
    }

    #[test]
    fn websocket_base_prefers_public_url() {
        let s = ServerSettings {
            public_url: Some("wss://maze.example.org/".into()),
            ..ServerSettings::default()
        };
        assert_eq!(s.websocket_base(), "wss://maze.example.org");
    }
}
