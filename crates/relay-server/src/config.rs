//! Server configuration.

use relay_core::RelayError;
use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (default `"localhost:8082"`).
    pub addr: String,
    /// Outbound queue capacity per subscriber.
    pub queue_capacity: usize,
    /// Capacity of the hub's command channel.
    pub command_capacity: usize,
    /// WebSocket ping interval in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:8082".into(),
            queue_capacity: 256,
            command_capacity: 1024,
            heartbeat_interval_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Reject values the channels and timers cannot run with.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.queue_capacity == 0 {
            return Err(RelayError::Config("queue_capacity must be at least 1".into()));
        }
        if self.command_capacity == 0 {
            return Err(RelayError::Config("command_capacity must be at least 1".into()));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(RelayError::Config(
                "heartbeat_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
