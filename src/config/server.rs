//! HTTP/push-stream server configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Cap on the `active_orders` snapshot sent at stream handshake.
    pub snapshot_limit: usize,
    /// Liveness ping interval on idle push connections, in seconds.
    pub ping_interval_secs: u64,
    /// Per-connection outbound buffer; a full buffer drops the connection.
    pub connection_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            snapshot_limit: 50,
            ping_interval_secs: 30,
            connection_buffer: 64,
        }
    }
}
