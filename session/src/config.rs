//! Session tuning knobs.

use shared::MAX_PLAYERS;
use std::time::Duration;

/// Tunable parameters for a [`NetworkSession`](crate::NetworkSession).
///
/// The defaults match the protocol's reference deployment; embedders with
/// unusual environments (or tests) can tighten the timing knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum simultaneously connected clients a server accepts.
    pub max_players: usize,
    /// Socket read timeout; bounds how long the receive thread can go
    /// without noticing a stop request.
    pub recv_timeout: Duration,
    /// Delay between unacknowledged connect attempts.
    pub connect_retry_interval: Duration,
    /// Connect attempts, the initial send included, before the client
    /// stops trying.
    pub max_connect_attempts: u32,
    /// How long a discovery ping waits for a reply before giving up.
    pub ping_timeout: Duration,
    /// Silence tolerated on a client slot before the server drops it.
    pub client_timeout: Duration,
    /// Display name advertised in server info responses.
    pub server_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: MAX_PLAYERS,
            recv_timeout: Duration::from_millis(200),
            connect_retry_interval: Duration::from_millis(500),
            max_connect_attempts: 15,
            ping_timeout: Duration::from_millis(600),
            client_timeout: Duration::from_secs(10),
            server_name: String::new(),
        }
    }
}
