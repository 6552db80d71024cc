use shared::{INITIAL_VITALITY, SPAWN_RADIUS};
use std::time::Duration;

/// Timing and gameplay parameters of one relay server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Delay between connect and the first mutual announcement
    pub announce_delay: Duration,
    /// Period of the PeerState heartbeat each session broadcasts
    pub reannounce_interval: Duration,
    /// Period of each session's collision scan
    pub collision_interval: Duration,
    /// Distance from the anchor at which new sessions are placed
    pub spawn_radius: f32,
    /// Vitality assigned to a freshly connected session
    pub initial_vitality: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            announce_delay: Duration::from_millis(1000),
            reannounce_interval: Duration::from_millis(1000),
            collision_interval: Duration::from_millis(100),
            spawn_radius: SPAWN_RADIUS,
            initial_vitality: INITIAL_VITALITY,
        }
    }
}
