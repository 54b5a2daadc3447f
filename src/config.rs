//! Broker configuration, collected from the environment at startup.

use std::time::Duration;

/// The well-known string `/discover` clients use to recognize this broker
/// among unrelated services bound to nearby ports. Fixed per an Open
/// Question in spec.md — see DESIGN.md.
pub const DISCOVERY_IDENTIFIER: &str = "console-bridge";

#[derive(Debug, Clone)]
pub struct Config {
    pub ws_port: u16,
    pub discovery_port: u16,
    pub max_logs: usize,
    pub max_network: usize,
    pub log_ttl: Option<Duration>,
    pub heartbeat_interval: Duration,
    pub execute_timeout: Duration,
    pub snapshot_timeout: Duration,
    pub lock_timeout: Duration,
    pub readiness_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_port: 9847,
            discovery_port: 9846,
            max_logs: 1000,
            max_network: 1000,
            log_ttl: None,
            heartbeat_interval: Duration::from_secs(30),
            execute_timeout: Duration::from_secs(10),
            snapshot_timeout: Duration::from_secs(30),
            lock_timeout: Duration::from_secs(5),
            readiness_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Build configuration from `CONSOLE_MCP_*` environment variables,
    /// falling back to the defaults matching spec.md §4/§6.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ws_port = std::env::var("CONSOLE_MCP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.ws_port);

        let discovery_port = std::env::var("CONSOLE_MCP_DISCOVERY_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.discovery_port);

        let max_logs = std::env::var("CONSOLE_MCP_MAX_LOGS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_logs);

        let max_network = std::env::var("CONSOLE_MCP_MAX_NETWORK")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_network);

        let log_ttl = std::env::var("CONSOLE_MCP_LOG_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|minutes| minutes.is_finite() && *minutes > 0.0)
            .map(|minutes| Duration::from_secs_f64(minutes * 60.0));

        Self {
            ws_port,
            discovery_port,
            max_logs,
            max_network,
            log_ttl,
            ..defaults
        }
    }

    pub fn discover_url(&self) -> String {
        format!("http://127.0.0.1:{}/discover", self.discovery_port)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.ws_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.ws_port, 9847);
        assert_eq!(cfg.discovery_port, 9846);
        assert_eq!(cfg.max_logs, 1000);
        assert_eq!(cfg.max_network, 1000);
        assert!(cfg.log_ttl.is_none());
    }
}
