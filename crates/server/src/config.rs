use std::net::SocketAddr;
use std::time::Duration;

use fsim_orchestrator::OrchestratorConfig;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// PostgreSQL URL. Without one the engine keeps its records in memory.
    pub database_url: Option<String>,
    /// How long a script run waits for its workers (default: `300`).
    pub worker_connect_timeout_secs: u64,
    /// How long `stop` waits for a run task to end (default: `2`).
    pub stop_join_timeout_secs: u64,
    /// Target of wake-on-LAN packets (default: `255.255.255.255:9`).
    pub wol_broadcast_addr: SocketAddr,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default             |
    /// |-------------------------------|---------------------|
    /// | `HOST`                        | `0.0.0.0`           |
    /// | `PORT`                        | `8000`              |
    /// | `DATABASE_URL`                | unset (in-memory)   |
    /// | `WORKER_CONNECT_TIMEOUT_SECS` | `300`               |
    /// | `STOP_JOIN_TIMEOUT_SECS`      | `2`                 |
    /// | `WOL_BROADCAST_ADDR`          | `255.255.255.255:9` |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let worker_connect_timeout_secs: u64 = std::env::var("WORKER_CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("WORKER_CONNECT_TIMEOUT_SECS must be a valid u64");

        let stop_join_timeout_secs: u64 = std::env::var("STOP_JOIN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("STOP_JOIN_TIMEOUT_SECS must be a valid u64");

        let wol_broadcast_addr: SocketAddr = std::env::var("WOL_BROADCAST_ADDR")
            .unwrap_or_else(|_| "255.255.255.255:9".into())
            .parse()
            .expect("WOL_BROADCAST_ADDR must be a socket address");

        Self {
            host,
            port,
            database_url,
            worker_connect_timeout_secs,
            stop_join_timeout_secs,
            wol_broadcast_addr,
        }
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            worker_connect_timeout: Duration::from_secs(self.worker_connect_timeout_secs),
            stop_join_timeout: Duration::from_secs(self.stop_join_timeout_secs),
        }
    }
}
