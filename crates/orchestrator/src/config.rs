use std::time::Duration;

/// Default time all workers of a script get to come online.
const DEFAULT_WORKER_CONNECT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default time `stop` waits for the run task to exit.
const DEFAULT_STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Timing knobs of the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub worker_connect_timeout: Duration,
    pub stop_join_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_connect_timeout: DEFAULT_WORKER_CONNECT_TIMEOUT,
            stop_join_timeout: DEFAULT_STOP_JOIN_TIMEOUT,
        }
    }
}
