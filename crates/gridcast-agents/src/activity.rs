use tracing::info;

pub const WEATHER_AGENT_ID: &str = "weather_001";
pub const DEMAND_AGENT_ID: &str = "demand_001";
pub const GRID_AGENT_ID: &str = "grid_001";
pub const COORDINATOR_ID: &str = "coordinator";

/// Per-agent audit trail of what the pipeline did.
pub trait ActivityLog: Send + Sync {
    fn log_action(&self, agent_id: &str, action: &str);
}

/// Emits each action as a `tracing` event on the `gridcast::activity` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActivityLog;

impl ActivityLog for TracingActivityLog {
    fn log_action(&self, agent_id: &str, action: &str) {
        info!(target: "gridcast::activity", agent_id, action, "Agent action");
    }
}
