//! Client configuration with defaults and builder-style setters.

use std::time::Duration;

/// Cadence of the poll worker's tick loop.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Grace ticks performed after cancellation to flush in-flight traffic.
pub const DEFAULT_DRAIN_TICKS: u32 = 5;

/// Bound on the handoff's wait for the old link to go inactive. Must
/// comfortably exceed the worker's worst-case cancel-plus-drain window
/// (one tick to observe cancellation, then the drain ticks).
pub const DEFAULT_HANDOFF_TIMEOUT: Duration = Duration::from_secs(2);

/// Budget the auth gateway waits for a temporary session to connect.
pub const DEFAULT_CONNECT_WAIT: Duration = Duration::from_secs(5);

/// Connection settings shared by every session the controller opens.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service endpoint passed to the connector.
    pub uri: String,
    /// Module (database) name on the service.
    pub module: String,
    /// Event stream queries subscribed once per connection.
    pub queries: Vec<String>,
    /// Sleep between poll ticks; also the cancellation granularity.
    pub tick_interval: Duration,
    /// Extra ticks between cancellation and disconnect.
    pub drain_ticks: u32,
    /// Upper bound on waiting for a cancelled link to go inactive.
    pub handoff_timeout: Duration,
    /// Gateway wait budget for a temporary session to come up.
    pub connect_wait: Duration,
}

impl ClientConfig {
    /// Builds a config with default timing for the given endpoint.
    pub fn new(uri: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            module: module.into(),
            queries: vec!["*".to_string()],
            tick_interval: DEFAULT_TICK_INTERVAL,
            drain_ticks: DEFAULT_DRAIN_TICKS,
            handoff_timeout: DEFAULT_HANDOFF_TIMEOUT,
            connect_wait: DEFAULT_CONNECT_WAIT,
        }
    }

    /// Sets the event stream queries subscribed after connect.
    pub fn with_queries(mut self, queries: Vec<String>) -> Self {
        self.queries = queries;
        self
    }

    /// Sets the poll tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the number of post-cancellation grace ticks.
    pub fn with_drain_ticks(mut self, ticks: u32) -> Self {
        self.drain_ticks = ticks;
        self
    }

    /// Sets the handoff inactivity timeout.
    pub fn with_handoff_timeout(mut self, timeout: Duration) -> Self {
        self.handoff_timeout = timeout;
        self
    }

    /// Sets the gateway connect wait budget.
    pub fn with_connect_wait(mut self, wait: Duration) -> Self {
        self.connect_wait = wait;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trip() {
        let config = ClientConfig::new("wss://svc.example/db", "app")
            .with_queries(vec!["users".to_string()])
            .with_tick_interval(Duration::from_millis(20))
            .with_drain_ticks(2)
            .with_handoff_timeout(Duration::from_millis(400))
            .with_connect_wait(Duration::from_secs(1));

        assert_eq!(config.uri, "wss://svc.example/db");
        assert_eq!(config.module, "app");
        assert_eq!(config.queries, vec!["users".to_string()]);
        assert_eq!(config.tick_interval, Duration::from_millis(20));
        assert_eq!(config.drain_ticks, 2);
        assert_eq!(config.handoff_timeout, Duration::from_millis(400));
        assert_eq!(config.connect_wait, Duration::from_secs(1));
    }

    #[test]
    fn defaults_subscribe_to_everything() {
        let config = ClientConfig::new("wss://svc.example/db", "app");
        assert_eq!(config.queries, vec!["*".to_string()]);
        assert_eq!(config.tick_interval, DEFAULT_TICK_INTERVAL);
        assert_eq!(config.drain_ticks, DEFAULT_DRAIN_TICKS);
    }
}
