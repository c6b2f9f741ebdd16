use crate::error::KariResult;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Trait for providing lightweight logging summaries of message types
///
/// Large messages should only report metadata here, not their whole payload.
pub trait LogSummary {
    /// Return a compact string representation suitable for logging
    fn log_summary(&self) -> String;
}

/// Lifecycle of a node under the scheduler
///
/// `Stopped` is terminal: a stopped scheduler never ticks again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    Uninitialized,
    Running,
    Stopped,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Uninitialized => write!(f, "Uninitialized"),
            NodeState::Running => write!(f, "Running"),
            NodeState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Performance metrics for node execution
#[derive(Debug, Clone, Default)]
pub struct NodeMetrics {
    pub total_ticks: u64,
    pub successful_ticks: u64,
    pub failed_ticks: u64,
    /// Ticks whose work ran past the scheduler period
    pub overruns: u64,
    pub avg_tick_duration_ms: f64,
    pub max_tick_duration_ms: f64,
    pub last_tick_duration_ms: f64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub callback_failures: u64,
    pub errors_count: u64,
    pub warnings_count: u64,
    pub uptime_seconds: f64,
}

/// Context and bookkeeping for a running node
pub struct NodeInfo {
    name: String,
    instance_id: String,
    state: NodeState,
    metrics: NodeMetrics,
    creation_time: Instant,
    tick_start_time: Option<Instant>,
    published_topics: HashMap<String, u64>,
    subscribed_topics: HashMap<String, u64>,
    error_history: Vec<(Instant, String)>,
}

const MAX_ERROR_HISTORY: usize = 100;

impl NodeInfo {
    pub fn new(node_name: &str) -> Self {
        Self {
            name: node_name.to_string(),
            instance_id: uuid::Uuid::new_v4().to_string(),
            state: NodeState::Uninitialized,
            metrics: NodeMetrics::default(),
            creation_time: Instant::now(),
            tick_start_time: None,
            published_topics: HashMap::new(),
            subscribed_topics: HashMap::new(),
            error_history: Vec::new(),
        }
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn set_state(&mut self, new_state: NodeState) {
        if self.state != new_state {
            log::debug!("[{}] {} -> {}", self.name, self.state, new_state);
            self.state = new_state;
        }
    }

    // Tick Management
    pub fn start_tick(&mut self) {
        self.tick_start_time = Some(Instant::now());
    }

    pub fn record_tick(&mut self) {
        if let Some(start_time) = self.tick_start_time.take() {
            let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;

            self.metrics.total_ticks += 1;
            self.metrics.successful_ticks += 1;
            self.metrics.last_tick_duration_ms = duration_ms;
            if duration_ms > self.metrics.max_tick_duration_ms {
                self.metrics.max_tick_duration_ms = duration_ms;
            }

            let total_duration =
                self.metrics.avg_tick_duration_ms * (self.metrics.successful_ticks - 1) as f64;
            self.metrics.avg_tick_duration_ms =
                (total_duration + duration_ms) / self.metrics.successful_ticks as f64;
        }
        self.metrics.uptime_seconds = self.creation_time.elapsed().as_secs_f64();
    }

    pub fn record_tick_failure(&mut self, error_msg: &str) {
        self.metrics.total_ticks += 1;
        self.metrics.failed_ticks += 1;
        if let Some(start_time) = self.tick_start_time.take() {
            self.metrics.last_tick_duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        }
        self.log_error(error_msg);
    }

    pub fn record_overrun(&mut self) {
        self.metrics.overruns += 1;
    }

    /// Count messages handed to a subscription callback, and how many failed
    pub fn record_received(&mut self, topic: &str, delivered: usize, failed: usize) {
        if delivered > 0 {
            *self.subscribed_topics.entry(topic.to_string()).or_insert(0) += delivered as u64;
            self.metrics.messages_received += delivered as u64;
        }
        self.metrics.callback_failures += failed as u64;
    }

    // Logging
    pub fn log_pub<T: LogSummary>(&mut self, topic: &str, data: &T) {
        log::info!("[{}] --PUB--> '{}' = {}", self.name, topic, data.log_summary());
        *self.published_topics.entry(topic.to_string()).or_insert(0) += 1;
        self.metrics.messages_sent += 1;
    }

    pub fn log_sub<T: LogSummary>(&mut self, topic: &str, data: &T) {
        log::info!("[{}] <--SUB-- '{}' = {}", self.name, topic, data.log_summary());
    }

    pub fn log_info(&self, message: &str) {
        log::info!("[{}] {}", self.name, message);
    }

    pub fn log_warning(&mut self, message: &str) {
        log::warn!("[{}] {}", self.name, message);
        self.metrics.warnings_count += 1;
    }

    pub fn log_error(&mut self, message: &str) {
        log::error!("[{}] {}", self.name, message);
        self.error_history.push((Instant::now(), message.to_string()));
        if self.error_history.len() > MAX_ERROR_HISTORY {
            self.error_history.remove(0);
        }
        self.metrics.errors_count += 1;
    }

    // Getters
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }
    pub fn published_topics(&self) -> &HashMap<String, u64> {
        &self.published_topics
    }
    pub fn subscribed_topics(&self) -> &HashMap<String, u64> {
        &self.subscribed_topics
    }
    pub fn last_error(&self) -> Option<&str> {
        self.error_history.last().map(|(_, msg)| msg.as_str())
    }
    pub fn uptime(&self) -> Duration {
        self.creation_time.elapsed()
    }
}

/// A unit of periodic work driven by the [`Scheduler`](crate::Scheduler)
pub trait Node: Send {
    /// Get the node's name
    fn name(&self) -> &str;

    /// Initialize the node (called once before the first tick)
    fn init(&mut self, ctx: &mut NodeInfo) -> KariResult<()> {
        ctx.log_info("Node initialized successfully");
        Ok(())
    }

    /// One iteration of work. Non-fatal errors are logged by the scheduler
    /// and the loop carries on with the next tick.
    fn tick(&mut self, ctx: &mut NodeInfo) -> KariResult<()>;

    /// Release resources (called once on the way to `Stopped`)
    fn shutdown(&mut self, ctx: &mut NodeInfo) -> KariResult<()> {
        ctx.log_info("Node shutdown successfully");
        Ok(())
    }
}

impl LogSummary for f64 {
    fn log_summary(&self) -> String {
        format!("{:.3}", self)
    }
}

impl LogSummary for u64 {
    fn log_summary(&self) -> String {
        self.to_string()
    }
}

impl LogSummary for String {
    fn log_summary(&self) -> String {
        self.clone()
    }
}
