use super::config::SchedulerConfig;
use super::rate::Rate;
use super::shutdown::ShutdownToken;
use crate::core::{Node, NodeInfo, NodeMetrics, NodeState};
use crate::error::{KariError, KariResult};
use std::time::{Duration, Instant};

/// Optional bound on how long a run lasts
#[derive(Debug, Clone, Copy)]
enum RunLimit {
    Unbounded,
    Duration(Duration),
    Ticks(u64),
}

impl RunLimit {
    fn reached(&self, ticks: u64, started: Instant) -> bool {
        match *self {
            RunLimit::Unbounded => false,
            RunLimit::Duration(max) => started.elapsed() >= max,
            RunLimit::Ticks(max) => ticks >= max,
        }
    }
}

/// Drives one node at a fixed rate until shut down.
///
/// `Running` is entered after the node's `init` succeeds; `Stopped` is
/// entered when the shutdown token is cancelled, a liveness check fails, a
/// run limit is hit or a tick returns a fatal error. A stopped scheduler
/// never runs again.
pub struct Scheduler {
    name: String,
    config: SchedulerConfig,
    shutdown: ShutdownToken,
    liveness: Vec<Box<dyn Fn() -> bool + Send>>,
    state: NodeState,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, shutdown: ShutdownToken) -> Self {
        Self {
            name: "DefaultScheduler".to_string(),
            config,
            shutdown,
            liveness: Vec::new(),
            state: NodeState::Uninitialized,
        }
    }

    /// Set scheduler name (for logging)
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Add a liveness query consulted once per tick alongside the token
    pub fn with_liveness_check<F>(mut self, check: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        self.liveness.push(Box::new(check));
        self
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run until the token is cancelled or a liveness check fails
    pub fn run(&mut self, node: &mut dyn Node) -> KariResult<NodeMetrics> {
        self.run_with_limit(node, RunLimit::Unbounded)
    }

    /// Run for at most `duration`, then shut down gracefully
    pub fn run_for(&mut self, node: &mut dyn Node, duration: Duration) -> KariResult<NodeMetrics> {
        self.run_with_limit(node, RunLimit::Duration(duration))
    }

    /// Run exactly `ticks` ticks unless stopped earlier
    pub fn run_ticks(&mut self, node: &mut dyn Node, ticks: u64) -> KariResult<NodeMetrics> {
        self.run_with_limit(node, RunLimit::Ticks(ticks))
    }

    fn is_ok(&self) -> bool {
        self.shutdown.is_ok() && self.liveness.iter().all(|check| check())
    }

    fn run_with_limit(&mut self, node: &mut dyn Node, limit: RunLimit) -> KariResult<NodeMetrics> {
        if self.state == NodeState::Stopped {
            return Err(KariError::Internal(format!(
                "Scheduler '{}' is stopped and cannot run again",
                self.name
            )));
        }
        self.config.validate()?;
        let mut rate = Rate::new(self.config.rate_hz)?;

        let mut ctx = NodeInfo::new(node.name());
        if let Err(e) = node.init(&mut ctx) {
            ctx.log_error(&format!("Initialization failed: {}", e));
            self.state = NodeState::Stopped;
            return Err(e);
        }

        self.state = NodeState::Running;
        ctx.set_state(NodeState::Running);
        log::info!(
            "Scheduler '{}' running node '{}' at {:.1} Hz",
            self.name,
            node.name(),
            self.config.rate_hz
        );

        let started = Instant::now();
        let mut ticks = 0u64;
        let mut fatal = None;
        rate.reset();

        while self.is_ok() && !limit.reached(ticks, started) {
            ctx.start_tick();
            match node.tick(&mut ctx) {
                Ok(()) => ctx.record_tick(),
                Err(e) if e.is_fatal() => {
                    ctx.record_tick_failure(&format!("Fatal tick error: {}", e));
                    fatal = Some(e);
                    break;
                }
                Err(e) => ctx.record_tick_failure(&format!("Tick failed: {}", e)),
            }
            ticks += 1;

            if self.config.report_every > 0 && ticks % self.config.report_every == 0 {
                self.log_summary(&ctx);
            }

            if !self.is_ok() || limit.reached(ticks, started) {
                break;
            }
            if !rate.sleep() {
                ctx.record_overrun();
                log::debug!(
                    "Tick {} of '{}' overran the {:?} period",
                    ticks,
                    node.name(),
                    rate.period()
                );
            }
        }

        if !self.is_ok() {
            log::info!("Shutdown requested, stopping scheduler '{}'", self.name);
        }

        self.state = NodeState::Stopped;
        ctx.set_state(NodeState::Stopped);
        match node.shutdown(&mut ctx) {
            Ok(()) => log::info!("Shutdown node '{}' successfully", node.name()),
            Err(e) => ctx.log_error(&format!("Error shutting down node: {}", e)),
        }

        self.log_summary(&ctx);
        log::info!("Scheduler '{}' shutdown complete", self.name);

        match fatal {
            Some(e) => Err(e),
            None => Ok(ctx.metrics().clone()),
        }
    }

    fn log_summary(&self, ctx: &NodeInfo) {
        let m = ctx.metrics();
        log::info!(
            "[{}] ticks:{}/{} overruns:{} sent:{} received:{} avg:{:.2}ms max:{:.2}ms",
            ctx.name(),
            m.successful_ticks,
            m.total_ticks,
            m.overruns,
            m.messages_sent,
            m.messages_received,
            m.avg_tick_duration_ms,
            m.max_tick_duration_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingNode {
        ticks: u64,
        fail_on: Option<u64>,
        fatal_on: Option<u64>,
        shut_down: bool,
    }

    impl CountingNode {
        fn new() -> Self {
            Self {
                ticks: 0,
                fail_on: None,
                fatal_on: None,
                shut_down: false,
            }
        }
    }

    impl Node for CountingNode {
        fn name(&self) -> &str {
            "counting_node"
        }

        fn tick(&mut self, _ctx: &mut NodeInfo) -> KariResult<()> {
            self.ticks += 1;
            if Some(self.ticks) == self.fail_on {
                return Err(KariError::Codec("bad frame".into()));
            }
            if Some(self.ticks) == self.fatal_on {
                return Err(KariError::closed("chatter"));
            }
            Ok(())
        }

        fn shutdown(&mut self, _ctx: &mut NodeInfo) -> KariResult<()> {
            self.shut_down = true;
            Ok(())
        }
    }

    fn fast() -> SchedulerConfig {
        SchedulerConfig::with_rate(1000.0)
    }

    #[test]
    fn test_run_ticks_runs_exact_count() {
        let mut scheduler = Scheduler::new(fast(), ShutdownToken::new());
        let mut node = CountingNode::new();

        let metrics = scheduler.run_ticks(&mut node, 7).unwrap();
        assert_eq!(node.ticks, 7);
        assert_eq!(metrics.total_ticks, 7);
        assert!(node.shut_down);
        assert_eq!(scheduler.state(), &NodeState::Stopped);
    }

    #[test]
    fn test_non_fatal_errors_keep_looping() {
        let mut scheduler = Scheduler::new(fast(), ShutdownToken::new());
        let mut node = CountingNode::new();
        node.fail_on = Some(2);

        let metrics = scheduler.run_ticks(&mut node, 5).unwrap();
        assert_eq!(node.ticks, 5);
        assert_eq!(metrics.failed_ticks, 1);
        assert_eq!(metrics.successful_ticks, 4);
    }

    #[test]
    fn test_fatal_error_stops_and_propagates() {
        let mut scheduler = Scheduler::new(fast(), ShutdownToken::new());
        let mut node = CountingNode::new();
        node.fatal_on = Some(3);

        let err = scheduler.run_ticks(&mut node, 10).unwrap_err();
        assert!(matches!(err, KariError::ChannelClosed { .. }));
        assert_eq!(node.ticks, 3);
        assert!(node.shut_down);
    }

    #[test]
    fn test_cancelled_token_never_ticks() {
        let token = ShutdownToken::new();
        token.cancel();
        let mut scheduler = Scheduler::new(fast(), token);
        let mut node = CountingNode::new();

        scheduler.run(&mut node).unwrap();
        assert_eq!(node.ticks, 0);
        assert!(node.shut_down);
    }

    #[test]
    fn test_liveness_check_stops_loop() {
        let mut scheduler = Scheduler::new(fast(), ShutdownToken::new())
            .with_liveness_check(|| false);
        let mut node = CountingNode::new();

        scheduler.run(&mut node).unwrap();
        assert_eq!(node.ticks, 0);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut scheduler = Scheduler::new(fast(), ShutdownToken::new());
        let mut node = CountingNode::new();
        scheduler.run_ticks(&mut node, 1).unwrap();

        assert!(scheduler.run_ticks(&mut node, 1).is_err());
        assert_eq!(node.ticks, 1);
    }

    #[test]
    fn test_invalid_rate_fails_before_init() {
        let mut scheduler = Scheduler::new(SchedulerConfig::with_rate(-1.0), ShutdownToken::new());
        let mut node = CountingNode::new();

        assert!(matches!(
            scheduler.run_ticks(&mut node, 1),
            Err(KariError::Config(_))
        ));
        assert!(!node.shut_down);
    }
}
