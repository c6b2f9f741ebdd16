//! # KARI Estimator
//!
//! A single node that announces itself on `chatter` every tick and reports
//! the x coordinate of every local pose it hears.

pub mod config;

pub use config::{EstimatorConfig, TopicConfig};

use kari_core::{
    KariResult, Node, NodeInfo, PoseStamped, PublisherChannel, StringMsg,
    SubscriptionHandler, Transport,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Publishes `"hello world {n}"` on the chatter topic and dispatches pose
/// updates once per tick.
///
/// The counter starts at 0 and advances once per tick, whether or not the
/// send was accepted by the transport.
pub struct EstimatorNode {
    name: String,
    chatter: PublisherChannel<StringMsg>,
    pose_sub: SubscriptionHandler<PoseStamped>,
    count: u64,
    latest_pose: Arc<Mutex<Option<PoseStamped>>>,
}

impl EstimatorNode {
    /// Open both channels on `transport`. Fails if either topic cannot be
    /// registered.
    pub fn new(transport: Arc<dyn Transport>, config: &EstimatorConfig) -> KariResult<Self> {
        let chatter = PublisherChannel::open(
            transport.clone(),
            &config.publish.topic,
            config.publish.queue_size,
        )?;

        let latest_pose = Arc::new(Mutex::new(None));
        let latest = latest_pose.clone();
        let pose_sub = SubscriptionHandler::open(
            transport,
            &config.pose.topic,
            config.pose.queue_size,
            move |pose: PoseStamped| {
                log::info!("I heard: [{}]", pose.position().x);
                *latest.lock() = Some(pose);
                Ok(())
            },
        )?;

        Ok(Self {
            name: config.node_name.clone(),
            chatter,
            pose_sub,
            count: 0,
            latest_pose,
        })
    }

    /// Number of ticks completed so far, i.e. the next payload's counter
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Most recent pose handed to the callback
    pub fn latest_pose(&self) -> Option<PoseStamped> {
        self.latest_pose.lock().clone()
    }

    pub fn chatter(&self) -> &PublisherChannel<StringMsg> {
        &self.chatter
    }

    pub fn pose_subscription(&self) -> &SubscriptionHandler<PoseStamped> {
        &self.pose_sub
    }
}

impl Node for EstimatorNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, ctx: &mut NodeInfo) -> KariResult<()> {
        ctx.log_info(&format!(
            "Publishing on '{}', listening on '{}'",
            self.chatter.topic(),
            self.pose_sub.topic()
        ));
        Ok(())
    }

    fn tick(&mut self, ctx: &mut NodeInfo) -> KariResult<()> {
        let msg = StringMsg::new(format!("hello world {}", self.count));
        ctx.log_pub(self.chatter.topic().name(), &msg);
        let sent = self.chatter.send(msg);
        self.count += 1;
        sent?;

        let report = self.pose_sub.dispatch()?;
        ctx.record_received(self.pose_sub.topic().name(), report.delivered, report.failed);
        if report.delivered > 0 {
            if let Some(pose) = self.latest_pose() {
                ctx.log_sub(self.pose_sub.topic().name(), &pose);
            }
        }
        if report.failed > 0 {
            ctx.log_warning(&format!(
                "{} of {} pose callbacks failed",
                report.failed, report.delivered
            ));
        }
        Ok(())
    }

    fn shutdown(&mut self, ctx: &mut NodeInfo) -> KariResult<()> {
        self.chatter.close();
        self.pose_sub.close();
        ctx.log_info(&format!("Closed channels after {} ticks", self.count));
        Ok(())
    }
}
