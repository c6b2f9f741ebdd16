//! # KARI Core
//!
//! Runtime pieces for a single fixed-rate robotics node:
//!
//! - **Communication**: bounded, drop-oldest publisher channels and
//!   callback-driven subscription handlers over a pluggable [`Transport`]
//! - **Core**: the [`Node`] trait and the per-node [`NodeInfo`] context
//! - **Scheduling**: the fixed-rate [`Scheduler`] loop, [`Rate`] and the
//!   [`ShutdownToken`] that stops it
//! - **Messages**: the wire types exchanged by the estimator node
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kari_core::{
//!     DeliveryMode, KariResult, LocalTransport, Node, NodeInfo, PublisherChannel,
//!     Scheduler, SchedulerConfig, ShutdownToken, StringMsg,
//! };
//!
//! struct Talker {
//!     output: PublisherChannel<StringMsg>,
//! }
//!
//! impl Node for Talker {
//!     fn name(&self) -> &str { "talker" }
//!
//!     fn tick(&mut self, _ctx: &mut NodeInfo) -> KariResult<()> {
//!         self.output.send(StringMsg::new("Hello KARI!"))
//!     }
//! }
//!
//! # fn main() -> KariResult<()> {
//! let transport = Arc::new(LocalTransport::new(DeliveryMode::Background)?);
//! let mut talker = Talker { output: PublisherChannel::open(transport, "chatter", 1000)? };
//! let mut scheduler = Scheduler::new(SchedulerConfig::default(), ShutdownToken::new());
//! scheduler.run(&mut talker)?;
//! # Ok(())
//! # }
//! ```

pub mod communication;
pub mod core;
pub mod error;
pub mod messages;
pub mod scheduling;

// Re-export commonly used types for easy access
pub use communication::{
    BoundedQueue, ChannelMetrics, DeliveryMode, DispatchReport, LocalTransport,
    PublisherChannel, SubscriptionHandler, TopicIdentity, Transport,
};
pub use core::{LogSummary, Node, NodeInfo, NodeMetrics, NodeState};
pub use error::{KariError, KariResult};
pub use messages::{Header, Message, Point, Pose, PoseStamped, Quaternion, StringMsg, Time};
pub use scheduling::{Rate, Scheduler, SchedulerConfig, ShutdownToken};
