//! # Communication layer for KARI
//!
//! - **PublisherChannel**: non-blocking, drop-oldest outbound channel
//! - **SubscriptionHandler**: bounded inbound buffer drained through one callback
//! - **Transport**: the capability set a messaging runtime provides
//! - **LocalTransport**: in-process runtime with a background delivery worker
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kari_core::communication::{DeliveryMode, LocalTransport, PublisherChannel, SubscriptionHandler};
//! use kari_core::StringMsg;
//!
//! # fn main() -> kari_core::KariResult<()> {
//! let transport = Arc::new(LocalTransport::new(DeliveryMode::Background)?);
//! let chatter = PublisherChannel::<StringMsg>::open(transport.clone(), "chatter", 1000)?;
//! let mut listener = SubscriptionHandler::open(transport, "chatter", 1000, |msg: StringMsg| {
//!     log::info!("I heard: [{}]", msg.data);
//!     Ok(())
//! })?;
//! chatter.send(StringMsg::new("hello world 0"))?;
//! listener.dispatch()?;
//! # Ok(())
//! # }
//! ```

pub mod local;
pub mod publisher;
pub mod queue;
pub mod subscriber;
pub mod topic;
pub mod traits;

pub use local::{DeliveryMode, LocalTransport};
pub use publisher::PublisherChannel;
pub use queue::BoundedQueue;
pub use subscriber::{DispatchReport, SubscriptionHandler};
pub use topic::TopicIdentity;
pub use traits::{Frame, FrameSink, FrameSource, RegistrationId, Transport};

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by every handle of a channel
#[derive(Debug, Default)]
pub(crate) struct AtomicChannelMetrics {
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub messages_dropped: AtomicU64,
    pub send_failures: AtomicU64,
    pub callback_failures: AtomicU64,
    pub decode_failures: AtomicU64,
}

impl AtomicChannelMetrics {
    pub fn snapshot(&self) -> ChannelMetrics {
        ChannelMetrics {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time channel counters
///
/// Publishers fill `messages_sent`, `messages_dropped` and `send_failures`;
/// subscriptions fill the receive side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    /// Messages evicted by the drop-oldest policy
    pub messages_dropped: u64,
    pub send_failures: u64,
    pub callback_failures: u64,
    pub decode_failures: u64,
}
