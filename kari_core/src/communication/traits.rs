//! Capability set a messaging runtime provides to KARI channels
//!
//! Channels never talk to a concrete runtime; they register an outbox
//! ([`FrameSource`]) or an inbox ([`FrameSink`]) through [`Transport`] and
//! the runtime moves encoded frames between them.

use crate::communication::topic::TopicIdentity;
use crate::error::KariResult;
use std::sync::Arc;

/// One encoded message inside the transport
pub type Frame = Arc<[u8]>;

/// Handle returned by `advertise`/`subscribe`, used to undo the registration
pub type RegistrationId = u64;

/// Publisher-side buffer the transport drains
pub trait FrameSource: Send + Sync {
    /// Remove and encode every pending message, oldest first
    fn take_frames(&self) -> Vec<Frame>;
}

/// Subscriber-side buffer the transport fills
pub trait FrameSink: Send + Sync {
    /// Accept one frame; must not block
    fn deliver(&self, frame: Frame);
}

/// Messaging runtime as seen by publisher channels and subscriptions
pub trait Transport: Send + Sync {
    /// Register a publisher outbox for `topic`
    fn advertise(
        &self,
        topic: &TopicIdentity,
        type_name: &'static str,
        outbox: Arc<dyn FrameSource>,
    ) -> KariResult<RegistrationId>;

    /// Remove a publisher registration
    fn unadvertise(&self, topic: &str, id: RegistrationId);

    /// Register a subscriber inbox for `topic`
    fn subscribe(
        &self,
        topic: &TopicIdentity,
        type_name: &'static str,
        inbox: Arc<dyn FrameSink>,
    ) -> KariResult<RegistrationId>;

    /// Remove a subscriber registration
    fn unsubscribe(&self, topic: &str, id: RegistrationId);

    /// An outbox for `topic` has new frames. Never blocks.
    fn notify(&self, topic: &str);

    /// Whether the runtime is still alive
    fn is_ok(&self) -> bool;
}
