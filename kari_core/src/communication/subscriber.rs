use crate::communication::topic::TopicIdentity;
use crate::communication::traits::{Frame, FrameSink, RegistrationId, Transport};
use crate::communication::{AtomicChannelMetrics, BoundedQueue, ChannelMetrics};
use crate::error::{KariError, KariResult};
use crate::messages::Message;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback invoked once per retained message
pub type Callback<T> = Box<dyn FnMut(T) -> anyhow::Result<()> + Send>;

/// Inbound buffer filled by the transport's delivery context
struct Inbox<T> {
    topic: String,
    queue: BoundedQueue<T>,
    closed: AtomicBool,
    metrics: AtomicChannelMetrics,
}

impl<T: Message> FrameSink for Inbox<T> {
    fn deliver(&self, frame: Frame) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        match bincode::deserialize::<T>(&frame) {
            Ok(msg) => {
                if self.queue.push(msg).is_some() {
                    AtomicChannelMetrics::bump(&self.metrics.messages_dropped);
                    log::debug!("Inbox for '{}' full, dropped oldest message", self.topic);
                }
            }
            Err(e) => {
                AtomicChannelMetrics::bump(&self.metrics.decode_failures);
                log::warn!("Dropping undecodable frame on '{}': {}", self.topic, e);
            }
        }
    }
}

/// Outcome of one [`SubscriptionHandler::dispatch`] step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Callback invocations, successful or not
    pub delivered: usize,
    /// Invocations that returned an error or panicked
    pub failed: usize,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.delivered - self.failed
    }
}

/// Inbound channel for one topic with a single callback
///
/// Messages arriving from the transport are buffered (drop-oldest) and only
/// handed to the callback when the host loop calls [`dispatch`](Self::dispatch).
/// The handler never runs the callback on its own.
pub struct SubscriptionHandler<T: Message> {
    topic: TopicIdentity,
    transport: Arc<dyn Transport>,
    inbox: Arc<Inbox<T>>,
    callback: Callback<T>,
    registration: RegistrationId,
    closed: bool,
}

impl<T: Message> SubscriptionHandler<T> {
    /// Subscribe to `topic_name` with a buffer of `capacity` messages
    pub fn open<F>(
        transport: Arc<dyn Transport>,
        topic_name: &str,
        capacity: usize,
        callback: F,
    ) -> KariResult<Self>
    where
        F: FnMut(T) -> anyhow::Result<()> + Send + 'static,
    {
        let topic = TopicIdentity::new(topic_name, capacity)?;
        if !transport.is_ok() {
            return Err(KariError::registration(topic_name, "transport unavailable"));
        }

        let inbox = Arc::new(Inbox {
            topic: topic_name.to_string(),
            queue: BoundedQueue::new(capacity),
            closed: AtomicBool::new(false),
            metrics: AtomicChannelMetrics::default(),
        });
        let registration = transport.subscribe(&topic, T::TYPE_NAME, inbox.clone())?;

        log::info!(
            "Subscribed to topic '{}' ({}, queue {})",
            topic.name(),
            T::TYPE_NAME,
            topic.capacity()
        );

        Ok(Self {
            topic,
            transport,
            inbox,
            callback: Box::new(callback),
            registration,
            closed: false,
        })
    }

    /// Run the callback for every buffered message, oldest first.
    ///
    /// The buffer is taken in one locked step, so messages that arrive while
    /// callbacks run wait for the next dispatch. A failing callback is logged
    /// and counted; the remaining messages are still dispatched.
    pub fn dispatch(&mut self) -> KariResult<DispatchReport> {
        if self.closed {
            return Err(KariError::closed(self.topic.name()));
        }

        let mut report = DispatchReport::default();
        for msg in self.inbox.queue.drain() {
            report.delivered += 1;
            AtomicChannelMetrics::bump(&self.inbox.metrics.messages_received);

            let callback = &mut self.callback;
            let failure = match panic::catch_unwind(AssertUnwindSafe(|| callback(msg))) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("{:#}", e)),
                Err(payload) => Some(panic_message(&*payload)),
            };

            if let Some(reason) = failure {
                report.failed += 1;
                AtomicChannelMetrics::bump(&self.inbox.metrics.callback_failures);
                let err = KariError::CallbackFailed {
                    topic: self.topic.name().to_string(),
                    reason,
                };
                log::error!("{}", err);
            }
        }

        Ok(report)
    }

    /// Unsubscribe and discard anything still buffered. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.inbox.closed.store(true, Ordering::Release);
        self.transport
            .unsubscribe(self.topic.name(), self.registration);

        let discarded = self.inbox.queue.clear();
        if discarded > 0 {
            log::debug!(
                "Discarded {} undispatched message(s) on '{}'",
                discarded,
                self.topic.name()
            );
        }
        log::info!("Unsubscribed from topic '{}'", self.topic.name());
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn topic(&self) -> &TopicIdentity {
        &self.topic
    }

    /// Messages waiting for the next dispatch
    pub fn pending(&self) -> usize {
        self.inbox.queue.len()
    }

    pub fn metrics(&self) -> ChannelMetrics {
        self.inbox.metrics.snapshot()
    }
}

impl<T: Message> Drop for SubscriptionHandler<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Message> fmt::Debug for SubscriptionHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandler")
            .field("topic", &self.topic)
            .field("type", &T::TYPE_NAME)
            .field("pending", &self.pending())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}
