use crate::communication::topic::TopicIdentity;
use crate::communication::traits::{Frame, FrameSource, RegistrationId, Transport};
use crate::communication::{AtomicChannelMetrics, BoundedQueue, ChannelMetrics};
use crate::error::{KariError, KariResult};
use crate::messages::Message;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Pending outbound messages, encoded lazily when the transport drains them
struct Outbox<T> {
    topic: String,
    queue: BoundedQueue<T>,
    metrics: AtomicChannelMetrics,
}

impl<T: Message> FrameSource for Outbox<T> {
    fn take_frames(&self) -> Vec<Frame> {
        self.queue
            .drain()
            .into_iter()
            .filter_map(|msg| match bincode::serialize(&msg) {
                Ok(bytes) => Some(Frame::from(bytes)),
                Err(e) => {
                    AtomicChannelMetrics::bump(&self.metrics.send_failures);
                    log::warn!("Dropping unencodable message on '{}': {}", self.topic, e);
                    None
                }
            })
            .collect()
    }
}

/// State shared by every clone of a publisher handle
struct Advertisement<T> {
    topic: TopicIdentity,
    transport: Arc<dyn Transport>,
    outbox: Arc<Outbox<T>>,
    registration: RegistrationId,
    open_handles: AtomicUsize,
}

impl<T> Advertisement<T> {
    /// Drop one handle; the last one out unadvertises the topic
    fn release(&self) {
        if self.open_handles.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.transport
                .unadvertise(self.topic.name(), self.registration);
            log::info!("Unadvertised topic '{}'", self.topic.name());
        }
    }
}

/// Outbound channel for one topic with a bounded, drop-oldest buffer
///
/// `send` never blocks: it enqueues and wakes the transport, which delivers
/// asynchronously. Handles are cloneable and the topic stays advertised
/// until the last handle is closed or dropped.
pub struct PublisherChannel<T: Message> {
    shared: Arc<Advertisement<T>>,
    closed: AtomicBool,
}

impl<T: Message> PublisherChannel<T> {
    /// Advertise `topic_name` on `transport` with a buffer of `capacity` messages
    pub fn open(
        transport: Arc<dyn Transport>,
        topic_name: &str,
        capacity: usize,
    ) -> KariResult<Self> {
        let topic = TopicIdentity::new(topic_name, capacity)?;
        if !transport.is_ok() {
            return Err(KariError::registration(topic_name, "transport unavailable"));
        }

        let outbox = Arc::new(Outbox {
            topic: topic_name.to_string(),
            queue: BoundedQueue::new(capacity),
            metrics: AtomicChannelMetrics::default(),
        });
        let registration = transport.advertise(&topic, T::TYPE_NAME, outbox.clone())?;

        log::info!(
            "Advertised topic '{}' ({}, queue {})",
            topic.name(),
            T::TYPE_NAME,
            topic.capacity()
        );

        Ok(Self {
            shared: Arc::new(Advertisement {
                topic,
                transport,
                outbox,
                registration,
                open_handles: AtomicUsize::new(1),
            }),
            closed: AtomicBool::new(false),
        })
    }

    /// Enqueue `msg` for delivery to every current subscriber.
    ///
    /// A full buffer evicts its oldest message; that loss is part of the
    /// channel contract and not reported as an error. Fails only with
    /// [`KariError::ChannelClosed`] once this handle is closed.
    pub fn send(&self, msg: T) -> KariResult<()> {
        let outbox = &self.shared.outbox;

        if self.closed.load(Ordering::Acquire) {
            AtomicChannelMetrics::bump(&outbox.metrics.send_failures);
            return Err(KariError::closed(self.shared.topic.name()));
        }

        if !self.shared.transport.is_ok() {
            // Lossy channel: an unreachable transport swallows the message
            AtomicChannelMetrics::bump(&outbox.metrics.messages_dropped);
            log::debug!(
                "Transport down, dropping message on '{}'",
                self.shared.topic.name()
            );
            return Ok(());
        }

        if outbox.queue.push(msg).is_some() {
            AtomicChannelMetrics::bump(&outbox.metrics.messages_dropped);
        }
        AtomicChannelMetrics::bump(&outbox.metrics.messages_sent);
        self.shared.transport.notify(self.shared.topic.name());
        Ok(())
    }

    /// Close this handle. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.shared.release();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn topic(&self) -> &TopicIdentity {
        &self.shared.topic
    }

    /// Messages accepted but not yet taken by the transport
    pub fn pending(&self) -> usize {
        self.shared.outbox.queue.len()
    }

    /// Copy of the undelivered messages, oldest first
    pub fn pending_messages(&self) -> Vec<T> {
        self.shared.outbox.queue.snapshot()
    }

    pub fn metrics(&self) -> ChannelMetrics {
        self.shared.outbox.metrics.snapshot()
    }
}

impl<T: Message> Clone for PublisherChannel<T> {
    fn clone(&self) -> Self {
        let closed = self.is_closed();
        if !closed {
            self.shared.open_handles.fetch_add(1, Ordering::AcqRel);
        }
        Self {
            shared: self.shared.clone(),
            closed: AtomicBool::new(closed),
        }
    }
}

impl<T: Message> Drop for PublisherChannel<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Message> fmt::Debug for PublisherChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherChannel")
            .field("topic", &self.shared.topic)
            .field("type", &T::TYPE_NAME)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::local::{DeliveryMode, LocalTransport};
    use crate::communication::subscriber::SubscriptionHandler;
    use crate::messages::StringMsg;

    fn manual() -> Arc<LocalTransport> {
        Arc::new(LocalTransport::new(DeliveryMode::Manual).unwrap())
    }

    #[test]
    fn test_overflow_retains_most_recent() {
        let transport = manual();
        let publisher = PublisherChannel::<StringMsg>::open(transport, "chatter", 4).unwrap();

        for i in 0..10 {
            publisher.send(StringMsg::new(format!("hello world {}", i))).unwrap();
        }

        let pending: Vec<String> = publisher
            .pending_messages()
            .into_iter()
            .map(|m| m.data)
            .collect();
        assert_eq!(
            pending,
            vec!["hello world 6", "hello world 7", "hello world 8", "hello world 9"]
        );

        let metrics = publisher.metrics();
        assert_eq!(metrics.messages_sent, 10);
        assert_eq!(metrics.messages_dropped, 6);
    }

    #[test]
    fn test_send_after_close_fails_without_enqueue() {
        let transport = manual();
        let publisher = PublisherChannel::<StringMsg>::open(transport.clone(), "chatter", 8).unwrap();
        let heard = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = heard.clone();
        let mut sub = SubscriptionHandler::open(transport.clone(), "chatter", 8, move |msg: StringMsg| {
            sink.lock().push(msg.data);
            Ok(())
        })
        .unwrap();

        publisher.send(StringMsg::new("before")).unwrap();
        publisher.close();
        assert_eq!(publisher.pending(), 0);

        let err = publisher.send(StringMsg::new("after")).unwrap_err();
        assert!(matches!(err, KariError::ChannelClosed { .. }));
        assert_eq!(publisher.pending(), 0);
        assert_eq!(publisher.metrics().messages_sent, 1);
        assert_eq!(publisher.metrics().send_failures, 1);

        transport.pump();
        sub.dispatch().unwrap();
        assert_eq!(*heard.lock(), vec!["before".to_string()]);
    }

    #[test]
    fn test_last_clone_unadvertises() {
        let transport = manual();
        let first = PublisherChannel::<StringMsg>::open(transport.clone(), "chatter", 8).unwrap();
        let second = first.clone();
        assert!(transport.is_advertised("chatter"));

        first.close();
        assert!(transport.is_advertised("chatter"));
        second.send(StringMsg::new("still open")).unwrap();

        drop(second);
        assert!(!transport.is_advertised("chatter"));
    }

    #[test]
    fn test_clone_of_closed_handle_stays_closed() {
        let transport = manual();
        let keeper = PublisherChannel::<StringMsg>::open(transport.clone(), "chatter", 8).unwrap();
        let closed = keeper.clone();
        closed.close();

        let copy = closed.clone();
        assert!(copy.is_closed());
        drop(copy);
        assert!(transport.is_advertised("chatter"));
    }

    #[test]
    fn test_open_on_dead_transport_fails() {
        let transport = manual();
        transport.shutdown();
        let err = PublisherChannel::<StringMsg>::open(transport, "chatter", 8).unwrap_err();
        assert!(matches!(err, KariError::TopicRegistration { .. }));
    }

    #[test]
    fn test_invalid_name_fails() {
        let err = PublisherChannel::<StringMsg>::open(manual(), "bad name", 8).unwrap_err();
        assert!(matches!(err, KariError::TopicRegistration { .. }));
    }
}
