//! In-process messaging runtime
//!
//! Routes frames from every publisher outbox of a topic to every subscriber
//! inbox of that topic. Delivery runs either on a dedicated worker thread
//! woken by `notify`, or on demand through [`LocalTransport::pump`].

use crate::communication::topic::TopicIdentity;
use crate::communication::traits::{Frame, FrameSink, FrameSource, RegistrationId, Transport};
use crate::error::{KariError, KariResult};
use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Where delivery work happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// A worker thread delivers as soon as a publisher notifies
    Background,
    /// Nothing moves until the owner calls `pump()`
    Manual,
}

enum Wake {
    Topic(String),
    Stop,
}

/// Registrations for one topic
struct TopicEntry {
    type_name: &'static str,
    publishers: Vec<(RegistrationId, Arc<dyn FrameSource>)>,
    subscribers: Vec<(RegistrationId, Arc<dyn FrameSink>)>,
}

impl TopicEntry {
    fn is_empty(&self) -> bool {
        self.publishers.is_empty() && self.subscribers.is_empty()
    }

    fn sinks(&self) -> Vec<Arc<dyn FrameSink>> {
        self.subscribers.iter().map(|(_, sink)| sink.clone()).collect()
    }
}

/// State shared with the delivery worker
struct Router {
    topics: RwLock<HashMap<String, TopicEntry>>,
    /// Held from taking frames until they are fanned out. Always acquired
    /// before `topics`.
    delivery: Mutex<()>,
    next_id: AtomicU64,
    alive: AtomicBool,
    delivered: AtomicU64,
}

impl Router {
    /// Move every pending frame of `topic` to its subscribers
    fn deliver_topic(&self, topic: &str) -> usize {
        let _serial = self.delivery.lock();
        let (frames, sinks) = {
            let topics = self.topics.read();
            let Some(entry) = topics.get(topic) else {
                return 0;
            };
            let frames: Vec<Frame> = entry
                .publishers
                .iter()
                .flat_map(|(_, source)| source.take_frames())
                .collect();
            (frames, entry.sinks())
        };

        self.fan_out(topic, frames, &sinks)
    }

    fn fan_out(&self, topic: &str, frames: Vec<Frame>, sinks: &[Arc<dyn FrameSink>]) -> usize {
        if frames.is_empty() {
            return 0;
        }
        if !self.alive.load(Ordering::Acquire) {
            log::debug!("Transport down, dropped {} frame(s) on '{}'", frames.len(), topic);
            return 0;
        }

        let mut count = 0;
        for frame in frames {
            for sink in sinks {
                sink.deliver(frame.clone());
                count += 1;
            }
        }
        self.delivered.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    fn register(
        &self,
        topic: &TopicIdentity,
        type_name: &'static str,
    ) -> KariResult<RegistrationId> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(KariError::registration(topic.name(), "transport unavailable"));
        }

        let topics = self.topics.read();
        if let Some(entry) = topics.get(topic.name()) {
            if entry.type_name != type_name {
                return Err(KariError::registration(
                    topic.name(),
                    format!("topic carries {}, not {}", entry.type_name, type_name),
                ));
            }
        }
        Ok(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Loopback runtime for publishers and subscriptions living in one process
pub struct LocalTransport {
    router: Arc<Router>,
    mode: DeliveryMode,
    wake_tx: Option<Sender<Wake>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LocalTransport {
    pub fn new(mode: DeliveryMode) -> KariResult<Self> {
        let router = Arc::new(Router {
            topics: RwLock::new(HashMap::new()),
            delivery: Mutex::new(()),
            next_id: AtomicU64::new(1),
            alive: AtomicBool::new(true),
            delivered: AtomicU64::new(0),
        });

        let (wake_tx, worker) = match mode {
            DeliveryMode::Manual => (None, None),
            DeliveryMode::Background => {
                let (tx, rx) = channel::unbounded::<Wake>();
                let router = router.clone();
                let handle = std::thread::Builder::new()
                    .name("kari-delivery".to_string())
                    .spawn(move || {
                        while let Ok(wake) = rx.recv() {
                            match wake {
                                Wake::Topic(topic) => {
                                    router.deliver_topic(&topic);
                                }
                                Wake::Stop => break,
                            }
                        }
                        log::debug!("Delivery worker stopped");
                    })?;
                (Some(tx), Some(handle))
            }
        };

        Ok(Self {
            router,
            mode,
            wake_tx,
            worker: Mutex::new(worker),
        })
    }

    /// Deliver everything pending on every topic from the calling thread.
    /// Returns the number of frame deliveries (frames times subscribers).
    pub fn pump(&self) -> usize {
        let names: Vec<String> = self.router.topics.read().keys().cloned().collect();
        names
            .iter()
            .map(|topic| self.router.deliver_topic(topic))
            .sum()
    }

    /// Mark the runtime dead and stop the worker. Later registrations fail
    /// and pending or future frames are dropped.
    pub fn shutdown(&self) {
        if !self.router.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(tx) = &self.wake_tx {
            let _ = tx.send(Wake::Stop);
        }
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                log::error!("Delivery worker panicked");
            }
        }
        log::info!("Local transport shut down");
    }

    /// Whether at least one publisher is registered on `topic`
    pub fn is_advertised(&self, topic: &str) -> bool {
        self.router
            .topics
            .read()
            .get(topic)
            .is_some_and(|entry| !entry.publishers.is_empty())
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.router
            .topics
            .read()
            .get(topic)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Names of every topic with a live registration, sorted
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.router.topics.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Total frame deliveries since creation
    pub fn delivered_frames(&self) -> u64 {
        self.router.delivered.load(Ordering::Relaxed)
    }
}

impl Transport for LocalTransport {
    fn advertise(
        &self,
        topic: &TopicIdentity,
        type_name: &'static str,
        outbox: Arc<dyn FrameSource>,
    ) -> KariResult<RegistrationId> {
        let id = self.router.register(topic, type_name)?;
        let mut topics = self.router.topics.write();
        let entry = topics
            .entry(topic.name().to_string())
            .or_insert_with(|| TopicEntry {
                type_name,
                publishers: Vec::new(),
                subscribers: Vec::new(),
            });
        if entry.type_name != type_name {
            return Err(KariError::registration(topic.name(), "topic type changed during registration"));
        }
        entry.publishers.push((id, outbox));
        Ok(id)
    }

    /// Flushes the outbox to current subscribers before forgetting it, so a
    /// message accepted by `send` is not lost to a close.
    fn unadvertise(&self, topic: &str, id: RegistrationId) {
        let _serial = self.router.delivery.lock();
        let (source, sinks) = {
            let mut topics = self.router.topics.write();
            let Some(entry) = topics.get_mut(topic) else {
                return;
            };
            let Some(pos) = entry.publishers.iter().position(|(reg, _)| *reg == id) else {
                return;
            };
            let (_, source) = entry.publishers.remove(pos);
            let sinks = entry.sinks();
            if entry.is_empty() {
                topics.remove(topic);
            }
            (source, sinks)
        };

        self.router.fan_out(topic, source.take_frames(), &sinks);
    }

    fn subscribe(
        &self,
        topic: &TopicIdentity,
        type_name: &'static str,
        inbox: Arc<dyn FrameSink>,
    ) -> KariResult<RegistrationId> {
        let id = self.router.register(topic, type_name)?;
        let mut topics = self.router.topics.write();
        let entry = topics
            .entry(topic.name().to_string())
            .or_insert_with(|| TopicEntry {
                type_name,
                publishers: Vec::new(),
                subscribers: Vec::new(),
            });
        if entry.type_name != type_name {
            return Err(KariError::registration(topic.name(), "topic type changed during registration"));
        }
        entry.subscribers.push((id, inbox));
        Ok(id)
    }

    fn unsubscribe(&self, topic: &str, id: RegistrationId) {
        let mut topics = self.router.topics.write();
        if let Some(entry) = topics.get_mut(topic) {
            entry.subscribers.retain(|(reg, _)| *reg != id);
            if entry.is_empty() {
                topics.remove(topic);
            }
        }
    }

    fn notify(&self, topic: &str) {
        if let Some(tx) = &self.wake_tx {
            if self.router.alive.load(Ordering::Acquire) {
                let _ = tx.send(Wake::Topic(topic.to_string()));
            }
        }
    }

    fn is_ok(&self) -> bool {
        self.router.alive.load(Ordering::Acquire)
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTransport")
            .field("mode", &self.mode)
            .field("alive", &self.is_ok())
            .field("topics", &self.topics())
            .finish()
    }
}
