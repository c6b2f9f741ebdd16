//! Estimator node configuration
//!
//! Loaded once from TOML at startup; any missing key falls back to the
//! values the node has always run with (10 Hz, `chatter`, the MAVROS local
//! pose topic, queues of 1000).

use kari_core::communication::TopicIdentity;
use kari_core::{KariError, KariResult, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_NODE_NAME: &str = "kari_estimator";
pub const DEFAULT_CHATTER_TOPIC: &str = "chatter";
pub const DEFAULT_POSE_TOPIC: &str = "/mavros/local_position/pose";
pub const DEFAULT_QUEUE_SIZE: usize = 1000;

/// One topic binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub topic: String,
    pub queue_size: usize,
}

impl TopicConfig {
    pub fn new(topic: &str, queue_size: usize) -> Self {
        Self {
            topic: topic.to_string(),
            queue_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub node_name: String,
    pub publish: TopicConfig,
    pub pose: TopicConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            node_name: DEFAULT_NODE_NAME.to_string(),
            publish: TopicConfig::new(DEFAULT_CHATTER_TOPIC, DEFAULT_QUEUE_SIZE),
            pose: TopicConfig::new(DEFAULT_POSE_TOPIC, DEFAULT_QUEUE_SIZE),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl EstimatorConfig {
    /// Load config from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> KariResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            KariError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse config from a TOML string
    pub fn from_toml_str(contents: &str) -> KariResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| KariError::config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> KariResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| KariError::config(format!("Failed to serialize config: {}", e)))
    }

    /// Reject settings the channels or the loop would refuse at startup
    pub fn validate(&self) -> KariResult<()> {
        if self.node_name.trim().is_empty() {
            return Err(KariError::config("node_name must not be empty"));
        }
        TopicIdentity::new(&self.publish.topic, self.publish.queue_size)?;
        TopicIdentity::new(&self.pose.topic, self.pose.queue_size)?;
        self.scheduler.validate()
    }
}
