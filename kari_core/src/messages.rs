//! Message types carried over KARI topics
//!
//! Each type names its wire type through [`Message::TYPE_NAME`]; a topic is
//! bound to the first type registered on it and rejects any other.

use crate::core::LogSummary;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A value that can travel through a topic
pub trait Message: Serialize + DeserializeOwned + Clone + Send + 'static + LogSummary {
    /// Wire type name, e.g. `std_msgs/String`
    const TYPE_NAME: &'static str;
}

/// Plain text message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringMsg {
    pub data: String,
}

impl StringMsg {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

impl Message for StringMsg {
    const TYPE_NAME: &'static str = "std_msgs/String";
}

impl LogSummary for StringMsg {
    fn log_summary(&self) -> String {
        self.data.clone()
    }
}

/// Wall-clock stamp split into seconds and nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Time {
    pub sec: u32,
    pub nsec: u32,
}

impl Time {
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            sec: now.timestamp().max(0) as u32,
            nsec: now.timestamp_subsec_nanos(),
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nsec as f64 * 1e-9
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub seq: u32,
    pub stamp: Time,
    pub frame_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

/// Pose sample with a header, as streamed by a flight controller bridge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

impl PoseStamped {
    /// Pose at `position` with identity orientation, stamped now
    pub fn at(frame_id: &str, position: Point) -> Self {
        Self {
            header: Header {
                seq: 0,
                stamp: Time::now(),
                frame_id: frame_id.to_string(),
            },
            pose: Pose {
                position,
                orientation: Quaternion::identity(),
            },
        }
    }

    pub fn position(&self) -> Point {
        self.pose.position
    }

    pub fn stamp(&self) -> Time {
        self.header.stamp
    }
}

impl Message for PoseStamped {
    const TYPE_NAME: &'static str = "geometry_msgs/PoseStamped";
}

impl LogSummary for PoseStamped {
    fn log_summary(&self) -> String {
        let p = &self.pose.position;
        format!(
            "PoseStamped(frame={}, pos=({:.3}, {:.3}, {:.3}), t={:.3})",
            self.header.frame_id,
            p.x,
            p.y,
            p.z,
            self.header.stamp.as_secs_f64()
        )
    }
}
