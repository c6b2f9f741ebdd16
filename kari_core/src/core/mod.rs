//! # Core types and traits for KARI nodes
//!
//! - **Node**: the per-tick unit of work driven by the scheduler
//! - **NodeInfo**: runtime context handed to a node on every call
//!
//! ## Node Lifecycle
//!
//! 1. **Construction** - channels are opened, registration errors surface here
//! 2. **Initialization** - `init()` is called once before the first tick
//! 3. **Execution** - `tick()` is called once per scheduler period
//! 4. **Shutdown** - `shutdown()` closes channels before the loop returns

pub mod node;

pub use node::{LogSummary, Node, NodeInfo, NodeMetrics, NodeState};
