//! # KARI Scheduling
//!
//! Fixed-rate loop that drives a single node:
//!
//! - **Scheduler**: init → tick per period → shutdown, stoppable at any tick
//! - **Rate**: drift-free fixed-rate sleeper without catch-up bursts
//! - **ShutdownToken**: explicit cancellation passed into the loop
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kari_core::{Scheduler, SchedulerConfig, ShutdownToken};
//!
//! let token = ShutdownToken::new();
//! token.cancel_on_ctrlc()?;
//! let mut scheduler = Scheduler::new(SchedulerConfig::default(), token).with_name("estimator");
//! scheduler.run(&mut node)?;
//! ```

pub mod config;
pub mod rate;
pub mod scheduler;
pub mod shutdown;

pub use config::SchedulerConfig;
pub use rate::Rate;
pub use scheduler::Scheduler;
pub use shutdown::ShutdownToken;
