use crate::error::KariResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop flag passed into the scheduler
///
/// Clones share the flag. Cancelling is one-way.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Liveness query: true until cancelled
    pub fn is_ok(&self) -> bool {
        !self.is_cancelled()
    }

    /// Cancel this token on Ctrl+C / SIGTERM. Only one handler can be
    /// installed per process.
    pub fn cancel_on_ctrlc(&self) -> KariResult<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            log::warn!("Termination signal received! Shutting down...");
            token.cancel();
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = ShutdownToken::new();
        let other = token.clone();
        assert!(token.is_ok());

        other.cancel();
        assert!(token.is_cancelled());
        assert!(!token.is_ok());
    }

    // Only test in this binary that installs the process-wide handler
    #[cfg(unix)]
    #[test]
    fn test_sigterm_cancels_token() {
        use std::time::{Duration, Instant};

        let token = ShutdownToken::new();
        token.cancel_on_ctrlc().unwrap();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let deadline = Instant::now() + Duration::from_secs(2);
        while !token.is_cancelled() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(token.is_cancelled());
    }
}
