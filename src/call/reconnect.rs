use std::time::Duration;
use tokio::task::JoinHandle;

/// Bounded-retry reconnection policy
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 3,
        }
    }
}

impl ReconnectPolicy {
    /// Whether the attempt budget is already spent
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

/// Slot holding the pending retry timer
///
/// At most one retry may be pending per call; arming a new timer first
/// cancels the previous one, and teardown cancels whatever is left.
#[derive(Debug, Default)]
pub struct RetrySlot {
    handle: Option<JoinHandle<()>>,
}

impl RetrySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, handle: JoinHandle<()>) {
        self.cancel();
        self.handle = Some(handle);
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RetrySlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
