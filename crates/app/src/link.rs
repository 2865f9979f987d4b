//! Link status of our own transport connection.

use std::sync::Arc;

use tokio::sync::watch;

/// Whether the server is currently connected to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Connected and subscribed.
    Online,
    /// Disconnected; commands still fall back to the pending store.
    Degraded,
}

/// Shared, cheaply cloneable holder of the current [`LinkStatus`].
///
/// Starts out [`Degraded`](LinkStatus::Degraded) until the dispatcher sees
/// the first `Connected` event.
#[derive(Clone)]
pub struct LinkMonitor {
    sender: Arc<watch::Sender<LinkStatus>>,
}

impl Default for LinkMonitor {
    fn default() -> Self {
        let (sender, _) = watch::channel(LinkStatus::Degraded);
        Self {
            sender: Arc::new(sender),
        }
    }
}

impl LinkMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        *self.sender.borrow()
    }

    /// Record a new status. Returns the previous one.
    pub fn set(&self, status: LinkStatus) -> LinkStatus {
        self.sender.send_replace(status)
    }

    /// Watch status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_start_degraded() {
        assert_eq!(LinkMonitor::new().status(), LinkStatus::Degraded);
    }

    #[test]
    fn should_share_status_between_clones() {
        let monitor = LinkMonitor::new();
        let clone = monitor.clone();

        assert_eq!(monitor.set(LinkStatus::Online), LinkStatus::Degraded);
        assert_eq!(clone.status(), LinkStatus::Online);
    }

    #[tokio::test]
    async fn should_notify_subscribers() {
        let monitor = LinkMonitor::new();
        let mut rx = monitor.subscribe();

        monitor.set(LinkStatus::Online);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LinkStatus::Online);
    }
}
