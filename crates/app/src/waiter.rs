//! Waiter registry — in-flight `set_state` calls waiting for their ack.
//!
//! Each call registers a [`Waiter`] tagged with the device and the state it
//! expects, then awaits the returned [`WaiterGuard`]. Inbound acks resolve
//! every waiter matching `(device, state)`. Dropping the guard unregisters
//! the waiter, so nothing outlives the call that created it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;

use relayhub_domain::id::DeviceId;
use relayhub_domain::state::DeviceState;

struct Waiter {
    id: u64,
    expected: DeviceState,
    signal: oneshot::Sender<()>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    by_device: HashMap<DeviceId, Vec<Waiter>>,
}

/// Per-device index of outstanding waiters.
///
/// The lock is never held across an `.await`; registration and resolution
/// are both short, synchronous critical sections.
#[derive(Clone, Default)]
pub struct WaiterRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl WaiterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for `(device_id, expected)`.
    ///
    /// Registration is complete when this returns, so an ack dispatched
    /// afterwards is guaranteed to see it.
    #[must_use]
    pub fn register(&self, device_id: &DeviceId, expected: DeviceState) -> WaiterGuard {
        let (signal, receiver) = oneshot::channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id = inner.next_id.wrapping_add(1);
        inner
            .by_device
            .entry(device_id.clone())
            .or_default()
            .push(Waiter {
                id,
                expected,
                signal,
            });

        WaiterGuard {
            registry: self.clone(),
            device_id: device_id.clone(),
            id,
            receiver,
        }
    }

    /// Resolve every waiter registered for `(device_id, state)`.
    ///
    /// Returns how many waiters were woken. Zero is normal for late or
    /// unsolicited acks.
    pub fn resolve(&self, device_id: &DeviceId, state: DeviceState) -> usize {
        let mut inner = self.lock();
        let Some(waiters) = inner.by_device.get_mut(device_id) else {
            return 0;
        };

        let mut resolved = 0;
        let mut remaining = Vec::with_capacity(waiters.len());
        for waiter in waiters.drain(..) {
            if waiter.expected == state {
                // The receiver may already be gone if its call just timed out.
                if waiter.signal.send(()).is_ok() {
                    resolved += 1;
                }
            } else {
                remaining.push(waiter);
            }
        }

        if remaining.is_empty() {
            inner.by_device.remove(device_id);
        } else {
            *waiters = remaining;
        }
        resolved
    }

    /// Number of outstanding waiters for a device.
    #[must_use]
    pub fn outstanding(&self, device_id: &DeviceId) -> usize {
        self.lock().by_device.get(device_id).map_or(0, Vec::len)
    }

    fn remove(&self, device_id: &DeviceId, id: u64) {
        let mut inner = self.lock();
        if let Some(waiters) = inner.by_device.get_mut(device_id) {
            waiters.retain(|waiter| waiter.id != id);
            if waiters.is_empty() {
                inner.by_device.remove(device_id);
            }
        }
    }
}

/// Handle on a registered waiter. Unregisters on drop.
pub struct WaiterGuard {
    registry: WaiterRegistry,
    device_id: DeviceId,
    id: u64,
    receiver: oneshot::Receiver<()>,
}

impl WaiterGuard {
    /// Wait until the waiter is resolved or `timeout` elapses.
    ///
    /// Returns `true` only if a matching ack arrived before the deadline.
    pub async fn wait(mut self, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, &mut self.receiver).await,
            Ok(Ok(()))
        )
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.device_id, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::device_id;

    #[tokio::test]
    async fn should_resolve_waiter_with_matching_state() {
        let registry = WaiterRegistry::new();
        let id = device_id("AABBCCDDEEF1");
        let guard = registry.register(&id, DeviceState::On);

        assert_eq!(registry.resolve(&id, DeviceState::On), 1);
        assert!(guard.wait(Duration::from_secs(1)).await);
        assert_eq!(registry.outstanding(&id), 0);
    }

    #[tokio::test]
    async fn should_ignore_ack_with_other_state() {
        let registry = WaiterRegistry::new();
        let id = device_id("AABBCCDDEEF1");
        let _guard = registry.register(&id, DeviceState::On);

        assert_eq!(registry.resolve(&id, DeviceState::Off), 0);
        assert_eq!(registry.outstanding(&id), 1);
    }

    #[tokio::test]
    async fn should_ignore_ack_for_other_device() {
        let registry = WaiterRegistry::new();
        let a = device_id("AABBCCDDEEF1");
        let b = device_id("AABBCCDDEEF2");
        let _guard = registry.register(&a, DeviceState::On);

        assert_eq!(registry.resolve(&b, DeviceState::On), 0);
        assert_eq!(registry.outstanding(&a), 1);
    }

    #[tokio::test]
    async fn should_resolve_every_matching_waiter_and_keep_the_rest() {
        let registry = WaiterRegistry::new();
        let id = device_id("AABBCCDDEEF1");
        let first = registry.register(&id, DeviceState::On);
        let second = registry.register(&id, DeviceState::On);
        let other = registry.register(&id, DeviceState::Off);

        assert_eq!(registry.resolve(&id, DeviceState::On), 2);
        assert!(first.wait(Duration::from_millis(10)).await);
        assert!(second.wait(Duration::from_millis(10)).await);
        assert_eq!(registry.outstanding(&id), 1);
        drop(other);
        assert_eq!(registry.outstanding(&id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_and_unregister_when_no_ack() {
        let registry = WaiterRegistry::new();
        let id = device_id("AABBCCDDEEF1");
        let guard = registry.register(&id, DeviceState::On);

        assert!(!guard.wait(Duration::from_secs(5)).await);
        assert_eq!(registry.outstanding(&id), 0);
        assert_eq!(registry.resolve(&id, DeviceState::On), 0);
    }

    #[test]
    fn should_unregister_on_drop() {
        let registry = WaiterRegistry::new();
        let id = device_id("AABBCCDDEEF1");
        let guard = registry.register(&id, DeviceState::Off);
        assert_eq!(registry.outstanding(&id), 1);

        drop(guard);
        assert_eq!(registry.outstanding(&id), 0);
    }
}
