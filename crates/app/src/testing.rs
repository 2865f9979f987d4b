//! In-memory port implementations shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use relayhub_domain::device::Device;
use relayhub_domain::error::RelayError;
use relayhub_domain::id::DeviceId;
use relayhub_domain::pending::PendingCommand;
use relayhub_domain::state::DeviceState;
use relayhub_domain::time::Timestamp;

use crate::ports::{DeviceRepository, PendingCommandStore, PublishOptions, QoS, Transport};

pub fn device_id(raw: &str) -> DeviceId {
    DeviceId::new(raw).unwrap()
}

pub fn device(raw: &str, name: &str) -> Device {
    Device::builder().id(raw).name(name).build().unwrap()
}

#[derive(Default)]
pub struct InMemoryDeviceRepo {
    pub store: Mutex<HashMap<DeviceId, Device>>,
    pub fail_writes: AtomicBool,
}

impl InMemoryDeviceRepo {
    pub fn with(devices: impl IntoIterator<Item = Device>) -> Self {
        let repo = Self::default();
        {
            let mut store = repo.store.lock().unwrap();
            for device in devices {
                store.insert(device.id.clone(), device);
            }
        }
        repo
    }

    pub fn get(&self, id: &DeviceId) -> Option<Device> {
        self.store.lock().unwrap().get(id).cloned()
    }

    fn check_writable(&self) -> Result<(), RelayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RelayError::persistence(std::io::Error::other(
                "device table locked",
            )));
        }
        Ok(())
    }
}

impl DeviceRepository for InMemoryDeviceRepo {
    async fn create(&self, device: Device) -> Result<Device, RelayError> {
        self.check_writable()?;
        self.store
            .lock()
            .unwrap()
            .insert(device.id.clone(), device.clone());
        Ok(device)
    }

    async fn get_by_id(&self, id: &DeviceId) -> Result<Option<Device>, RelayError> {
        Ok(self.get(id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Device>, RelayError> {
        let store = self.store.lock().unwrap();
        Ok(store.values().find(|d| d.name == name).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Device>, RelayError> {
        Ok(self.store.lock().unwrap().values().cloned().collect())
    }

    async fn delete(&self, id: &DeviceId) -> Result<bool, RelayError> {
        self.check_writable()?;
        Ok(self.store.lock().unwrap().remove(id).is_some())
    }

    async fn set_online(&self, id: &DeviceId, online: bool) -> Result<Option<bool>, RelayError> {
        self.check_writable()?;
        let mut store = self.store.lock().unwrap();
        Ok(store
            .get_mut(id)
            .map(|device| std::mem::replace(&mut device.online, online)))
    }

    async fn confirm_state(
        &self,
        id: &DeviceId,
        state: DeviceState,
        at: Timestamp,
    ) -> Result<Option<Device>, RelayError> {
        self.check_writable()?;
        let mut store = self.store.lock().unwrap();
        Ok(store.get_mut(id).map(|device| {
            device.confirm_state(state, at);
            device.clone()
        }))
    }
}

/// Pending store that keeps every row it is given, so tests can verify the
/// single-row invariant instead of having it enforced by a map.
#[derive(Default)]
pub struct InMemoryPendingStore {
    pub rows: Mutex<Vec<PendingCommand>>,
    pub fail_writes: AtomicBool,
}

impl InMemoryPendingStore {
    pub fn rows_for(&self, id: &DeviceId) -> Vec<PendingCommand> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| &row.device_id == id)
            .cloned()
            .collect()
    }
}

impl PendingCommandStore for InMemoryPendingStore {
    async fn save_pending(&self, command: &PendingCommand) -> Result<(), RelayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RelayError::persistence(std::io::Error::other("disk full")));
        }
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|row| row.device_id != command.device_id);
        rows.push(command.clone());
        Ok(())
    }

    async fn take_latest_pending(
        &self,
        id: &DeviceId,
    ) -> Result<Option<PendingCommand>, RelayError> {
        Ok(self.rows_for(id).pop())
    }

    async fn clear_pending(&self, id: &DeviceId) -> Result<u64, RelayError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| &row.device_id != id);
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub options: PublishOptions,
}

impl Published {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.payload).unwrap()
    }
}

/// Transport that records publishes and reports each one on a channel.
pub struct RecordingTransport {
    pub published: Mutex<Vec<Published>>,
    pub subscriptions: Mutex<Vec<(String, QoS)>>,
    pub connected: AtomicBool,
    notify: mpsc::UnboundedSender<Published>,
}

impl RecordingTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Published>) {
        let (notify, rx) = mpsc::unbounded_channel();
        let transport = Self {
            published: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            notify,
        };
        (transport, rx)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn published_to(&self, topic: &str) -> Vec<Published> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect()
    }
}

impl Transport for RecordingTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        options: PublishOptions,
    ) -> Result<(), RelayError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(RelayError::transport(std::io::Error::other(
                "not connected",
            )));
        }
        let published = Published {
            topic: topic.to_string(),
            payload: String::from_utf8(payload.to_vec()).unwrap(),
            options,
        };
        self.published.lock().unwrap().push(published.clone());
        let _ = self.notify.send(published);
        Ok(())
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<(), RelayError> {
        self.subscriptions
            .lock()
            .unwrap()
            .push((filter.to_string(), qos));
        Ok(())
    }
}
