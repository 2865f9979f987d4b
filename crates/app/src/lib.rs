//! # relayhub-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceRepository` — CRUD and presence for devices
//!   - `PendingCommandStore` — one undelivered command per device
//!   - `Transport` — publish/subscribe client
//! - Define **driving/inbound ports** as use-case structs:
//!   - `RelayService` — device CRUD and acknowledged state changes
//!   - `Dispatcher` — consumes transport events
//! - Own the **acknowledgment engine**: waiter registry, ack coordinator,
//!   pending-command replay
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `relayhub-domain` only (plus `tokio` for sync primitives and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod coordinator;
pub mod dispatcher;
pub mod link;
pub mod ports;
pub mod router;
pub mod services;
pub mod waiter;

#[cfg(test)]
mod testing;
