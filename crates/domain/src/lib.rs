//! # relayhub-domain
//!
//! Pure domain model for the relayhub command relay.
//!
//! ## Responsibilities
//! - Foundational types: device identifiers, error conventions, timestamps
//! - Define **Devices** (remote relays and their confirmed state)
//! - Define **Pending commands** (the latest unacknowledged command per device)
//! - Define the **wire messages** exchanged with devices
//! - Define the **topic scheme** and how topics are parsed
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod message;
pub mod pending;
pub mod state;
pub mod topic;
