//! # relayhub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **JSON API** for registering devices and switching them
//!   (`/api/devices`, `/api/devices/{id}/state`)
//! - Report broker link health on `/health`
//! - Map HTTP requests into relay service calls (driving adapter)
//! - Map relay results and errors into HTTP responses
//!
//! ## Dependency rule
//! Depends on `relayhub-app` (for port traits and services) and `relayhub-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
