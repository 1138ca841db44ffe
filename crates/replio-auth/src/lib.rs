//! Replio Auth - Capabilities and file credentials
//!
//! This crate provides:
//! - Short-lived HMAC-signed capabilities authorizing operations on a file
//! - The config-driven capability builder used by the coordinator
//! - The `FileCredentials` envelope attached to OSD RPCs

pub mod builder;
pub mod capability;
pub mod creds;

pub use builder::CapabilityBuilder;
pub use capability::{AccessMode, Capability, SnapConfig};
pub use creds::FileCredentials;
