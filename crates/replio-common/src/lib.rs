//! Replio Common - Shared types and utilities
//!
//! This crate provides the core data model of the replica reconfiguration
//! subsystem (replica location sets, striping descriptors, replica status
//! reports), the common error taxonomy, and configuration types used across
//! all replio components.

pub mod config;
pub mod error;
pub mod striping;
pub mod types;

pub use config::{CapabilityConfig, Config, CoordinatorConfig, OsdClientConfig};
pub use error::{Errno, Error, ErrorRecord, ErrorType, Result};
pub use striping::{StripingPolicy, StripingRecordError};
pub use types::*;
