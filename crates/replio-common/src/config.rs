//! Configuration types for replio
//!
//! The embedding metadata server owns loading and merging; these are the
//! plain structures its components consume.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the reconfiguration subsystem
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Coordinator configuration
    pub coordinator: CoordinatorConfig,
    /// OSD client configuration
    pub osd_client: OsdClientConfig,
    /// Capability issuing configuration
    pub capability: CapabilityConfig,
}

/// Coordinator configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How long a silent primary's lease must be assumed valid (milliseconds)
    pub lease_timeout_ms: u64,
}

impl CoordinatorConfig {
    /// The lease timeout as a duration
    #[must_use]
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_millis(self.lease_timeout_ms)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lease_timeout_ms: 15_000,
        }
    }
}

/// OSD client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OsdClientConfig {
    /// Per-RPC deadline (milliseconds)
    pub rpc_timeout_ms: u64,
    /// Retries per call on transient failures
    pub max_retries: u32,
}

impl OsdClientConfig {
    /// The per-RPC deadline as a duration
    #[must_use]
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

impl Default for OsdClientConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: 30_000,
            max_retries: 2,
        }
    }
}

/// Capability issuing configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// Validity of issued capabilities (seconds)
    pub timeout_secs: u64,
    /// Shared secret for capability signatures
    pub secret: String,
    /// Advertised host/port used as the client identity of issued
    /// capabilities; the identity is left empty when unset
    pub advertised_address: Option<String>,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            secret: String::new(),
            advertised_address: None,
        }
    }
}
