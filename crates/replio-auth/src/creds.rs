//! File credentials envelope

use crate::capability::Capability;
use replio_common::XLocSet;
use serde::{Deserialize, Serialize};

/// The credential envelope attached to OSD RPCs: the signed capability plus
/// the replica location set the caller is operating under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCredentials {
    /// Capability authorizing the operation
    pub capability: Capability,
    /// Replica location set the operation runs against
    pub xloc_set: XLocSet,
}

impl FileCredentials {
    /// Create a new credentials envelope
    #[must_use]
    pub fn new(capability: Capability, xloc_set: XLocSet) -> Self {
        Self {
            capability,
            xloc_set,
        }
    }
}
