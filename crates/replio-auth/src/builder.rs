//! Config-driven capability issuer

use crate::capability::{AccessMode, Capability, SnapConfig};
use chrono::Utc;
use replio_common::{CapabilityConfig, FileId};

/// Issues read-write capabilities for the reconfiguration protocol
#[derive(Clone, Debug)]
pub struct CapabilityBuilder {
    config: CapabilityConfig,
}

impl CapabilityBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new(config: CapabilityConfig) -> Self {
        Self { config }
    }

    /// Issue a capability for the given file at its current epoch.
    ///
    /// The capability is read-write, valid for the configured timeout, and
    /// identifies this service by the advertised address (empty when none is
    /// configured). Snapshots are disabled and replicate-on-close is off;
    /// reconfiguration never touches either.
    #[must_use]
    pub fn build(&self, file_id: &FileId, epoch: u32) -> Capability {
        let validity = self.config.timeout_secs;
        let expires_at = Utc::now().timestamp().max(0) as u64 + validity;
        let client_identity = self.config.advertised_address.clone().unwrap_or_default();

        Capability::new(
            file_id.clone(),
            AccessMode::ReadWrite,
            validity,
            expires_at,
            client_identity,
            epoch,
            false,
            SnapConfig::SnapsDisabled,
            0,
            &self.config.secret,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_uses_config() {
        let builder = CapabilityBuilder::new(CapabilityConfig {
            timeout_secs: 600,
            secret: "shared".into(),
            advertised_address: Some("mrc-1.example:32636".into()),
        });

        let file_id = FileId::new_unchecked("vol:42");
        let cap = builder.build(&file_id, 5);

        assert_eq!(cap.file_id(), &file_id);
        assert_eq!(cap.access_mode(), AccessMode::ReadWrite);
        assert_eq!(cap.validity_secs(), 600);
        assert_eq!(cap.client_identity(), "mrc-1.example:32636");
        assert_eq!(cap.epoch(), 5);
        assert!(!cap.replicate_on_close());
        assert_eq!(cap.snap_config(), SnapConfig::SnapsDisabled);
        assert!(cap.verify("shared"));

        let now = Utc::now().timestamp() as u64;
        assert!(!cap.has_expired(now));
        assert!(cap.has_expired(now + 601));
    }

    #[test]
    fn test_identity_defaults_to_empty() {
        let builder = CapabilityBuilder::new(CapabilityConfig {
            secret: "shared".into(),
            ..CapabilityConfig::default()
        });
        let cap = builder.build(&FileId::new_unchecked("vol:1"), 0);
        assert_eq!(cap.client_identity(), "");
    }
}
