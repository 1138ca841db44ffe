//! HMAC-signed file capabilities
//!
//! A capability is a short-lived token authorizing operations on one file.
//! The signature is an HMAC-SHA256 over the canonical field string, keyed by
//! the shared secret configured on the metadata service; OSDs hold the same
//! secret and verify before serving.

use hmac::{Hmac, Mac};
use replio_common::FileId;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// File access mode a capability grants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    /// Read only
    ReadOnly,
    /// Write only
    WriteOnly,
    /// Read and write
    ReadWrite,
}

impl AccessMode {
    /// POSIX open-flag style encoding of the mode
    #[must_use]
    pub const fn as_mode_bits(&self) -> u32 {
        match self {
            Self::ReadOnly => 0,
            Self::WriteOnly => 1,
            Self::ReadWrite => 2,
        }
    }
}

/// Snapshot configuration carried in a capability
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapConfig {
    /// Snapshots are disabled for the file
    SnapsDisabled,
    /// The capability grants access to the current version
    AccessCurrent,
    /// The capability grants access to the snapshot at `snap_timestamp`
    AccessSnap,
}

impl SnapConfig {
    const fn as_tag(&self) -> u8 {
        match self {
            Self::SnapsDisabled => 0,
            Self::AccessCurrent => 1,
            Self::AccessSnap => 2,
        }
    }
}

/// Short-lived signed token authorizing operations on a file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    file_id: FileId,
    access_mode: AccessMode,
    validity_secs: u64,
    expires_at: u64,
    client_identity: String,
    epoch: u32,
    replicate_on_close: bool,
    snap_config: SnapConfig,
    snap_timestamp: u64,
    signature: String,
}

impl Capability {
    /// Create and sign a new capability
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        file_id: FileId,
        access_mode: AccessMode,
        validity_secs: u64,
        expires_at: u64,
        client_identity: impl Into<String>,
        epoch: u32,
        replicate_on_close: bool,
        snap_config: SnapConfig,
        snap_timestamp: u64,
        secret: &str,
    ) -> Self {
        let client_identity = client_identity.into();
        let signature = compute_signature(
            &file_id,
            access_mode,
            expires_at,
            &client_identity,
            epoch,
            replicate_on_close,
            snap_config,
            snap_timestamp,
            secret,
        );
        Self {
            file_id,
            access_mode,
            validity_secs,
            expires_at,
            client_identity,
            epoch,
            replicate_on_close,
            snap_config,
            snap_timestamp,
            signature,
        }
    }

    /// The file this capability authorizes
    #[must_use]
    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    /// The granted access mode
    #[must_use]
    pub fn access_mode(&self) -> AccessMode {
        self.access_mode
    }

    /// Validity the capability was issued with, in seconds
    #[must_use]
    pub fn validity_secs(&self) -> u64 {
        self.validity_secs
    }

    /// Expiry as unix seconds
    #[must_use]
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Identity of the client the capability was issued to
    #[must_use]
    pub fn client_identity(&self) -> &str {
        &self.client_identity
    }

    /// The file's epoch at issue time
    #[must_use]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Whether the file must be replicated when closed
    #[must_use]
    pub fn replicate_on_close(&self) -> bool {
        self.replicate_on_close
    }

    /// Snapshot configuration
    #[must_use]
    pub fn snap_config(&self) -> SnapConfig {
        self.snap_config
    }

    /// Snapshot timestamp, 0 unless `snap_config` is `AccessSnap`
    #[must_use]
    pub fn snap_timestamp(&self) -> u64 {
        self.snap_timestamp
    }

    /// The hex-encoded signature
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Whether the capability has expired at `now` (unix seconds)
    #[must_use]
    pub fn has_expired(&self, now_secs: u64) -> bool {
        now_secs > self.expires_at
    }

    /// Verify the signature against the shared secret
    #[must_use]
    pub fn verify(&self, secret: &str) -> bool {
        let expected = compute_signature(
            &self.file_id,
            self.access_mode,
            self.expires_at,
            &self.client_identity,
            self.epoch,
            self.replicate_on_close,
            self.snap_config,
            self.snap_timestamp,
            secret,
        );
        self.signature == expected
    }
}

#[allow(clippy::too_many_arguments)]
fn compute_signature(
    file_id: &FileId,
    access_mode: AccessMode,
    expires_at: u64,
    client_identity: &str,
    epoch: u32,
    replicate_on_close: bool,
    snap_config: SnapConfig,
    snap_timestamp: u64,
    secret: &str,
) -> String {
    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}",
        file_id,
        access_mode.as_mode_bits(),
        expires_at,
        client_identity,
        epoch,
        u8::from(replicate_on_close),
        snap_config.as_tag(),
        snap_timestamp,
    );

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
