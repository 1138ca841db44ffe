//! OSD RPC transport seam
//!
//! The transport carries raw RPCs to one OSD and owns address resolution and
//! connection management. Implementations must be safe for concurrent use;
//! the production implementation wraps the generated gRPC client, tests use
//! scripted in-memory transports.

use async_trait::async_trait;
use bytes::Bytes;
use replio_auth::FileCredentials;
use replio_common::{FileId, OsdUuid, ReplicaStatus};
use tonic::Status;

/// Response to an XLocSet invalidation call
#[derive(Clone, Debug, Default)]
pub struct InvalidateResponse {
    /// Whether the replica held the primary lease when invalidated
    pub is_primary: bool,
    /// The replica's state report, if it produced one
    pub status: Option<ReplicaStatus>,
}

/// Raw RPC surface of one OSD, addressed by UUID
#[async_trait]
pub trait OsdTransport: Send + Sync {
    /// Mark the file's replica on `osd` invalid for new client I/O and
    /// return its current state report.
    async fn xloc_set_invalidate(
        &self,
        osd: &OsdUuid,
        creds: &FileCredentials,
        file_id: &FileId,
    ) -> Result<InvalidateResponse, Status>;

    /// Read `length` bytes of object `object_number` from the file's replica
    /// on `osd`. Reading from a fresh replica triggers replication priming.
    #[allow(clippy::too_many_arguments)]
    async fn read(
        &self,
        osd: &OsdUuid,
        creds: &FileCredentials,
        file_id: &FileId,
        object_number: u64,
        object_version: u64,
        offset: u32,
        length: u32,
    ) -> Result<Bytes, Status>;
}
