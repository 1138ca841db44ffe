//! Typed OSD client with deadlines and retries

use crate::transport::{InvalidateResponse, OsdTransport};
use replio_auth::FileCredentials;
use replio_common::{Error, FileId, OsdClientConfig, OsdUuid, Result};
use std::sync::Arc;
use tonic::{Code, Status};
use tracing::{debug, warn};

/// Client facade for the OSD operations the coordinator consumes.
///
/// Every call is bounded by the configured per-RPC deadline and retried on
/// transient failures up to the configured retry count. Cheap to clone; the
/// transport is shared.
#[derive(Clone)]
pub struct OsdClient {
    transport: Arc<dyn OsdTransport>,
    config: OsdClientConfig,
}

impl OsdClient {
    /// Create a new client over the given transport
    #[must_use]
    pub fn new(transport: Arc<dyn OsdTransport>, config: OsdClientConfig) -> Self {
        Self { transport, config }
    }

    /// Invalidate the file's replica on `osd` and collect its state report
    pub async fn invalidate(
        &self,
        osd: &OsdUuid,
        creds: &FileCredentials,
        file_id: &FileId,
    ) -> Result<InvalidateResponse> {
        let mut attempt = 0;
        loop {
            let call = self.transport.xloc_set_invalidate(osd, creds, file_id);
            match tokio::time::timeout(self.config.rpc_timeout(), call).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(status)) if retryable(&status) && attempt < self.config.max_retries => {
                    warn!(%osd, %file_id, %status, attempt, "invalidate failed, retrying");
                }
                Ok(Err(status)) => return Err(transport_error(osd, &status)),
                Err(_) if attempt < self.config.max_retries => {
                    warn!(%osd, %file_id, attempt, "invalidate timed out, retrying");
                }
                Err(_) => return Err(Error::Timeout),
            }
            attempt += 1;
        }
    }

    /// Trigger replication priming on a fresh replica by reading a single
    /// byte of object 0.
    pub async fn read_probe(
        &self,
        osd: &OsdUuid,
        creds: &FileCredentials,
        file_id: &FileId,
    ) -> Result<()> {
        let mut attempt = 0;
        loop {
            let call = self.transport.read(osd, creds, file_id, 0, 0, 0, 1);
            match tokio::time::timeout(self.config.rpc_timeout(), call).await {
                Ok(Ok(data)) => {
                    debug!(%osd, %file_id, bytes = data.len(), "read probe completed");
                    return Ok(());
                }
                Ok(Err(status)) if retryable(&status) && attempt < self.config.max_retries => {
                    warn!(%osd, %file_id, %status, attempt, "read probe failed, retrying");
                }
                Ok(Err(status)) => return Err(transport_error(osd, &status)),
                Err(_) if attempt < self.config.max_retries => {
                    warn!(%osd, %file_id, attempt, "read probe timed out, retrying");
                }
                Err(_) => return Err(Error::Timeout),
            }
            attempt += 1;
        }
    }
}

fn retryable(status: &Status) -> bool {
    matches!(
        status.code(),
        Code::Unavailable | Code::DeadlineExceeded | Code::Aborted
    )
}

fn transport_error(osd: &OsdUuid, status: &Status) -> Error {
    Error::Transport {
        osd: osd.to_string(),
        message: status.to_string(),
    }
}
