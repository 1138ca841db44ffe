//! Metadata callback bridge
//!
//! The coordinator holds no metadata locks. To install a new XLocSet it
//! enqueues an install request into the metadata processing stage and awaits
//! the completion signal; the stage executes the operation's callback under
//! its own concurrency discipline (single writer per file, one database
//! transaction). Either the new set becomes visible to all future
//! operations or nothing changes.

use async_trait::async_trait;
use replio_common::{Error, FileId, Result, XLocSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

/// Installs a new XLocSet on behalf of the originating metadata operation.
///
/// Implementations must, under the metadata transaction, replace the file's
/// canonical XLocList with `xloc_set` and finish the request. A
/// `NOT_ALLOWED` database verdict maps to `Error::PermissionDenied`; a
/// replicated metadata service that is not the master for the volume maps
/// to `Error::Redirect`.
#[async_trait]
pub trait InstallCallback: Send + Sync {
    async fn install_xloc_set(&self, file_id: &FileId, xloc_set: &XLocSet) -> Result<()>;
}

/// One install hand-off travelling from the coordinator to the stage
pub struct InstallRequest {
    /// The reconfigured file
    pub file_id: FileId,
    /// The new set, version already bumped
    pub xloc_set: XLocSet,
    /// The originating operation's install callback
    pub callback: Arc<dyn InstallCallback>,
    done: oneshot::Sender<Result<()>>,
}

impl InstallRequest {
    /// Report the install outcome back to the coordinator. Consumers that
    /// replace [`MetadataStage`] must call this exactly once per request.
    pub fn complete(self, result: Result<()>) {
        let _ = self.done.send(result);
    }
}

/// Producer half of the bridge, held by the coordinator
#[derive(Clone)]
pub struct MetadataBridge {
    tx: mpsc::UnboundedSender<InstallRequest>,
}

impl MetadataBridge {
    /// Create a bridge and the receiving end for the processing stage
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<InstallRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue an install and wait for the stage to complete it
    pub async fn install(
        &self,
        file_id: FileId,
        xloc_set: XLocSet,
        callback: Arc<dyn InstallCallback>,
    ) -> Result<()> {
        let (done, done_rx) = oneshot::channel();
        self.tx
            .send(InstallRequest {
                file_id,
                xloc_set,
                callback,
                done,
            })
            .map_err(|_| Error::internal("metadata processing stage is gone"))?;

        done_rx
            .await
            .map_err(|_| Error::internal("metadata processing stage dropped the install request"))?
    }
}

/// Minimal single-consumer executor of install requests.
///
/// Embedding servers with their own processing stage can drain the receiver
/// themselves instead; the bridge only requires that every request is
/// eventually completed.
pub struct MetadataStage {
    rx: mpsc::UnboundedReceiver<InstallRequest>,
}

impl MetadataStage {
    /// Create a stage over the bridge's receiving end
    #[must_use]
    pub fn new(rx: mpsc::UnboundedReceiver<InstallRequest>) -> Self {
        Self { rx }
    }

    /// Spawn the stage onto the runtime
    pub fn spawn(rx: mpsc::UnboundedReceiver<InstallRequest>) -> JoinHandle<()> {
        tokio::spawn(Self::new(rx).run())
    }

    /// Serially execute install requests until the bridge is dropped
    pub async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            let result = request
                .callback
                .install_xloc_set(&request.file_id, &request.xloc_set)
                .await;
            request.complete(result);
        }
        debug!("metadata stage stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replio_common::{ReplicaUpdatePolicy, StripingPolicy, XLoc};

    struct FixedCallback {
        result: std::result::Result<(), String>,
    }

    #[async_trait]
    impl InstallCallback for FixedCallback {
        async fn install_xloc_set(&self, _file_id: &FileId, _xloc_set: &XLocSet) -> Result<()> {
            self.result
                .clone()
                .map_err(Error::PermissionDenied)
        }
    }

    fn xloc_set() -> XLocSet {
        let striping = StripingPolicy::new("RAID0", 128, 1).unwrap();
        let xloc = XLoc::new(striping, vec![replio_common::OsdUuid::new()], 0).unwrap();
        XLocSet::new(vec![xloc], ReplicaUpdatePolicy::Ronly, 1, true)
    }

    #[tokio::test]
    async fn test_install_round_trip() {
        let (bridge, rx) = MetadataBridge::channel();
        let stage = MetadataStage::spawn(rx);

        let callback = Arc::new(FixedCallback { result: Ok(()) });
        bridge
            .install(FileId::new_unchecked("vol:1"), xloc_set(), callback)
            .await
            .unwrap();

        drop(bridge);
        stage.await.unwrap();
    }

    #[tokio::test]
    async fn test_install_failure_propagates() {
        let (bridge, rx) = MetadataBridge::channel();
        MetadataStage::spawn(rx);

        let callback = Arc::new(FixedCallback {
            result: Err("NOT_ALLOWED".into()),
        });
        let err = bridge
            .install(FileId::new_unchecked("vol:1"), xloc_set(), callback)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_dropped_stage_is_an_error() {
        let (bridge, rx) = MetadataBridge::channel();
        drop(rx);

        let callback = Arc::new(FixedCallback { result: Ok(()) });
        let err = bridge
            .install(FileId::new_unchecked("vol:1"), xloc_set(), callback)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)), "got {err}");
    }
}
