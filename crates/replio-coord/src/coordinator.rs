//! The XLocSet change coordinator
//!
//! A single dedicated worker drains a FIFO queue of reconfiguration
//! requests, so at most one reconfiguration is in flight at any time.
//! Reconfiguration is rare; serializing it avoids quorum interference
//! between concurrent policy changes on the same file.
//!
//! For an AddReplicas request the worker runs:
//!
//! ```text
//! [INVALIDATE-FANOUT] -> [COLLECT-STATES] -> [DECIDE]
//!        (current replicas, lease wait)        |
//!                      +-----------------------+---------------+
//!                      v                       v               v
//!                RONLY branch        [PRIME-NEW-REPLICAS]   (error)
//!                      |                       |               |
//!                      +--> [INSTALL-XLOCSET] <+               v
//!                                 |                     error record on
//!                                 v                     the reply channel
//!                              success
//! ```
//!
//! Every failure before INSTALL leaves the canonical XLocList untouched.

use crate::bridge::{InstallCallback, MetadataBridge};
use crate::request::{
    ReconfigSuccess, RequestHandle, RequestId, RequestKind, RequestMethod,
};
use replio_auth::{Capability, CapabilityBuilder, FileCredentials};
use replio_client::OsdClient;
use replio_common::{
    Config, Error, ErrorRecord, ErrorType, FileId, ReplicaStatus, ReplicaUpdatePolicy, Result,
    XLoc, XLocSet,
};
use replio_policy::{
    backup_can_read, calculate_authoritative_state, minimal_majority, num_required_acks, QuorumOp,
};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Submission handle of the coordinator.
///
/// Producers (metadata operations) submit request methods concurrently; the
/// worker owns each request exclusively from dequeue to completion.
pub struct XLocSetCoordinator {
    tx: mpsc::UnboundedSender<RequestMethod>,
    shutdown: watch::Sender<bool>,
    capabilities: CapabilityBuilder,
}

impl XLocSetCoordinator {
    /// Spawn the coordinator worker and return the submission handle
    pub fn spawn(
        client: OsdClient,
        bridge: MetadataBridge,
        config: &Config,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let worker = Worker {
            rx,
            shutdown: shutdown_rx,
            client,
            bridge,
            lease_timeout: config.coordinator.lease_timeout(),
        };
        let handle = tokio::spawn(worker.run());

        (
            Self {
                tx,
                shutdown,
                capabilities: CapabilityBuilder::new(config.capability.clone()),
            },
            handle,
        )
    }

    /// Submit an AddReplicas reconfiguration.
    ///
    /// `ext_xloc_set` must be `cur_xloc_set` extended by `new_replicas` as
    /// its suffix, at the same version; `file_epoch` is the file's current
    /// epoch used for the capability.
    pub fn add_replicas(
        &self,
        file_id: FileId,
        file_epoch: u32,
        cur_xloc_set: XLocSet,
        ext_xloc_set: XLocSet,
        new_replicas: Vec<XLoc>,
        callback: Arc<dyn InstallCallback>,
    ) -> Result<RequestHandle> {
        check_extension(&cur_xloc_set, &ext_xloc_set, &new_replicas)?;
        self.submit(
            file_id,
            file_epoch,
            RequestKind::AddReplicas {
                cur_xloc_set,
                ext_xloc_set,
                new_replicas,
            },
            callback,
        )
    }

    /// Submit a RemoveReplicas reconfiguration (reserved; the worker
    /// reports it as not implemented)
    pub fn remove_replicas(
        &self,
        file_id: FileId,
        file_epoch: u32,
        cur_xloc_set: XLocSet,
        red_xloc_set: XLocSet,
        removed_replicas: Vec<XLoc>,
        callback: Arc<dyn InstallCallback>,
    ) -> Result<RequestHandle> {
        self.submit(
            file_id,
            file_epoch,
            RequestKind::RemoveReplicas {
                cur_xloc_set,
                red_xloc_set,
                removed_replicas,
            },
            callback,
        )
    }

    /// Submit a ReplaceReplica reconfiguration (reserved; the worker
    /// reports it as not implemented)
    #[allow(clippy::too_many_arguments)]
    pub fn replace_replica(
        &self,
        file_id: FileId,
        file_epoch: u32,
        cur_xloc_set: XLocSet,
        ext_xloc_set: XLocSet,
        old_replica: XLoc,
        new_replica: XLoc,
        callback: Arc<dyn InstallCallback>,
    ) -> Result<RequestHandle> {
        self.submit(
            file_id,
            file_epoch,
            RequestKind::ReplaceReplica {
                cur_xloc_set,
                ext_xloc_set,
                old_replica,
                new_replica,
            },
            callback,
        )
    }

    fn submit(
        &self,
        file_id: FileId,
        file_epoch: u32,
        kind: RequestKind,
        callback: Arc<dyn InstallCallback>,
    ) -> Result<RequestHandle> {
        let capability = self.capabilities.build(&file_id, file_epoch);
        let id = RequestId::new();
        let (reply, outcome) = oneshot::channel();

        let method = RequestMethod {
            id,
            file_id,
            capability,
            kind,
            callback,
            reply,
        };
        self.tx.send(method).map_err(|_| Error::Shutdown)?;

        debug!(%id, "reconfiguration request enqueued");
        Ok(RequestHandle::new(id, outcome))
    }

    /// Signal shutdown. The worker stops after the current suspension
    /// point; an in-flight request is abandoned.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

fn check_extension(cur: &XLocSet, ext: &XLocSet, new_replicas: &[XLoc]) -> Result<()> {
    if ext.version != cur.version {
        return Err(Error::precondition(format!(
            "extended set version {} does not match current version {}",
            ext.version, cur.version
        )));
    }

    let cur_count = cur.replica_count();
    let extends = ext.replica_count() == cur_count + new_replicas.len()
        && ext.replicas[..cur_count] == cur.replicas[..]
        && ext.replicas[cur_count..] == new_replicas[..];
    if !extends {
        return Err(Error::precondition(
            "extended set must be the current set with the new replicas appended",
        ));
    }

    Ok(())
}

/// Collected results of the invalidate fan-out
struct Invalidation {
    /// Per-replica state reports, indexed like the current set
    states: Vec<Option<ReplicaStatus>>,
    /// Number of replicas that answered
    response_count: usize,
    /// Whether any replica answered as primary
    primary_responded: bool,
}

struct Worker {
    rx: mpsc::UnboundedReceiver<RequestMethod>,
    shutdown: watch::Receiver<bool>,
    client: OsdClient,
    bridge: MetadataBridge,
    lease_timeout: Duration,
}

impl Worker {
    async fn run(mut self) {
        info!("xlocset coordinator started");
        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                method = self.rx.recv() => {
                    let Some(method) = method else { break };
                    if self.process(method).await.is_break() {
                        break;
                    }
                }
            }
        }
        info!("xlocset coordinator stopped");
    }

    /// Process one dequeued request. Failures are reported on the request's
    /// reply channel; only shutdown stops the worker.
    async fn process(&mut self, method: RequestMethod) -> ControlFlow<()> {
        let RequestMethod {
            id,
            file_id,
            capability,
            kind,
            callback,
            reply,
        } = method;

        debug!(%id, %file_id, kind = kind.name(), "processing reconfiguration request");

        let result = match kind {
            RequestKind::AddReplicas {
                cur_xloc_set,
                ext_xloc_set,
                new_replicas,
            } => {
                self.process_add_replicas(
                    &file_id,
                    &capability,
                    cur_xloc_set,
                    ext_xloc_set,
                    &new_replicas,
                    callback,
                )
                .await
            }
            RequestKind::RemoveReplicas { .. } => {
                Err(Error::not_implemented("remove replicas"))
            }
            RequestKind::ReplaceReplica { .. } => {
                Err(Error::not_implemented("replace replica"))
            }
        };

        match result {
            Ok(success) => {
                info!(
                    %id, %file_id,
                    version = success.installed_version,
                    "new replica set installed"
                );
                let _ = reply.send(Ok(success));
                ControlFlow::Continue(())
            }
            Err(Error::Shutdown) => {
                // Abandon the in-flight request; the closed reply channel is
                // the in-process equivalent of a connection reset.
                warn!(%id, %file_id, "request abandoned on shutdown");
                ControlFlow::Break(())
            }
            Err(err) => {
                report_error(id, &file_id, reply, err);
                ControlFlow::Continue(())
            }
        }
    }

    async fn process_add_replicas(
        &mut self,
        file_id: &FileId,
        capability: &Capability,
        cur_xloc_set: XLocSet,
        ext_xloc_set: XLocSet,
        new_replicas: &[XLoc],
        callback: Arc<dyn InstallCallback>,
    ) -> Result<ReconfigSuccess> {
        // Invalidate the replicas that currently hold data and collect
        // their state reports. The new replicas are empty and keep serving
        // nothing either way.
        let creds = FileCredentials::new(capability.clone(), cur_xloc_set.clone());
        let invalidation = self
            .invalidate_replicas(file_id, &creds, &cur_xloc_set)
            .await?;

        if invalidation.response_count == 0 {
            return Err(Error::insufficient_quorum(
                "no replica responded to invalidation",
            ));
        }
        debug!(
            %file_id,
            responses = invalidation.response_count,
            primary_responded = invalidation.primary_responded,
            "replicas invalidated"
        );

        match ext_xloc_set.update_policy {
            ReplicaUpdatePolicy::Ronly => {
                // Full replicas are filled by background replication,
                // partial replicas are installed as-is.
                debug!(%file_id, "read-only replication, nothing to prime synchronously");
            }
            policy if policy.is_coordinated() => {
                self.prime_for_quorum(
                    file_id,
                    capability,
                    &cur_xloc_set,
                    &ext_xloc_set,
                    new_replicas,
                    &invalidation,
                    policy,
                )
                .await?;
            }
            policy => {
                return Err(Error::UnsupportedPolicy(policy.as_str().to_string()));
            }
        }

        // Install atomically through the metadata stage, version bumped.
        let installed = ext_xloc_set.bumped();
        let installed_version = installed.version;
        self.bridge
            .install(file_id.clone(), installed, callback)
            .await?;

        Ok(ReconfigSuccess {
            file_id: file_id.clone(),
            installed_version,
        })
    }

    /// Invalidate every replica of the current set, head OSD by head OSD in
    /// set order. Per-replica transport failures are absorbed: the replica
    /// is treated as silent and contributes no state report.
    async fn invalidate_replicas(
        &mut self,
        file_id: &FileId,
        creds: &FileCredentials,
        cur_xloc_set: &XLocSet,
    ) -> Result<Invalidation> {
        let heads = cur_xloc_set.head_osds();
        let mut states: Vec<Option<ReplicaStatus>> = vec![None; heads.len()];
        let mut response_count = 0;
        let mut primary_responded = false;

        for (i, osd) in heads.iter().enumerate() {
            match self.client.invalidate(osd, creds, file_id).await {
                Ok(response) => {
                    response_count += 1;
                    if response.is_primary {
                        primary_responded = true;
                    }
                    states[i] = response.status;
                }
                Err(err) => {
                    debug!(%file_id, %osd, "invalidate failed, treating replica as silent: {err}");
                }
            }
        }

        // A silent primary may keep serving client I/O under the old set
        // until its lease expires, so the protocol must wait it out. If
        // every replica answered there is no silent primary left.
        if !primary_responded && response_count < heads.len() {
            debug!(
                %file_id,
                response_count,
                replicas = heads.len(),
                "primary did not respond, waiting for its lease to expire"
            );
            self.lease_wait().await?;
        }

        Ok(Invalidation {
            states,
            response_count,
            primary_responded,
        })
    }

    /// Sleep for the configured lease timeout. Only shutdown may cut the
    /// wait short, and it aborts the request rather than shortening it.
    async fn lease_wait(&mut self) -> Result<()> {
        let sleep = tokio::time::sleep(self.lease_timeout);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return Ok(()),
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        return Err(Error::Shutdown);
                    }
                }
            }
        }
    }

    /// The DECIDE step for coordinated policies: derive from the collected
    /// states how many of the new replicas must be primed before the
    /// extended set goes live, and prime them.
    #[allow(clippy::too_many_arguments)]
    async fn prime_for_quorum(
        &mut self,
        file_id: &FileId,
        capability: &Capability,
        cur_xloc_set: &XLocSet,
        ext_xloc_set: &XLocSet,
        new_replicas: &[XLoc],
        invalidation: &Invalidation,
        policy: ReplicaUpdatePolicy,
    ) -> Result<()> {
        let cur_heads = cur_xloc_set.head_osds();
        let auth_state = calculate_authoritative_state(&invalidation.states, &cur_heads);

        let ext_count = ext_xloc_set.replica_count();
        // An empty or sparse file has no objects anywhere, hence nothing
        // that could be lost by skipping the priming.
        let min_majority =
            minimal_majority(&invalidation.states, &auth_state).unwrap_or(ext_count);

        // Number of replicas a future read will contact. The ack count
        // excludes the replica local to the reader, so it is added back in.
        let required_read = if backup_can_read(policy)? {
            1
        } else {
            num_required_acks(policy, QuorumOp::Read, cur_xloc_set.replica_count())? + 1
        };

        // The policy guarantees R + W > N. min_majority replicas already
        // hold the authoritative state and count toward writes, so at least
        // W'' = N - W' - R + 1 new replicas must be primed to restore the
        // overlap under the extended set.
        let required_updates =
            ext_count as i64 - min_majority as i64 - required_read as i64 + 1;

        if required_updates > new_replicas.len() as i64 {
            return Err(Error::insufficient_quorum(format!(
                "{required_updates} replicas must be primed but only {} were added",
                new_replicas.len()
            )));
        }

        if required_updates <= 0 {
            debug!(
                %file_id,
                min_majority,
                required_read,
                "quorum overlap holds without priming"
            );
            return Ok(());
        }
        let required_updates = required_updates as usize;

        debug!(
            %file_id,
            min_majority,
            required_read,
            required_updates,
            "priming newly added replicas"
        );

        // The new replicas form the tail of the extended set; prime the
        // last required_updates of them under the extended credentials. A
        // failed probe is fatal: an unprimed replica must not count toward
        // the quorum.
        let creds = FileCredentials::new(capability.clone(), ext_xloc_set.clone());
        let heads = ext_xloc_set.head_osds();
        for osd in &heads[ext_count - required_updates..] {
            self.client.read_probe(osd, &creds, file_id).await?;
            debug!(%file_id, %osd, "replication primed on new replica");
        }

        Ok(())
    }
}

fn report_error(
    id: RequestId,
    file_id: &FileId,
    reply: oneshot::Sender<crate::request::RequestOutcome>,
    err: Error,
) {
    let record = ErrorRecord::from(err);
    match record.error_type {
        ErrorType::Errno => {
            debug!(%id, %file_id, errno = ?record.errno, "request failed: {}", record.message);
        }
        ErrorType::Redirect => {
            debug!(%id, %file_id, target = %record.message, "request redirected");
        }
        ErrorType::InternalServerError => {
            error!(%id, %file_id, "request failed: {}", record.message);
        }
    }
    let _ = reply.send(Err(record));
}
