//! Reconfiguration request methods and handles
//!
//! A request method is created by the submitting metadata operation, owned
//! by the queue until dequeued, and then exclusively by the worker until it
//! either installs the new set or reports failure on the reply channel.

use crate::bridge::InstallCallback;
use replio_auth::Capability;
use replio_common::{ErrorRecord, FileId, XLoc, XLocSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Identifier of an enqueued reconfiguration request
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Success report of a completed reconfiguration
#[derive(Clone, Debug)]
pub struct ReconfigSuccess {
    /// The reconfigured file
    pub file_id: FileId,
    /// Version of the installed XLocSet
    pub installed_version: u64,
}

/// Outcome delivered on the request's reply channel
pub type RequestOutcome = Result<ReconfigSuccess, ErrorRecord>;

/// Handle returned from a submit call; resolves once the request finishes
#[derive(Debug)]
pub struct RequestHandle {
    id: RequestId,
    outcome: oneshot::Receiver<RequestOutcome>,
}

impl RequestHandle {
    pub(crate) fn new(id: RequestId, outcome: oneshot::Receiver<RequestOutcome>) -> Self {
        Self { id, outcome }
    }

    /// The request's identifier
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the request to finish.
    ///
    /// A request abandoned mid-flight (coordinator shutdown) resolves to an
    /// internal-server-error record, the in-process equivalent of the
    /// connection reset a remote client would observe.
    pub async fn outcome(self) -> RequestOutcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ErrorRecord {
                error_type: replio_common::ErrorType::InternalServerError,
                errno: replio_common::Errno::None,
                message: "request abandoned: coordinator shut down".to_string(),
            }),
        }
    }
}

/// Kind-specific arguments of a reconfiguration request
#[derive(Clone, Debug)]
pub enum RequestKind {
    /// Extend the replica set; `new_replicas` is the suffix of
    /// `ext_xloc_set` not present in `cur_xloc_set`
    AddReplicas {
        cur_xloc_set: XLocSet,
        ext_xloc_set: XLocSet,
        new_replicas: Vec<XLoc>,
    },
    /// Shrink the replica set (reserved)
    RemoveReplicas {
        cur_xloc_set: XLocSet,
        red_xloc_set: XLocSet,
        removed_replicas: Vec<XLoc>,
    },
    /// Replace one replica by another (reserved)
    ReplaceReplica {
        cur_xloc_set: XLocSet,
        ext_xloc_set: XLocSet,
        old_replica: XLoc,
        new_replica: XLoc,
    },
}

impl RequestKind {
    /// Short name for logging
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddReplicas { .. } => "add replicas",
            Self::RemoveReplicas { .. } => "remove replicas",
            Self::ReplaceReplica { .. } => "replace replica",
        }
    }
}

/// Queue element driving one reconfiguration
pub(crate) struct RequestMethod {
    pub(crate) id: RequestId,
    pub(crate) file_id: FileId,
    pub(crate) capability: Capability,
    pub(crate) kind: RequestKind,
    pub(crate) callback: Arc<dyn InstallCallback>,
    pub(crate) reply: oneshot::Sender<RequestOutcome>,
}
