//! Replio Coord - XLocSet change coordinator
//!
//! The serialized state machine that drives replica-set reconfigurations:
//! invalidate the old replicas, collect their state reports, compute the
//! authoritative state, prime as many new replicas as the quorum math
//! demands, and install the new XLocSet atomically through the metadata
//! callback bridge.
//!
//! Requests are processed one at a time by a dedicated worker task;
//! producers enqueue concurrently and are never blocked by protocol work.

pub mod bridge;
pub mod coordinator;
pub mod request;

pub use bridge::{InstallCallback, InstallRequest, MetadataBridge, MetadataStage};
pub use coordinator::XLocSetCoordinator;
pub use request::{ReconfigSuccess, RequestHandle, RequestId, RequestKind, RequestOutcome};
