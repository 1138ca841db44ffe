//! Replio Client - OSD client facade
//!
//! Typed wrappers for the OSD operations the reconfiguration protocol
//! consumes (invalidation and read probes), layered over a pluggable
//! transport. The facade owns deadlines and bounded retries; the transport
//! is the seam a tonic-generated client plugs into.

pub mod client;
pub mod transport;

pub use client::OsdClient;
pub use transport::{InvalidateResponse, OsdTransport};
