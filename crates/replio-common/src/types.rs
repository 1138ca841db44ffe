//! Core type definitions for replio
//!
//! This module defines the fundamental types of the reconfiguration
//! subsystem: identifiers, replica descriptors (XLoc), replica location
//! sets (XLocSet), and the per-replica state reports exchanged with OSDs.

use crate::striping::StripingPolicy;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an OSD (object storage device)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OsdUuid(Uuid);

impl OsdUuid {
    /// Generate a new random OSD UUID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OsdUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OsdUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OsdUuid({})", self.0)
    }
}

impl fmt::Display for OsdUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Global identifier of a file (`<volume>:<file number>` style, opaque here)
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct FileId(String);

impl FileId {
    /// Create a new file id
    pub fn new(id: impl Into<String>) -> Result<Self, FileIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(FileIdError::Empty);
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(FileIdError::InvalidChar);
        }
        Ok(Self(id))
    }

    /// Create without validation (internal use only)
    #[must_use]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the file id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({:?})", self.0)
    }
}

/// Errors that can occur when creating a file id
#[derive(Debug, Clone, thiserror::Error)]
pub enum FileIdError {
    #[error("file id must not be empty")]
    Empty,
    #[error("file id must not contain whitespace or control characters")]
    InvalidChar,
}

/// Replication flag bits carried per replica
pub mod repl_flag {
    /// The replica holds (or will hold) a full copy of the file
    pub const FULL_REPLICA: u32 = 0x1;
    /// Background replication has completed for this replica
    pub const IS_COMPLETE: u32 = 0x2;
    /// Objects are fetched in random order
    pub const STRATEGY_RANDOM: u32 = 0x4;
    /// Objects are fetched sequentially
    pub const STRATEGY_SEQUENTIAL: u32 = 0x8;
}

/// Replica update policy governing read/write quorums across replicas
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicaUpdatePolicy {
    /// No replication (single replica)
    None,
    /// Read-only replication; replicas are filled lazily
    Ronly,
    /// Write-all, read-one
    WaR1,
    /// Write-all, read-any
    WaRa,
    /// Write-quorum, read-quorum
    WqRq,
}

impl ReplicaUpdatePolicy {
    /// The policy's wire/database tag
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Ronly => "ronly",
            Self::WaR1 => "WaR1",
            Self::WaRa => "WaRa",
            Self::WqRq => "WqRq",
        }
    }

    /// True for the lease-coordinated read/write policies
    #[must_use]
    pub const fn is_coordinated(&self) -> bool {
        matches!(self, Self::WaR1 | Self::WaRa | Self::WqRq)
    }
}

impl fmt::Display for ReplicaUpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplicaUpdatePolicy {
    type Err = UnknownPolicyTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::None),
            "ronly" => Ok(Self::Ronly),
            "WaR1" => Ok(Self::WaR1),
            "WaRa" => Ok(Self::WaRa),
            "WqRq" => Ok(Self::WqRq),
            _ => Err(UnknownPolicyTag(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown replica update policy tag
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown replica update policy tag: {0:?}")]
pub struct UnknownPolicyTag(pub String);

/// One replica descriptor: the striping layout, the ordered OSD list of the
/// stripe (the first entry is the head OSD), and the replication flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct XLoc {
    striping: StripingPolicy,
    osds: Vec<OsdUuid>,
    replication_flags: u32,
}

impl XLoc {
    /// Create a new replica descriptor. The OSD list must not be empty.
    pub fn new(
        striping: StripingPolicy,
        osds: Vec<OsdUuid>,
        replication_flags: u32,
    ) -> Result<Self, XLocError> {
        if osds.is_empty() {
            return Err(XLocError::NoOsds);
        }
        Ok(Self {
            striping,
            osds,
            replication_flags,
        })
    }

    /// The striping policy of this replica
    #[must_use]
    pub fn striping(&self) -> &StripingPolicy {
        &self.striping
    }

    /// All OSDs of this replica's stripe, in stripe order
    #[must_use]
    pub fn osds(&self) -> &[OsdUuid] {
        &self.osds
    }

    /// The head OSD of this replica (first of the stripe)
    #[must_use]
    pub fn head_osd(&self) -> OsdUuid {
        self.osds[0]
    }

    /// Raw replication flag bitmap
    #[must_use]
    pub fn replication_flags(&self) -> u32 {
        self.replication_flags
    }

    /// Whether this replica holds (or will hold) a full copy
    #[must_use]
    pub fn is_full_replica(&self) -> bool {
        self.replication_flags & repl_flag::FULL_REPLICA != 0
    }

    /// Whether background replication has completed for this replica
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.replication_flags & repl_flag::IS_COMPLETE != 0
    }
}

/// Errors that can occur when creating a replica descriptor
#[derive(Debug, Clone, thiserror::Error)]
pub enum XLocError {
    #[error("a replica needs at least one OSD")]
    NoOsds,
}

/// The ordered replica location set of a file, together with the replica
/// update policy, a monotonically increasing version and the read-only flag.
///
/// The set is an immutable value snapshot; the metadata database owns the
/// canonical copy. The first replica is the primary candidate for
/// lease-coordinated policies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct XLocSet {
    /// Replicas in priority order
    pub replicas: Vec<XLoc>,
    /// Update policy governing quorums across the replicas
    pub update_policy: ReplicaUpdatePolicy,
    /// Version counter, bumped on every install
    pub version: u64,
    /// Whether the file is read-only
    pub read_only: bool,
}

impl XLocSet {
    /// Create a new replica location set
    #[must_use]
    pub fn new(
        replicas: Vec<XLoc>,
        update_policy: ReplicaUpdatePolicy,
        version: u64,
        read_only: bool,
    ) -> Self {
        Self {
            replicas,
            update_policy,
            version,
            read_only,
        }
    }

    /// Number of replicas in the set
    #[must_use]
    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// The head OSD of every replica, in set order
    #[must_use]
    pub fn head_osds(&self) -> Vec<OsdUuid> {
        self.replicas.iter().map(XLoc::head_osd).collect()
    }

    /// Whether any replica's stripe contains the given OSD
    #[must_use]
    pub fn contains_osd(&self, osd: &OsdUuid) -> bool {
        self.replicas.iter().any(|r| r.osds().contains(osd))
    }

    /// Index of the replica whose head OSD matches, if any
    #[must_use]
    pub fn index_of_head_osd(&self, osd: &OsdUuid) -> Option<usize> {
        self.replicas.iter().position(|r| r.head_osd() == *osd)
    }

    /// A copy of this set with the version bumped by one
    #[must_use]
    pub fn bumped(&self) -> Self {
        let mut set = self.clone();
        set.version += 1;
        set
    }

    /// True if changes to this set require the coordinated reconfiguration
    /// protocol: a coordinated policy and more than one replica.
    #[must_use]
    pub fn requires_coordination(&self) -> bool {
        self.update_policy.is_coordinated() && self.replica_count() > 1
    }
}

/// Version of a single object held by a replica
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersion {
    /// Object number within the file
    pub object_number: u64,
    /// Version of that object
    pub object_version: u64,
}

/// State report of one replica, returned by the invalidation call
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaStatus {
    /// Size of the file as seen by this replica
    pub file_size: u64,
    /// Truncate epoch of this replica
    pub truncate_epoch: u64,
    /// Master epoch the replica last acted under
    pub primary_epoch: u32,
    /// Highest object version stored locally
    pub max_obj_version: u64,
    /// Versions of the objects stored locally
    pub object_versions: Vec<ObjectVersion>,
}

/// The winning version of one object and the replicas that hold it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersionMapping {
    /// Object number within the file
    pub object_number: u64,
    /// The authoritative (maximum observed) version
    pub object_version: u64,
    /// Head OSDs of the replicas reporting the authoritative version
    pub osds: Vec<OsdUuid>,
}

/// Authoritative state across a set of replica reports: for every object the
/// winning version and the set of replicas holding it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritativeReplicaState {
    /// Maximum truncate epoch observed across the reports
    pub truncate_epoch: u64,
    /// Maximum object version observed across the reports
    pub max_obj_version: u64,
    /// Winning versions, ordered by object number
    pub object_versions: Vec<ObjectVersionMapping>,
}

impl AuthoritativeReplicaState {
    /// Look up the authoritative version of an object
    #[must_use]
    pub fn version_of(&self, object_number: u64) -> Option<u64> {
        self.object_versions
            .iter()
            .find(|m| m.object_number == object_number)
            .map(|m| m.object_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn striping() -> StripingPolicy {
        StripingPolicy::new("RAID0", 128, 1).unwrap()
    }

    fn replica(osd: OsdUuid) -> XLoc {
        XLoc::new(striping(), vec![osd], repl_flag::FULL_REPLICA).unwrap()
    }

    #[test]
    fn test_file_id_validation() {
        assert!(FileId::new("vol:17").is_ok());
        assert!(matches!(FileId::new(""), Err(FileIdError::Empty)));
        assert!(matches!(
            FileId::new("vol 17"),
            Err(FileIdError::InvalidChar)
        ));
    }

    #[test]
    fn test_policy_tag_round_trip() {
        for policy in [
            ReplicaUpdatePolicy::None,
            ReplicaUpdatePolicy::Ronly,
            ReplicaUpdatePolicy::WaR1,
            ReplicaUpdatePolicy::WaRa,
            ReplicaUpdatePolicy::WqRq,
        ] {
            assert_eq!(policy.as_str().parse::<ReplicaUpdatePolicy>().unwrap(), policy);
        }
        assert!("WqRqX".parse::<ReplicaUpdatePolicy>().is_err());
    }

    #[test]
    fn test_xloc_needs_osds() {
        assert!(matches!(
            XLoc::new(striping(), vec![], 0),
            Err(XLocError::NoOsds)
        ));
    }

    #[test]
    fn test_xlocset_helpers() {
        let osds: Vec<OsdUuid> = (0..3).map(|_| OsdUuid::new()).collect();
        let set = XLocSet::new(
            osds.iter().map(|o| replica(*o)).collect(),
            ReplicaUpdatePolicy::WqRq,
            7,
            false,
        );

        assert_eq!(set.replica_count(), 3);
        assert_eq!(set.head_osds(), osds);
        assert!(set.contains_osd(&osds[1]));
        assert!(!set.contains_osd(&OsdUuid::new()));
        assert_eq!(set.index_of_head_osd(&osds[2]), Some(2));
        assert!(set.requires_coordination());

        let bumped = set.bumped();
        assert_eq!(bumped.version, 8);
        assert_eq!(bumped.replicas, set.replicas);
    }

    #[test]
    fn test_requires_coordination_single_replica() {
        let set = XLocSet::new(
            vec![replica(OsdUuid::new())],
            ReplicaUpdatePolicy::WqRq,
            1,
            false,
        );
        assert!(!set.requires_coordination());

        let ronly = XLocSet::new(
            vec![replica(OsdUuid::new()), replica(OsdUuid::new())],
            ReplicaUpdatePolicy::Ronly,
            1,
            true,
        );
        assert!(!ronly.requires_coordination());
    }

    #[test]
    fn test_replication_flags() {
        let full = replica(OsdUuid::new());
        assert!(full.is_full_replica());
        assert!(!full.is_complete());

        let partial = XLoc::new(
            striping(),
            vec![OsdUuid::new()],
            repl_flag::STRATEGY_SEQUENTIAL,
        )
        .unwrap();
        assert!(!partial.is_full_replica());
    }
}
