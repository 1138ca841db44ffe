//! Per-policy quorum math
//!
//! The policies are data, not behavior: each function matches on the tag so
//! the compiler checks exhaustiveness. Acknowledgement counts exclude the
//! local replica, matching how the on-OSD replication layer counts votes.

use replio_common::{Error, ReplicaUpdatePolicy, Result};

/// Operation class distinguished by the quorum math
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuorumOp {
    /// A client read
    Read,
    /// A client write or truncate
    Write,
}

/// Whether the policy coordinates writes through a primary lease
pub fn requires_lease(policy: ReplicaUpdatePolicy) -> Result<bool> {
    match policy {
        ReplicaUpdatePolicy::WaR1 | ReplicaUpdatePolicy::WaRa | ReplicaUpdatePolicy::WqRq => {
            Ok(true)
        }
        ReplicaUpdatePolicy::Ronly => Ok(false),
        ReplicaUpdatePolicy::None => unsupported(policy),
    }
}

/// Whether a backup replica may serve reads without holding the lease
pub fn backup_can_read(policy: ReplicaUpdatePolicy) -> Result<bool> {
    match policy {
        ReplicaUpdatePolicy::WaRa | ReplicaUpdatePolicy::Ronly => Ok(true),
        ReplicaUpdatePolicy::WaR1 | ReplicaUpdatePolicy::WqRq => Ok(false),
        ReplicaUpdatePolicy::None => unsupported(policy),
    }
}

/// Number of remote acknowledgements the policy requires for `op` on a file
/// with `replica_count` replicas. The local replica is excluded; reads and
/// writes coincide for the supported policies.
pub fn num_required_acks(
    policy: ReplicaUpdatePolicy,
    _op: QuorumOp,
    replica_count: usize,
) -> Result<usize> {
    match policy {
        // Write-all: every remote replica must acknowledge
        ReplicaUpdatePolicy::WaR1 | ReplicaUpdatePolicy::WaRa => {
            Ok(replica_count.saturating_sub(1))
        }
        // Majority including the local replica
        ReplicaUpdatePolicy::WqRq => Ok((replica_count + 1).div_ceil(2) - 1),
        // Lazy replication, no synchronous acknowledgements
        ReplicaUpdatePolicy::Ronly => Ok(0),
        ReplicaUpdatePolicy::None => unsupported(policy),
    }
}

fn unsupported<T>(policy: ReplicaUpdatePolicy) -> Result<T> {
    Err(Error::UnsupportedPolicy(policy.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COORDINATED: [ReplicaUpdatePolicy; 3] = [
        ReplicaUpdatePolicy::WaR1,
        ReplicaUpdatePolicy::WaRa,
        ReplicaUpdatePolicy::WqRq,
    ];

    #[test]
    fn test_lease_requirements() {
        for policy in COORDINATED {
            assert!(requires_lease(policy).unwrap(), "{policy:?} uses a lease");
        }
        assert!(!requires_lease(ReplicaUpdatePolicy::Ronly).unwrap());
        assert!(requires_lease(ReplicaUpdatePolicy::None).is_err());
    }

    #[test]
    fn test_backup_read() {
        assert!(!backup_can_read(ReplicaUpdatePolicy::WaR1).unwrap());
        assert!(backup_can_read(ReplicaUpdatePolicy::WaRa).unwrap());
        assert!(!backup_can_read(ReplicaUpdatePolicy::WqRq).unwrap());
        assert!(backup_can_read(ReplicaUpdatePolicy::Ronly).unwrap());
    }

    #[test]
    fn test_ack_counts() {
        use QuorumOp::Write;
        assert_eq!(
            num_required_acks(ReplicaUpdatePolicy::WaR1, Write, 4).unwrap(),
            3
        );
        assert_eq!(
            num_required_acks(ReplicaUpdatePolicy::WaRa, Write, 3).unwrap(),
            2
        );
        assert_eq!(
            num_required_acks(ReplicaUpdatePolicy::WqRq, Write, 3).unwrap(),
            1
        );
        assert_eq!(
            num_required_acks(ReplicaUpdatePolicy::WqRq, Write, 4).unwrap(),
            2
        );
        assert_eq!(
            num_required_acks(ReplicaUpdatePolicy::WqRq, Write, 5).unwrap(),
            2
        );
        assert_eq!(
            num_required_acks(ReplicaUpdatePolicy::Ronly, Write, 5).unwrap(),
            0
        );
        assert!(num_required_acks(ReplicaUpdatePolicy::None, Write, 3).is_err());
    }

    #[test]
    fn test_read_write_overlap() {
        // R + W > N once the local replica is counted back in: the read and
        // write quorums of every coordinated policy must intersect.
        for policy in COORDINATED {
            for n in 2..=16 {
                let write = num_required_acks(policy, QuorumOp::Write, n).unwrap();
                let read = num_required_acks(policy, QuorumOp::Read, n).unwrap();
                assert!(
                    write + read + 1 >= n,
                    "{policy:?} violates quorum overlap at n={n}: W={write} R={read}"
                );
            }
        }
    }
}
