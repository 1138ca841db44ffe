//! Authoritative-state computation
//!
//! Given the per-replica status reports collected during invalidation, the
//! authoritative state names, for every object, the highest version observed
//! and the replicas that hold it. Replicas that did not respond contribute
//! nothing. Ties on the version carry identical content by construction of
//! the replication protocol, so they simply widen the holder set.

use replio_common::{AuthoritativeReplicaState, ObjectVersionMapping, OsdUuid, ReplicaStatus};
use std::collections::BTreeMap;

/// Compute the authoritative state from the collected replica reports.
///
/// `states` is indexed in parallel with `osds`: `states[i]` is the report of
/// the replica headed by `osds[i]`, `None` when that replica did not respond.
#[must_use]
pub fn calculate_authoritative_state(
    states: &[Option<ReplicaStatus>],
    osds: &[OsdUuid],
) -> AuthoritativeReplicaState {
    debug_assert_eq!(states.len(), osds.len());

    let mut truncate_epoch = 0;
    let mut max_obj_version = 0;
    let mut winners: BTreeMap<u64, (u64, Vec<OsdUuid>)> = BTreeMap::new();

    for (state, osd) in states.iter().zip(osds) {
        let Some(state) = state else {
            continue;
        };

        truncate_epoch = truncate_epoch.max(state.truncate_epoch);
        max_obj_version = max_obj_version.max(state.max_obj_version);

        for object in &state.object_versions {
            match winners.get_mut(&object.object_number) {
                Some((version, holders)) if *version == object.object_version => {
                    holders.push(*osd);
                }
                Some((version, holders)) if *version < object.object_version => {
                    *version = object.object_version;
                    holders.clear();
                    holders.push(*osd);
                }
                Some(_) => {}
                None => {
                    winners.insert(object.object_number, (object.object_version, vec![*osd]));
                }
            }
        }
    }

    AuthoritativeReplicaState {
        truncate_epoch,
        max_obj_version,
        object_versions: winners
            .into_iter()
            .map(|(object_number, (object_version, osds))| ObjectVersionMapping {
                object_number,
                object_version,
                osds,
            })
            .collect(),
    }
}

/// The smallest number of replicas holding the authoritative version of any
/// object, or `None` when no objects exist anywhere (empty or sparse file).
#[must_use]
pub fn minimal_majority(
    states: &[Option<ReplicaStatus>],
    auth_state: &AuthoritativeReplicaState,
) -> Option<usize> {
    auth_state
        .object_versions
        .iter()
        .map(|mapping| {
            states
                .iter()
                .flatten()
                .filter(|state| {
                    state
                        .object_versions
                        .iter()
                        .any(|o| {
                            o.object_number == mapping.object_number
                                && o.object_version == mapping.object_version
                        })
                })
                .count()
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use replio_common::ObjectVersion;

    fn status(objects: &[(u64, u64)]) -> Option<ReplicaStatus> {
        let max = objects.iter().map(|(_, v)| *v).max().unwrap_or(0);
        Some(ReplicaStatus {
            file_size: 0,
            truncate_epoch: 0,
            primary_epoch: 0,
            max_obj_version: max,
            object_versions: objects
                .iter()
                .map(|&(object_number, object_version)| ObjectVersion {
                    object_number,
                    object_version,
                })
                .collect(),
        })
    }

    fn osds(n: usize) -> Vec<OsdUuid> {
        (0..n).map(|_| OsdUuid::new()).collect()
    }

    #[test]
    fn test_max_version_wins() {
        let osds = osds(3);
        let states = vec![
            status(&[(0, 4), (1, 2)]),
            status(&[(0, 4)]),
            status(&[(0, 3), (1, 3)]),
        ];

        let auth = calculate_authoritative_state(&states, &osds);
        assert_eq!(auth.version_of(0), Some(4));
        assert_eq!(auth.version_of(1), Some(3));
        assert_eq!(auth.max_obj_version, 4);

        let holders_0 = &auth.object_versions[0].osds;
        assert_eq!(holders_0, &[osds[0], osds[1]]);
        let holders_1 = &auth.object_versions[1].osds;
        assert_eq!(holders_1, &[osds[2]]);
    }

    #[test]
    fn test_unresponsive_replicas_contribute_nothing() {
        let osds = osds(3);
        let states = vec![status(&[(0, 4)]), None, status(&[(0, 4)])];

        let auth = calculate_authoritative_state(&states, &osds);
        assert_eq!(auth.object_versions.len(), 1);
        assert_eq!(auth.object_versions[0].osds.len(), 2);
        assert_eq!(minimal_majority(&states, &auth), Some(2));
    }

    #[test]
    fn test_stale_report_does_not_change_state() {
        // Adding a replica whose versions are at or below the existing
        // maxima must not change the authoritative versions.
        let base_osds = osds(2);
        let base = vec![status(&[(0, 4), (1, 3)]), status(&[(0, 4)])];
        let auth_before = calculate_authoritative_state(&base, &base_osds);

        let mut extended_osds = base_osds.clone();
        extended_osds.push(OsdUuid::new());
        let mut extended = base;
        extended.push(status(&[(0, 3), (1, 3)]));
        let auth_after = calculate_authoritative_state(&extended, &extended_osds);

        for mapping in &auth_before.object_versions {
            assert_eq!(
                auth_after.version_of(mapping.object_number),
                Some(mapping.object_version)
            );
        }
    }

    #[test]
    fn test_minimal_majority_over_objects() {
        let osds = osds(3);
        // Object 0 is held by all three, object 1 only by the first replica.
        let states = vec![
            status(&[(0, 4), (1, 7)]),
            status(&[(0, 4)]),
            status(&[(0, 4)]),
        ];
        let auth = calculate_authoritative_state(&states, &osds);
        assert_eq!(minimal_majority(&states, &auth), Some(1));
    }

    #[test]
    fn test_minimal_majority_empty_file() {
        let osds = osds(3);
        let states = vec![status(&[]), status(&[]), status(&[])];
        let auth = calculate_authoritative_state(&states, &osds);
        assert!(auth.object_versions.is_empty());
        assert_eq!(minimal_majority(&states, &auth), None);
    }

    #[test]
    fn test_deterministic() {
        let osds = osds(3);
        let states = vec![
            status(&[(3, 1), (0, 2)]),
            status(&[(0, 2), (3, 2)]),
            status(&[(1, 5)]),
        ];
        let a = calculate_authoritative_state(&states, &osds);
        let b = calculate_authoritative_state(&states, &osds);
        assert_eq!(a, b);
        // Mappings come out ordered by object number
        let numbers: Vec<u64> = a.object_versions.iter().map(|m| m.object_number).collect();
        assert_eq!(numbers, vec![0, 1, 3]);
    }
}
