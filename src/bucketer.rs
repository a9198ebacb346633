//! Deterministic user-to-variation assignment via hashed traffic allocation.
use std::io::Cursor;

use crate::entities::{Experiment, Group, TrafficAllocation, Variation, GROUP_POLICY_RANDOM};

/// Buckets span `[0, 10000)`.
pub const MAX_TRAFFIC_VALUE: u32 = 10_000;

/// Seed shared by every SDK implementation of this protocol. Changing it
/// breaks cross-SDK assignment stability.
const HASH_SEED: u32 = 1;

/// Assigns users to variations from an experiment's traffic allocation.
pub trait ExperimentBucketer: Send + Sync {
    /// Bucket `bucketing_id` into `experiment`. `group` carries the
    /// experiment's mutually-exclusive group, when it has one. Returns `None`
    /// when the user lands outside the allocated traffic, is excluded by the
    /// group, or the selected entity id is unknown.
    fn bucket<'a>(
        &self,
        bucketing_id: &str,
        experiment: &'a Experiment,
        group: Option<&Group>,
    ) -> Option<&'a Variation>;
}

/// The default bucketer: canonical 32-bit MurmurHash3 over
/// `bucketing_id + layer_id`, mapped onto `[0, 10000)`.
#[derive(Debug, Default)]
pub struct MurmurhashBucketer;

impl MurmurhashBucketer {
    pub fn new() -> MurmurhashBucketer {
        MurmurhashBucketer
    }

    /// Map a bucketing key onto `[0, MAX_TRAFFIC_VALUE)`.
    fn generate_bucket_value(bucketing_key: &str) -> u32 {
        let hash = murmur3::murmur3_32(&mut Cursor::new(bucketing_key.as_bytes()), HASH_SEED)
            .expect("reading from an in-memory cursor cannot fail");
        let ratio = f64::from(hash) / (f64::from(u32::MAX) + 1.0);
        (ratio * f64::from(MAX_TRAFFIC_VALUE)) as u32
    }

    /// Walk an allocation in order and select the first range containing
    /// `bucket`. An empty entity id means the span is unassigned.
    fn bucket_to_entity(bucket: u32, allocation: &[TrafficAllocation]) -> Option<&str> {
        allocation
            .iter()
            .find(|range| range.end_of_range > bucket)
            .map(|range| range.entity_id.as_str())
            .filter(|entity_id| !entity_id.is_empty())
    }
}

impl ExperimentBucketer for MurmurhashBucketer {
    fn bucket<'a>(
        &self,
        bucketing_id: &str,
        experiment: &'a Experiment,
        group: Option<&Group>,
    ) -> Option<&'a Variation> {
        if let Some(group) = group.filter(|g| g.policy == GROUP_POLICY_RANDOM) {
            let group_key = format!("{}{}", bucketing_id, group.id);
            let bucket = Self::generate_bucket_value(&group_key);
            match Self::bucket_to_entity(bucket, &group.traffic_allocation) {
                Some(entity_id) if entity_id == experiment.id => {}
                _ => {
                    log::debug!(
                        target: "flagship",
                        "user {:?} is not in experiment {:?} of group {:?}",
                        bucketing_id,
                        experiment.key,
                        group.id
                    );
                    return None;
                }
            }
        }

        let bucketing_key = format!("{}{}", bucketing_id, experiment.layer_id);
        let bucket = Self::generate_bucket_value(&bucketing_key);
        let entity_id = Self::bucket_to_entity(bucket, &experiment.traffic_allocation)?;
        experiment.variations.get(entity_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{ExperimentBucketer, MurmurhashBucketer, MAX_TRAFFIC_VALUE};
    use crate::entities::{Experiment, Group, TrafficAllocation, Variation};

    fn test_experiment(allocation: Vec<TrafficAllocation>) -> Experiment {
        Experiment {
            id: "1111".to_owned(),
            key: "exp_1".to_owned(),
            layer_id: "layer_1".to_owned(),
            variations: HashMap::from([
                (
                    "2221".to_owned(),
                    Variation {
                        id: "2221".to_owned(),
                        key: "a".to_owned(),
                        ..Default::default()
                    },
                ),
                (
                    "2222".to_owned(),
                    Variation {
                        id: "2222".to_owned(),
                        key: "b".to_owned(),
                        ..Default::default()
                    },
                ),
            ]),
            traffic_allocation: allocation,
            ..Default::default()
        }
    }

    fn full_range(entity_id: &str) -> Vec<TrafficAllocation> {
        vec![TrafficAllocation {
            entity_id: entity_id.to_owned(),
            end_of_range: MAX_TRAFFIC_VALUE,
        }]
    }

    #[test]
    fn bucketing_is_deterministic() {
        let bucketer = MurmurhashBucketer::new();
        let experiment = test_experiment(vec![
            TrafficAllocation {
                entity_id: "2221".to_owned(),
                end_of_range: 5000,
            },
            TrafficAllocation {
                entity_id: "2222".to_owned(),
                end_of_range: MAX_TRAFFIC_VALUE,
            },
        ]);

        let first = bucketer.bucket("user-1", &experiment, None).unwrap();
        for _ in 0..10 {
            let again = bucketer.bucket("user-1", &experiment, None).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn full_range_always_selects() {
        let bucketer = MurmurhashBucketer::new();
        let experiment = test_experiment(full_range("2222"));

        for user in ["user-1", "user-2", "another", "x"] {
            let variation = bucketer.bucket(user, &experiment, None).unwrap();
            assert_eq!(variation.id, "2222");
        }
    }

    #[test]
    fn zero_width_leading_range_is_skipped() {
        let bucketer = MurmurhashBucketer::new();
        let experiment = test_experiment(vec![
            TrafficAllocation {
                entity_id: "2221".to_owned(),
                end_of_range: 0,
            },
            TrafficAllocation {
                entity_id: "2222".to_owned(),
                end_of_range: MAX_TRAFFIC_VALUE,
            },
        ]);

        let variation = bucketer.bucket("user-1", &experiment, None).unwrap();
        assert_eq!(variation.id, "2222");
    }

    #[test]
    fn empty_entity_id_yields_no_variation() {
        let bucketer = MurmurhashBucketer::new();
        let experiment = test_experiment(full_range(""));
        assert!(bucketer.bucket("user-1", &experiment, None).is_none());
    }

    #[test]
    fn unknown_entity_id_yields_no_variation() {
        let bucketer = MurmurhashBucketer::new();
        let experiment = test_experiment(full_range("9999"));
        assert!(bucketer.bucket("user-1", &experiment, None).is_none());
    }

    #[test]
    fn empty_allocation_yields_no_variation() {
        let bucketer = MurmurhashBucketer::new();
        let experiment = test_experiment(Vec::new());
        assert!(bucketer.bucket("user-1", &experiment, None).is_none());
    }

    #[test]
    fn mutex_group_excludes_other_experiments() {
        let bucketer = MurmurhashBucketer::new();
        let experiment = test_experiment(full_range("2222"));

        // The whole group allocation belongs to a different experiment.
        let group = Group {
            id: "g1".to_owned(),
            policy: "random".to_owned(),
            traffic_allocation: vec![TrafficAllocation {
                entity_id: "other-exp".to_owned(),
                end_of_range: MAX_TRAFFIC_VALUE,
            }],
        };
        assert!(bucketer.bucket("user-1", &experiment, Some(&group)).is_none());
    }

    #[test]
    fn mutex_group_admits_its_own_experiment() {
        let bucketer = MurmurhashBucketer::new();
        let experiment = test_experiment(full_range("2222"));

        let group = Group {
            id: "g1".to_owned(),
            policy: "random".to_owned(),
            traffic_allocation: vec![TrafficAllocation {
                entity_id: "1111".to_owned(),
                end_of_range: MAX_TRAFFIC_VALUE,
            }],
        };
        let variation = bucketer.bucket("user-1", &experiment, Some(&group)).unwrap();
        assert_eq!(variation.id, "2222");
    }

    #[test]
    fn overlapping_group_policy_does_not_exclude() {
        let bucketer = MurmurhashBucketer::new();
        let experiment = test_experiment(full_range("2222"));

        let group = Group {
            id: "g1".to_owned(),
            policy: "overlapping".to_owned(),
            traffic_allocation: vec![TrafficAllocation {
                entity_id: "other-exp".to_owned(),
                end_of_range: MAX_TRAFFIC_VALUE,
            }],
        };
        assert!(bucketer.bucket("user-1", &experiment, Some(&group)).is_some());
    }
}
