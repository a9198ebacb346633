//! Externally managed variation overrides, the first layer of the experiment
//! chain.
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::reasons::{DecisionReasons, Reason};
use super::{DecideOptions, ExperimentDecision, ExperimentDecisionContext, ExperimentService};
use crate::user_context::UserContext;
use crate::{Error, Result};

/// Identifies one override: the experiment key plus the user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperimentOverrideKey {
    pub experiment_key: String,
    pub user_id: String,
}

/// Read access to an override source.
pub trait ExperimentOverrideStore: Send + Sync {
    /// The variation key assigned to `key`, if any.
    fn variation(&self, key: &ExperimentOverrideKey) -> Option<String>;
}

/// A map-based [`ExperimentOverrideStore`] that is safe to mutate while
/// decisions are being made. Readers take the lock shared; mutators take it
/// exclusive.
#[derive(Default)]
pub struct MapExperimentOverridesStore {
    overrides: RwLock<HashMap<ExperimentOverrideKey, String>>,
}

impl MapExperimentOverridesStore {
    pub fn new() -> MapExperimentOverridesStore {
        MapExperimentOverridesStore::default()
    }

    /// Assign `variation_key` as the override for `key`.
    pub fn set_variation(&self, key: ExperimentOverrideKey, variation_key: impl Into<String>) {
        let mut overrides = self
            .overrides
            .write()
            .expect("thread holding overrides lock should not panic");
        overrides.insert(key, variation_key.into());
    }

    /// Remove the override for `key`. No effect when none is set.
    pub fn remove_variation(&self, key: &ExperimentOverrideKey) {
        let mut overrides = self
            .overrides
            .write()
            .expect("thread holding overrides lock should not panic");
        overrides.remove(key);
    }
}

impl ExperimentOverrideStore for MapExperimentOverridesStore {
    fn variation(&self, key: &ExperimentOverrideKey) -> Option<String> {
        let overrides = self
            .overrides
            .read()
            .expect("thread holding overrides lock should not panic");
        overrides.get(key).cloned()
    }
}

/// Decides using an injected [`ExperimentOverrideStore`].
pub struct ExperimentOverrideService {
    overrides: Arc<dyn ExperimentOverrideStore>,
}

impl ExperimentOverrideService {
    pub fn new(overrides: Arc<dyn ExperimentOverrideStore>) -> ExperimentOverrideService {
        ExperimentOverrideService { overrides }
    }
}

impl ExperimentService for ExperimentOverrideService {
    fn decide(
        &self,
        context: &ExperimentDecisionContext<'_>,
        user: &UserContext,
        _options: &DecideOptions,
        reasons: &mut DecisionReasons,
    ) -> Result<ExperimentDecision> {
        let experiment = context
            .experiment
            .ok_or(Error::InvalidDecisionContext("experiment"))?;

        let key = ExperimentOverrideKey {
            experiment_key: experiment.key.clone(),
            user_id: user.id.clone(),
        };
        let Some(variation_key) = self.overrides.variation(&key) else {
            return Ok(ExperimentDecision::nil(
                Reason::NoOverrideVariationAssignment,
            ));
        };

        match experiment.variation_by_key(&variation_key) {
            Some(variation) => {
                let message = reasons.add_info(format!(
                    "override variation {:?} found for user {:?}",
                    variation_key, user.id
                ));
                log::debug!(target: "flagship", "{message}");
                Ok(ExperimentDecision {
                    variation: Some(variation.clone()),
                    reason: Some(Reason::OverrideVariationAssignmentFound),
                })
            }
            None => Ok(ExperimentDecision::nil(
                Reason::InvalidOverrideVariationAssignment,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::config::ProjectConfig;
    use crate::entities::{Experiment, Variation};

    fn test_experiment() -> Experiment {
        Experiment {
            id: "1111".to_owned(),
            key: "exp_1".to_owned(),
            variations: HashMap::from([(
                "2222".to_owned(),
                Variation {
                    id: "2222".to_owned(),
                    key: "treatment".to_owned(),
                    ..Default::default()
                },
            )]),
            variation_key_to_id_map: HashMap::from([("treatment".to_owned(), "2222".to_owned())]),
            ..Default::default()
        }
    }

    fn decide_for(
        store: Arc<MapExperimentOverridesStore>,
        experiment: Option<&Experiment>,
    ) -> Result<ExperimentDecision> {
        let config = ProjectConfig::default();
        let service = ExperimentOverrideService::new(store);
        let context = ExperimentDecisionContext {
            experiment,
            config: &config,
        };
        let user = UserContext::new("user-1", HashMap::new());
        let mut reasons = DecisionReasons::new(false);
        service.decide(&context, &user, &DecideOptions::default(), &mut reasons)
    }

    #[test]
    fn override_assignment_is_returned() {
        let store = Arc::new(MapExperimentOverridesStore::new());
        store.set_variation(
            ExperimentOverrideKey {
                experiment_key: "exp_1".to_owned(),
                user_id: "user-1".to_owned(),
            },
            "treatment",
        );

        let experiment = test_experiment();
        let decision = decide_for(store, Some(&experiment)).unwrap();
        assert_eq!(decision.variation.unwrap().id, "2222");
        assert_eq!(
            decision.reason,
            Some(Reason::OverrideVariationAssignmentFound)
        );
    }

    #[test]
    fn no_assignment_yields_nil_decision() {
        let store = Arc::new(MapExperimentOverridesStore::new());
        let experiment = test_experiment();
        let decision = decide_for(store, Some(&experiment)).unwrap();
        assert!(decision.variation.is_none());
        assert_eq!(decision.reason, Some(Reason::NoOverrideVariationAssignment));
    }

    #[test]
    fn unresolvable_assignment_yields_nil_decision() {
        let store = Arc::new(MapExperimentOverridesStore::new());
        store.set_variation(
            ExperimentOverrideKey {
                experiment_key: "exp_1".to_owned(),
                user_id: "user-1".to_owned(),
            },
            "no_such_variation",
        );

        let experiment = test_experiment();
        let decision = decide_for(store, Some(&experiment)).unwrap();
        assert!(decision.variation.is_none());
        assert_eq!(
            decision.reason,
            Some(Reason::InvalidOverrideVariationAssignment)
        );
    }

    #[test]
    fn missing_experiment_is_an_error() {
        let store = Arc::new(MapExperimentOverridesStore::new());
        assert!(decide_for(store, None).is_err());
    }

    #[test]
    fn removed_override_no_longer_applies() {
        let store = MapExperimentOverridesStore::new();
        let key = ExperimentOverrideKey {
            experiment_key: "exp_1".to_owned(),
            user_id: "user-1".to_owned(),
        };

        store.set_variation(key.clone(), "treatment");
        assert_eq!(store.variation(&key).as_deref(), Some("treatment"));

        store.remove_variation(&key);
        assert_eq!(store.variation(&key), None);
    }

    // Interleaved mutation from many threads must leave the store
    // consistent, and a value must never reappear after its removal.
    #[test]
    fn store_is_consistent_under_concurrent_mutation() {
        let store = Arc::new(MapExperimentOverridesStore::new());
        let threads = 8;
        let writes_per_thread = 100;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..writes_per_thread {
                        let key = ExperimentOverrideKey {
                            experiment_key: format!("exp_{t}"),
                            user_id: format!("user_{i}"),
                        };
                        store.set_variation(key.clone(), format!("var_{t}_{i}"));
                        let read = store.variation(&key);
                        assert_eq!(read.as_deref(), Some(format!("var_{t}_{i}").as_str()));
                        if i % 2 == 0 {
                            store.remove_variation(&key);
                            assert_eq!(store.variation(&key), None);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Every odd-numbered key survives, every even-numbered one is gone.
        for t in 0..threads {
            for i in 0..writes_per_thread {
                let key = ExperimentOverrideKey {
                    experiment_key: format!("exp_{t}"),
                    user_id: format!("user_{i}"),
                };
                let value = store.variation(&key);
                if i % 2 == 0 {
                    assert_eq!(value, None);
                } else {
                    assert_eq!(value, Some(format!("var_{t}_{i}")));
                }
            }
        }
    }
}
