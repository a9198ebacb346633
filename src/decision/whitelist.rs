//! Whitelist decisions from the experiment's embedded forced-variation map.
use super::reasons::{DecisionReasons, Reason};
use super::{DecideOptions, ExperimentDecision, ExperimentDecisionContext, ExperimentService};
use crate::user_context::UserContext;
use crate::{Error, Result};

/// Decides from the experiment's whitelist (user id to variation key).
#[derive(Debug, Default)]
pub struct ExperimentWhitelistService;

impl ExperimentWhitelistService {
    pub fn new() -> ExperimentWhitelistService {
        ExperimentWhitelistService
    }
}

impl ExperimentService for ExperimentWhitelistService {
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

        let Some(variation_key) = experiment.whitelist.get(&user.id) else {
            return Ok(ExperimentDecision::nil(
                Reason::NoWhitelistVariationAssignment,
            ));
        };

        match experiment.variation_by_key(variation_key) {
            Some(variation) => {
                let message = reasons.add_info(format!(
                    "user {:?} is whitelisted into variation {:?} of experiment {:?}",
                    user.id, variation_key, experiment.key
                ));
                log::debug!(target: "flagship", "{message}");
                Ok(ExperimentDecision {
                    variation: Some(variation.clone()),
                    reason: Some(Reason::WhitelistVariationAssignmentFound),
                })
            }
            None => Ok(ExperimentDecision::nil(
                Reason::InvalidWhitelistVariationAssignment,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::ProjectConfig;
    use crate::entities::{Experiment, Variation};

    fn test_experiment(whitelist: HashMap<String, String>) -> Experiment {
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
            whitelist,
            ..Default::default()
        }
    }

    fn decide(experiment: Option<&Experiment>) -> Result<ExperimentDecision> {
        let config = ProjectConfig::default();
        let context = ExperimentDecisionContext {
            experiment,
            config: &config,
        };
        let user = UserContext::new("user-1", HashMap::new());
        let mut reasons = DecisionReasons::new(false);
        ExperimentWhitelistService::new().decide(
            &context,
            &user,
            &DecideOptions::default(),
            &mut reasons,
        )
    }

    #[test]
    fn whitelisted_user_gets_the_variation() {
        let experiment = test_experiment(HashMap::from([(
            "user-1".to_owned(),
            "treatment".to_owned(),
        )]));
        let decision = decide(Some(&experiment)).unwrap();
        assert_eq!(decision.variation.unwrap().key, "treatment");
        assert_eq!(
            decision.reason,
            Some(Reason::WhitelistVariationAssignmentFound)
        );
    }

    #[test]
    fn unlisted_user_gets_nil_decision() {
        let experiment = test_experiment(HashMap::new());
        let decision = decide(Some(&experiment)).unwrap();
        assert!(decision.variation.is_none());
        assert_eq!(
            decision.reason,
            Some(Reason::NoWhitelistVariationAssignment)
        );
    }

    #[test]
    fn dangling_whitelist_entry_gets_nil_decision() {
        let experiment = test_experiment(HashMap::from([(
            "user-1".to_owned(),
            "no_such_variation".to_owned(),
        )]));
        let decision = decide(Some(&experiment)).unwrap();
        assert!(decision.variation.is_none());
        assert_eq!(
            decision.reason,
            Some(Reason::InvalidWhitelistVariationAssignment)
        );
    }

    #[test]
    fn missing_experiment_is_an_error() {
        assert!(decide(None).is_err());
    }
}
