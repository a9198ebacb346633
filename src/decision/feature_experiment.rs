//! Feature-test decisions: the feature's experiments walked in order, each
//! through the full experiment chain.
use super::reasons::DecisionReasons;
use super::{
    DecideOptions, DecisionSource, ExperimentDecisionContext, ExperimentService, FeatureDecision,
    FeatureDecisionContext, FeatureService,
};
use crate::user_context::UserContext;
use crate::Result;

/// Runs the composite experiment chain for each of the feature's experiments;
/// the first one that yields a variation wins, with `Source = FeatureTest`.
pub struct FeatureExperimentService {
    experiment_service: Box<dyn ExperimentService>,
}

impl FeatureExperimentService {
    pub fn new(experiment_service: Box<dyn ExperimentService>) -> FeatureExperimentService {
        FeatureExperimentService { experiment_service }
    }
}

impl FeatureService for FeatureExperimentService {
    fn decide(
        &self,
        context: &FeatureDecisionContext<'_>,
        user: &UserContext,
        options: &DecideOptions,
        reasons: &mut DecisionReasons,
    ) -> Result<FeatureDecision> {
        for experiment in &context.feature.feature_experiments {
            let experiment_context = ExperimentDecisionContext {
                experiment: Some(experiment),
                config: context.config,
            };
            match self
                .experiment_service
                .decide(&experiment_context, user, options, reasons)
            {
                Ok(decision) if decision.variation.is_some() => {
                    return Ok(FeatureDecision {
                        variation: decision.variation,
                        experiment: Some(experiment.clone()),
                        source: Some(DecisionSource::FeatureTest),
                        reason: decision.reason,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    let message = reasons.add_error(format!(
                        "experiment {:?} errored while deciding for user {:?}: {err}",
                        experiment.key, user.id
                    ));
                    log::debug!(target: "flagship", "{message}");
                }
            }
        }

        Ok(FeatureDecision::default())
    }
}
