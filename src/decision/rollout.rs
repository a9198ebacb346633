//! Rollout decisions: an ordered walk of targeting rules ending in the
//! "everyone-else" rule.
use super::bucketer_service::ExperimentBucketerService;
use super::reasons::{DecisionReasons, Reason};
use super::{
    DecideOptions, DecisionSource, ExperimentDecisionContext, ExperimentService, FeatureDecision,
    FeatureDecisionContext, FeatureService,
};
use crate::user_context::UserContext;
use crate::Result;

/// Walks the feature's rollout rules in order. A user that fails a rule's
/// targeting moves on to the next rule; a user that passes targeting but
/// misses the rule's traffic skips straight to the terminal everyone-else
/// rule.
pub struct RolloutService {
    bucketer_service: ExperimentBucketerService,
}

impl Default for RolloutService {
    fn default() -> RolloutService {
        RolloutService::new()
    }
}

impl RolloutService {
    pub fn new() -> RolloutService {
        RolloutService {
            bucketer_service: ExperimentBucketerService::new(),
        }
    }
}

impl FeatureService for RolloutService {
    fn decide(
        &self,
        context: &FeatureDecisionContext<'_>,
        user: &UserContext,
        options: &DecideOptions,
        reasons: &mut DecisionReasons,
    ) -> Result<FeatureDecision> {
        let feature = context.feature;
        let rules = &feature.rollout.experiments;
        if rules.is_empty() {
            let message = reasons.add_info(format!(
                "feature {:?} has no rollout rules",
                feature.key
            ));
            log::debug!(target: "flagship", "{message}");
            return Ok(FeatureDecision::nil(Reason::RolloutHasNoExperiments));
        }

        let last = rules.len() - 1;
        let mut index = 0;
        let mut missed_traffic = false;
        while index < rules.len() {
            let rule = &rules[index];
            let rule_context = ExperimentDecisionContext {
                experiment: Some(rule),
                config: context.config,
            };
            let decision =
                self.bucketer_service
                    .decide(&rule_context, user, options, reasons)?;

            match decision.variation {
                Some(variation) => {
                    return Ok(FeatureDecision {
                        variation: Some(variation),
                        experiment: Some(rule.clone()),
                        source: Some(DecisionSource::Rollout),
                        reason: decision.reason,
                    });
                }
                None if decision.reason == Some(Reason::FailedAudienceTargeting) => {
                    let message = reasons.add_info(format!(
                        "user {:?} failed targeting for rollout rule {} of feature {:?}",
                        user.id,
                        index + 1,
                        feature.key
                    ));
                    log::debug!(target: "flagship", "{message}");
                    index += 1;
                }
                None => {
                    // Missed the rule's traffic. Only the everyone-else rule
                    // remains eligible.
                    if index == last {
                        missed_traffic = true;
                        break;
                    }
                    index = last;
                }
            }
        }

        if missed_traffic {
            Ok(FeatureDecision::nil(Reason::NotBucketedIntoVariation))
        } else {
            Ok(FeatureDecision::nil(Reason::FailedRolloutTargeting))
        }
    }
}
