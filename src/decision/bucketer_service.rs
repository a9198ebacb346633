//! Audience gating plus traffic-allocation bucketing, the last layer of the
//! experiment chain.
use super::reasons::{DecisionReasons, Reason};
use super::{DecideOptions, ExperimentDecision, ExperimentDecisionContext, ExperimentService};
use crate::audience;
use crate::bucketer::{ExperimentBucketer, MurmurhashBucketer};
use crate::user_context::UserContext;
use crate::{Error, Result};

/// Evaluates the experiment's audience and, when the user qualifies,
/// delegates to the bucketer.
pub struct ExperimentBucketerService {
    bucketer: Box<dyn ExperimentBucketer>,
}

impl Default for ExperimentBucketerService {
    fn default() -> ExperimentBucketerService {
        ExperimentBucketerService::new()
    }
}

impl ExperimentBucketerService {
    pub fn new() -> ExperimentBucketerService {
        ExperimentBucketerService {
            bucketer: Box::new(MurmurhashBucketer::new()),
        }
    }

    /// Replace the bucketer. Intended for tests and exotic hosts.
    pub fn with_bucketer(bucketer: Box<dyn ExperimentBucketer>) -> ExperimentBucketerService {
        ExperimentBucketerService { bucketer }
    }
}

impl ExperimentService for ExperimentBucketerService {
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

        if let Some(tree) = &experiment.audience_conditions {
            if !audience::evaluate(tree, user, reasons)? {
                let message = reasons.add_info(format!(
                    "user {:?} does not meet conditions to be in experiment {:?}",
                    user.id, experiment.key
                ));
                log::debug!(target: "flagship", "{message}");
                return Ok(ExperimentDecision::nil(Reason::FailedAudienceTargeting));
            }
        }

        let bucketing_id = user.bucketing_id()?;
        let group = experiment
            .group_id
            .as_deref()
            .and_then(|id| context.config.group(id));

        match self.bucketer.bucket(&bucketing_id, experiment, group) {
            Some(variation) => {
                let message = reasons.add_info(format!(
                    "user {:?} is bucketed into variation {:?} of experiment {:?}",
                    user.id, variation.key, experiment.key
                ));
                log::debug!(target: "flagship", "{message}");
                Ok(ExperimentDecision {
                    variation: Some(variation.clone()),
                    reason: Some(Reason::BucketedIntoVariation),
                })
            }
            None => {
                let message = reasons.add_info(format!(
                    "user {:?} is not bucketed into any variation of experiment {:?}",
                    user.id, experiment.key
                ));
                log::debug!(target: "flagship", "{message}");
                Ok(ExperimentDecision::nil(Reason::NotBucketedIntoVariation))
            }
        }
    }
}
