//! Fixed-order decision chains.
//!
//! Chain order is part of the cross-SDK contract: overrides, then whitelist,
//! then bucketing for experiments; feature tests, then rollout for features.
//! The first layer producing a variation short-circuits; a nil decision or an
//! error falls through; when nothing short-circuits, the last layer's outcome
//! (decision or error) is returned as-is.
use std::sync::Arc;

use super::feature_experiment::FeatureExperimentService;
use super::overrides::{ExperimentOverrideService, ExperimentOverrideStore};
use super::reasons::DecisionReasons;
use super::rollout::RolloutService;
use super::whitelist::ExperimentWhitelistService;
use super::{
    DecideOptions, ExperimentBucketerService, ExperimentDecision, ExperimentDecisionContext,
    ExperimentService, FeatureDecision, FeatureDecisionContext, FeatureService,
};
use crate::user_context::UserContext;
use crate::Result;

/// The experiment chain: override (when a store is configured), whitelist,
/// bucketer.
pub struct CompositeExperimentService {
    services: Vec<Box<dyn ExperimentService>>,
}

impl Default for CompositeExperimentService {
    fn default() -> CompositeExperimentService {
        CompositeExperimentService::new()
    }
}

impl CompositeExperimentService {
    /// The chain without an override layer.
    pub fn new() -> CompositeExperimentService {
        CompositeExperimentService {
            services: vec![
                Box::new(ExperimentWhitelistService::new()),
                Box::new(ExperimentBucketerService::new()),
            ],
        }
    }

    /// The full chain, with overrides served from `store`.
    pub fn with_override_store(store: Arc<dyn ExperimentOverrideStore>) -> CompositeExperimentService {
        CompositeExperimentService {
            services: vec![
                Box::new(ExperimentOverrideService::new(store)),
                Box::new(ExperimentWhitelistService::new()),
                Box::new(ExperimentBucketerService::new()),
            ],
        }
    }
}

impl ExperimentService for CompositeExperimentService {
    fn decide(
        &self,
        context: &ExperimentDecisionContext<'_>,
        user: &UserContext,
        options: &DecideOptions,
        reasons: &mut DecisionReasons,
    ) -> Result<ExperimentDecision> {
        let mut result = Ok(ExperimentDecision::default());
        for service in &self.services {
            result = service.decide(context, user, options, reasons);
            match &result {
                Ok(decision) if decision.variation.is_some() => return result,
                Ok(_) => {}
                Err(err) => {
                    let message = reasons.add_error(format!(
                        "experiment decision layer failed for user {:?}: {err}",
                        user.id
                    ));
                    log::debug!(target: "flagship", "{message}");
                }
            }
        }
        result
    }
}

/// The feature chain: feature tests, then rollout.
pub struct CompositeFeatureService {
    services: Vec<Box<dyn FeatureService>>,
}

impl Default for CompositeFeatureService {
    fn default() -> CompositeFeatureService {
        CompositeFeatureService::new(Box::new(CompositeExperimentService::new()))
    }
}

impl CompositeFeatureService {
    pub fn new(experiment_service: Box<dyn ExperimentService>) -> CompositeFeatureService {
        CompositeFeatureService {
            services: vec![
                Box::new(FeatureExperimentService::new(experiment_service)),
                Box::new(RolloutService::new()),
            ],
        }
    }
}

impl FeatureService for CompositeFeatureService {
    fn decide(
        &self,
        context: &FeatureDecisionContext<'_>,
        user: &UserContext,
        options: &DecideOptions,
        reasons: &mut DecisionReasons,
    ) -> Result<FeatureDecision> {
        let mut result = Ok(FeatureDecision::default());
        for service in &self.services {
            result = service.decide(context, user, options, reasons);
            match &result {
                Ok(decision) if decision.variation.is_some() => return result,
                Ok(_) => {}
                Err(err) => {
                    let message = reasons.add_error(format!(
                        "feature decision layer failed for user {:?} on feature {:?}: {err}",
                        user.id, context.feature.key
                    ));
                    log::debug!(target: "flagship", "{message}");
                }
            }
        }
        result
    }
}
