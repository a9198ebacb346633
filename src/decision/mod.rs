//! The layered decision engine.
//!
//! Every decision layer is a single-operation service. Composite services
//! hold an ordered chain of them: the first layer that produces a variation
//! short-circuits the chain, a layer that produces nothing (or errors) falls
//! through to the next. Chain order is part of the protocol and is never
//! reordered.
pub mod reasons;

mod bucketer_service;
mod composite;
mod feature_experiment;
mod overrides;
mod rollout;
mod whitelist;

pub use bucketer_service::ExperimentBucketerService;
pub use composite::{CompositeExperimentService, CompositeFeatureService};
pub use feature_experiment::FeatureExperimentService;
pub use overrides::{
    ExperimentOverrideKey, ExperimentOverrideService, ExperimentOverrideStore,
    MapExperimentOverridesStore,
};
pub use rollout::RolloutService;
pub use whitelist::ExperimentWhitelistService;

use std::fmt;

use crate::config::ProjectConfig;
use crate::entities::{Experiment, Feature, Variation};
use crate::user_context::UserContext;
use crate::Result;
use reasons::{DecisionReasons, Reason};

/// Per-call decision options.
#[derive(Debug, Clone, Default)]
pub struct DecideOptions {
    /// Retain informational reasons for reporting back to the caller.
    pub include_reasons: bool,
}

/// Context for one experiment decision. Borrows the project snapshot pinned
/// by the caller.
#[derive(Debug, Clone, Copy)]
pub struct ExperimentDecisionContext<'a> {
    pub experiment: Option<&'a Experiment>,
    pub config: &'a ProjectConfig,
}

/// Context for one feature decision.
#[derive(Debug, Clone, Copy)]
pub struct FeatureDecisionContext<'a> {
    pub feature: &'a Feature,
    pub config: &'a ProjectConfig,
}

/// Where a feature decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    FeatureTest,
    Rollout,
}

impl DecisionSource {
    /// The wire spelling, used in impression metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::FeatureTest => "feature-test",
            DecisionSource::Rollout => "rollout",
        }
    }
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an experiment decision. A decision without a variation is a
/// "nil decision": the layer had nothing to say and the chain moves on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentDecision {
    pub variation: Option<Variation>,
    pub reason: Option<Reason>,
}

impl ExperimentDecision {
    pub(crate) fn nil(reason: Reason) -> ExperimentDecision {
        ExperimentDecision {
            variation: None,
            reason: Some(reason),
        }
    }
}

/// Outcome of a feature decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureDecision {
    pub variation: Option<Variation>,
    /// The experiment (or rollout rule) that produced the variation.
    pub experiment: Option<Experiment>,
    pub source: Option<DecisionSource>,
    pub reason: Option<Reason>,
}

impl FeatureDecision {
    pub(crate) fn nil(reason: Reason) -> FeatureDecision {
        FeatureDecision {
            reason: Some(reason),
            ..Default::default()
        }
    }
}

/// One experiment decision layer.
pub trait ExperimentService: Send + Sync {
    /// Decide a variation for `user` in the context's experiment.
    ///
    /// `Ok` with no variation means this layer has no opinion; an `Err`
    /// means the layer could not run. Either way composite chains continue
    /// with the next layer.
    fn decide(
        &self,
        context: &ExperimentDecisionContext<'_>,
        user: &UserContext,
        options: &DecideOptions,
        reasons: &mut DecisionReasons,
    ) -> Result<ExperimentDecision>;
}

/// One feature decision layer.
pub trait FeatureService: Send + Sync {
    /// Decide a variation for `user` for the context's feature.
    fn decide(
        &self,
        context: &FeatureDecisionContext<'_>,
        user: &UserContext,
        options: &DecideOptions,
        reasons: &mut DecisionReasons,
    ) -> Result<FeatureDecision>;
}
