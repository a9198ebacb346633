use std::fmt;

/// Machine-readable explanation attached to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Reason {
    BucketedIntoVariation,
    NotBucketedIntoVariation,
    FailedAudienceTargeting,
    FailedRolloutTargeting,
    RolloutHasNoExperiments,
    NoOverrideVariationAssignment,
    OverrideVariationAssignmentFound,
    InvalidOverrideVariationAssignment,
    NoWhitelistVariationAssignment,
    WhitelistVariationAssignmentFound,
    InvalidWhitelistVariationAssignment,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Reason::BucketedIntoVariation => "bucketed into variation",
            Reason::NotBucketedIntoVariation => "not bucketed into variation",
            Reason::FailedAudienceTargeting => "failed audience targeting",
            Reason::FailedRolloutTargeting => "failed rollout targeting",
            Reason::RolloutHasNoExperiments => "rollout has no experiments",
            Reason::NoOverrideVariationAssignment => "no override variation assignment",
            Reason::OverrideVariationAssignmentFound => "override variation assignment found",
            Reason::InvalidOverrideVariationAssignment => "invalid override variation assignment",
            Reason::NoWhitelistVariationAssignment => "no whitelist variation assignment",
            Reason::WhitelistVariationAssignmentFound => "whitelist variation assignment found",
            Reason::InvalidWhitelistVariationAssignment => "invalid whitelist variation assignment",
        };
        f.write_str(text)
    }
}

/// Ordered accumulator of human-readable decision explanations.
///
/// One accumulator is allocated per decision call and never shared across
/// concurrent calls. Error entries are always retained; informational entries
/// are retained only when the caller opted into reasons reporting.
#[derive(Debug, Clone, Default)]
pub struct DecisionReasons {
    include_infos: bool,
    messages: Vec<String>,
}

impl DecisionReasons {
    /// An accumulator that keeps only error entries.
    pub fn new(include_reasons: bool) -> DecisionReasons {
        DecisionReasons {
            include_infos: include_reasons,
            messages: Vec::new(),
        }
    }

    /// An accumulator that keeps everything, for callers that asked for the
    /// full reasoning report.
    pub fn with_reasons_included() -> DecisionReasons {
        DecisionReasons::new(true)
    }

    /// Record an error entry. Always retained.
    pub fn add_error(&mut self, message: impl Into<String>) -> String {
        let message = message.into();
        self.messages.push(message.clone());
        message
    }

    /// Record an informational entry, retained only when reasons reporting
    /// is on. The message is returned either way so the caller can log it.
    pub fn add_info(&mut self, message: impl Into<String>) -> String {
        let message = message.into();
        if self.include_infos {
            self.messages.push(message.clone());
        }
        message
    }

    /// Merge entries from a nested call, preserving order.
    pub fn append(&mut self, other: DecisionReasons) {
        self.messages.extend(other.messages);
    }

    /// All retained entries, in append order.
    pub fn report(&self) -> &[String] {
        &self.messages
    }
}
