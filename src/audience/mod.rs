//! Audience condition tree evaluation.
//!
//! Leaves are evaluated through the matcher registry; internal nodes combine
//! them with three-valued `and`/`or`/`not`. A leaf that cannot be evaluated
//! (missing attribute, type mismatch) contributes *unknown*; an unknown
//! result at the root resolves to does-not-qualify.
pub mod matchers;

use crate::decision::reasons::DecisionReasons;
use crate::entities::{Condition, ConditionTree, LogicalOp};
use crate::user_context::UserContext;
use crate::{Error, Result};

/// Evaluate `tree` for `user`. Returns `false` when the tree resolves to
/// unknown, with a reason describing the unevaluable condition already
/// recorded.
///
/// # Errors
///
/// Returns [`Error::UnknownMatchType`] when a condition names a match kind
/// that is not registered. This is a datafile problem, not an attribute
/// problem, and is surfaced instead of being folded into unknown.
pub fn evaluate(
    tree: &ConditionTree,
    user: &UserContext,
    reasons: &mut DecisionReasons,
) -> Result<bool> {
    match evaluate_node(tree, user, reasons)? {
        Some(result) => Ok(result),
        None => {
            let message = reasons.add_info(format!(
                "audience conditions for user {:?} evaluated to unknown",
                user.id
            ));
            log::debug!(target: "flagship", "{message}");
            Ok(false)
        }
    }
}

fn evaluate_node(
    node: &ConditionTree,
    user: &UserContext,
    reasons: &mut DecisionReasons,
) -> Result<Option<bool>> {
    match node {
        ConditionTree::Node { op, nodes } => match op {
            LogicalOp::And => evaluate_and(nodes, user, reasons),
            LogicalOp::Or => evaluate_or(nodes, user, reasons),
            LogicalOp::Not => evaluate_not(nodes, user, reasons),
        },
        ConditionTree::Leaf(condition) => evaluate_leaf(condition, user, reasons),
    }
}

// unknown ∧ false = false; unknown ∧ true = unknown
fn evaluate_and(
    nodes: &[ConditionTree],
    user: &UserContext,
    reasons: &mut DecisionReasons,
) -> Result<Option<bool>> {
    let mut result = Some(true);
    for node in nodes {
        match evaluate_node(node, user, reasons)? {
            Some(false) => return Ok(Some(false)),
            Some(true) => {}
            None => result = None,
        }
    }
    Ok(result)
}

// unknown ∨ true = true; unknown ∨ false = unknown
fn evaluate_or(
    nodes: &[ConditionTree],
    user: &UserContext,
    reasons: &mut DecisionReasons,
) -> Result<Option<bool>> {
    let mut result = Some(false);
    for node in nodes {
        match evaluate_node(node, user, reasons)? {
            Some(true) => return Ok(Some(true)),
            Some(false) => {}
            None => result = None,
        }
    }
    Ok(result)
}

// `not` applies to its single child; unknown stays unknown.
fn evaluate_not(
    nodes: &[ConditionTree],
    user: &UserContext,
    reasons: &mut DecisionReasons,
) -> Result<Option<bool>> {
    match nodes.first() {
        Some(node) => Ok(evaluate_node(node, user, reasons)?.map(|b| !b)),
        None => Ok(None),
    }
}

fn evaluate_leaf(
    condition: &Condition,
    user: &UserContext,
    reasons: &mut DecisionReasons,
) -> Result<Option<bool>> {
    let kind = condition.match_type.as_deref().unwrap_or(matchers::EXACT);
    let matcher =
        matchers::matcher_for(kind).ok_or_else(|| Error::UnknownMatchType(kind.to_owned()))?;

    match matcher(condition, user) {
        Ok(result) => Ok(Some(result)),
        Err(err) => {
            let message = reasons.add_info(format!(
                "condition on attribute {:?} could not be evaluated for user {:?}: {err}",
                condition.name, user.id
            ));
            log::debug!(target: "flagship", "{message}");
            Ok(None)
        }
    }
}
