//! Typed attribute matchers, looked up by the `match` field of a condition.
use std::cmp::Ordering;

use semver::Version;

use crate::attributes::AttributeValue;
use crate::entities::Condition;
use crate::user_context::UserContext;
use crate::{Error, Result};

/// A matcher decides whether a user satisfies one leaf condition.
///
/// An `Err` means the condition cannot be evaluated for this user (missing
/// attribute, mismatched type, malformed condition value); the tree evaluator
/// treats it as *unknown* rather than a failure.
pub type Matcher = fn(&Condition, &UserContext) -> Result<bool>;

pub const EXISTS: &str = "exists";
pub const EXACT: &str = "exact";
pub const SUBSTRING: &str = "substring";
pub const GT: &str = "gt";
pub const GE: &str = "ge";
pub const LT: &str = "lt";
pub const LE: &str = "le";
pub const SEMVER_EQ: &str = "semver_eq";
pub const SEMVER_GT: &str = "semver_gt";
pub const SEMVER_GE: &str = "semver_ge";
pub const SEMVER_LT: &str = "semver_lt";
pub const SEMVER_LE: &str = "semver_le";
pub const QUALIFIED: &str = "qualified";

/// Resolve a match kind to its matcher. `None` for unrecognized kinds.
pub fn matcher_for(kind: &str) -> Option<Matcher> {
    Some(match kind {
        EXISTS => exists,
        EXACT => exact,
        SUBSTRING => substring,
        GT => gt,
        GE => ge,
        LT => lt,
        LE => le,
        SEMVER_EQ => semver_eq,
        SEMVER_GT => semver_gt,
        SEMVER_GE => semver_ge,
        SEMVER_LT => semver_lt,
        SEMVER_LE => semver_le,
        QUALIFIED => qualified,
        _ => return None,
    })
}

/// The condition's attribute, erroring on absent or null.
fn required_attribute<'a>(condition: &Condition, user: &'a UserContext) -> Result<&'a AttributeValue> {
    user.attribute(&condition.name)
        .filter(|value| !value.is_null())
        .ok_or_else(|| Error::MissingAttribute(condition.name.clone()))
}

/// The condition's own value, erroring when the datafile left it out.
fn condition_value<'a>(condition: &'a Condition) -> Result<&'a AttributeValue> {
    condition
        .value
        .as_ref()
        .ok_or_else(|| Error::MalformedCondition(condition.name.clone()))
}

fn exists(condition: &Condition, user: &UserContext) -> Result<bool> {
    Ok(user
        .attribute(&condition.name)
        .is_some_and(|value| !value.is_null()))
}

fn exact(condition: &Condition, user: &UserContext) -> Result<bool> {
    let expected = condition_value(condition)?;
    let actual = required_attribute(condition, user)?;

    match (expected, actual) {
        (AttributeValue::String(e), AttributeValue::String(a)) => Ok(e == a),
        (AttributeValue::Bool(e), AttributeValue::Bool(a)) => Ok(e == a),
        // Numeric types are interchangeable as long as both sides are finite.
        (AttributeValue::Int(_) | AttributeValue::Double(_), _) => {
            let e = finite(expected).ok_or_else(|| Error::MalformedCondition(condition.name.clone()))?;
            let a = finite(actual).ok_or_else(|| Error::InvalidAttribute {
                key: condition.name.clone(),
            })?;
            Ok(e == a)
        }
        (AttributeValue::Null, _) => Err(Error::MalformedCondition(condition.name.clone())),
        _ => Err(Error::InvalidAttribute {
            key: condition.name.clone(),
        }),
    }
}

fn substring(condition: &Condition, user: &UserContext) -> Result<bool> {
    let expected = condition_value(condition)?
        .as_str()
        .ok_or_else(|| Error::MalformedCondition(condition.name.clone()))?;
    let actual = required_attribute(condition, user)?
        .as_str()
        .ok_or_else(|| Error::InvalidAttribute {
            key: condition.name.clone(),
        })?;
    Ok(actual.contains(expected))
}

fn finite(value: &AttributeValue) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite())
}

/// Both numeric operands of an order comparison.
fn numeric_operands(condition: &Condition, user: &UserContext) -> Result<(f64, f64)> {
    let expected = finite(condition_value(condition)?)
        .ok_or_else(|| Error::MalformedCondition(condition.name.clone()))?;
    let actual =
        finite(required_attribute(condition, user)?).ok_or_else(|| Error::InvalidAttribute {
            key: condition.name.clone(),
        })?;
    Ok((expected, actual))
}

fn gt(condition: &Condition, user: &UserContext) -> Result<bool> {
    let (expected, actual) = numeric_operands(condition, user)?;
    Ok(actual > expected)
}

fn ge(condition: &Condition, user: &UserContext) -> Result<bool> {
    let (expected, actual) = numeric_operands(condition, user)?;
    Ok(actual >= expected)
}

fn lt(condition: &Condition, user: &UserContext) -> Result<bool> {
    let (expected, actual) = numeric_operands(condition, user)?;
    Ok(actual < expected)
}

fn le(condition: &Condition, user: &UserContext) -> Result<bool> {
    let (expected, actual) = numeric_operands(condition, user)?;
    Ok(actual <= expected)
}

/// Parse a version, padding partial versions ("2" or "2.1") to full semver.
fn parse_version(raw: &str) -> Option<Version> {
    if let Ok(version) = Version::parse(raw) {
        return Some(version);
    }
    let split_at = raw.find(['-', '+']).unwrap_or(raw.len());
    let (core, rest) = raw.split_at(split_at);
    let dots = core.matches('.').count();
    if dots >= 2 {
        return None;
    }
    let padded = format!("{}{}{}", core, ".0".repeat(2 - dots), rest);
    Version::parse(&padded).ok()
}

/// Compare the user's version attribute against the condition's version.
fn semver_operands(condition: &Condition, user: &UserContext) -> Result<Ordering> {
    let expected_raw = condition_value(condition)?
        .as_str()
        .ok_or_else(|| Error::MalformedCondition(condition.name.clone()))?;
    let expected = parse_version(expected_raw)
        .ok_or_else(|| Error::MalformedCondition(condition.name.clone()))?;

    let actual_raw = required_attribute(condition, user)?
        .as_str()
        .ok_or_else(|| Error::InvalidAttribute {
            key: condition.name.clone(),
        })?;
    let actual = parse_version(actual_raw).ok_or_else(|| Error::InvalidAttribute {
        key: condition.name.clone(),
    })?;

    Ok(actual.cmp(&expected))
}

fn semver_eq(condition: &Condition, user: &UserContext) -> Result<bool> {
    Ok(semver_operands(condition, user)? == Ordering::Equal)
}

fn semver_gt(condition: &Condition, user: &UserContext) -> Result<bool> {
    Ok(semver_operands(condition, user)? == Ordering::Greater)
}

fn semver_ge(condition: &Condition, user: &UserContext) -> Result<bool> {
    Ok(semver_operands(condition, user)? != Ordering::Less)
}

fn semver_lt(condition: &Condition, user: &UserContext) -> Result<bool> {
    Ok(semver_operands(condition, user)? == Ordering::Less)
}

fn semver_le(condition: &Condition, user: &UserContext) -> Result<bool> {
    Ok(semver_operands(condition, user)? != Ordering::Greater)
}

fn qualified(condition: &Condition, user: &UserContext) -> Result<bool> {
    let segment = condition_value(condition)?
        .as_str()
        .ok_or_else(|| Error::MalformedCondition(condition.name.clone()))?;
    Ok(user.is_qualified_for(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeValue;
    use crate::entities::Condition;
    use crate::user_context::UserContext;

    fn condition(name: &str, match_type: &str, value: Option<AttributeValue>) -> Condition {
        Condition {
            name: name.to_owned(),
            condition_type: "custom_attribute".to_owned(),
            match_type: Some(match_type.to_owned()),
            value,
        }
    }

    fn user(attributes: &[(&str, AttributeValue)]) -> UserContext {
        UserContext::new(
            "test_user",
            attributes
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn exists_matcher() {
        let cond = condition("string_foo", EXISTS, None);

        let result = exists(&cond, &user(&[("string_foo", "any_value".into())])).unwrap();
        assert!(result);

        let result = exists(&cond, &user(&[("string_foo1", "not_foo".into())])).unwrap();
        assert!(!result);

        let result = exists(&cond, &user(&[])).unwrap();
        assert!(!result);

        // A null attribute does not exist.
        let result = exists(&cond, &user(&[("string_foo", AttributeValue::Null)])).unwrap();
        assert!(!result);
    }

    #[test]
    fn exact_strings() {
        let cond = condition("plan", EXACT, Some("premium".into()));
        assert!(exact(&cond, &user(&[("plan", "premium".into())])).unwrap());
        assert!(!exact(&cond, &user(&[("plan", "free".into())])).unwrap());
    }

    #[test]
    fn exact_bools() {
        let cond = condition("beta", EXACT, Some(true.into()));
        assert!(exact(&cond, &user(&[("beta", true.into())])).unwrap());
        assert!(!exact(&cond, &user(&[("beta", false.into())])).unwrap());
    }

    #[test]
    fn exact_numbers_are_interchangeable() {
        let cond = condition("age", EXACT, Some(30i64.into()));
        assert!(exact(&cond, &user(&[("age", 30.0.into())])).unwrap());
        assert!(exact(&cond, &user(&[("age", 30i64.into())])).unwrap());
        assert!(!exact(&cond, &user(&[("age", 31i64.into())])).unwrap());
    }

    #[test]
    fn exact_type_mismatch_is_unevaluable() {
        let cond = condition("plan", EXACT, Some("premium".into()));
        assert!(exact(&cond, &user(&[("plan", 3i64.into())])).is_err());
        assert!(exact(&cond, &user(&[])).is_err());
    }

    #[test]
    fn exact_nonfinite_attribute_is_unevaluable() {
        let cond = condition("age", EXACT, Some(30i64.into()));
        assert!(exact(&cond, &user(&[("age", f64::NAN.into())])).is_err());
    }

    #[test]
    fn substring_matcher() {
        let cond = condition("email", SUBSTRING, Some("@example.com".into()));
        assert!(substring(&cond, &user(&[("email", "a@example.com".into())])).unwrap());
        assert!(!substring(&cond, &user(&[("email", "a@test.com".into())])).unwrap());
        assert!(substring(&cond, &user(&[("email", 42i64.into())])).is_err());
    }

    #[test]
    fn numeric_comparisons() {
        let above = user(&[("age", 19i64.into())]);
        let equal = user(&[("age", 18i64.into())]);
        let below = user(&[("age", 17.5.into())]);
        let cond = |m: &str| condition("age", m, Some(18i64.into()));

        assert!(gt(&cond(GT), &above).unwrap());
        assert!(!gt(&cond(GT), &equal).unwrap());
        assert!(ge(&cond(GE), &equal).unwrap());
        assert!(!ge(&cond(GE), &below).unwrap());
        assert!(lt(&cond(LT), &below).unwrap());
        assert!(!lt(&cond(LT), &equal).unwrap());
        assert!(le(&cond(LE), &equal).unwrap());
        assert!(!le(&cond(LE), &above).unwrap());
    }

    #[test]
    fn numeric_comparison_rejects_infinities() {
        let cond = condition("age", GT, Some(18i64.into()));
        assert!(gt(&cond, &user(&[("age", f64::INFINITY.into())])).is_err());

        let cond = condition("age", GT, Some(f64::INFINITY.into()));
        assert!(gt(&cond, &user(&[("age", 20i64.into())])).is_err());
    }

    #[test]
    fn semver_comparisons() {
        let cond = |m: &str| condition("app_version", m, Some("2.1.0".into()));
        let at = user(&[("app_version", "2.1.0".into())]);
        let newer = user(&[("app_version", "2.10.0".into())]);
        let older = user(&[("app_version", "2.0.9".into())]);

        assert!(semver_eq(&cond(SEMVER_EQ), &at).unwrap());
        assert!(!semver_eq(&cond(SEMVER_EQ), &newer).unwrap());
        assert!(semver_gt(&cond(SEMVER_GT), &newer).unwrap());
        assert!(!semver_gt(&cond(SEMVER_GT), &at).unwrap());
        assert!(semver_ge(&cond(SEMVER_GE), &at).unwrap());
        assert!(!semver_ge(&cond(SEMVER_GE), &older).unwrap());
        assert!(semver_lt(&cond(SEMVER_LT), &older).unwrap());
        assert!(!semver_lt(&cond(SEMVER_LT), &at).unwrap());
        assert!(semver_le(&cond(SEMVER_LE), &at).unwrap());
        assert!(!semver_le(&cond(SEMVER_LE), &newer).unwrap());
    }

    #[test]
    fn partial_versions_are_padded() {
        let cond = condition("app_version", SEMVER_EQ, Some("2.1".into()));
        assert!(semver_eq(&cond, &user(&[("app_version", "2.1.0".into())])).unwrap());

        let cond = condition("app_version", SEMVER_GT, Some("2".into()));
        assert!(semver_gt(&cond, &user(&[("app_version", "2.0.1".into())])).unwrap());
    }

    #[test]
    fn unparseable_version_is_unevaluable() {
        let cond = condition("app_version", SEMVER_EQ, Some("2.1.0".into()));
        assert!(semver_eq(&cond, &user(&[("app_version", "not-a-version".into())])).is_err());

        let cond = condition("app_version", SEMVER_EQ, Some("garbage/1".into()));
        assert!(semver_eq(&cond, &user(&[("app_version", "2.1.0".into())])).is_err());
    }

    #[test]
    fn qualified_matcher() {
        let cond = condition("odp_segment", QUALIFIED, Some("beta_testers".into()));
        let mut member = user(&[]);
        member.qualified_segments = vec!["beta_testers".to_owned()];

        assert!(qualified(&cond, &member).unwrap());
        assert!(!qualified(&cond, &user(&[])).unwrap());
    }

    #[test]
    fn registry_resolves_every_kind() {
        for kind in [
            EXISTS, EXACT, SUBSTRING, GT, GE, LT, LE, SEMVER_EQ, SEMVER_GT, SEMVER_GE, SEMVER_LT,
            SEMVER_LE, QUALIFIED,
        ] {
            assert!(matcher_for(kind).is_some(), "no matcher for {kind:?}");
        }
        assert!(matcher_for("regex").is_none());
    }

    #[test]
    fn unrelated_attributes_are_ignored() {
        let cond = condition("age", GT, Some(18i64.into()));
        let user = user(&[("age", 20i64.into()), ("name", "alice".into())]);
        assert!(gt(&cond, &user).unwrap());
    }
}
