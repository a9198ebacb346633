use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Prefix shared by all reserved attribute keys. Attributes whose key starts
/// with this prefix are always forwarded on events, even when the datafile
/// does not declare them.
pub const RESERVED_ATTRIBUTE_PREFIX: &str = "$opt_";

/// Reserved attribute overriding the bucketing key. Must hold a string.
pub const BUCKETING_ID_ATTRIBUTE: &str = "$opt_bucketing_id";

/// Reserved attribute carrying the client user agent.
pub const USER_AGENT_ATTRIBUTE: &str = "$opt_user_agent";

/// Reserved attribute carrying per-experiment bucket assignments.
pub const EXPERIMENT_BUCKET_MAP_ATTRIBUTE: &str = "$opt_experiment_bucket_map";

/// Reserved attribute attached to events when the project has bot filtering
/// configured.
pub const BOT_FILTERING_ATTRIBUTE: &str = "$opt_bot_filtering";

/// Type alias for a map of attribute names to attribute values.
///
/// # Examples
/// ```
/// # use flagship_core::{Attributes, AttributeValue};
/// let attributes = [
///     ("age".to_owned(), 30i64.into()),
///     ("is_premium_member".to_owned(), true.into()),
///     ("username".to_owned(), "john_doe".into()),
/// ].into_iter().collect::<Attributes>();
/// ```
pub type Attributes = HashMap<String, AttributeValue>;

/// Enum representing possible values of a user attribute.
///
/// Integers and floating-point numbers are kept apart because the datafile
/// declares them separately, but matchers treat finite numerics as
/// interchangeable.
///
/// Conveniently implements `From` conversions for `String`, `&str`, `bool`,
/// `i64`, and `f64`.
#[derive(Debug, Serialize, Deserialize, PartialEq, From, Clone)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string value.
    String(String),
    /// A boolean value.
    Bool(bool),
    /// A 64-bit integer value.
    Int(i64),
    /// A 64-bit floating-point value.
    Double(f64),
    /// A null value or absence of value.
    Null,
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> AttributeValue {
        AttributeValue::String(value.to_owned())
    }
}

impl AttributeValue {
    /// Return the string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Return the boolean content, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Return a numeric view of this value. Integers are widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Return `true` for [`AttributeValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::AttributeValue;

    #[test]
    fn from_conversions() {
        assert_eq!(
            AttributeValue::from("abc"),
            AttributeValue::String("abc".to_owned())
        );
        assert_eq!(AttributeValue::from(true), AttributeValue::Bool(true));
        assert_eq!(AttributeValue::from(42i64), AttributeValue::Int(42));
        assert_eq!(AttributeValue::from(4.2), AttributeValue::Double(4.2));
    }

    #[test]
    fn numeric_view_widens_integers() {
        assert_eq!(AttributeValue::Int(7).as_f64(), Some(7.0));
        assert_eq!(AttributeValue::Double(7.5).as_f64(), Some(7.5));
        assert_eq!(AttributeValue::from("7").as_f64(), None);
    }

    #[test]
    fn untagged_serialization() {
        assert_eq!(
            serde_json::to_value(AttributeValue::Int(3)).unwrap(),
            serde_json::json!(3)
        );
        assert_eq!(
            serde_json::to_value(AttributeValue::from("x")).unwrap(),
            serde_json::json!("x")
        );
        assert_eq!(
            serde_json::to_value(AttributeValue::Null).unwrap(),
            serde_json::Value::Null
        );
    }
}
