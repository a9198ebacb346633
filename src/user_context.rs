use crate::attributes::{AttributeValue, Attributes, BUCKETING_ID_ATTRIBUTE};
use crate::{Error, Result};

/// A user evaluated against experiments and features.
///
/// `UserContext` is immutable for the duration of a decision call; decision
/// services only read from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserContext {
    /// Unique user identifier. Also the default bucketing key.
    pub id: String,
    /// Attributes used for audience targeting and event enrichment.
    pub attributes: Attributes,
    /// Audience segments this user is known to belong to.
    pub qualified_segments: Vec<String>,
}

impl UserContext {
    /// Create a user context from an id and attributes.
    pub fn new(id: impl Into<String>, attributes: Attributes) -> UserContext {
        UserContext {
            id: id.into(),
            attributes,
            qualified_segments: Vec::new(),
        }
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// The key used for bucketing: the `$opt_bucketing_id` attribute when
    /// present, the user id otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAttribute`] if the override attribute is
    /// present but not a string.
    pub fn bucketing_id(&self) -> Result<String> {
        match self.attributes.get(BUCKETING_ID_ATTRIBUTE) {
            None => Ok(self.id.clone()),
            Some(value) => value
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| Error::InvalidAttribute {
                    key: BUCKETING_ID_ATTRIBUTE.to_owned(),
                }),
        }
    }

    /// Return `true` if the user is a member of the named segment.
    pub fn is_qualified_for(&self, segment: &str) -> bool {
        self.qualified_segments.iter().any(|s| s == segment)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::UserContext;
    use crate::attributes::BUCKETING_ID_ATTRIBUTE;

    #[test]
    fn bucketing_id_defaults_to_user_id() {
        let user = UserContext::new("user-1", HashMap::new());
        assert_eq!(user.bucketing_id().unwrap(), "user-1");
    }

    #[test]
    fn bucketing_id_attribute_overrides_user_id() {
        let user = UserContext::new(
            "user-1",
            HashMap::from([(BUCKETING_ID_ATTRIBUTE.to_owned(), "custom".into())]),
        );
        assert_eq!(user.bucketing_id().unwrap(), "custom");
    }

    #[test]
    fn non_string_bucketing_id_is_an_error() {
        let user = UserContext::new(
            "user-1",
            HashMap::from([(BUCKETING_ID_ATTRIBUTE.to_owned(), 5i64.into())]),
        );
        assert!(user.bucketing_id().is_err());
    }

    #[test]
    fn qualified_segments() {
        let mut user = UserContext::new("user-1", HashMap::new());
        user.qualified_segments = vec!["beta".to_owned()];
        assert!(user.is_qualified_for("beta"));
        assert!(!user.is_qualified_for("alpha"));
    }
}
