use std::collections::HashMap;
use std::fmt;

use aws_sdk_dynamodb::types::AttributeValue;

use crate::error::TableError;

pub const ATTR_LOCK_KEY: &str = "lock_key";
pub const ATTR_HOLDER_ID: &str = "holder_id";
pub const ATTR_INFO: &str = "info";

/// One row of the lock table. Its existence is the locked state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub lock_key: String,
    pub holder_id: String,
    pub info: Option<String>,
}

impl LockRecord {
    pub fn new(lock_key: impl Into<String>, holder_id: impl Into<String>) -> Self {
        Self {
            lock_key: lock_key.into(),
            holder_id: holder_id.into(),
            info: None,
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Parse a DynamoDB item.
    ///
    /// An item that exists but lacks a string key or holder attribute is an
    /// error, not an absent lock.
    pub fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Self, TableError> {
        let lock_key = string_attr(item, ATTR_LOCK_KEY)?;
        let holder_id = string_attr(item, ATTR_HOLDER_ID)?;
        let info = item.get(ATTR_INFO).and_then(|v| v.as_s().ok()).cloned();
        Ok(Self {
            lock_key,
            holder_id,
            info,
        })
    }
}

fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Result<String, TableError> {
    let problem = match item.get(name) {
        Some(AttributeValue::S(value)) => return Ok(value.clone()),
        Some(_) => "is not a string",
        None => "is missing",
    };
    Err(TableError::Unavailable(format!(
        "malformed lock record: {name} {problem}"
    )))
}

impl fmt::Display for LockRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.holder_id)?;
        if let Some(info) = &self.info {
            write!(f, " (info: {info})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_string())
    }

    #[test]
    fn parses_full_item() {
        let item = HashMap::from([
            (ATTR_LOCK_KEY.to_string(), s("default")),
            (ATTR_HOLDER_ID.to_string(), s("ci-run-42")),
            (ATTR_INFO.to_string(), s("applying 3 of 7")),
        ]);
        let record = LockRecord::from_item(&item).unwrap();
        assert_eq!(
            record,
            LockRecord::new("default", "ci-run-42").with_info("applying 3 of 7")
        );
        assert_eq!(record.to_string(), "ci-run-42 (info: applying 3 of 7)");
    }

    #[test]
    fn item_without_holder_is_an_error() {
        let item = HashMap::from([(ATTR_LOCK_KEY.to_string(), s("default"))]);
        let err = LockRecord::from_item(&item).unwrap_err();
        assert_eq!(
            err,
            TableError::Unavailable("malformed lock record: holder_id is missing".into())
        );
    }

    #[test]
    fn non_string_holder_is_an_error() {
        let item = HashMap::from([
            (ATTR_LOCK_KEY.to_string(), s("default")),
            (ATTR_HOLDER_ID.to_string(), AttributeValue::N("42".into())),
        ]);
        assert!(matches!(
            LockRecord::from_item(&item),
            Err(TableError::Unavailable(msg)) if msg.contains("holder_id is not a string")
        ));
    }

    #[test]
    fn non_string_info_is_ignored() {
        let item = HashMap::from([
            (ATTR_LOCK_KEY.to_string(), s("default")),
            (ATTR_HOLDER_ID.to_string(), s("alice")),
            (ATTR_INFO.to_string(), AttributeValue::N("7".into())),
        ]);
        assert_eq!(LockRecord::from_item(&item).unwrap().info, None);
    }
}
