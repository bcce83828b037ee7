use std::collections::BTreeMap;
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::security::acl::Acl;

/// Qualified property name. The empty namespace is the default namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyName {
    pub namespace: String,
    pub name: String,
}

impl PropertyName {
    pub fn new(namespace: &str, name: &str) -> Self {
        PropertyName {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn local(name: &str) -> Self {
        PropertyName::new("", name)
    }

    /// Index field key, always `namespace:name`. System fields never contain
    /// a colon, so the two key spaces cannot collide.
    pub fn field_key(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    pub fn from_field_key(key: &str) -> Option<Self> {
        let (namespace, name) = key.split_once(':')?;
        Some(PropertyName::new(namespace, name))
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.namespace, self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Date(DateTime<Utc>),
    /// Complex value kept as JSON text; top-level attributes are indexed
    /// separately so they can be queried and sorted on.
    Json(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Top-level scalar attribute of a complex value.
    pub fn attribute(&self, attribute: &str) -> Option<PropertyValue> {
        let PropertyValue::Json(text) = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        match value.get(attribute)? {
            serde_json::Value::String(s) => Some(PropertyValue::String(s.clone())),
            serde_json::Value::Bool(b) => Some(PropertyValue::Boolean(*b)),
            serde_json::Value::Number(n) => n.as_i64().map(PropertyValue::Integer),
            _ => None,
        }
    }

    /// Names of the top-level scalar attributes of a complex value.
    pub fn attribute_names(&self) -> Vec<String> {
        let PropertyValue::Json(text) = self else {
            return Vec::new();
        };
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::Date(value)
    }
}

/// Properties of one search hit, materialized according to a `PropertySelect`.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySet {
    pub uri: String,
    pub name: String,
    pub resource_type: String,
    pub properties: BTreeMap<PropertyName, Vec<PropertyValue>>,
    pub acl: Option<Acl>,
}

impl PropertySet {
    pub fn new(uri: String, resource_type: String) -> Self {
        let name = resource_name(&uri).to_string();
        PropertySet {
            uri,
            name,
            resource_type,
            properties: BTreeMap::new(),
            acl: None,
        }
    }

    pub fn property(&self, name: &PropertyName) -> Option<&PropertyValue> {
        self.properties.get(name).and_then(|values| values.first())
    }

    pub fn values(&self, name: &PropertyName) -> &[PropertyValue] {
        self.properties.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn property_names(&self) -> impl Iterator<Item = &PropertyName> {
        self.properties.keys()
    }
}

/// Last path segment of a URI; the root collection is named "/".
pub fn resource_name(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_derived_from_the_last_segment() {
        assert_eq!(resource_name("/a/b/report.pdf"), "report.pdf");
        assert_eq!(resource_name("/a/b/"), "b");
        assert_eq!(resource_name("/"), "/");
    }

    #[test]
    fn field_keys_round_trip() {
        let name = PropertyName::new("content", "title");
        assert_eq!(name.field_key(), "content:title");
        assert_eq!(PropertyName::from_field_key("content:title"), Some(name));
        assert_eq!(PropertyName::from_field_key(":title"), Some(PropertyName::local("title")));
        assert_eq!(PropertyName::from_field_key("uri"), None);
    }

    #[test]
    fn complex_values_expose_scalar_attributes() {
        let value = PropertyValue::Json(r#"{"city":"Oslo","zip":150,"tags":[1]}"#.to_string());
        assert_eq!(value.attribute("city"), Some(PropertyValue::from("Oslo")));
        assert_eq!(value.attribute("zip"), Some(PropertyValue::Integer(150)));
        assert_eq!(value.attribute("tags"), None);
        assert_eq!(value.attribute_names().len(), 3);
    }
}
