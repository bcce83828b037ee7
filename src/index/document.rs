use std::collections::BTreeMap;
use crate::core::error::{Error, Result};
use crate::core::types::{resource_name, PropertyName, PropertyValue};
use crate::security::acl::Acl;

/// A resource as handed to the index. The ACL is validated on construction,
/// so the index never sees an ACL that violates the owner/all-users rules.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    uri: String,
    resource_type: String,
    owner: String,
    acl: Acl,
    published: bool,
    in_unpublished_collection: bool,
    properties: BTreeMap<PropertyName, Vec<PropertyValue>>,
}

impl IndexDocument {
    pub fn new(uri: &str, resource_type: &str, owner: &str, acl: Acl) -> Result<Self> {
        if !uri.starts_with('/') {
            return Err(Error::invalid_argument(format!("URI must be absolute: {}", uri)));
        }
        acl.validate(owner)?;

        Ok(IndexDocument {
            uri: uri.to_string(),
            resource_type: resource_type.to_string(),
            owner: owner.to_string(),
            acl,
            published: true,
            in_unpublished_collection: false,
            properties: BTreeMap::new(),
        })
    }

    pub fn with_property(mut self, name: PropertyName, value: impl Into<PropertyValue>) -> Self {
        self.properties.entry(name).or_default().push(value.into());
        self
    }

    pub fn with_values(mut self, name: PropertyName, values: Vec<PropertyValue>) -> Self {
        self.properties.insert(name, values);
        self
    }

    pub fn unpublished(mut self) -> Self {
        self.published = false;
        self
    }

    pub fn in_unpublished_collection(mut self) -> Self {
        self.in_unpublished_collection = true;
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn name(&self) -> &str {
        resource_name(&self.uri)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn acl(&self) -> &Acl {
        &self.acl
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn is_in_unpublished_collection(&self) -> bool {
        self.in_unpublished_collection
    }

    pub fn properties(&self) -> &BTreeMap<PropertyName, Vec<PropertyValue>> {
        &self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::security::acl::{Action, Principal};

    #[test]
    fn invalid_acls_never_reach_the_index() {
        let acl = Acl::owner_default().with_grant(Action::Write, Principal::PseudoAll);
        let err = IndexDocument::new("/a.txt", "file", "alice", acl).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalOperation);

        let acl = Acl::new().with_grant(Action::Read, Principal::PseudoOwner);
        assert!(IndexDocument::new("/a.txt", "file", "alice", acl).is_err());
    }

    #[test]
    fn relative_uris_are_rejected() {
        let err = IndexDocument::new("a.txt", "file", "alice", Acl::owner_default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn properties_accumulate_values() {
        let tags = PropertyName::local("tags");
        let doc = IndexDocument::new("/docs/a.txt", "file", "alice", Acl::owner_default())
            .unwrap()
            .with_property(tags.clone(), "red")
            .with_property(tags.clone(), "blue");
        assert_eq!(doc.properties()[&tags].len(), 2);
        assert_eq!(doc.name(), "a.txt");
    }
}
