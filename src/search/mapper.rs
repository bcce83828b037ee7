use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::PropertySet;
use crate::index::segment::{FieldSet, PropertyFields, RawDocument, StoredProperty};
use crate::index::term;
use crate::search::search::PropertySelect;
use crate::security::acl::Acl;

/// Turns stored fields into result property sets. Only the fields named by
/// `fields_to_load` are ever read off a segment.
pub trait DocumentMapper: Send + Sync {
    fn fields_to_load(&self, select: &PropertySelect) -> FieldSet;

    fn map_document(&self, raw: RawDocument, select: &PropertySelect) -> Result<PropertySet>;
}

#[derive(Debug, Clone, Default)]
pub struct StoredFieldMapper;

impl StoredFieldMapper {
    fn required_string(raw: &RawDocument, key: &str) -> Result<String> {
        let bytes = raw
            .get(key)
            .ok_or_else(|| Error::new(ErrorKind::Internal, format!("stored field {} missing", key)))?;
        Ok(bincode::deserialize(bytes)?)
    }
}

impl DocumentMapper for StoredFieldMapper {
    fn fields_to_load(&self, select: &PropertySelect) -> FieldSet {
        let properties = match select {
            PropertySelect::All | PropertySelect::AllProperties => PropertyFields::All,
            PropertySelect::None => PropertyFields::None,
            PropertySelect::Named { names, .. } => {
                PropertyFields::Only(names.iter().map(|name| name.field_key()).collect())
            }
        };
        FieldSet {
            properties,
            acl: select.include_acl(),
        }
    }

    fn map_document(&self, raw: RawDocument, select: &PropertySelect) -> Result<PropertySet> {
        let uri = Self::required_string(&raw, term::STORED_URI)?;
        let resource_type = Self::required_string(&raw, term::STORED_TYPE)?;
        let mut set = PropertySet::new(uri, resource_type);
        if let Some(bytes) = raw.get(term::STORED_NAME) {
            set.name = bincode::deserialize(bytes)?;
        }

        for (key, bytes) in &raw.fields {
            match key.as_str() {
                term::STORED_URI | term::STORED_NAME | term::STORED_TYPE => {}
                term::STORED_ACL => {
                    if select.include_acl() {
                        let acl: Acl = bincode::deserialize(bytes)?;
                        set.acl = Some(acl);
                    }
                }
                _ => {
                    let property: StoredProperty = bincode::deserialize(bytes)?;
                    if select.includes(&property.name) {
                        set.properties.insert(property.name, property.values);
                    }
                }
            }
        }
        Ok(set)
    }
}
