use std::collections::HashSet;
use crate::core::error::{Error, Result};
use crate::core::types::PropertyName;
use crate::index::term;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Resource identity fields that can be sorted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceField {
    Uri,
    Name,
    Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SortField {
    Resource {
        field: ResourceField,
        direction: SortDirection,
    },
    Property {
        name: PropertyName,
        direction: SortDirection,
        /// Locale-aware comparison; string values compare case-insensitively
        locale: Option<String>,
        /// Sort on one attribute of a complex value
        attribute: Option<String>,
    },
}

impl SortField {
    pub fn resource(field: ResourceField, direction: SortDirection) -> Self {
        SortField::Resource { field, direction }
    }

    pub fn property(name: PropertyName, direction: SortDirection) -> Self {
        SortField::Property {
            name,
            direction,
            locale: None,
            attribute: None,
        }
    }

    pub fn direction(&self) -> SortDirection {
        match self {
            SortField::Resource { direction, .. } | SortField::Property { direction, .. } => *direction,
        }
    }

    /// Index field holding the doc values this field sorts by.
    pub fn field_key(&self) -> String {
        match self {
            SortField::Resource { field, .. } => match field {
                ResourceField::Uri => term::URI.to_string(),
                ResourceField::Name => term::NAME.to_string(),
                ResourceField::Type => term::TYPE.to_string(),
            },
            SortField::Property { name, attribute: Some(attribute), .. } => {
                term::attribute_field(&name.field_key(), attribute)
            }
            SortField::Property { name, .. } => name.field_key(),
        }
    }
}

/// Ordered sort specification. Every field appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sorting {
    fields: Vec<SortField>,
}

impl Sorting {
    pub fn new(fields: Vec<SortField>) -> Result<Self> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.field_key()) {
                return Err(Error::invalid_argument(format!(
                    "sort field referenced more than once: {}",
                    field.field_key()
                )));
            }
        }
        Ok(Sorting { fields })
    }

    pub fn by(field: SortField) -> Self {
        Sorting { fields: vec![field] }
    }

    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    /// The fields followed by an ascending URI tie-break unless the URI is
    /// already sorted on, giving a total order.
    pub fn with_tie_break(&self) -> Vec<SortField> {
        let mut fields = self.fields.clone();
        let has_uri = fields.iter().any(|f| f.field_key() == term::URI);
        if !has_uri {
            fields.push(SortField::resource(ResourceField::Uri, SortDirection::Ascending));
        }
        fields
    }
}

/// Engine-level comparator over doc values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeSort {
    pub fields: Vec<NativeSortField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeSortField {
    pub field: String,
    pub descending: bool,
    pub case_insensitive: bool,
}

impl From<&SortField> for NativeSortField {
    fn from(field: &SortField) -> Self {
        let case_insensitive = matches!(field, SortField::Property { locale: Some(_), .. });
        NativeSortField {
            field: field.field_key(),
            descending: field.direction() == SortDirection::Descending,
            case_insensitive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_fields_are_rejected() {
        let title = PropertyName::new("", "title");
        let result = Sorting::new(vec![
            SortField::property(title.clone(), SortDirection::Ascending),
            SortField::property(title, SortDirection::Descending),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn uri_tie_break_is_appended_once() {
        let sorting = Sorting::by(SortField::resource(ResourceField::Name, SortDirection::Descending));
        let fields = sorting.with_tie_break();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].field_key(), term::URI);
        assert_eq!(fields[1].direction(), SortDirection::Ascending);

        let by_uri = Sorting::by(SortField::resource(ResourceField::Uri, SortDirection::Descending));
        let fields = by_uri.with_tie_break();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].direction(), SortDirection::Descending);
    }

    #[test]
    fn attribute_sorts_use_attribute_field() {
        let field = SortField::Property {
            name: PropertyName::new("geo", "address"),
            direction: SortDirection::Ascending,
            locale: Some("nb".to_string()),
            attribute: Some("city".to_string()),
        };
        let native = NativeSortField::from(&field);
        assert_eq!(native.field, "geo:address@city");
        assert!(native.case_insensitive);
        assert!(!native.descending);
    }
}
