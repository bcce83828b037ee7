use crate::core::error::{Error, Result};
use crate::core::types::{PropertyName, PropertyValue};
use crate::index::term;

/// Addressable index field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Uri,
    Name,
    Type,
    Property(PropertyName),
    /// Top-level attribute of a complex (JSON) property value
    Attribute { property: PropertyName, attribute: String },
}

impl Field {
    pub fn property(namespace: &str, name: &str) -> Self {
        Field::Property(PropertyName::new(namespace, name))
    }

    pub fn index_field(&self) -> String {
        match self {
            Field::Uri => term::URI.to_string(),
            Field::Name => term::NAME.to_string(),
            Field::Type => term::TYPE.to_string(),
            Field::Property(name) => name.field_key(),
            Field::Attribute { property, attribute } => term::attribute_field(&property.field_key(), attribute),
        }
    }
}

/// Immutable query tree built by callers
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term(TermQuery),         // Exact value match
    Range(RangeQuery),       // Value range
    Bool(BoolQuery),         // Boolean combinations
    Not(Box<Query>),         // Everything the inner query does not match
    Prefix(PrefixQuery),     // String values starting with a prefix
    Wildcard(WildcardQuery), // * and ? patterns
    Phrase(PhraseQuery),     // Consecutive words in a string value
    Exists(Field),           // Any value present
    MatchAll,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    pub field: Field,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub field: Field,
    pub from: Option<PropertyValue>,
    pub to: Option<PropertyValue>,
    pub include_from: bool,
    pub include_to: bool,
}

/// Boolean query with must/should/must_not clauses
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoolQuery {
    pub must: Vec<Query>,      // All must match (AND)
    pub should: Vec<Query>,    // At least one must match when there is no must clause (OR)
    pub must_not: Vec<Query>,  // None may match (NOT)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixQuery {
    pub field: Field,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WildcardQuery {
    pub field: Field,
    pub pattern: String, // Pattern with wildcards (* and ?)
    pub ignore_case: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhraseQuery {
    pub field: Field,
    pub text: String,
}

impl Query {
    pub fn term(field: Field, value: impl Into<PropertyValue>) -> Self {
        Query::Term(TermQuery {
            field,
            value: value.into(),
        })
    }

    /// Inclusive range; `None` leaves that side open.
    pub fn range(field: Field, from: Option<PropertyValue>, to: Option<PropertyValue>) -> Self {
        Query::Range(RangeQuery {
            field,
            from,
            to,
            include_from: true,
            include_to: true,
        })
    }

    pub fn and(clauses: Vec<Query>) -> Self {
        Query::Bool(BoolQuery {
            must: clauses,
            ..BoolQuery::default()
        })
    }

    pub fn or(clauses: Vec<Query>) -> Self {
        Query::Bool(BoolQuery {
            should: clauses,
            ..BoolQuery::default()
        })
    }

    pub fn not(query: Query) -> Self {
        Query::Not(Box::new(query))
    }

    pub fn prefix(field: Field, prefix: &str) -> Self {
        Query::Prefix(PrefixQuery {
            field,
            prefix: prefix.to_string(),
        })
    }

    pub fn wildcard(field: Field, pattern: &str) -> Self {
        Query::Wildcard(WildcardQuery {
            field,
            pattern: pattern.to_string(),
            ignore_case: false,
        })
    }

    pub fn phrase(field: Field, text: &str) -> Self {
        Query::Phrase(PhraseQuery {
            field,
            text: text.to_string(),
        })
    }

    pub fn exists(field: Field) -> Self {
        Query::Exists(field)
    }

    /// Structural checks: operator arity, bounds and nesting depth.
    pub fn validate(&self, max_depth: usize) -> Result<()> {
        self.validate_at(0, max_depth)
    }

    fn validate_at(&self, depth: usize, max_depth: usize) -> Result<()> {
        if depth > max_depth {
            return Err(Error::invalid_argument(format!(
                "query depth {} exceeds maximum {}",
                depth, max_depth
            )));
        }

        match self {
            Query::Bool(bool_query) => {
                let clauses = bool_query
                    .must
                    .iter()
                    .chain(&bool_query.should)
                    .chain(&bool_query.must_not);
                let mut count = 0;
                for clause in clauses {
                    clause.validate_at(depth + 1, max_depth)?;
                    count += 1;
                }
                if count == 0 {
                    return Err(Error::invalid_argument("boolean query without clauses"));
                }
            }
            Query::Not(inner) => inner.validate_at(depth + 1, max_depth)?,
            Query::Range(range) => {
                if range.from.is_none() && range.to.is_none() {
                    return Err(Error::invalid_argument("range query without bounds"));
                }
                if let (Some(from), Some(to)) = (&range.from, &range.to) {
                    if std::mem::discriminant(from) != std::mem::discriminant(to) {
                        return Err(Error::invalid_argument("range bounds of different types"));
                    }
                }
            }
            Query::Wildcard(wildcard) if wildcard.pattern.is_empty() => {
                return Err(Error::invalid_argument("empty wildcard pattern"));
            }
            Query::Phrase(phrase) => {
                if phrase.text.trim().is_empty() {
                    return Err(Error::invalid_argument("empty phrase"));
                }
                if matches!(phrase.field, Field::Attribute { .. }) {
                    return Err(Error::invalid_argument("phrases cannot target value attributes"));
                }
            }
            _ => {}
        }
        Ok(())
    }
}
