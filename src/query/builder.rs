use std::sync::Arc;
use crate::analysis::tokenizer::{StandardTokenizer, Tokenizer};
use crate::core::error::{Error, Result};
use crate::index::term::{self, encode_bool, encode_str, encode_value, term_key};
use crate::query::ast::Query;
use crate::query::native::{BooleanQuery, NativeQuery, TermPattern};
use crate::query::sort::{NativeSort, NativeSortField, Sorting};
use crate::search::search::{FilterFlag, FilterFlags};
use crate::security::acl::Principal;
use crate::security::principal::{PrincipalStore, Role};
use crate::security::token::{SecurityToken, TokenResolver};

/// Translation from caller-facing queries to the engine's representation.
/// Implementations are pure: the same input always yields an equal output.
pub trait QueryBuilder: Send + Sync {
    fn to_native_query(&self, query: &Query) -> Result<NativeQuery>;

    /// `None` ranks by relevance.
    fn to_native_sort(&self, sorting: Option<&Sorting>) -> Option<NativeSort>;

    /// Restriction to what the token's principal may read, plus the filter
    /// flags. `None` means nothing is filtered out.
    fn to_native_auth_filter(
        &self,
        token: Option<&SecurityToken>,
        flags: &FilterFlags,
    ) -> Result<Option<NativeQuery>>;

    /// Whether `token` is searched as anonymous.
    fn is_anonymous(&self, token: Option<&SecurityToken>) -> bool {
        token.is_none()
    }
}

pub struct IndexQueryBuilder {
    tokens: Arc<dyn TokenResolver>,
    principals: Arc<dyn PrincipalStore>,
    tokenizer: StandardTokenizer,
}

impl IndexQueryBuilder {
    pub fn new(tokens: Arc<dyn TokenResolver>, principals: Arc<dyn PrincipalStore>) -> Self {
        IndexQueryBuilder {
            tokens,
            principals,
            tokenizer: StandardTokenizer::default(),
        }
    }

    fn acl_term(principal: &Principal) -> NativeQuery {
        NativeQuery::Term {
            key: term_key(term::ACL_READ, &encode_str(&principal.qualified_name())),
        }
    }

    /// Mirrors the read rules of the authorization decision: pseudo-all,
    /// then authenticated, direct, group and owner grants.
    fn read_filter(&self, principal: Option<&Principal>) -> Option<NativeQuery> {
        let mut grants = vec![Self::acl_term(&Principal::PseudoAll)];
        let Some(principal) = principal else {
            return Some(NativeQuery::Boolean(BooleanQuery {
                should: grants,
                ..BooleanQuery::default()
            }));
        };

        if self.principals.has_role(principal, Role::Root)
            || self.principals.has_role(principal, Role::ReadEverything)
        {
            return None;
        }

        grants.push(Self::acl_term(&Principal::PseudoAuthenticated));
        grants.push(Self::acl_term(principal));
        for group in self.principals.groups_of(principal) {
            grants.push(Self::acl_term(&group));
        }
        if let Some(user) = principal.user_id() {
            grants.push(NativeQuery::Boolean(BooleanQuery {
                must: vec![
                    Self::acl_term(&Principal::PseudoOwner),
                    NativeQuery::Term {
                        key: term_key(term::OWNER, &encode_str(user)),
                    },
                ],
                ..BooleanQuery::default()
            }));
        }

        Some(NativeQuery::Boolean(BooleanQuery {
            should: grants,
            ..BooleanQuery::default()
        }))
    }
}

impl QueryBuilder for IndexQueryBuilder {
    fn to_native_query(&self, query: &Query) -> Result<NativeQuery> {
        let native = match query {
            Query::Term(term_query) => NativeQuery::Term {
                key: term_key(&term_query.field.index_field(), &encode_value(&term_query.value)),
            },
            Query::Range(range) => {
                let (lower, upper) = term::range_bounds(
                    &range.field.index_field(),
                    range.from.as_ref(),
                    range.to.as_ref(),
                    range.include_from,
                    range.include_to,
                );
                NativeQuery::Range { lower, upper }
            }
            Query::Bool(bool_query) => NativeQuery::Boolean(BooleanQuery {
                must: self.translate_all(&bool_query.must)?,
                should: self.translate_all(&bool_query.should)?,
                must_not: self.translate_all(&bool_query.must_not)?,
                filter: Vec::new(),
            }),
            Query::Not(inner) => NativeQuery::Boolean(BooleanQuery {
                must_not: vec![self.to_native_query(inner)?],
                ..BooleanQuery::default()
            }),
            Query::Prefix(prefix) => NativeQuery::Prefix {
                field: prefix.field.index_field(),
                prefix: encode_str(&prefix.prefix),
            },
            Query::Wildcard(wildcard) => NativeQuery::Pattern {
                field: wildcard.field.index_field(),
                pattern: TermPattern::wildcard(&wildcard.pattern, wildcard.ignore_case)?,
            },
            Query::Phrase(phrase) => {
                let tokens = self.tokenizer.terms(&phrase.text);
                if tokens.is_empty() {
                    return Err(Error::invalid_argument(format!(
                        "phrase has no searchable words: {:?}",
                        phrase.text
                    )));
                }
                NativeQuery::Phrase {
                    field: phrase.field.index_field(),
                    tokens,
                }
            }
            Query::Exists(field) => NativeQuery::Exists {
                field: field.index_field(),
            },
            Query::MatchAll => NativeQuery::All,
        };
        Ok(native)
    }

    fn to_native_sort(&self, sorting: Option<&Sorting>) -> Option<NativeSort> {
        sorting.map(|sorting| NativeSort {
            fields: sorting.with_tie_break().iter().map(NativeSortField::from).collect(),
        })
    }

    fn is_anonymous(&self, token: Option<&SecurityToken>) -> bool {
        token.and_then(|token| self.tokens.principal(token)).is_none()
    }

    fn to_native_auth_filter(
        &self,
        token: Option<&SecurityToken>,
        flags: &FilterFlags,
    ) -> Result<Option<NativeQuery>> {
        // Unknown tokens are treated as anonymous
        let principal = token.and_then(|token| self.tokens.principal(token));
        let read = self.read_filter(principal.as_ref());

        let mut excluded = Vec::new();
        for flag in flags.iter() {
            excluded.push(match flag {
                FilterFlag::ExcludeUnpublished => NativeQuery::Term {
                    key: term_key(term::PUBLISHED, &encode_bool(false)),
                },
                FilterFlag::ExcludeUnpublishedCollections => NativeQuery::Term {
                    key: term_key(term::UNPUBLISHED_COLLECTION, &encode_bool(true)),
                },
            });
        }

        if read.is_none() && excluded.is_empty() {
            return Ok(None);
        }
        Ok(Some(NativeQuery::Boolean(BooleanQuery {
            filter: read.into_iter().collect(),
            must_not: excluded,
            ..BooleanQuery::default()
        })))
    }
}

impl IndexQueryBuilder {
    fn translate_all(&self, queries: &[Query]) -> Result<Vec<NativeQuery>> {
        queries.iter().map(|q| self.to_native_query(q)).collect()
    }
}
