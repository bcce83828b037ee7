use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use chrono::{DateTime, Utc};
use crate::core::types::PropertyName;
use crate::query::ast::Query;
use crate::query::sort::Sorting;

/// Result window used when a search does not set one.
pub const DEFAULT_LIMIT: usize = 40000;

/// Which properties, and whether the ACL, are materialized per hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertySelect {
    /// Every property and the ACL
    All,
    /// Resource identity only
    None,
    /// Every property, no ACL
    AllProperties,
    Named {
        names: HashSet<PropertyName>,
        include_acl: bool,
    },
}

impl PropertySelect {
    pub fn named(names: impl IntoIterator<Item = PropertyName>, include_acl: bool) -> Self {
        PropertySelect::Named {
            names: names.into_iter().collect(),
            include_acl,
        }
    }

    pub fn includes(&self, name: &PropertyName) -> bool {
        match self {
            PropertySelect::All | PropertySelect::AllProperties => true,
            PropertySelect::None => false,
            PropertySelect::Named { names, .. } => names.contains(name),
        }
    }

    pub fn include_acl(&self) -> bool {
        match self {
            PropertySelect::All => true,
            PropertySelect::None | PropertySelect::AllProperties => false,
            PropertySelect::Named { include_acl, .. } => *include_acl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterFlag {
    ExcludeUnpublished,
    /// Hide resources below an unpublished collection
    ExcludeUnpublishedCollections,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterFlags(BTreeSet<FilterFlag>);

impl FilterFlags {
    pub fn with(mut self, flag: FilterFlag) -> Self {
        self.0.insert(flag);
        self
    }

    pub fn contains(&self, flag: FilterFlag) -> bool {
        self.0.contains(&flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = FilterFlag> + '_ {
        self.0.iter().copied()
    }
}

/// Ask the search to observe every change logged up to `timestamp`,
/// waiting at most `timeout` for the index to catch up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSpec {
    pub timestamp: DateTime<Utc>,
    pub timeout: Duration,
}

impl WaitSpec {
    pub fn new(timestamp: DateTime<Utc>, timeout: Duration) -> Self {
        WaitSpec { timestamp, timeout }
    }
}

/// A complete search request. Built by value, then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    query: Query,
    sorting: Option<Sorting>,
    limit: usize,
    cursor: usize,
    select: PropertySelect,
    flags: FilterFlags,
    wait: Option<WaitSpec>,
}

impl Search {
    pub fn new(query: Query) -> Self {
        Search {
            query,
            sorting: None,
            limit: DEFAULT_LIMIT,
            cursor: 0,
            select: PropertySelect::All,
            flags: FilterFlags::default(),
            wait: None,
        }
    }

    pub fn with_sorting(mut self, sorting: Sorting) -> Self {
        self.sorting = Some(sorting);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_select(mut self, select: PropertySelect) -> Self {
        self.select = select;
        self
    }

    pub fn with_flag(mut self, flag: FilterFlag) -> Self {
        self.flags = self.flags.with(flag);
        self
    }

    pub fn wait_for(mut self, wait: WaitSpec) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn sorting(&self) -> Option<&Sorting> {
        self.sorting.as_ref()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn select(&self) -> &PropertySelect {
        &self.select
    }

    pub fn flags(&self) -> &FilterFlags {
        &self.flags
    }

    pub fn wait(&self) -> Option<&WaitSpec> {
        self.wait.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_selects() {
        let title = PropertyName::local("title");
        assert!(PropertySelect::All.includes(&title) && PropertySelect::All.include_acl());
        assert!(!PropertySelect::None.includes(&title));
        assert!(PropertySelect::AllProperties.includes(&title));
        assert!(!PropertySelect::AllProperties.include_acl());

        let named = PropertySelect::named([title.clone()], true);
        assert!(named.includes(&title));
        assert!(!named.includes(&PropertyName::local("size")));
        assert!(named.include_acl());
    }

    #[test]
    fn builder_defaults() {
        let search = Search::new(Query::MatchAll)
            .with_flag(FilterFlag::ExcludeUnpublished)
            .with_cursor(5);
        assert_eq!(search.limit(), DEFAULT_LIMIT);
        assert_eq!(search.cursor(), 5);
        assert!(search.flags().contains(FilterFlag::ExcludeUnpublished));
        assert!(search.sorting().is_none() && search.wait().is_none());
    }
}
