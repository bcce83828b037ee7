use crate::core::error::{BoxError, Result};
use crate::core::types::PropertySet;
use crate::search::results::ResultSet;
use crate::search::search::Search;
use crate::security::token::SecurityToken;

pub type CallbackResult = std::result::Result<bool, BoxError>;

/// Receives matches from `Searcher::iterate_matching`. Returning `Ok(false)`
/// stops the iteration; an error stops it and is handed back to the caller.
pub trait MatchCallback {
    fn matching(&mut self, result: PropertySet) -> CallbackResult;
}

impl<F> MatchCallback for F
where
    F: FnMut(PropertySet) -> CallbackResult,
{
    fn matching(&mut self, result: PropertySet) -> CallbackResult {
        self(result)
    }
}

pub trait Searcher: Send + Sync {
    /// Ranked, windowed results. `None` searches anonymously.
    fn execute(&self, token: Option<&SecurityToken>, search: &Search) -> Result<ResultSet>;

    /// Stream every match to `callback`, unsorted or by one ascending field.
    fn iterate_matching(
        &self,
        token: Option<&SecurityToken>,
        search: &Search,
        callback: &mut dyn MatchCallback,
    ) -> Result<()>;
}
