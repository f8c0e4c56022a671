//! Search capability over discussion forums.
//!
//! The collector only sees the [`SearchProvider`] trait: run one ranked query
//! against one forum section and get back [`RawItem`]s. Rate limiting,
//! pagination and authentication are the provider's concern.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Reddit | [`reddit`] | JSON search listing | Anonymous, or app-only OAuth when credentials are set |

pub mod reddit;

use crate::config::SortOrder;
use crate::error::SearchError;
use crate::models::RawItem;

/// One ranked query against one forum section.
#[derive(Debug, Clone, Copy)]
pub struct SearchQuery<'a> {
    pub source: &'a str,
    pub phrase: &'a str,
    pub sort: SortOrder,
    /// Upper bound on returned items.
    pub limit: usize,
}

/// Something that can search a forum section.
pub trait SearchProvider {
    /// Return at most `query.limit` items, in the provider's ranking order.
    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<RawItem>, SearchError>;
}

impl<T: SearchProvider> SearchProvider for &T {
    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<RawItem>, SearchError> {
        (**self).search(query).await
    }
}
