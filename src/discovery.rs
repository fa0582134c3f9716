//! Repository discovery abstraction layer
//!
//! A [`RepoSource`] hands out one page of repository descriptors at a time.
//! [`list_all`] turns any source into a lazy stream that walks the pages in
//! order and stops at the first page that carries no continuation.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use std::fmt;

/// Minimal remote metadata needed to locate and update one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDescriptor {
    /// Repository name in `owner/name` form, unique within an organization
    pub full_name: String,

    /// Address handed to the update command
    pub clone_url: String,
}

impl RepoDescriptor {
    pub fn new(full_name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            clone_url: clone_url.into(),
        }
    }
}

impl fmt::Display for RepoDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// One page of a listing plus the number of the page that follows it
#[derive(Debug, Clone, Default)]
pub struct RepoPage {
    pub items: Vec<RepoDescriptor>,

    /// `None` (or a page that does not advance) ends the listing
    pub next_page: Option<u32>,
}

/// Trait for paginated repository listing
///
/// Implement this trait to plug another hosting provider (or a test double)
/// into the sync loop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Fetch a single page. Pages are numbered from 1.
    async fn fetch_page(&self, page: u32) -> Result<RepoPage>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

/// Lazily enumerate every repository of a source, page by page.
///
/// A page is only requested once the previous one has been fully consumed.
/// The first failed request ends the stream with that error.
pub fn list_all<S>(source: &S) -> impl Stream<Item = Result<RepoDescriptor>> + '_
where
    S: RepoSource + ?Sized,
{
    stream::try_unfold(Some(1u32), move |next| async move {
        let Some(page) = next else {
            return Ok::<_, anyhow::Error>(None);
        };

        tracing::debug!("Fetching page {} from {}", page, source.provider_name());
        let fetched = source.fetch_page(page).await?;
        tracing::debug!("Page {} returned {} repositories", page, fetched.items.len());

        let following = fetched.next_page.filter(|&n| n > page);
        let items = stream::iter(fetched.items.into_iter().map(Ok::<_, anyhow::Error>));

        Ok(Some((items, following)))
    })
    .try_flatten()
}
