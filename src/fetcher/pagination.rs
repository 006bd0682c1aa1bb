//! Cursor pagination
//!
//! Turns a "fetch one page" function into a lazy stream of items:
//! - the first request carries no cursor
//! - each page's cursor selects the next page
//! - a page without a cursor, or with no items, ends the stream
//!
//! Includes a maximum page count to stop a server that never ends the stream.

use futures::stream::{self, Stream, TryStreamExt};
use std::future::Future;
use tracing::debug;

use crate::fetcher::{FetcherError, FetcherResult};

/// Maximum number of pages fetched for one stream.
pub const MAX_PAGES: usize = 10_000;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items in server order
    pub items: Vec<T>,
    /// Cursor of the following page; `None` on the last page
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Build a page. An empty cursor is treated as absent.
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self {
            items,
            next_cursor: next_cursor.filter(|cursor| !cursor.is_empty()),
        }
    }

    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }

    /// Whether no page follows this one.
    pub fn is_last(&self) -> bool {
        self.items.is_empty() || self.next_cursor.is_none()
    }
}

/// Stream every item of a paginated listing.
///
/// Pages are fetched on demand, strictly in order. The first fetch error ends
/// the stream; nothing is retried here.
pub fn paginate<T, F, Fut>(fetch_page: F) -> impl Stream<Item = FetcherResult<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = FetcherResult<Page<T>>>,
{
    // State: fetch function, cursor of the next page (None = stream ended), pages fetched.
    let initial = (fetch_page, Some(None::<String>), 0usize);

    stream::try_unfold(initial, |(mut fetch_page, next, fetched)| async move {
        let Some(cursor) = next else {
            return Ok::<_, FetcherError>(None);
        };
        if fetched >= MAX_PAGES {
            return Err(FetcherError::TooManyPages(MAX_PAGES));
        }

        let page = fetch_page(cursor).await?;
        let fetched = fetched + 1;
        debug!(
            page = fetched,
            items = page.items.len(),
            has_more = !page.is_last(),
            "fetched page"
        );

        if page.items.is_empty() {
            return Ok(None);
        }

        let next = page.next_cursor.map(Some);
        Ok(Some((page.items, (fetch_page, next, fetched))))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, FetcherError>)))
    .try_flatten()
}

/// Collect a whole listing, or fail with the first error.
pub async fn fetch_all<T, F, Fut>(fetch_page: F) -> FetcherResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = FetcherResult<Page<T>>>,
{
    let items: Vec<T> = paginate(fetch_page).try_collect().await?;
    debug!(items = items.len(), "pagination complete");
    Ok(items)
}
