//! Unit tests for cursor pagination

use asana_extractor::fetcher::pagination::{fetch_all, paginate, Page};
use asana_extractor::fetcher::{FetcherError, FetcherResult};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Serves a fixed list of pages keyed by the cursor that requests them.
struct PageScript {
    pages: Vec<(Option<&'static str>, Page<&'static str>)>,
    calls: AtomicUsize,
    cursors: Mutex<Vec<Option<String>>>,
}

impl PageScript {
    fn new(pages: Vec<(Option<&'static str>, Page<&'static str>)>) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
            cursors: Mutex::new(Vec::new()),
        }
    }

    async fn fetch(&self, cursor: Option<String>) -> FetcherResult<Page<&'static str>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cursors.lock().unwrap().push(cursor.clone());
        let page = self
            .pages
            .iter()
            .find(|(expected, _)| expected.map(str::to_string) == cursor)
            .map(|(_, page)| page.clone())
            .expect("unexpected cursor");
        Ok(page)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_follows_cursors_until_empty_page() {
    let script = PageScript::new(vec![
        (None, Page::new(vec!["A", "B"], Some("cursor1".to_string()))),
        (Some("cursor1"), Page::new(vec!["C"], Some("cursor2".to_string()))),
        (Some("cursor2"), Page::new(vec![], None)),
    ]);

    let items = fetch_all(|cursor| script.fetch(cursor)).await.unwrap();

    assert_eq!(items, vec!["A", "B", "C"]);
    assert_eq!(script.calls(), 3);
    assert_eq!(
        *script.cursors.lock().unwrap(),
        vec![None, Some("cursor1".to_string()), Some("cursor2".to_string())]
    );
}

#[tokio::test]
async fn test_empty_first_page_ends_after_one_fetch() {
    let script = PageScript::new(vec![(None, Page::last(vec![]))]);

    let items = fetch_all(|cursor| script.fetch(cursor)).await.unwrap();

    assert!(items.is_empty());
    assert_eq!(script.calls(), 1);
}

#[tokio::test]
async fn test_empty_page_with_cursor_still_ends() {
    let script = PageScript::new(vec![
        (None, Page::new(vec!["A"], Some("c1".to_string()))),
        (Some("c1"), Page::new(vec![], Some("c2".to_string()))),
    ]);

    let items = fetch_all(|cursor| script.fetch(cursor)).await.unwrap();

    assert_eq!(items, vec!["A"]);
    assert_eq!(script.calls(), 2);
}

#[tokio::test]
async fn test_page_without_cursor_is_last() {
    let script = PageScript::new(vec![(None, Page::last(vec!["A", "B"]))]);

    let items = fetch_all(|cursor| script.fetch(cursor)).await.unwrap();

    assert_eq!(items, vec!["A", "B"]);
    assert_eq!(script.calls(), 1);
}

#[tokio::test]
async fn test_fetch_error_is_propagated() {
    let calls = AtomicUsize::new(0);
    let result: FetcherResult<Vec<u32>> = fetch_all(|cursor: Option<String>| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            match cursor {
                None => Ok(Page::new(vec![1, 2], Some("next".to_string()))),
                Some(_) => Err(FetcherError::TooManyPages(0)),
            }
        }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stream_yields_items_in_order() {
    let script = PageScript::new(vec![
        (None, Page::new(vec!["A", "B"], Some("c1".to_string()))),
        (Some("c1"), Page::last(vec!["C"])),
    ]);

    let items: Vec<_> = paginate(|cursor| script.fetch(cursor))
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(items, vec!["A", "B", "C"]);
}
