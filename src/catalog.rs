//! Infinite catalog list over the paginated `/pokemon` endpoint.

use crate::api::pagination::next_offset;
use crate::api::types::{ListReference, Page};

/// Append-only sequence of fetched pages plus the cursor for the next one.
///
/// At most one page request is outstanding at a time: [`CatalogFeed::load_more`]
/// hands out the cursor to fetch and refuses to hand out another until the
/// result comes back through [`CatalogFeed::complete`].
#[derive(Debug, Default)]
pub struct CatalogFeed {
    pages: Vec<FetchedPage>,
    next_cursor: Option<u32>,
    exhausted: bool,
    in_flight: Option<u32>,
}

#[derive(Debug)]
struct FetchedPage {
    offset: u32,
    page: Page,
}

impl CatalogFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// All fetched references, flattened in page order.
    pub fn items(&self) -> impl Iterator<Item = &ListReference> {
        self.pages.iter().flat_map(|p| p.page.results.iter())
    }

    pub fn get(&self, index: usize) -> Option<&ListReference> {
        self.items().nth(index)
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(|p| p.page.results.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn has_more(&self) -> bool {
        !self.exhausted
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_loading_first_page(&self) -> bool {
        self.pages.is_empty() && self.in_flight.is_some()
    }

    /// Claim the next page to fetch. Returns `None` (and issues nothing) when
    /// the list is exhausted or a fetch is already in flight.
    pub fn load_more(&mut self) -> Option<u32> {
        if self.exhausted || self.in_flight.is_some() {
            return None;
        }
        let cursor = if self.pages.is_empty() {
            0
        } else {
            self.next_cursor?
        };
        self.in_flight = Some(cursor);
        Some(cursor)
    }

    /// Record the outcome of the fetch claimed for `offset`.
    ///
    /// A failure releases the claim and leaves pages and `has_more`
    /// untouched, so calling `load_more` again retries the same cursor.
    /// Results for a cursor that is not in flight are ignored.
    pub fn complete<E>(&mut self, offset: u32, result: Result<Page, E>) -> Result<(), E> {
        if self.in_flight != Some(offset) {
            tracing::debug!(offset, "dropping page result for a cursor not in flight");
            return Ok(());
        }
        self.in_flight = None;
        let page = result?;

        self.next_cursor = next_offset(page.next.as_deref());
        if self.next_cursor.is_none() {
            self.exhausted = true;
        }
        self.pages.push(FetchedPage { offset, page });
        Ok(())
    }

    /// Swap in a refreshed copy of an already-fetched page, keeping its
    /// position. Pages that were never fetched are not inserted.
    pub fn refresh(&mut self, offset: u32, page: Page) -> bool {
        match self.pages.iter_mut().find(|p| p.offset == offset) {
            Some(existing) => {
                existing.page = page;
                true
            }
            None => false,
        }
    }
}
