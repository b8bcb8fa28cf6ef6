//! Keyset ("seek") pagination over a filtered, ordered record set.
//!
//! # Responsibility
//! - Own the cursor state of one browsing session.
//! - Build `id`-boundary predicates for the previous/current/next page.
//! - Keep total item and page counts in step with the static filter.
//!
//! # Invariants
//! - Ordering must include `id`; it is the seek key and the tie-breaker.
//! - A fresh cursor has page index 0 and both boundary ids at 0.
//! - Boundary ids only move when a fetch returns at least one row.
//! - Counting and fetching are separate statements. Rows inserted or
//!   deleted between them can make totals disagree with the fetched page.
//! - A pager is confined to one caller; it is not meant to be shared.

use crate::db::StoreExecutor;
use crate::model::{FieldValue, RecordId};
use crate::repo::predicate::{OrderBy, Predicate, SortDirection};
use crate::repo::record_repo::{Record, RecordRepository, RepoError, RepoResult, ID_COLUMN};
use log::debug;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Previous,
    Current,
    Next,
}

impl PageDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Previous => "previous",
            Self::Current => "current",
            Self::Next => "next",
        }
    }
}

impl Display for PageDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageDirection {
    type Err = RepoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "previous" => Ok(Self::Previous),
            "current" => Ok(Self::Current),
            "next" => Ok(Self::Next),
            other => Err(RepoError::InvalidDirection(other.to_string())),
        }
    }
}

/// Cached result of the last count query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTotals {
    pub total_items: u64,
    pub total_pages: u32,
}

/// Pagination state of one browsing session.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCursor {
    order: OrderBy,
    filter: Predicate,
    page_size: u32,
    page_index: u32,
    first_id: RecordId,
    last_id: RecordId,
    totals: Option<PageTotals>,
}

impl PageCursor {
    pub fn new(order: OrderBy) -> Self {
        Self {
            order,
            filter: Predicate::all(),
            page_size: 0,
            page_index: 0,
            first_id: 0,
            last_id: 0,
            totals: None,
        }
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = filter;
        self
    }

    /// `0` selects [`DEFAULT_PAGE_SIZE`].
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn order(&self) -> &OrderBy {
        &self.order
    }

    pub fn filter(&self) -> &Predicate {
        &self.filter
    }

    /// Effective page size.
    pub fn page_size(&self) -> u32 {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn first_id(&self) -> RecordId {
        self.first_id
    }

    pub fn last_id(&self) -> RecordId {
        self.last_id
    }

    pub fn totals(&self) -> Option<PageTotals> {
        self.totals
    }

    fn has_fetched(&self) -> bool {
        self.page_index != 0 || self.first_id != 0 || self.last_id != 0
    }

    fn rewind(&mut self) {
        self.page_index = 0;
        self.first_id = 0;
        self.last_id = 0;
        self.totals = None;
    }
}

/// Walks pages of kind `K` forward and backward by id boundaries.
pub struct KeysetPager<'store, K: Record> {
    repo: RecordRepository<'store, K>,
    cursor: PageCursor,
}

impl<'store, K: Record> KeysetPager<'store, K> {
    pub fn new(store: &'store dyn StoreExecutor, cursor: PageCursor) -> Self {
        Self {
            repo: RecordRepository::new(store),
            cursor,
        }
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    /// Replaces the static filter and rewinds to the first page.
    pub fn set_filter(&mut self, filter: Predicate) {
        self.cursor.filter = filter;
        self.cursor.rewind();
    }

    /// Replaces the ordering and rewinds to the first page.
    pub fn set_order(&mut self, order: OrderBy) {
        self.cursor.order = order;
        self.cursor.rewind();
    }

    /// Replaces the page size and rewinds to the first page.
    pub fn set_page_size(&mut self, page_size: u32) {
        self.cursor.page_size = page_size;
        self.cursor.rewind();
    }

    /// Re-counts the filtered set and caches the totals.
    pub fn refresh_page_count(&mut self) -> RepoResult<PageTotals> {
        let total_items = self.repo.count_where(&self.cursor.filter)?;
        let page_size = u64::from(self.cursor.page_size());
        let total_pages = u32::try_from(total_items.div_ceil(page_size)).unwrap_or(u32::MAX);

        let totals = PageTotals {
            total_items,
            total_pages,
        };
        self.cursor.totals = Some(totals);
        Ok(totals)
    }

    /// Boundary predicate for `direction`, conjoined with the static filter.
    pub fn build_seek_predicate(&self, direction: PageDirection) -> RepoResult<Predicate> {
        let id_direction = self.id_direction()?;
        let ascending = id_direction == SortDirection::Asc;
        let first = self.cursor.first_id;
        let last = self.cursor.last_id;

        let (sql, params): (&str, Vec<RecordId>) = match direction {
            PageDirection::Previous if ascending => ("id < ?", vec![first]),
            PageDirection::Previous => ("id > ?", vec![first]),
            // Ids start at 1, so `id > 0` reads the first page in either order.
            PageDirection::Current | PageDirection::Next if !self.cursor.has_fetched() => {
                ("id > ?", vec![0])
            }
            PageDirection::Current if ascending => ("id >= ? AND id <= ?", vec![first, last]),
            PageDirection::Current => ("id <= ? AND id >= ?", vec![first, last]),
            PageDirection::Next if ascending => ("id > ?", vec![last]),
            PageDirection::Next => ("id < ?", vec![last]),
        };

        let seek = Predicate::trusted(sql, params.into_iter().map(FieldValue::from).collect());
        Ok(self.cursor.filter.clone().and(seek))
    }

    /// Re-fetches the page between the current boundaries.
    ///
    /// The first call returns the first page. The page index never changes.
    pub fn current(&mut self) -> RepoResult<Vec<K>> {
        self.id_direction()?;
        self.refresh_page_count()?;
        self.fetch(PageDirection::Current)
    }

    /// Fetches the page before the current one.
    ///
    /// # Errors
    /// - `NoPreviousPage` at page index 0, without touching the store.
    pub fn previous(&mut self) -> RepoResult<Vec<K>> {
        if self.cursor.page_index == 0 {
            return Err(RepoError::NoPreviousPage);
        }
        self.id_direction()?;
        self.refresh_page_count()?;

        let rows = self.fetch(PageDirection::Previous)?;
        self.cursor.page_index -= 1;
        Ok(rows)
    }

    /// Fetches the page after the current one.
    ///
    /// Before any fetch this reads the first page and moves to index 1.
    ///
    /// # Errors
    /// - `NoNextPage` when the current page is the last one.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> RepoResult<Vec<K>> {
        self.id_direction()?;
        let totals = self.refresh_page_count()?;
        if self.cursor.page_index.saturating_add(1) >= totals.total_pages {
            return Err(RepoError::NoNextPage);
        }

        let rows = self.fetch(PageDirection::Next)?;
        self.cursor.page_index += 1;
        Ok(rows)
    }

    /// Dispatches to [`previous`](Self::previous), [`current`](Self::current)
    /// or [`next`](Self::next), propagating their errors.
    pub fn page(&mut self, direction: PageDirection) -> RepoResult<Vec<K>> {
        match direction {
            PageDirection::Previous => self.previous(),
            PageDirection::Current => self.current(),
            PageDirection::Next => self.next(),
        }
    }

    /// Parses `previous|current|next` and dispatches.
    pub fn page_str(&mut self, direction: &str) -> RepoResult<Vec<K>> {
        let direction = direction.parse::<PageDirection>()?;
        self.page(direction)
    }

    fn id_direction(&self) -> RepoResult<SortDirection> {
        self.cursor
            .order
            .direction_of(ID_COLUMN)
            .ok_or(RepoError::MissingOrderKey)
    }

    fn fetch(&mut self, direction: PageDirection) -> RepoResult<Vec<K>> {
        let predicate = self.build_seek_predicate(direction)?;
        let page_size = self.cursor.page_size();

        // The previous page is the nearest one below the boundary, so it is
        // read in reverse and flipped back into display order.
        let rows = if direction == PageDirection::Previous {
            let reversed = self.cursor.order.reversed();
            let mut rows = self
                .repo
                .find_where_ordered(&predicate, &reversed, Some(page_size))?;
            rows.reverse();
            rows
        } else {
            self.repo
                .find_where_ordered(&predicate, &self.cursor.order, Some(page_size))?
        };

        if let (Some(first), Some(last)) = (rows.first(), rows.last()) {
            self.cursor.first_id = first.id();
            self.cursor.last_id = last.id();
        }

        debug!(
            "event=page_fetch module=pager status=ok table={} direction={} page_index={} rows={} first_id={} last_id={}",
            K::TABLE,
            direction,
            self.cursor.page_index,
            rows.len(),
            self.cursor.first_id,
            self.cursor.last_id
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::{KeysetPager, PageCursor, PageDirection};
    use crate::db::open_db_in_memory;
    use crate::model::article::Article;
    use crate::model::FieldValue;
    use crate::repo::predicate::{OrderBy, Predicate};
    use crate::repo::record_repo::RepoError;
    use rusqlite::types::Value;

    #[test]
    fn direction_tokens_parse_and_reject_unknown_values() {
        assert_eq!(
            "previous".parse::<PageDirection>().unwrap(),
            PageDirection::Previous
        );
        assert!(matches!(
            "sideways".parse::<PageDirection>(),
            Err(RepoError::InvalidDirection(token)) if token == "sideways"
        ));
    }

    #[test]
    fn seek_predicates_follow_id_direction() {
        let conn = open_db_in_memory().unwrap();
        let mut pager =
            KeysetPager::<Article>::new(&conn, PageCursor::new(OrderBy::asc("id")));

        let first_fetch = pager.build_seek_predicate(PageDirection::Current).unwrap();
        assert_eq!(first_fetch.sql(), "id > ?");
        assert_eq!(first_fetch.params(), &[Value::Integer(0)]);

        pager.cursor.first_id = 11;
        pager.cursor.last_id = 20;
        pager.cursor.page_index = 1;
        assert_eq!(
            pager
                .build_seek_predicate(PageDirection::Previous)
                .unwrap()
                .sql(),
            "id < ?"
        );
        let current = pager.build_seek_predicate(PageDirection::Current).unwrap();
        assert_eq!(current.sql(), "id >= ? AND id <= ?");
        assert_eq!(current.params(), &[Value::Integer(11), Value::Integer(20)]);

        pager.cursor.order = OrderBy::desc("id");
        let fresh = KeysetPager::<Article>::new(&conn, PageCursor::new(OrderBy::desc("id")));
        let first_next = fresh.build_seek_predicate(PageDirection::Next).unwrap();
        assert_eq!(first_next.sql(), "id > ?");
        assert_eq!(first_next.params(), &[Value::Integer(0)]);
        assert_eq!(
            pager.build_seek_predicate(PageDirection::Next).unwrap().sql(),
            "id < ?"
        );
        assert_eq!(
            pager
                .build_seek_predicate(PageDirection::Previous)
                .unwrap()
                .sql(),
            "id > ?"
        );
        assert_eq!(
            pager
                .build_seek_predicate(PageDirection::Current)
                .unwrap()
                .sql(),
            "id <= ? AND id >= ?"
        );
    }

    #[test]
    fn seek_predicate_is_conjoined_with_static_filter() {
        let conn = open_db_in_memory().unwrap();
        let cursor = PageCursor::new(OrderBy::asc("id")).with_filter(Predicate::trusted(
            "title LIKE ?",
            vec![FieldValue::from("Rust%")],
        ));
        let pager = KeysetPager::<Article>::new(&conn, cursor);

        let predicate = pager.build_seek_predicate(PageDirection::Next).unwrap();
        assert_eq!(predicate.sql(), "(title LIKE ?) AND (id > ?)");
        assert_eq!(
            predicate.params(),
            &[Value::Text("Rust%".to_string()), Value::Integer(0)]
        );
    }

    #[test]
    fn ordering_without_id_is_rejected() {
        let conn = open_db_in_memory().unwrap();
        let mut pager =
            KeysetPager::<Article>::new(&conn, PageCursor::new(OrderBy::asc("title")));

        assert!(matches!(pager.current(), Err(RepoError::MissingOrderKey)));
        assert!(matches!(
            pager.build_seek_predicate(PageDirection::Next),
            Err(RepoError::MissingOrderKey)
        ));
    }

    #[test]
    fn page_size_zero_means_default() {
        let cursor = PageCursor::new(OrderBy::asc("id"));
        assert_eq!(cursor.page_size(), 10);
        assert_eq!(cursor.with_page_size(3).page_size(), 3);
    }
}
