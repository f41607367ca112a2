//! Pagination
//!
//! A paginator wraps an entity-bound statement: construction runs a count
//! pre-flight on a deep-cloned, limit-stripped copy to learn the total and
//! the last page, then individual pages re-run the live statement with the
//! page's offset. Page numbers are 1-based and clamped into range; only the
//! relative `next`/`previous` moves refuse to run past a boundary.

use crate::backends::core::Database;
use crate::error::{OrmError, OrmResult};
use crate::model::Entity;
use crate::query::builder::Query;

/// Generates the navigation URL for a page number.
pub type UrlHandler = Box<dyn Fn(u64) -> String + Send + Sync>;

/// One fetched page plus its cursor bookkeeping and navigation URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
    /// Number of rows on this page.
    pub count: usize,
    pub data: Vec<Entity>,
    pub first_page_url: String,
    pub last_page_url: String,
    /// `None` on the last page.
    pub next_page_url: Option<String>,
    /// `None` on the first page.
    pub prev_page_url: Option<String>,
}

/// Pagination cursor over an entity-bound statement.
pub struct Paginator {
    query: Query,
    total: u64,
    per_page: u64,
    current_page: u64,
    last_page: u64,
    url_handler: Option<UrlHandler>,
}

impl std::fmt::Debug for Paginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("query", &self.query)
            .field("total", &self.total)
            .field("per_page", &self.per_page)
            .field("current_page", &self.current_page)
            .field("last_page", &self.last_page)
            .field("url_handler", &self.url_handler.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Paginator {
    /// Build a paginator and run the count pre-flight.
    pub async fn new(
        query: Query,
        per_page: u64,
        page: u64,
        db: &dyn Database,
    ) -> OrmResult<Self> {
        if query.descriptor().is_none() {
            return Err(OrmError::Configuration(
                "Pagination requires an entity-bound query".to_string(),
            ));
        }
        if per_page == 0 {
            return Err(OrmError::Configuration(
                "Pagination requires a page size of at least 1".to_string(),
            ));
        }

        let mut counter = query.clone().unlimited().offset(0);
        let total = counter.count(db).await?;
        let last_page = (total.div_ceil(per_page)).max(1);

        Ok(Self {
            query: query.limit(per_page),
            total,
            per_page,
            current_page: page.clamp(1, last_page),
            last_page,
            url_handler: None,
        })
    }

    /// Replace the default `?page=N` URL generation.
    pub fn with_url_handler(mut self, handler: UrlHandler) -> Self {
        self.url_handler = Some(handler);
        self
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn last_page(&self) -> u64 {
        self.last_page
    }

    /// Fetch a specific page. Out-of-range numbers clamp into
    /// `[1, last_page]`.
    pub async fn page(&mut self, page: u64, db: &dyn Database) -> OrmResult<PageResult> {
        self.current_page = page.clamp(1, self.last_page);
        self.query
            .set_offset((self.current_page - 1) * self.per_page);

        let data = self.query.get_models(db).await?;
        Ok(self.make(data))
    }

    /// Fetch the current page.
    pub async fn get(&mut self, db: &dyn Database) -> OrmResult<PageResult> {
        self.page(self.current_page, db).await
    }

    /// Fetch the page after the current one. Refuses to move past the last
    /// page.
    pub async fn next(&mut self, db: &dyn Database) -> OrmResult<PageResult> {
        if self.current_page == self.last_page {
            return Err(OrmError::Pagination(format!(
                "Cannot fetch the next page (current page is {})",
                self.current_page
            )));
        }
        self.page(self.current_page + 1, db).await
    }

    /// Fetch the page before the current one. Refuses to move before page 1.
    pub async fn previous(&mut self, db: &dyn Database) -> OrmResult<PageResult> {
        if self.current_page == 1 {
            return Err(OrmError::Pagination(
                "Cannot fetch the previous page (current page is 1)".to_string(),
            ));
        }
        self.page(self.current_page - 1, db).await
    }

    /// Fetch the first page.
    pub async fn first(&mut self, db: &dyn Database) -> OrmResult<PageResult> {
        self.page(1, db).await
    }

    /// Fetch the last page.
    pub async fn last(&mut self, db: &dyn Database) -> OrmResult<PageResult> {
        self.page(self.last_page, db).await
    }

    fn url_for(&self, page: u64) -> String {
        match &self.url_handler {
            Some(handler) => handler(page),
            None => format!("?page={}", page),
        }
    }

    fn make(&self, data: Vec<Entity>) -> PageResult {
        PageResult {
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
            count: data.len(),
            first_page_url: self.url_for(1),
            last_page_url: self.url_for(self.last_page),
            next_page_url: (self.current_page < self.last_page)
                .then(|| self.url_for(self.current_page + 1)),
            prev_page_url: (self.current_page > 1)
                .then(|| self.url_for(self.current_page - 1)),
            data,
        }
    }
}

impl Query {
    /// Wrap this statement in a [`Paginator`], running the count pre-flight.
    pub async fn paginate(
        self,
        per_page: u64,
        page: u64,
        db: &dyn Database,
    ) -> OrmResult<Paginator> {
        Paginator::new(self, per_page, page, db).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backends::mock::MockDatabase;
    use crate::model::EntityDescriptor;
    use crate::value::Row;

    fn users() -> Arc<EntityDescriptor> {
        Arc::new(EntityDescriptor::new("User", "users"))
    }

    async fn paginator(total: i64, per_page: u64, page: u64, db: &MockDatabase) -> Paginator {
        db.push_rows(vec![Row::from_pairs([("count", total)])]);
        Query::for_entity(users())
            .paginate(per_page, page, db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_last_page_from_count_preflight() {
        let db = MockDatabase::new();
        let pager = paginator(47, 15, 1, &db).await;

        assert_eq!(pager.total(), 47);
        assert_eq!(pager.last_page(), 4);
        assert!(db.last_executed().unwrap().sql.contains("COUNT(*)"));
    }

    #[tokio::test]
    async fn test_page_offsets() {
        let db = MockDatabase::new();
        let mut pager = paginator(47, 15, 1, &db).await;

        pager.page(1, &db).await.unwrap();
        assert!(db.last_executed().unwrap().sql.ends_with("LIMIT 0, 15"));

        pager.page(4, &db).await.unwrap();
        assert!(db.last_executed().unwrap().sql.ends_with("LIMIT 45, 15"));
    }

    #[tokio::test]
    async fn test_out_of_range_page_clamps() {
        let db = MockDatabase::new();
        let mut pager = paginator(47, 15, 1, &db).await;

        let result = pager.page(10, &db).await.unwrap();
        assert_eq!(result.current_page, 4);
        assert!(db.last_executed().unwrap().sql.ends_with("LIMIT 45, 15"));
    }

    #[tokio::test]
    async fn test_boundary_moves_are_errors() {
        let db = MockDatabase::new();
        let mut pager = paginator(47, 15, 4, &db).await;

        let err = pager.next(&db).await.unwrap_err();
        assert!(matches!(err, OrmError::Pagination(_)));

        let mut pager = paginator(47, 15, 1, &db).await;
        let err = pager.previous(&db).await.unwrap_err();
        assert!(matches!(err, OrmError::Pagination(_)));
    }

    #[tokio::test]
    async fn test_navigation_urls() {
        let db = MockDatabase::new();
        let mut pager = paginator(47, 15, 2, &db).await;

        let result = pager.get(&db).await.unwrap();
        assert_eq!(result.first_page_url, "?page=1");
        assert_eq!(result.last_page_url, "?page=4");
        assert_eq!(result.next_page_url.as_deref(), Some("?page=3"));
        assert_eq!(result.prev_page_url.as_deref(), Some("?page=1"));

        let result = pager.page(1, &db).await.unwrap();
        assert!(result.prev_page_url.is_none());
        let result = pager.page(4, &db).await.unwrap();
        assert!(result.next_page_url.is_none());
    }

    #[tokio::test]
    async fn test_empty_table_still_has_one_page() {
        let db = MockDatabase::new();
        // Count pre-flight finds no rows at all.
        let pager = Query::for_entity(users())
            .paginate(15, 1, &db)
            .await
            .unwrap();

        assert_eq!(pager.total(), 0);
        assert_eq!(pager.last_page(), 1);
    }

    #[tokio::test]
    async fn test_unbound_query_is_rejected() {
        let db = MockDatabase::new();
        let err = Query::table("users").paginate(15, 1, &db).await.unwrap_err();
        assert!(matches!(err, OrmError::Configuration(_)));
    }
}
