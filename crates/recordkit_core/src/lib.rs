//! Record persistence and keyset pagination over SQLite.
//!
//! Repositories borrow an explicit [`StoreExecutor`]; nothing holds a global
//! connection.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult, ExecOutcome, StoreExecutor, StoreRow};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::article::Article;
pub use model::comment::Comment;
pub use model::validation::{validate, FieldConstraint, Validatable, ValidationError, Violation};
pub use model::{FieldValue, RecordId};
pub use repo::article_repo::ArticleRepository;
pub use repo::attributes::AttributeMap;
pub use repo::cascade::{Association, CascadeOutcome, CascadeReport, CascadeStatus};
pub use repo::comment_repo::CommentRepository;
pub use repo::pager::{KeysetPager, PageCursor, PageDirection, PageTotals, DEFAULT_PAGE_SIZE};
pub use repo::predicate::{OrderBy, Predicate, SortDirection, ID_CHUNK_SIZE};
pub use repo::record_repo::{DestroyOutcome, Record, RecordRepository, RepoError, RepoResult};
pub use service::article_service::{ArticleService, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
