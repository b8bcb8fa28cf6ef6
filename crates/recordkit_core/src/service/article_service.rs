//! Article use-case service.
//!
//! # Responsibility
//! - Publish, revise, show and delete articles.
//! - Attach comments to existing articles.
//! - Open keyset browsing sessions over articles.
//!
//! # Invariants
//! - Comments are only created for articles that exist.
//! - `browse` always orders by `id ASC`.

use crate::db::StoreExecutor;
use crate::model::article::Article;
use crate::model::comment::Comment;
use crate::model::validation::{validate, ValidationError};
use crate::model::RecordId;
use crate::repo::article_repo::ArticleRepository;
use crate::repo::attributes::AttributeMap;
use crate::repo::cascade::CascadeReport;
use crate::repo::comment_repo::CommentRepository;
use crate::repo::pager::{KeysetPager, PageCursor};
use crate::repo::predicate::{OrderBy, Predicate};
use crate::repo::record_repo::{RepoError, ID_COLUMN};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for article use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Input failed the record's constraint table.
    Validation(ValidationError),
    /// Target article does not exist.
    ArticleNotFound(RecordId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::ArticleNotFound(_) => "article_not_found",
            Self::Repo(err) => err.code(),
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::ArticleNotFound(id) => write!(f, "article not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::ArticleNotFound(_) => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Article service facade over the article and comment repositories.
pub struct ArticleService<'store> {
    articles: ArticleRepository<'store>,
}

impl<'store> ArticleService<'store> {
    pub fn new(store: &'store dyn StoreExecutor) -> Self {
        Self {
            articles: ArticleRepository::new(store),
        }
    }

    /// Validates and stores a new article, returning it with its id.
    pub fn publish_article(
        &self,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> ServiceResult<Article> {
        let mut article = Article::new(title, text);
        self.articles.create(&mut article)?;
        info!(
            "event=article_publish module=service status=ok article_id={}",
            article.id
        );
        Ok(article)
    }

    /// Replaces the supplied fields and saves the whole article.
    pub fn revise_article(
        &self,
        id: RecordId,
        title: Option<&str>,
        text: Option<&str>,
    ) -> ServiceResult<Article> {
        let mut article = self.load(id)?;
        if let Some(title) = title {
            article.title = title.to_string();
        }
        if let Some(text) = text {
            article.text = text.to_string();
        }
        self.articles.save(&mut article)?;
        Ok(article)
    }

    /// Adds a comment to an existing article.
    pub fn add_comment(
        &self,
        article_id: RecordId,
        commenter: &str,
        body: &str,
    ) -> ServiceResult<Comment> {
        self.load(article_id)?;

        let comment = Comment::new(article_id, commenter, body);
        validate(&comment)?;
        let map = AttributeMap::<Comment>::new()
            .with("commenter", comment.commenter.as_str())?
            .with("body", comment.body.as_str())?;
        let id = self.articles.create_comment(article_id, map)?;
        Ok(CommentRepository::new(self.articles.store()).find_by_id(id)?)
    }

    /// One article with its comments attached.
    pub fn show_article(&self, id: RecordId) -> ServiceResult<Article> {
        let mut article = self.load(id)?;
        self.articles.load_comments(&mut article)?;
        Ok(article)
    }

    /// Every article matching `filter`, comments attached.
    pub fn list_with_comments(&self, filter: &Predicate) -> ServiceResult<Vec<Article>> {
        Ok(self.articles.includes_comments(filter)?)
    }

    /// Deletes an article and its comments.
    ///
    /// Comment cleanup failures are returned in the report, not as errors.
    pub fn delete_article(&self, id: RecordId) -> ServiceResult<CascadeReport> {
        let outcome = self.articles.destroy_by_id(id)?;
        if outcome.rows_deleted == 0 {
            return Err(ServiceError::ArticleNotFound(id));
        }
        if !outcome.cascade.is_clean() {
            warn!(
                "event=article_delete module=service status=partial article_id={} cascade_failures={}",
                id,
                outcome.cascade.failures().count()
            );
        }
        Ok(outcome.cascade)
    }

    /// Opens a browsing session over articles matching `filter`.
    pub fn browse(&self, page_size: u32, filter: Predicate) -> KeysetPager<'store, Article> {
        let cursor = PageCursor::new(OrderBy::asc(ID_COLUMN))
            .with_filter(filter)
            .with_page_size(page_size);
        KeysetPager::new(self.articles.store(), cursor)
    }

    fn load(&self, id: RecordId) -> ServiceResult<Article> {
        self.articles.find_by_id(id).map_err(|err| match err {
            RepoError::NotFound { .. } => ServiceError::ArticleNotFound(id),
            other => ServiceError::from(other),
        })
    }
}
