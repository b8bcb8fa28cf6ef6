//! Article persistence: row mapping, associations and comment eager loading.
//!
//! # Invariants
//! - Destroying articles first destroys their comments (`comments.article_id`).
//! - `Article::comments` is only filled by `includes_comments`/`load_comments`.

use crate::db::StoreRow;
use crate::model::article::Article;
use crate::model::comment::Comment;
use crate::model::{FieldValue, RecordId};
use crate::repo::attributes::AttributeMap;
use crate::repo::cascade::Association;
use crate::repo::predicate::{OrderBy, Predicate};
use crate::repo::record_repo::{Record, RecordRepository, RepoError, RepoResult, ID_COLUMN};
use std::collections::HashMap;

pub type ArticleRepository<'store> = RecordRepository<'store, Article>;

const COMMENT_FOREIGN_KEY: &str = "article_id";

impl Record for Article {
    const TABLE: &'static str = "articles";
    const COLUMNS: &'static [&'static str] = &["title", "text", "created_at", "updated_at"];
    const HAS_TIMESTAMPS: bool = true;
    const SELECT_LIST: &'static str =
        "id, title, COALESCE(text, '') AS text, created_at, updated_at";

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn from_row(row: &StoreRow) -> RepoResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            title: row.get_text("title")?,
            text: row.get_text("text")?,
            created_at: row.get_i64("created_at")?,
            updated_at: row.get_i64("updated_at")?,
            comments: Vec::new(),
        })
    }

    fn column_values(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("title", FieldValue::from(self.title.as_str())),
            ("text", FieldValue::from(self.text.as_str())),
            ("created_at", FieldValue::Timestamp(self.created_at)),
            ("updated_at", FieldValue::Timestamp(self.updated_at)),
        ]
    }

    fn set_created_at(&mut self, at: i64) {
        self.created_at = at;
    }

    fn set_updated_at(&mut self, at: i64) {
        self.updated_at = at;
    }

    fn associations() -> Vec<Association> {
        vec![Association::has_many::<Comment>("comments", COMMENT_FOREIGN_KEY)]
    }
}

impl RecordRepository<'_, Article> {
    /// Articles matching `predicate`, each with its comments attached.
    pub fn includes_comments(&self, predicate: &Predicate) -> RepoResult<Vec<Article>> {
        let mut articles = self.find_where(predicate)?;
        if articles.is_empty() {
            return Ok(articles);
        }

        let ids: Vec<RecordId> = articles.iter().map(|article| article.id).collect();
        let mut by_article: HashMap<RecordId, Vec<Comment>> = HashMap::new();
        for comment in self.comments_of(&ids)? {
            by_article
                .entry(comment.article_id)
                .or_default()
                .push(comment);
        }

        for article in &mut articles {
            article.comments = by_article.remove(&article.id).unwrap_or_default();
        }
        Ok(articles)
    }

    /// Replaces `article.comments` with the stored comments of that article.
    pub fn load_comments(&self, article: &mut Article) -> RepoResult<()> {
        if article.id == 0 {
            return Err(RepoError::InvalidIdentity);
        }
        article.comments = self.comments_of(&[article.id])?;
        Ok(())
    }

    /// Inserts a comment owned by `article_id` from an attribute map.
    ///
    /// The foreign key is always set from `article_id`.
    pub fn create_comment(
        &self,
        article_id: RecordId,
        mut map: AttributeMap<Comment>,
    ) -> RepoResult<RecordId> {
        if article_id == 0 {
            return Err(RepoError::InvalidIdentity);
        }
        map.insert(COMMENT_FOREIGN_KEY, article_id)?;
        RecordRepository::<Comment>::new(self.store()).create_from_map(map)
    }

    // Comment order holds within each article, not across the whole result.
    fn comments_of(&self, article_ids: &[RecordId]) -> RepoResult<Vec<Comment>> {
        let comments = RecordRepository::<Comment>::new(self.store());
        let order = OrderBy::asc(ID_COLUMN);
        let mut loaded = Vec::new();
        for predicate in Predicate::id_in_chunks(COMMENT_FOREIGN_KEY, article_ids) {
            loaded.extend(comments.find_where_ordered(&predicate, &order, None)?);
        }
        Ok(loaded)
    }
}
