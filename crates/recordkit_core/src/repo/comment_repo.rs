//! Comment persistence.

use crate::db::StoreRow;
use crate::model::article::Article;
use crate::model::comment::Comment;
use crate::model::{FieldValue, RecordId};
use crate::repo::predicate::{OrderBy, Predicate};
use crate::repo::record_repo::{Record, RecordRepository, RepoError, RepoResult, ID_COLUMN};

pub type CommentRepository<'store> = RecordRepository<'store, Comment>;

impl Record for Comment {
    const TABLE: &'static str = "comments";
    const COLUMNS: &'static [&'static str] =
        &["commenter", "body", "article_id", "created_at", "updated_at"];
    const HAS_TIMESTAMPS: bool = true;
    const SELECT_LIST: &'static str = "id, commenter, COALESCE(body, '') AS body, \
         COALESCE(article_id, 0) AS article_id, created_at, updated_at";

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn from_row(row: &StoreRow) -> RepoResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            commenter: row.get_text("commenter")?,
            body: row.get_text("body")?,
            article_id: row.get_i64("article_id")?,
            created_at: row.get_i64("created_at")?,
            updated_at: row.get_i64("updated_at")?,
        })
    }

    fn column_values(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("commenter", FieldValue::from(self.commenter.as_str())),
            ("body", FieldValue::from(self.body.as_str())),
            ("article_id", FieldValue::Integer(self.article_id)),
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
}

impl RecordRepository<'_, Comment> {
    /// Comments of one article, oldest first.
    pub fn find_for_article(&self, article_id: RecordId) -> RepoResult<Vec<Comment>> {
        if article_id == 0 {
            return Err(RepoError::InvalidIdentity);
        }
        self.find_where_ordered(
            &Predicate::trusted("article_id = ?", vec![FieldValue::Integer(article_id)]),
            &OrderBy::asc(ID_COLUMN),
            None,
        )
    }

    /// Loads the article owning `comment`.
    pub fn article_of(&self, comment: &Comment) -> RepoResult<Article> {
        RecordRepository::<Article>::new(self.store()).find_by_id(comment.article_id)
    }
}
