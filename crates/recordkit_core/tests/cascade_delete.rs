use recordkit_core::db::{open_db_in_memory, DbError, DbResult};
use recordkit_core::{
    Article, ArticleRepository, AttributeMap, CascadeStatus, Comment, CommentRepository,
    ExecOutcome, Predicate, StoreExecutor, StoreRow,
};
use rusqlite::types::Value;
use rusqlite::Connection;

const TEXT: &str = "Body text that is comfortably long.";
const BODY: &str = "A comment body that is long enough.";

/// Delegates to SQLite but fails every statement starting with `fail_prefix`.
struct FailingStore<'conn> {
    conn: &'conn Connection,
    fail_prefix: &'static str,
}

impl StoreExecutor for FailingStore<'_> {
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        if sql.starts_with(self.fail_prefix) {
            return Err(DbError::Backend(format!("injected failure: {sql}")));
        }
        StoreExecutor::execute(self.conn, sql, params)
    }

    fn query_many(&self, sql: &str, params: &[Value]) -> DbResult<Vec<StoreRow>> {
        if sql.starts_with(self.fail_prefix) {
            return Err(DbError::Backend(format!("injected failure: {sql}")));
        }
        StoreExecutor::query_many(self.conn, sql, params)
    }
}

/// Seeds articles 1..=`articles` and three comments on article 7.
fn seeded(articles: usize) -> Connection {
    let conn = open_db_in_memory().unwrap();
    let repo = ArticleRepository::new(&conn);
    for n in 1..=articles {
        let mut article = Article::new(format!("Article title {n:02}"), TEXT);
        repo.create(&mut article).unwrap();
    }
    for commenter in ["ann", "bob", "cy"] {
        let map = AttributeMap::<Comment>::new()
            .with("commenter", commenter)
            .unwrap()
            .with("body", BODY)
            .unwrap();
        repo.create_comment(7, map).unwrap();
    }
    conn
}

fn comments_of(conn: &Connection, article_id: i64) -> u64 {
    CommentRepository::new(conn)
        .count_where(&Predicate::trusted("article_id = ?", vec![article_id.into()]))
        .unwrap()
}

#[test]
fn destroying_a_parent_removes_its_comments_first() {
    let conn = seeded(8);
    let repo = ArticleRepository::new(&conn);
    assert_eq!(comments_of(&conn, 7), 3);

    let outcome = repo.destroy_by_id(7).unwrap();

    assert_eq!(outcome.rows_deleted, 1);
    assert!(outcome.cascade.is_clean());
    assert_eq!(outcome.cascade.rows_deleted(), 3);
    assert_eq!(outcome.cascade.outcomes.len(), 1);
    assert_eq!(outcome.cascade.outcomes[0].association, "comments");
    assert_eq!(outcome.cascade.outcomes[0].child_table, "comments");
    assert_eq!(comments_of(&conn, 7), 0);
    assert_eq!(repo.count().unwrap(), 7);
}

#[test]
fn child_delete_failure_is_reported_and_parent_is_still_deleted() {
    let conn = seeded(8);
    let failing = FailingStore {
        conn: &conn,
        fail_prefix: "DELETE FROM comments",
    };

    let outcome = ArticleRepository::new(&failing).destroy_by_id(7).unwrap();

    assert_eq!(outcome.rows_deleted, 1);
    assert!(!outcome.cascade.is_clean());
    let failure = outcome.cascade.failures().next().unwrap();
    assert_eq!(failure.child_table, "comments");
    assert!(matches!(
        &failure.status,
        CascadeStatus::Failed { code: "store_error", message } if message.contains("injected failure")
    ));

    let repo = ArticleRepository::new(&conn);
    assert!(repo.find_by_id(7).is_err());
    assert_eq!(comments_of(&conn, 7), 3);
}

#[test]
fn unresolvable_parent_ids_skip_the_cascade_but_delete_parents() {
    let conn = seeded(8);
    let failing = FailingStore {
        conn: &conn,
        fail_prefix: "SELECT id FROM articles",
    };

    let outcome = ArticleRepository::new(&failing)
        .destroy_where(&Predicate::trusted("id = ?", vec![7_i64.into()]))
        .unwrap();

    assert_eq!(outcome.rows_deleted, 1);
    assert!(matches!(
        outcome.cascade.outcomes[0].status,
        CascadeStatus::Skipped { .. }
    ));
    assert_eq!(comments_of(&conn, 7), 3);
}

#[test]
fn destroy_where_cascades_for_every_matched_parent() {
    let conn = seeded(8);
    let repo = ArticleRepository::new(&conn);
    let extra = AttributeMap::<Comment>::new()
        .with("commenter", "dee")
        .unwrap()
        .with("body", BODY)
        .unwrap();
    repo.create_comment(2, extra).unwrap();

    let outcome = repo
        .destroy_where(&Predicate::trusted("id IN (?, ?)", vec![2_i64.into(), 7_i64.into()]))
        .unwrap();

    assert_eq!(outcome.rows_deleted, 2);
    assert_eq!(outcome.cascade.rows_deleted(), 4);
    assert_eq!(CommentRepository::new(&conn).count().unwrap(), 0);
}

#[test]
fn destroying_parents_without_children_reports_zero_child_rows() {
    let conn = seeded(8);
    let repo = ArticleRepository::new(&conn);

    let outcome = repo.destroy_by_ids(&[1, 3]).unwrap();

    assert_eq!(outcome.rows_deleted, 2);
    assert!(outcome.cascade.is_clean());
    assert_eq!(outcome.cascade.rows_deleted(), 0);
    assert_eq!(comments_of(&conn, 7), 3);
}

#[test]
fn includes_comments_attaches_children_per_parent() {
    let conn = seeded(8);
    let repo = ArticleRepository::new(&conn);

    let articles = repo
        .includes_comments(&Predicate::trusted("id IN (?, ?)", vec![6_i64.into(), 7_i64.into()]))
        .unwrap();

    assert_eq!(articles.len(), 2);
    for article in &articles {
        let expected = if article.id == 7 { 3 } else { 0 };
        assert_eq!(article.comments.len(), expected);
        assert!(article
            .comments
            .iter()
            .all(|comment| comment.article_id == article.id));
    }

    let none = repo
        .includes_comments(&Predicate::trusted("id > ?", vec![100_i64.into()]))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn load_comments_and_find_for_article_agree() {
    let conn = seeded(8);
    let articles = ArticleRepository::new(&conn);
    let comments = CommentRepository::new(&conn);

    let mut article = articles.find_by_id(7).unwrap();
    assert!(article.comments.is_empty());
    articles.load_comments(&mut article).unwrap();

    assert_eq!(article.comments, comments.find_for_article(7).unwrap());
    let commenters: Vec<_> = article
        .comments
        .iter()
        .map(|comment| comment.commenter.as_str())
        .collect();
    assert_eq!(commenters, vec!["ann", "bob", "cy"]);
    assert_eq!(comments.article_of(&article.comments[0]).unwrap().id, 7);

    let json = serde_json::to_value(&article).unwrap();
    assert_eq!(json["comments"].as_array().map(Vec::len), Some(3));
}

#[test]
fn create_comment_always_uses_the_given_article_id() {
    let conn = seeded(8);
    let repo = ArticleRepository::new(&conn);

    let map = AttributeMap::<Comment>::new()
        .with("commenter", "eve")
        .unwrap()
        .with("body", BODY)
        .unwrap()
        .with("article_id", 1_i64)
        .unwrap();
    let id = repo.create_comment(3, map).unwrap();

    let comment = CommentRepository::new(&conn).find_by_id(id).unwrap();
    assert_eq!(comment.article_id, 3);
}

/// Bulk-inserts `count` articles in one statement.
fn bulk_articles(conn: &Connection, count: usize) {
    conn.execute_batch(&format!(
        "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < {count}) \
         INSERT INTO articles (title, text, created_at, updated_at) \
         SELECT 'Article title ' || n, 'Body text that is comfortably long.', 1, 1 FROM seq;"
    ))
    .unwrap();
}

// More ids than SQLite binds in one statement.
const MANY_ARTICLES: usize = 40_000;

#[test]
fn cascade_over_more_parents_than_one_statement_can_bind() {
    let conn = open_db_in_memory().unwrap();
    bulk_articles(&conn, MANY_ARTICLES);
    let repo = ArticleRepository::new(&conn);
    for article_id in [7, 39_999] {
        let map = AttributeMap::<Comment>::new()
            .with("commenter", "ann")
            .unwrap()
            .with("body", BODY)
            .unwrap();
        repo.create_comment(article_id, map).unwrap();
    }

    let outcome = repo
        .destroy_where(&Predicate::trusted("id > ?", vec![0_i64.into()]))
        .unwrap();

    assert_eq!(outcome.rows_deleted, MANY_ARTICLES as u64);
    assert!(outcome.cascade.is_clean());
    assert_eq!(outcome.cascade.outcomes.len(), 1);
    assert_eq!(outcome.cascade.rows_deleted(), 2);
    assert_eq!(CommentRepository::new(&conn).count().unwrap(), 0);
}

#[test]
fn id_lists_past_the_bind_limit_are_read_and_destroyed_in_chunks() {
    let conn = open_db_in_memory().unwrap();
    bulk_articles(&conn, MANY_ARTICLES);
    let repo = ArticleRepository::new(&conn);
    let ids: Vec<i64> = (1..=MANY_ARTICLES as i64).rev().collect();

    let found = repo.find_by_ids(&ids).unwrap();
    assert_eq!(found.len(), MANY_ARTICLES);
    assert!(found.windows(2).all(|pair| pair[0].id < pair[1].id));

    let outcome = repo.destroy_by_ids(&ids).unwrap();
    assert_eq!(outcome.rows_deleted, MANY_ARTICLES as u64);
    assert!(outcome.cascade.is_clean());
    assert_eq!(repo.count().unwrap(), 0);
}

/// Fails child deletes whose bound ids include `fail_id`.
struct FailingChunkStore<'conn> {
    conn: &'conn Connection,
    fail_id: i64,
}

impl StoreExecutor for FailingChunkStore<'_> {
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        if sql.starts_with("DELETE FROM comments") && params.contains(&Value::Integer(self.fail_id))
        {
            return Err(DbError::Backend(format!("injected failure for {}", self.fail_id)));
        }
        StoreExecutor::execute(self.conn, sql, params)
    }

    fn query_many(&self, sql: &str, params: &[Value]) -> DbResult<Vec<StoreRow>> {
        StoreExecutor::query_many(self.conn, sql, params)
    }
}

#[test]
fn a_failing_chunk_marks_the_association_failed_without_stopping_the_rest() {
    let conn = open_db_in_memory().unwrap();
    bulk_articles(&conn, 600);
    let repo = ArticleRepository::new(&conn);
    for article_id in [7, 550] {
        let map = AttributeMap::<Comment>::new()
            .with("commenter", "dee")
            .unwrap()
            .with("body", BODY)
            .unwrap();
        repo.create_comment(article_id, map).unwrap();
    }

    let failing = FailingChunkStore {
        conn: &conn,
        fail_id: 7,
    };
    let outcome = ArticleRepository::new(&failing)
        .destroy_where(&Predicate::trusted("id > ?", vec![0_i64.into()]))
        .unwrap();

    assert_eq!(outcome.rows_deleted, 600);
    assert_eq!(outcome.cascade.outcomes.len(), 1);
    assert!(matches!(
        &outcome.cascade.outcomes[0].status,
        CascadeStatus::Failed { code: "store_error", message } if message.contains("injected failure for 7")
    ));
    assert_eq!(comments_of(&conn, 7), 1);
    assert_eq!(comments_of(&conn, 550), 0);
}
