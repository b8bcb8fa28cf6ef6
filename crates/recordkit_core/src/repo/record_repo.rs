//! Record-kind-generic repository over a store executor.
//!
//! # Responsibility
//! - Provide find/count/create/update/destroy for any `Record` kind.
//! - Route attribute-map writes through the attribute codec.
//! - Run the cascade coordinator before parent rows are deleted.
//!
//! # Invariants
//! - Argument-shape errors (zero id, empty map, empty predicate, arity
//!   mismatch, unknown column) are returned before any store interaction.
//! - `create`/`save` run the validation gate first; `create_from_map` does not.
//! - Store failures are wrapped with context and never retried.
//! - Cascade failures are logged and reported, never propagated.

use crate::db::{DbError, StoreExecutor, StoreRow};
use crate::model::validation::{validate, Validatable, ValidationError};
use crate::model::{now_epoch_ms, FieldValue, RecordId};
use crate::repo::attributes::{
    encode_for_insert, encode_for_update, AttributeMap, CREATED_AT, UPDATED_AT,
};
use crate::repo::cascade::{destroy_dependents, Association, CascadeReport};
use crate::repo::predicate::{OrderBy, Predicate};
use log::{info, warn};
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by accessor, cascade and pager operations.
#[derive(Debug)]
pub enum RepoError {
    /// Zero id where a persisted identity is required.
    InvalidIdentity,
    /// Single-record fetch matched no row.
    NotFound { table: &'static str, key: String },
    Validation(ValidationError),
    EmptyAttributes,
    UnknownColumn { table: &'static str, column: String },
    /// Destroy-by-predicate called without a predicate.
    MissingPredicate,
    /// Destroy-by-ids called with an empty id list.
    MissingIds,
    PredicateArity { placeholders: usize, params: usize },
    /// Pagination ordering lacks the identity column.
    MissingOrderKey,
    NoPreviousPage,
    NoNextPage,
    InvalidDirection(String),
    Store {
        context: &'static str,
        source: DbError,
    },
    InvalidData(String),
}

impl RepoError {
    /// Stable code for presentation layers and log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentity => "invalid_identity",
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_failed",
            Self::EmptyAttributes => "empty_attributes",
            Self::UnknownColumn { .. } => "unknown_column",
            Self::MissingPredicate => "missing_predicate",
            Self::MissingIds => "missing_ids",
            Self::PredicateArity { .. } => "predicate_arity",
            Self::MissingOrderKey => "missing_order_key",
            Self::NoPreviousPage => "no_previous_page",
            Self::NoNextPage => "no_next_page",
            Self::InvalidDirection(_) => "invalid_direction",
            Self::Store { .. } => "store_error",
            Self::InvalidData(_) => "invalid_data",
        }
    }

    pub(crate) fn store(context: &'static str) -> impl FnOnce(DbError) -> RepoError {
        move |source| match source {
            DbError::InvalidRow { column, message } => {
                RepoError::InvalidData(format!("{column}: {message}"))
            }
            source => RepoError::Store { context, source },
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentity => write!(f, "invalid id: it can't be zero"),
            Self::NotFound { table, key } => write!(f, "no row in `{table}` matches {key}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::EmptyAttributes => write!(f, "zero key in the attributes map"),
            Self::UnknownColumn { table, column } => {
                write!(f, "unknown column `{column}` for table `{table}`")
            }
            Self::MissingPredicate => write!(f, "no WHERE conditions provided"),
            Self::MissingIds => write!(f, "at least one id is required"),
            Self::PredicateArity {
                placeholders,
                params,
            } => write!(
                f,
                "predicate has {placeholders} placeholders but {params} parameters"
            ),
            Self::MissingOrderKey => write!(f, "no id order specified for pagination"),
            Self::NoPreviousPage => write!(f, "this is the first page, no previous page"),
            Self::NoNextPage => write!(f, "this is the last page, no next page"),
            Self::InvalidDirection(token) => write!(
                f,
                "invalid page direction `{token}`; expected previous|current|next"
            ),
            Self::Store { context, source } => write!(f, "{context}: {source}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::store("store")(value)
    }
}

/// A persisted record kind backed by one table.
pub trait Record: Sized {
    const TABLE: &'static str;
    /// Writable columns, excluding `id`.
    const COLUMNS: &'static [&'static str];
    /// Whether `created_at`/`updated_at` bookkeeping applies.
    const HAS_TIMESTAMPS: bool;
    /// SELECT list used by every read path.
    const SELECT_LIST: &'static str;

    fn id(&self) -> RecordId;
    fn set_id(&mut self, id: RecordId);

    fn from_row(row: &StoreRow) -> RepoResult<Self>;

    /// Values of every writable column, in `COLUMNS` order.
    fn column_values(&self) -> Vec<(&'static str, FieldValue)>;

    fn set_created_at(&mut self, _at: i64) {}
    fn set_updated_at(&mut self, _at: i64) {}

    /// Dependent kinds destroyed before rows of this kind.
    fn associations() -> Vec<Association> {
        Vec::new()
    }

    fn writable_column(column: &str) -> Option<&'static str> {
        Self::COLUMNS.iter().copied().find(|known| *known == column)
    }

    fn has_column(column: &str) -> bool {
        column == ID_COLUMN || Self::writable_column(column).is_some()
    }
}

pub const ID_COLUMN: &str = "id";

/// Result of one destroy call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestroyOutcome {
    /// Parent rows deleted.
    pub rows_deleted: u64,
    /// Best-effort dependent cleanup that ran first.
    pub cascade: CascadeReport,
}

/// Generic accessor for record kind `K`.
pub struct RecordRepository<'store, K: Record> {
    store: &'store dyn StoreExecutor,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Record> Clone for RecordRepository<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: Record> Copy for RecordRepository<'_, K> {}

impl<'store, K: Record> RecordRepository<'store, K> {
    pub fn new(store: &'store dyn StoreExecutor) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    pub fn store(&self) -> &'store dyn StoreExecutor {
        self.store
    }

    /// Loads exactly one record by id.
    pub fn find_by_id(&self, id: RecordId) -> RepoResult<K> {
        if id == 0 {
            return Err(RepoError::InvalidIdentity);
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE id = ? LIMIT 1",
            K::SELECT_LIST,
            K::TABLE
        );
        let row = self
            .store
            .query_one(&sql, &[Value::Integer(id)])
            .map_err(RepoError::store("find_by_id"))?
            .ok_or_else(|| RepoError::NotFound {
                table: K::TABLE,
                key: format!("id={id}"),
            })?;
        K::from_row(&row)
    }

    /// Records matching `predicate`; [`Predicate::all`] returns every row.
    pub fn find_where(&self, predicate: &Predicate) -> RepoResult<Vec<K>> {
        self.find_where_ordered(predicate, &OrderBy::new(), None)
    }

    /// Filtered find with ordering and an optional row limit.
    pub fn find_where_ordered(
        &self,
        predicate: &Predicate,
        order: &OrderBy,
        limit: Option<u32>,
    ) -> RepoResult<Vec<K>> {
        predicate.check_arity()?;
        self.check_order(order)?;

        let mut sql = format!(
            "SELECT {} FROM {}{}{}",
            K::SELECT_LIST,
            K::TABLE,
            predicate.where_clause(),
            order.to_sql()
        );
        let mut params = predicate.params().to_vec();
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(i64::from(limit)));
        }

        self.load_many(&sql, &params, "find_where")
    }

    pub fn all(&self) -> RepoResult<Vec<K>> {
        self.find_where(&Predicate::all())
    }

    /// Records with any of `ids`, in ascending id order.
    ///
    /// Large id sets are read in bounded chunks.
    pub fn find_by_ids(&self, ids: &[RecordId]) -> RepoResult<Vec<K>> {
        if ids.is_empty() {
            return Err(RepoError::MissingIds);
        }
        let order = OrderBy::asc(ID_COLUMN);
        let mut records = Vec::new();
        for predicate in Predicate::id_in_chunks(ID_COLUMN, ids) {
            records.extend(self.find_where_ordered(&predicate, &order, None)?);
        }
        Ok(records)
    }

    /// First record whose `column` equals `value`.
    pub fn find_by(&self, column: &str, value: impl Into<FieldValue>) -> RepoResult<K> {
        let value = value.into();
        let key = format!("{column}={value:?}");
        let predicate = self.column_equals(column, value)?;
        self.find_where_ordered(&predicate, &OrderBy::new(), Some(1))?
            .into_iter()
            .next()
            .ok_or(RepoError::NotFound {
                table: K::TABLE,
                key,
            })
    }

    /// Every record whose `column` equals `value`.
    pub fn find_all_by(&self, column: &str, value: impl Into<FieldValue>) -> RepoResult<Vec<K>> {
        let predicate = self.column_equals(column, value.into())?;
        self.find_where(&predicate)
    }

    /// The `n` lowest-id records.
    pub fn first(&self, n: u32) -> RepoResult<Vec<K>> {
        self.find_where_ordered(&Predicate::all(), &OrderBy::asc(ID_COLUMN), Some(n))
    }

    /// The `n` highest-id records, highest first.
    pub fn last(&self, n: u32) -> RepoResult<Vec<K>> {
        self.find_where_ordered(&Predicate::all(), &OrderBy::desc(ID_COLUMN), Some(n))
    }

    pub fn count_where(&self, predicate: &Predicate) -> RepoResult<u64> {
        predicate.check_arity()?;

        let sql = format!(
            "SELECT COUNT(*) AS count FROM {}{}",
            K::TABLE,
            predicate.where_clause()
        );
        let count = match self
            .store
            .query_one(&sql, predicate.params())
            .map_err(RepoError::store("count_where"))?
        {
            Some(row) => row.get_i64("count").map_err(RepoError::store("count_where"))?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub fn count(&self) -> RepoResult<u64> {
        self.count_where(&Predicate::all())
    }

    /// Ids of the records matching `predicate`.
    pub fn ids_where(&self, predicate: &Predicate) -> RepoResult<Vec<RecordId>> {
        self.pluck_i64(ID_COLUMN, predicate)
    }

    /// One integer column of the matching records.
    pub fn pluck_i64(&self, column: &str, predicate: &Predicate) -> RepoResult<Vec<i64>> {
        self.pluck(column, predicate)?
            .iter()
            .map(|row| row.get_i64(column).map_err(RepoError::store("pluck")))
            .collect()
    }

    /// One text column of the matching records; NULL becomes an empty string.
    pub fn pluck_text(&self, column: &str, predicate: &Predicate) -> RepoResult<Vec<String>> {
        self.pluck(column, predicate)?
            .iter()
            .map(|row| {
                row.get_opt_text(column)
                    .map(Option::unwrap_or_default)
                    .map_err(RepoError::store("pluck"))
            })
            .collect()
    }

    /// Inserts `map` without record validation and returns the new id.
    pub fn create_from_map(&self, map: AttributeMap<K>) -> RepoResult<RecordId> {
        let encoded = encode_for_insert(map, now_epoch_ms())?;
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            K::TABLE,
            encoded.column_list(),
            encoded.placeholders()
        );
        let outcome = self
            .store
            .execute(&sql, &encoded.params)
            .map_err(RepoError::store("create"))?;
        Ok(outcome.last_insert_id)
    }

    /// Rewrites the columns in `map` (plus `updated_at`) on row `id`.
    ///
    /// Returns the affected-row count; a missing row is `NotFound`.
    pub fn update(&self, id: RecordId, map: AttributeMap<K>) -> RepoResult<u64> {
        self.update_at(id, map, now_epoch_ms())
    }

    fn update_at(&self, id: RecordId, map: AttributeMap<K>, now: i64) -> RepoResult<u64> {
        if id == 0 {
            return Err(RepoError::InvalidIdentity);
        }

        let encoded = encode_for_update(map, now)?;
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            K::TABLE,
            encoded.assignments().join(", ")
        );
        let mut params = encoded.params;
        params.push(Value::Integer(id));

        let outcome = self
            .store
            .execute(&sql, &params)
            .map_err(RepoError::store("update"))?;
        if outcome.rows_affected == 0 {
            return Err(RepoError::NotFound {
                table: K::TABLE,
                key: format!("id={id}"),
            });
        }
        Ok(outcome.rows_affected)
    }

    /// Rewrites the columns in `map` on every row matching `predicate`.
    pub fn update_where(&self, map: AttributeMap<K>, predicate: &Predicate) -> RepoResult<u64> {
        if predicate.is_empty() {
            return Err(RepoError::MissingPredicate);
        }
        predicate.check_arity()?;

        let encoded = encode_for_update(map, now_epoch_ms())?;
        let sql = format!(
            "UPDATE {} SET {}{}",
            K::TABLE,
            encoded.assignments().join(", "),
            predicate.where_clause()
        );
        let mut params = encoded.params;
        params.extend_from_slice(predicate.params());

        let outcome = self
            .store
            .execute(&sql, &params)
            .map_err(RepoError::store("update_where"))?;
        Ok(outcome.rows_affected)
    }

    pub fn destroy_by_id(&self, id: RecordId) -> RepoResult<DestroyOutcome> {
        if id == 0 {
            return Err(RepoError::InvalidIdentity);
        }
        self.destroy_by_ids(&[id])
    }

    pub fn destroy(&self, record: &K) -> RepoResult<DestroyOutcome> {
        self.destroy_by_id(record.id())
    }

    /// Deletes rows by id after cascading to dependent kinds.
    pub fn destroy_by_ids(&self, ids: &[RecordId]) -> RepoResult<DestroyOutcome> {
        if ids.is_empty() {
            return Err(RepoError::MissingIds);
        }
        if ids.contains(&0) {
            return Err(RepoError::InvalidIdentity);
        }

        let cascade = destroy_dependents::<K>(self.store, ids);
        let mut rows_deleted = 0;
        for predicate in Predicate::id_in_chunks(ID_COLUMN, ids) {
            rows_deleted += self.delete_matching(&predicate)?;
        }
        Ok(self.destroyed(rows_deleted, cascade))
    }

    /// Deletes rows matching `predicate` after cascading to dependent kinds.
    ///
    /// # Errors
    /// - `MissingPredicate` for an empty predicate; nothing is deleted.
    pub fn destroy_where(&self, predicate: &Predicate) -> RepoResult<DestroyOutcome> {
        if predicate.is_empty() {
            return Err(RepoError::MissingPredicate);
        }
        predicate.check_arity()?;

        let cascade = match self.ids_where(predicate) {
            Ok(ids) => destroy_dependents::<K>(self.store, &ids),
            Err(err) => {
                warn!(
                    "event=cascade_delete module=repo status=skipped table={} error_code={} error={}",
                    K::TABLE,
                    err.code(),
                    err
                );
                CascadeReport::skipped::<K>(&err)
            }
        };
        let rows_deleted = self.delete_matching(predicate)?;
        Ok(self.destroyed(rows_deleted, cascade))
    }

    fn delete_matching(&self, predicate: &Predicate) -> RepoResult<u64> {
        let sql = format!("DELETE FROM {}{}", K::TABLE, predicate.where_clause());
        let outcome = self
            .store
            .execute(&sql, predicate.params())
            .map_err(RepoError::store("destroy"))?;
        Ok(outcome.rows_affected)
    }

    fn destroyed(&self, rows_deleted: u64, cascade: CascadeReport) -> DestroyOutcome {
        info!(
            "event=record_destroy module=repo status=ok table={} rows={} cascade_failures={}",
            K::TABLE,
            rows_deleted,
            cascade.failures().count()
        );
        DestroyOutcome {
            rows_deleted,
            cascade,
        }
    }

    fn pluck(&self, column: &str, predicate: &Predicate) -> RepoResult<Vec<StoreRow>> {
        self.check_column(column)?;
        predicate.check_arity()?;

        let sql = format!(
            "SELECT {column} FROM {}{}",
            K::TABLE,
            predicate.where_clause()
        );
        self.store
            .query_many(&sql, predicate.params())
            .map_err(RepoError::store("pluck"))
    }

    fn column_equals(&self, column: &str, value: FieldValue) -> RepoResult<Predicate> {
        self.check_column(column)?;
        Ok(Predicate::from_parts(
            format!("{column} = ?"),
            vec![value.to_sql_value()],
        ))
    }

    fn check_column(&self, column: &str) -> RepoResult<()> {
        if K::has_column(column) {
            Ok(())
        } else {
            Err(RepoError::UnknownColumn {
                table: K::TABLE,
                column: column.to_string(),
            })
        }
    }

    fn check_order(&self, order: &OrderBy) -> RepoResult<()> {
        order
            .keys()
            .iter()
            .try_for_each(|(column, _)| self.check_column(column))
    }

    fn load_many(
        &self,
        sql: &str,
        params: &[Value],
        context: &'static str,
    ) -> RepoResult<Vec<K>> {
        self.store
            .query_many(sql, params)
            .map_err(RepoError::store(context))?
            .iter()
            .map(K::from_row)
            .collect()
    }
}

impl<K: Record + Validatable> RecordRepository<'_, K> {
    /// Validates, stamps timestamps, inserts, and writes the new id back.
    ///
    /// # Errors
    /// - `Validation` before any store interaction.
    pub fn create(&self, record: &mut K) -> RepoResult<RecordId> {
        validate(record)?;

        let now = now_epoch_ms();
        record.set_created_at(now);
        record.set_updated_at(now);

        let mut map = AttributeMap::<K>::new();
        for (column, value) in record.column_values() {
            map.insert(column, value)?;
        }
        let id = self.create_from_map(map)?;
        record.set_id(id);
        Ok(id)
    }

    /// Creates when `record.id() == 0`, otherwise rewrites every field.
    pub fn save(&self, record: &mut K) -> RepoResult<RecordId> {
        validate(record)?;
        if record.id() == 0 {
            return self.create(record);
        }

        let now = now_epoch_ms();
        record.set_updated_at(now);

        let mut map = AttributeMap::<K>::new();
        for (column, value) in record.column_values() {
            if column != CREATED_AT && column != UPDATED_AT {
                map.insert(column, value)?;
            }
        }
        self.update_at(record.id(), map, now)?;
        Ok(record.id())
    }
}
