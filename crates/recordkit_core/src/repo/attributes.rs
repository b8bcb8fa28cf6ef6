//! Attribute maps and their INSERT/UPDATE encoding.
//!
//! # Responsibility
//! - Hold a sparse `column -> value` set for one record kind.
//! - Encode it into ordered columns, placeholders, assignments and binds.
//! - Apply `created_at`/`updated_at` bookkeeping on write paths.
//!
//! # Invariants
//! - Keys are columns of the record kind; unknown names are rejected on insert.
//! - Iteration is sorted by column name, so the column list and the bind
//!   list of one statement always line up.
//! - An empty map never reaches the store.

use crate::model::FieldValue;
use crate::repo::record_repo::{Record, RepoError, RepoResult};
use rusqlite::types::Value;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Sparse set of column values for a partial write on kind `K`.
pub struct AttributeMap<K: Record> {
    entries: BTreeMap<&'static str, FieldValue>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Record> AttributeMap<K> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            _kind: PhantomData,
        }
    }

    /// Sets `column`, returning the value it replaced.
    ///
    /// # Errors
    /// - `UnknownColumn` when `column` is not a writable column of `K`.
    pub fn insert(
        &mut self,
        column: &str,
        value: impl Into<FieldValue>,
    ) -> RepoResult<Option<FieldValue>> {
        let column = K::writable_column(column).ok_or_else(|| RepoError::UnknownColumn {
            table: K::TABLE,
            column: column.to_string(),
        })?;
        Ok(self.entries.insert(column, value.into()))
    }

    /// Builder form of [`AttributeMap::insert`].
    pub fn with(mut self, column: &str, value: impl Into<FieldValue>) -> RepoResult<Self> {
        self.insert(column, value)?;
        Ok(self)
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.entries.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.entries.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<FieldValue> {
        self.entries.remove(column)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    fn put_static(&mut self, column: &'static str, value: FieldValue) {
        self.entries.insert(column, value);
    }
}

impl<K: Record> Default for AttributeMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Record> Clone for AttributeMap<K> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: Record> Debug for AttributeMap<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeMap")
            .field("table", &K::TABLE)
            .field("entries", &self.entries)
            .finish()
    }
}

/// Column list and matching bind values of one encoded map.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAttributes {
    pub columns: Vec<&'static str>,
    pub params: Vec<Value>,
}

impl EncodedAttributes {
    /// `title, text, ...`
    pub fn column_list(&self) -> String {
        self.columns.join(", ")
    }

    /// `?, ?, ...` with one placeholder per column.
    pub fn placeholders(&self) -> String {
        vec!["?"; self.columns.len()].join(", ")
    }

    /// `title = ?` fragments for an UPDATE SET list.
    pub fn assignments(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect()
    }
}

/// Encodes `map` for INSERT, filling absent timestamps with `now`.
pub fn encode_for_insert<K: Record>(
    mut map: AttributeMap<K>,
    now: i64,
) -> RepoResult<EncodedAttributes> {
    if map.is_empty() {
        return Err(RepoError::EmptyAttributes);
    }

    if K::HAS_TIMESTAMPS {
        for column in [CREATED_AT, UPDATED_AT] {
            if matches!(map.get(column), None | Some(FieldValue::Null)) {
                map.put_static(column, FieldValue::Timestamp(now));
            }
        }
    }

    Ok(encode(map))
}

/// Encodes `map` for UPDATE, always overwriting `updated_at` with `now`.
pub fn encode_for_update<K: Record>(
    mut map: AttributeMap<K>,
    now: i64,
) -> RepoResult<EncodedAttributes> {
    if map.is_empty() {
        return Err(RepoError::EmptyAttributes);
    }

    if K::HAS_TIMESTAMPS {
        map.put_static(UPDATED_AT, FieldValue::Timestamp(now));
    }

    Ok(encode(map))
}

fn encode<K: Record>(map: AttributeMap<K>) -> EncodedAttributes {
    let (columns, params) = map
        .entries
        .into_iter()
        .map(|(column, value)| (column, value.to_sql_value()))
        .unzip();
    EncodedAttributes { columns, params }
}
