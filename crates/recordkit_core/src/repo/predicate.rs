//! Trusted WHERE fragments and ORDER BY specifications.
//!
//! # Responsibility
//! - Carry a raw boolean SQL fragment together with its bound parameters.
//! - Build `IN (...)` and conjunction fragments for repository internals.
//! - Describe ordering as `(column, direction)` pairs.
//!
//! # Invariants
//! - Fragment text never starts with `WHERE`; repositories add it.
//! - Placeholder count must equal parameter count before a statement runs.
//! - Fragment text is caller-owned SQL. Never build one from unsanitized
//!   external input; pass such input as a parameter instead.

use crate::model::{FieldValue, RecordId};
use crate::repo::record_repo::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;

/// Most ids bound into one `IN` list.
pub const ID_CHUNK_SIZE: usize = 500;

// Quoted literals are matched first so a `?` inside them is not counted.
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|\?"#).expect("valid placeholder regex")
});

/// Raw boolean SQL fragment with positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    sql: String,
    params: Vec<Value>,
}

impl Predicate {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Wraps caller-owned SQL, e.g. `Predicate::trusted("title = ?", vec!["x".into()])`.
    pub fn trusted(sql: impl Into<String>, params: Vec<FieldValue>) -> Self {
        Self {
            sql: sql.into(),
            params: params.iter().map(FieldValue::to_sql_value).collect(),
        }
    }

    /// `column IN (?, ?, ...)` over `ids`.
    ///
    /// `column` must come from a record kind's column table, never from input.
    pub fn id_in(column: &str, ids: &[RecordId]) -> Self {
        let holders = vec!["?"; ids.len()].join(", ");
        Self {
            sql: format!("{column} IN ({holders})"),
            params: ids.iter().map(|id| Value::Integer(*id)).collect(),
        }
    }

    /// [`Predicate::id_in`] split into lists of at most [`ID_CHUNK_SIZE`] ids.
    ///
    /// Keeps every statement under SQLite's bound-parameter limit. Ids are
    /// sorted and deduplicated, so chunks cover increasing id ranges.
    pub fn id_in_chunks(column: &str, ids: &[RecordId]) -> Vec<Self> {
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        sorted
            .chunks(ID_CHUNK_SIZE)
            .map(|chunk| Self::id_in(column, chunk))
            .collect()
    }

    pub(crate) fn from_parts(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    /// Conjoins two fragments; an empty side is dropped.
    pub fn and(self, other: Predicate) -> Predicate {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }

        let mut params = self.params;
        params.extend(other.params);
        Predicate {
            sql: format!("({}) AND ({})", self.sql.trim(), other.sql.trim()),
            params,
        }
    }

    /// Number of `?` placeholders outside quoted literals.
    pub fn placeholder_count(&self) -> usize {
        PLACEHOLDER_RE
            .find_iter(&self.sql)
            .filter(|found| found.as_str() == "?")
            .count()
    }

    /// Rejects fragments whose placeholders and parameters disagree.
    pub fn check_arity(&self) -> RepoResult<()> {
        let placeholders = self.placeholder_count();
        if placeholders != self.params.len() {
            return Err(RepoError::PredicateArity {
                placeholders,
                params: self.params.len(),
            });
        }
        Ok(())
    }

    /// ` WHERE <sql>` or an empty string for [`Predicate::all`].
    pub(crate) fn where_clause(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.sql.trim())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Ordered list of sort keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    keys: Vec<(String, SortDirection)>,
}

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new().then(column, SortDirection::Asc)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new().then(column, SortDirection::Desc)
    }

    /// Appends one key; a repeated column keeps its first direction.
    pub fn then(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        let column = column.into();
        if self.direction_of(&column).is_none() {
            self.keys.push((column, direction));
        }
        self
    }

    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn direction_of(&self, column: &str) -> Option<SortDirection> {
        self.keys
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, direction)| *direction)
    }

    /// Same keys with every direction flipped.
    pub fn reversed(&self) -> Self {
        Self {
            keys: self
                .keys
                .iter()
                .map(|(column, direction)| (column.clone(), direction.reversed()))
                .collect(),
        }
    }

    /// ` ORDER BY a ASC, b DESC` or an empty string.
    pub(crate) fn to_sql(&self) -> String {
        if self.keys.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .keys
            .iter()
            .map(|(column, direction)| format!("{column} {}", direction.as_sql()))
            .collect();
        format!(" ORDER BY {}", parts.join(", "))
    }
}
