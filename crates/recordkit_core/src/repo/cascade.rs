//! Best-effort cascade deletion of dependent records.
//!
//! # Responsibility
//! - Hold the `parent -> child` associations a record kind registers.
//! - Destroy dependent rows before their parents are deleted.
//!
//! # Invariants
//! - Child failures are logged and recorded, never returned as errors.
//! - Parent ids are bound in bounded `IN` lists, never one unbounded list.
//! - Cascades are not transactional: a parent can outlive a failed child
//!   cleanup, and children removed before a failed parent delete stay removed.

use crate::db::StoreExecutor;
use crate::model::RecordId;
use crate::repo::predicate::Predicate;
use crate::repo::record_repo::{DestroyOutcome, Record, RecordRepository, RepoError, RepoResult};
use log::{debug, error};
use std::fmt::{Debug, Formatter};

type DestroyWhereFn = fn(&dyn StoreExecutor, &Predicate) -> RepoResult<DestroyOutcome>;

/// `has_many` link from a parent kind to a child kind.
#[derive(Clone, Copy)]
pub struct Association {
    pub name: &'static str,
    pub child_table: &'static str,
    /// Column on the child table holding the parent id.
    pub foreign_key: &'static str,
    destroy_where: DestroyWhereFn,
}

impl Association {
    pub fn has_many<C: Record>(name: &'static str, foreign_key: &'static str) -> Self {
        Self {
            name,
            child_table: C::TABLE,
            foreign_key,
            destroy_where: destroy_children::<C>,
        }
    }
}

impl Debug for Association {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Association")
            .field("name", &self.name)
            .field("child_table", &self.child_table)
            .field("foreign_key", &self.foreign_key)
            .finish()
    }
}

fn destroy_children<C: Record>(
    store: &dyn StoreExecutor,
    predicate: &Predicate,
) -> RepoResult<DestroyOutcome> {
    RecordRepository::<C>::new(store).destroy_where(predicate)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeStatus {
    Deleted(u64),
    /// Child delete failed; carries the error code and message.
    Failed { code: &'static str, message: String },
    /// Parent ids could not be resolved, so the child delete never ran.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub association: &'static str,
    pub child_table: &'static str,
    pub status: CascadeStatus,
}

/// Summary of every dependent cleanup attempted for one destroy call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub outcomes: Vec<CascadeOutcome>,
}

impl CascadeReport {
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CascadeOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| !matches!(outcome.status, CascadeStatus::Deleted(_)))
    }

    /// Child rows removed across every association and nesting level.
    pub fn rows_deleted(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|outcome| match outcome.status {
                CascadeStatus::Deleted(rows) => rows,
                _ => 0,
            })
            .sum()
    }

    pub(crate) fn skipped<K: Record>(err: &RepoError) -> Self {
        Self {
            outcomes: K::associations()
                .into_iter()
                .map(|association| CascadeOutcome {
                    association: association.name,
                    child_table: association.child_table,
                    status: CascadeStatus::Skipped {
                        reason: err.to_string(),
                    },
                })
                .collect(),
        }
    }
}

/// Destroys every dependent row of `parent_ids` for each association of `K`.
///
/// Parent ids are bound in chunks (see `Predicate::id_in_chunks`). A failed
/// chunk does not stop the remaining ones; the association is then reported
/// as failed with the first error. Nested cascades (children of children) are
/// flattened into the report.
pub fn destroy_dependents<K: Record>(
    store: &dyn StoreExecutor,
    parent_ids: &[RecordId],
) -> CascadeReport {
    let mut report = CascadeReport::default();
    if parent_ids.is_empty() {
        return report;
    }

    for association in K::associations() {
        let chunks = Predicate::id_in_chunks(association.foreign_key, parent_ids);
        let mut rows_deleted = 0;
        let mut first_error: Option<RepoError> = None;

        for predicate in &chunks {
            match (association.destroy_where)(store, predicate) {
                Ok(outcome) => {
                    rows_deleted += outcome.rows_deleted;
                    report.outcomes.extend(outcome.cascade.outcomes);
                }
                Err(err) => {
                    error!(
                        "event=cascade_delete module=repo status=error parent_table={} child_table={} chunk_ids={} error_code={} error={}",
                        K::TABLE,
                        association.child_table,
                        predicate.params().len(),
                        err.code(),
                        err
                    );
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        let status = match first_error {
            None => {
                debug!(
                    "event=cascade_delete module=repo status=ok parent_table={} child_table={} chunks={} rows={}",
                    K::TABLE,
                    association.child_table,
                    chunks.len(),
                    rows_deleted
                );
                CascadeStatus::Deleted(rows_deleted)
            }
            Some(err) => CascadeStatus::Failed {
                code: err.code(),
                message: err.to_string(),
            },
        };
        report.outcomes.push(CascadeOutcome {
            association: association.name,
            child_table: association.child_table,
            status,
        });
    }

    report
}
