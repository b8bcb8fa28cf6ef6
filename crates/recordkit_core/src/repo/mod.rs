//! Repository layer over the store executor.
//!
//! # Responsibility
//! - Map record kinds to tables and rows (`Record`).
//! - Provide the generic accessor, cascade coordinator and keyset pager.
//!
//! # Invariants
//! - Repository writes through `create`/`save` run record validation first.
//! - Every store interaction goes through a `&dyn StoreExecutor`.

pub mod article_repo;
pub mod attributes;
pub mod cascade;
pub mod comment_repo;
pub mod pager;
pub mod predicate;
pub mod record_repo;
