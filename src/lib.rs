//! Online schema change engine for MySQL/InnoDB.
//!
//! Builds a shadow table with the new shape, mirrors ongoing origin writes
//! into it via triggers, back-fills pre-existing rows in bounded chunks, then
//! swaps the two tables — either atomically (`RENAME TABLE o TO a, s TO o`) or
//! via a `LOCK TABLES` fallback. The pattern traces back to the
//! "large-hadron-migrator" lineage of online-DDL tools (in spirit alongside
//! `gh-ost` and `pt-online-schema-change`), distilled here to its four moving
//! parts: entangler, chunker, switcher, and the invoker that sequences them.
//!
//! The engine speaks to the database only through the [`adapter::Adapter`]
//! trait; it never touches a socket itself. [`adapter::SqlxAdapter`] is the
//! reference implementation over `sqlx::MySqlPool`.
//!
//! # Example
//!
//! ```ignore
//! use lhm::{adapter::SqlxAdapter, config::LhmConfig, invoker::Invoker};
//!
//! let pool = sqlx::MySqlPool::connect("mysql://...").await?;
//! let adapter = SqlxAdapter::new(pool);
//! let invoker = Invoker::new(&adapter, "users", LhmConfig::default().build()?);
//!
//! invoker
//!     .execute(Box::new(|shadow| Box::pin(async move {
//!         // mutate `shadow`'s shape here, e.g. ALTER TABLE shadow ADD COLUMN ...
//!         Ok(())
//!     })))
//!     .await?;
//! # Ok::<(), lhm::error::LhmError>(())
//! ```
//!
//! # Safety
//!
//! This crate contains no `unsafe` code.

pub mod adapter;
pub mod chunker;
pub mod clock;
pub mod config;
pub mod entangler;
pub mod error;
pub mod intersection;
pub mod invoker;
pub mod sql_helper;
pub mod switcher;
