//! Declarative schema reconciliation for relational databases.
//!
//! `declaredb` takes a desired schema described as plain values and
//! converges a live database toward it: read the actual schema, replay
//! conditional migrations, diff, and apply the resulting operations
//! inside one transaction.
//!
//! # Architecture
//!
//! - **Schema** - Immutable schema values: tables, fields, indexes,
//!   checks, foreign keys, enums, extensions
//! - **Validator** - Structural checks on the desired schema, all
//!   errors accumulated
//! - **Diff** - Compares desired against actual and emits ordered
//!   [`operations::Operation`]s; refuses lossy enum rewrites
//! - **Normalizer** - Round-trips expression-bearing tables through the
//!   database so canonical expression text is compared, not
//!   human-written text
//! - **Migration** - Named, predicate-gated imperative changes for what
//!   a diff cannot express (renames, backfills)
//! - **Runner** - The transactional reconcile loop tying it together
//!
//! # Example
//!
//! ```rust
//! use declaredb::prelude::*;
//!
//! let desired = Schema::new().table(
//!     Table::new("users")
//!         .field(Field::new("id", FieldType::BigSerial).primary_key())
//!         .field(Field::new("email", FieldType::Text).not_null())
//!         .index(Index::new("users_email_idx", vec![IndexColumn::asc("email")]).unique()),
//! );
//!
//! let mut db = MemoryDatabase::new();
//! let config = Config::new("app");
//! reconcile(&mut db, &config, &desired, &[]).unwrap();
//!
//! // A second run finds nothing to do.
//! reconcile(&mut db, &config, &desired, &[]).unwrap();
//! ```

pub mod config;
pub mod database;
pub mod diff;
pub mod error;
pub mod memory;
pub mod migration;
pub mod normalizer;
pub mod operations;
pub mod runner;
pub mod schema;
pub mod validator;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::database::Database;
    pub use crate::diff::diff;
    pub use crate::error::{Error, Result};
    pub use crate::memory::MemoryDatabase;
    pub use crate::migration::{Migration, MigrationRun};
    pub use crate::normalizer::{normalize_schema, normalize_table};
    pub use crate::operations::{
        EnumDependentField, EnumValueAddition, Operation, TableChange,
    };
    pub use crate::runner::reconcile;
    pub use crate::schema::{
        CheckConstraint, ColumnRef, EnumType, Extension, Field, FieldDefault, FieldType,
        FkAction, ForeignKey, Index, IndexColumn, IndexMethod, NullsOrder, Schema, SortOrder,
        Table,
    };
    pub use crate::validator::{validate, ValidationResult};
}
