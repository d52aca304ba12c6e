//! The database collaborator boundary.
//!
//! The engine never talks to a wire protocol itself; it drives an
//! implementation of [`Database`], which couples dialect-specific
//! introspection (read the live catalog as a [`Schema`]) with DDL
//! execution (perform one [`Operation`]). The whole reconciliation run
//! happens inside one transaction, so the trait also exposes the
//! transaction boundary.

use crate::error::Result;
use crate::operations::Operation;
use crate::schema::Schema;

/// A live database connection capable of introspection and DDL
/// execution.
///
/// Implementations must populate every attribute the schema model
/// defines when reading (index column ordering, expression text, default
/// text, constraint conditions), in the same shape the diff engine
/// compares against desired values. Execution failures propagate as
/// [`crate::Error::Execution`] and are never retried or reinterpreted by
/// the engine.
pub trait Database {
    /// Reads the database's current structure.
    fn read_schema(&mut self) -> Result<Schema>;

    /// Performs one structural change.
    fn execute(&mut self, operation: &Operation) -> Result<()>;

    /// Opens a transaction.
    fn begin(&mut self) -> Result<()>;

    /// Commits the open transaction.
    fn commit(&mut self) -> Result<()>;

    /// Rolls back the open transaction, restoring the pre-transaction
    /// structure.
    fn rollback(&mut self) -> Result<()>;
}
