//! Expression canonicalizer.
//!
//! Default values, check conditions and expression indexes are written
//! by humans in one syntactic form but stored by the database in a
//! canonical one (extra parentheses, type casts, qualified function
//! names). Comparing the two directly produces false positive diffs.
//!
//! Rather than re-implement the engine's expression parser, the
//! normalizer round-trips each expression-bearing table through the
//! live database: create it under a collision-resistant temporary name,
//! read it back, restore the original name and drop the temporary
//! table. The read-back copy carries the canonical expression text and
//! replaces the desired definition before diffing. One extra
//! create+read+drop round trip per such table, once per run.

use std::hash::{DefaultHasher, Hash, Hasher};

use tracing::debug;

use crate::database::Database;
use crate::error::{Error, Result};
use crate::operations::Operation;
use crate::schema::{Schema, Table};

/// Canonicalizes every expression-bearing table in `schema` through the
/// database. Tables without expressions pass through untouched.
pub fn normalize_schema(schema: &Schema, db: &mut dyn Database) -> Result<Schema> {
    let mut normalized = schema.clone();
    for table in &mut normalized.tables {
        if table.has_expressions() {
            *table = normalize_table(table, db)?;
        }
    }
    Ok(normalized)
}

/// Round-trips one table through the database and returns the canonical
/// definition. The temporary table is dropped on every exit path.
pub fn normalize_table(table: &Table, db: &mut dyn Database) -> Result<Table> {
    let temp_name = temporary_name(table);
    debug!(table = %table.name, temp = %temp_name, "normalizing table");

    // Foreign keys carry no expression text and would dangle on the
    // temporary copy, so they sit out the round trip.
    let mut temporary = table.with_name(&temp_name);
    temporary.foreign_keys.clear();

    db.execute(&Operation::CreateTable { table: temporary })?;
    let read_back = read_temporary(db, &temp_name, table);
    let dropped = db.execute(&Operation::DropTable {
        name: temp_name.clone(),
    });

    let normalized = read_back?;
    dropped?;
    Ok(normalized)
}

fn read_temporary(db: &mut dyn Database, temp_name: &str, original: &Table) -> Result<Table> {
    let schema = db.read_schema()?;
    let table = schema.get_table(temp_name).ok_or_else(|| {
        Error::Execution(format!(
            "temporary table '{temp_name}' missing after creation"
        ))
    })?;
    let mut normalized = table.with_name(&original.name);
    normalized.foreign_keys = original.foreign_keys.clone();
    Ok(normalized)
}

/// Derives the temporary name from a content hash of the table's own
/// name and its field, index and check names. Repeated normalization of
/// an unchanged table reuses the same name, and two distinct tables
/// never collide in practice.
fn temporary_name(table: &Table) -> String {
    let mut hasher = DefaultHasher::new();
    table.name.hash(&mut hasher);
    for field in &table.fields {
        field.name.hash(&mut hasher);
    }
    for index in &table.indexes {
        index.name.hash(&mut hasher);
    }
    for check in &table.checks {
        check.name.hash(&mut hasher);
    }
    format!("{}_norm_{:016x}", table.name, hasher.finish())
}
