//! Reconciliation orchestration.
//!
//! [`reconcile`] drives a full run: validate the desired schema,
//! canonicalize its expressions, then inside one transaction replay the
//! applicable migrations, diff, and apply. Everything after `begin`
//! commits atomically or rolls back entirely; a dry run always rolls
//! back. With post-check enabled, a fresh diff after applying must come
//! back empty or the run fails with the remaining differences.

use tracing::{debug, info};

use crate::config::Config;
use crate::database::Database;
use crate::diff::diff;
use crate::error::{Error, Result};
use crate::migration::Migration;
use crate::normalizer::normalize_schema;
use crate::schema::Schema;
use crate::validator::validate;

/// Reconciles the live database with `desired`.
///
/// Validation and normalization happen before the transaction opens;
/// every structural change happens inside it. On any failure after
/// `begin` the transaction is rolled back and the database is left
/// exactly as it was.
pub fn reconcile(
    db: &mut dyn Database,
    config: &Config,
    desired: &Schema,
    migrations: &[Migration],
) -> Result<()> {
    if config.database.is_empty() {
        return Err(Error::Configuration(
            "no database configured".to_string(),
        ));
    }

    let validation = validate(desired);
    if !validation.is_valid() {
        return Err(Error::InvalidSchema(validation.into_errors()));
    }

    let desired = normalize_schema(desired, db)?;

    db.begin()?;
    match run(db, config, &desired, migrations) {
        Ok(()) => Ok(()),
        Err(err) => {
            // Best effort: the original error is the one to report.
            let _ = db.rollback();
            Err(err)
        }
    }
}

fn run(
    db: &mut dyn Database,
    config: &Config,
    desired: &Schema,
    migrations: &[Migration],
) -> Result<()> {
    // Each applied migration's effects must be visible to the next
    // migration's conditions, so the schema is re-read every iteration.
    for migration in migrations {
        let snapshot = db.read_schema()?;
        if migration.applicable(&snapshot) {
            info!(migration = %migration.name(), "applying migration");
            migration.run(db)?;
        } else {
            debug!(migration = %migration.name(), "migration not applicable, skipping");
        }
    }

    let actual = db.read_schema()?;
    let operations = diff(desired, &actual)?;

    if config.dry_run {
        info!(
            changes = operations.len(),
            "dry run, rolling back without applying"
        );
        for operation in &operations {
            info!("would apply: {}", operation.description());
        }
        db.rollback()?;
        return Ok(());
    }

    if operations.is_empty() {
        debug!("schema already converged");
        db.commit()?;
        return Ok(());
    }

    if config.log_changes {
        for operation in &operations {
            info!("applying: {}", operation.description());
        }
    }

    for operation in &operations {
        db.execute(operation)?;
    }

    if config.post_check {
        let after = db.read_schema()?;
        let remaining = diff(desired, &after)?;
        if !remaining.is_empty() {
            return Err(Error::SchemaMismatch(remaining));
        }
    }

    db.commit()
}
