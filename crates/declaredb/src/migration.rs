//! Conditional migrations.
//!
//! A [`Migration`] is a named unit guarded by predicates over a schema
//! snapshot and carrying an optional imperative body. Bodies run
//! through a [`MigrationRun`], whose builder calls execute operations
//! against the live database one at a time, so each call's effect is
//! visible to the next. The orchestration layer re-reads the schema
//! after every applied migration for the same reason.
//!
//! Migrations handle the changes a pure diff cannot express: renames,
//! data-preserving column rewrites, raw statements.

use std::fmt;

use tracing::debug;

use crate::database::Database;
use crate::error::Result;
use crate::operations::{Operation, TableChange};
use crate::schema::{
    CheckConstraint, EnumType, Extension, Field, FieldDefault, FieldType, ForeignKey, Index,
    Schema, Table,
};

type Predicate = Box<dyn Fn(&Schema) -> bool + Send + Sync>;
type Body = Box<dyn Fn(&mut MigrationRun<'_>) -> Result<()> + Send + Sync>;

/// A named, conditionally-applied unit of imperative schema change.
pub struct Migration {
    name: String,
    apply_if: Vec<Predicate>,
    skip_if: Vec<Predicate>,
    body: Option<Body>,
}

impl Migration {
    /// Creates a migration with no conditions and no body. Such a
    /// migration is always applicable and applying it does nothing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            apply_if: Vec::new(),
            skip_if: Vec::new(),
            body: None,
        }
    }

    /// The migration's name, used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a predicate that must hold for the migration to apply.
    #[must_use]
    pub fn apply_if(mut self, predicate: impl Fn(&Schema) -> bool + Send + Sync + 'static) -> Self {
        self.apply_if.push(Box::new(predicate));
        self
    }

    /// Adds a predicate that suppresses the migration when it holds.
    #[must_use]
    pub fn skip_if(mut self, predicate: impl Fn(&Schema) -> bool + Send + Sync + 'static) -> Self {
        self.skip_if.push(Box::new(predicate));
        self
    }

    /// Sets the imperative body.
    #[must_use]
    pub fn body(
        mut self,
        body: impl Fn(&mut MigrationRun<'_>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    /// True iff every apply-condition holds and no skip-condition does.
    /// Both lists are vacuous by default.
    #[must_use]
    pub fn applicable(&self, schema: &Schema) -> bool {
        self.apply_if.iter().all(|p| p(schema)) && !self.skip_if.iter().any(|p| p(schema))
    }

    /// Executes the body against the database. A bodiless migration is
    /// a no-op.
    pub fn run(&self, db: &mut dyn Database) -> Result<()> {
        debug!(migration = %self.name, "running migration");
        if let Some(body) = &self.body {
            let mut run = MigrationRun { db };
            body(&mut run)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("name", &self.name)
            .field("apply_if", &self.apply_if.len())
            .field("skip_if", &self.skip_if.len())
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Executes a migration body's builder calls. Every call issues its
/// operations immediately, one at a time.
pub struct MigrationRun<'a> {
    db: &'a mut dyn Database,
}

impl MigrationRun<'_> {
    /// Creates a table.
    pub fn create_table(&mut self, table: Table) -> Result<()> {
        self.db.execute(&Operation::CreateTable { table })
    }

    /// Drops a table.
    pub fn drop_table(&mut self, name: impl Into<String>) -> Result<()> {
        self.db.execute(&Operation::DropTable { name: name.into() })
    }

    /// Renames a table.
    pub fn rename_table(
        &mut self,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Result<()> {
        self.db.execute(&Operation::RenameTable {
            old_name: old_name.into(),
            new_name: new_name.into(),
        })
    }

    /// Alters one table through a nested builder.
    pub fn alter_table(
        &mut self,
        name: impl Into<String>,
        f: impl FnOnce(&mut AlterTable<'_>) -> Result<()>,
    ) -> Result<()> {
        let mut alter = AlterTable {
            db: &mut *self.db,
            table: name.into(),
        };
        f(&mut alter)
    }

    /// Creates an enumerated type.
    pub fn create_enum(&mut self, enum_type: EnumType) -> Result<()> {
        self.db.execute(&Operation::CreateEnum { enum_type })
    }

    /// Drops an enumerated type.
    pub fn drop_enum(&mut self, name: impl Into<String>) -> Result<()> {
        self.db.execute(&Operation::DropEnum { name: name.into() })
    }

    /// Installs an extension.
    pub fn create_extension(&mut self, name: impl Into<String>) -> Result<()> {
        self.db.execute(&Operation::CreateExtension {
            extension: Extension::new(name),
        })
    }

    /// Drops an extension.
    pub fn drop_extension(&mut self, name: impl Into<String>) -> Result<()> {
        self.db.execute(&Operation::DropExtension { name: name.into() })
    }

    /// Escape hatch: executes a raw statement.
    pub fn execute(&mut self, sql: impl Into<String>) -> Result<()> {
        self.db.execute(&Operation::RawStatement { sql: sql.into() })
    }
}

/// Nested builder for alter-table calls inside a migration body. Each
/// method executes one alter-table operation immediately.
pub struct AlterTable<'a> {
    db: &'a mut dyn Database,
    table: String,
}

impl AlterTable<'_> {
    fn change(&mut self, change: TableChange) -> Result<()> {
        self.db.execute(&Operation::AlterTable {
            name: self.table.clone(),
            changes: vec![change],
        })
    }

    /// Adds a column.
    pub fn add_column(&mut self, field: Field) -> Result<()> {
        self.change(TableChange::CreateColumn { field })
    }

    /// Drops a column.
    pub fn drop_column(&mut self, name: impl Into<String>) -> Result<()> {
        self.change(TableChange::DropColumn { name: name.into() })
    }

    /// Renames a column.
    pub fn rename_column(
        &mut self,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Result<()> {
        self.change(TableChange::RenameColumn {
            old_name: old_name.into(),
            new_name: new_name.into(),
        })
    }

    /// Changes a column's type.
    pub fn alter_column_type(
        &mut self,
        name: impl Into<String>,
        new_type: FieldType,
    ) -> Result<()> {
        self.change(TableChange::AlterColumnType {
            name: name.into(),
            new_type,
        })
    }

    /// Allows NULLs in a column.
    pub fn allow_null(&mut self, name: impl Into<String>) -> Result<()> {
        self.change(TableChange::AllowNull { name: name.into() })
    }

    /// Forbids NULLs in a column.
    pub fn disallow_null(&mut self, name: impl Into<String>) -> Result<()> {
        self.change(TableChange::DisallowNull { name: name.into() })
    }

    /// Sets or clears a column's default.
    pub fn alter_column_default(
        &mut self,
        name: impl Into<String>,
        new_default: Option<FieldDefault>,
    ) -> Result<()> {
        self.change(TableChange::AlterColumnDefault {
            name: name.into(),
            new_default,
        })
    }

    /// Creates an index.
    pub fn add_index(&mut self, index: Index) -> Result<()> {
        self.change(TableChange::CreateIndex { index })
    }

    /// Drops an index.
    pub fn drop_index(&mut self, name: impl Into<String>) -> Result<()> {
        self.change(TableChange::DropIndex { name: name.into() })
    }

    /// Adds a check constraint.
    pub fn add_check(&mut self, check: CheckConstraint) -> Result<()> {
        self.change(TableChange::CreateCheck { check })
    }

    /// Drops a check constraint.
    pub fn drop_check(&mut self, name: impl Into<String>) -> Result<()> {
        self.change(TableChange::DropCheck { name: name.into() })
    }

    /// Adds a foreign key.
    pub fn add_foreign_key(&mut self, foreign_key: ForeignKey) -> Result<()> {
        self.db.execute(&Operation::CreateForeignKey {
            table: self.table.clone(),
            foreign_key,
        })
    }

    /// Drops a foreign key.
    pub fn drop_foreign_key(&mut self, name: impl Into<String>) -> Result<()> {
        self.db.execute(&Operation::DropForeignKey {
            table: self.table.clone(),
            name: name.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatabase;
    use crate::schema::FieldType;

    fn users() -> Table {
        Table::new("users")
            .field(Field::new("id", FieldType::BigInt).primary_key())
            .field(Field::new("login", FieldType::Text).not_null())
    }

    #[test]
    fn no_conditions_means_always_applicable() {
        let migration = Migration::new("noop");
        assert!(migration.applicable(&Schema::new()));
    }

    #[test]
    fn apply_and_skip_conditions_combine() {
        let migration = Migration::new("rename_login")
            .apply_if(|s: &Schema| s.has_table("users"))
            .skip_if(|s: &Schema| {
                s.get_table("users").is_some_and(|t| t.has_field("username"))
            });

        assert!(!migration.applicable(&Schema::new()));
        assert!(migration.applicable(&Schema::new().table(users())));

        let migrated = Schema::new().table(
            Table::new("users")
                .field(Field::new("id", FieldType::BigInt).primary_key())
                .field(Field::new("username", FieldType::Text).not_null()),
        );
        assert!(!migration.applicable(&migrated));
    }

    #[test]
    fn bodiless_migration_is_a_noop() {
        let mut db = MemoryDatabase::new();
        Migration::new("gate_only").run(&mut db).unwrap();
        assert_eq!(db.executed(), 0);
    }

    #[test]
    fn body_calls_execute_one_at_a_time() {
        let mut db = MemoryDatabase::with_schema(Schema::new().table(users()));
        let migration = Migration::new("rename_login").body(|run| {
            run.alter_table("users", |t| {
                t.rename_column("login", "username")?;
                t.alter_column_default(
                    "username",
                    Some(FieldDefault::String("anonymous".into())),
                )
            })
        });

        migration.run(&mut db).unwrap();
        assert_eq!(db.executed(), 2);

        let schema = db.read_schema().unwrap();
        let table = schema.get_table("users").unwrap();
        assert!(table.has_field("username"));
        assert!(!table.has_field("login"));
        assert_eq!(
            table.get_field("username").unwrap().default,
            Some(FieldDefault::String("anonymous".into()))
        );
    }

    #[test]
    fn raw_statements_reach_the_database() {
        let mut db = MemoryDatabase::new();
        let migration = Migration::new("backfill")
            .body(|run| run.execute("UPDATE users SET username = login"));
        migration.run(&mut db).unwrap();
        assert_eq!(db.raw_statements(), ["UPDATE users SET username = login"]);
    }

    #[test]
    fn body_errors_propagate() {
        let mut db = MemoryDatabase::new();
        let migration = Migration::new("bad").body(|run| run.drop_table("missing"));
        assert!(migration.run(&mut db).is_err());
    }
}
