//! In-memory database.
//!
//! A [`Database`] implementation backed by a plain [`Schema`] value,
//! with snapshot-based transactions. Used by the test suite and by the
//! CLI's diff command; it executes every operation the engine can emit,
//! so a full reconcile run can be exercised without a live server.

use crate::database::Database;
use crate::error::{Error, Result};
use crate::operations::{Operation, TableChange};
use crate::schema::{Schema, Table};

/// A schema container that behaves like a live database connection.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    schema: Schema,
    snapshot: Option<Schema>,
    raw_statements: Vec<String>,
    executed: usize,
    fail_after: Option<usize>,
}

impl MemoryDatabase {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a database already holding `schema`.
    #[must_use]
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Makes every execution after the first `count` fail, for
    /// exercising rollback paths.
    pub fn fail_after(&mut self, count: usize) {
        self.fail_after = Some(count);
    }

    /// Raw statements executed so far, in order.
    #[must_use]
    pub fn raw_statements(&self) -> &[String] {
        &self.raw_statements
    }

    /// Number of operations executed so far.
    #[must_use]
    pub fn executed(&self) -> usize {
        self.executed
    }

    /// True while a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.schema
            .tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::Execution(format!("table '{name}' does not exist")))
    }

    fn apply(&mut self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::CreateTable { table } => {
                if self.schema.has_table(&table.name) {
                    return Err(Error::Execution(format!(
                        "table '{}' already exists",
                        table.name
                    )));
                }
                self.schema.tables.push(table.clone());
            }
            Operation::DropTable { name } => {
                self.table_mut(name)?;
                self.schema.tables.retain(|t| t.name != *name);
            }
            Operation::RenameTable { old_name, new_name } => {
                self.table_mut(old_name)?.name = new_name.clone();
            }
            Operation::AlterTable { name, changes } => {
                for change in changes {
                    self.apply_table_change(name, change)?;
                }
            }
            Operation::CreateForeignKey { table, foreign_key } => {
                let table = self.table_mut(table)?;
                if table.get_foreign_key(&foreign_key.name).is_some() {
                    return Err(Error::Execution(format!(
                        "foreign key '{}' already exists",
                        foreign_key.name
                    )));
                }
                table.foreign_keys.push(foreign_key.clone());
            }
            Operation::DropForeignKey { table, name } => {
                let table = self.table_mut(table)?;
                if table.get_foreign_key(name).is_none() {
                    return Err(Error::Execution(format!(
                        "foreign key '{name}' does not exist"
                    )));
                }
                table.foreign_keys.retain(|fk| fk.name != *name);
            }
            Operation::CreateEnum { enum_type } => {
                if self.schema.get_enum(&enum_type.name).is_some() {
                    return Err(Error::Execution(format!(
                        "enum '{}' already exists",
                        enum_type.name
                    )));
                }
                self.schema.enums.push(enum_type.clone());
            }
            Operation::DropEnum { name } => {
                if self.schema.get_enum(name).is_none() {
                    return Err(Error::Execution(format!("enum '{name}' does not exist")));
                }
                self.schema.enums.retain(|e| e.name != *name);
            }
            Operation::AlterEnumValues {
                enum_name,
                additions,
                ..
            } => {
                let enum_type = self
                    .schema
                    .enums
                    .iter_mut()
                    .find(|e| e.name == *enum_name)
                    .ok_or_else(|| {
                        Error::Execution(format!("enum '{enum_name}' does not exist"))
                    })?;
                for addition in additions {
                    match &addition.before {
                        Some(anchor) => {
                            let position = enum_type
                                .values
                                .iter()
                                .position(|v| v == anchor)
                                .ok_or_else(|| {
                                    Error::Execution(format!(
                                        "enum '{enum_name}' has no value '{anchor}'"
                                    ))
                                })?;
                            enum_type.values.insert(position, addition.value.clone());
                        }
                        None => enum_type.values.push(addition.value.clone()),
                    }
                }
            }
            Operation::CreateExtension { extension } => {
                if self.schema.get_extension(&extension.name).is_some() {
                    return Err(Error::Execution(format!(
                        "extension '{}' already exists",
                        extension.name
                    )));
                }
                self.schema.extensions.push(extension.clone());
            }
            Operation::DropExtension { name } => {
                if self.schema.get_extension(name).is_none() {
                    return Err(Error::Execution(format!(
                        "extension '{name}' does not exist"
                    )));
                }
                self.schema.extensions.retain(|e| e.name != *name);
            }
            Operation::RawStatement { sql } => {
                self.raw_statements.push(sql.clone());
            }
        }
        Ok(())
    }

    fn apply_table_change(&mut self, table_name: &str, change: &TableChange) -> Result<()> {
        let table = self.table_mut(table_name)?;
        let missing_field =
            |name: &str| Error::Execution(format!("column '{table_name}.{name}' does not exist"));

        match change {
            TableChange::CreateColumn { field } => {
                if table.has_field(&field.name) {
                    return Err(Error::Execution(format!(
                        "column '{}.{}' already exists",
                        table_name, field.name
                    )));
                }
                table.fields.push(field.clone());
            }
            TableChange::DropColumn { name } => {
                if !table.has_field(name) {
                    return Err(missing_field(name));
                }
                table.fields.retain(|f| f.name != *name);
            }
            TableChange::RenameColumn { old_name, new_name } => {
                let field = table
                    .fields
                    .iter_mut()
                    .find(|f| f.name == *old_name)
                    .ok_or_else(|| missing_field(old_name))?;
                field.name = new_name.clone();
            }
            TableChange::AlterColumnType { name, new_type } => {
                let field = table
                    .fields
                    .iter_mut()
                    .find(|f| f.name == *name)
                    .ok_or_else(|| missing_field(name))?;
                field.field_type = new_type.clone();
            }
            TableChange::CreatePrimaryKey { name } => {
                let field = table
                    .fields
                    .iter_mut()
                    .find(|f| f.name == *name)
                    .ok_or_else(|| missing_field(name))?;
                field.primary_key = true;
            }
            TableChange::DropPrimaryKey { name } => {
                let field = table
                    .fields
                    .iter_mut()
                    .find(|f| f.name == *name)
                    .ok_or_else(|| missing_field(name))?;
                field.primary_key = false;
            }
            TableChange::AllowNull { name } => {
                let field = table
                    .fields
                    .iter_mut()
                    .find(|f| f.name == *name)
                    .ok_or_else(|| missing_field(name))?;
                field.nullable = true;
            }
            TableChange::DisallowNull { name } => {
                let field = table
                    .fields
                    .iter_mut()
                    .find(|f| f.name == *name)
                    .ok_or_else(|| missing_field(name))?;
                field.nullable = false;
            }
            TableChange::AlterColumnDefault { name, new_default } => {
                let field = table
                    .fields
                    .iter_mut()
                    .find(|f| f.name == *name)
                    .ok_or_else(|| missing_field(name))?;
                field.default = new_default.clone();
            }
            TableChange::CreateIndex { index } => {
                if table.get_index(&index.name).is_some() {
                    return Err(Error::Execution(format!(
                        "index '{}' already exists",
                        index.name
                    )));
                }
                table.indexes.push(index.clone());
            }
            TableChange::DropIndex { name } => {
                if table.get_index(name).is_none() {
                    return Err(Error::Execution(format!("index '{name}' does not exist")));
                }
                table.indexes.retain(|i| i.name != *name);
            }
            TableChange::CreateCheck { check } => {
                if table.get_check(&check.name).is_some() {
                    return Err(Error::Execution(format!(
                        "check constraint '{}' already exists",
                        check.name
                    )));
                }
                table.checks.push(check.clone());
            }
            TableChange::DropCheck { name } => {
                if table.get_check(name).is_none() {
                    return Err(Error::Execution(format!(
                        "check constraint '{name}' does not exist"
                    )));
                }
                table.checks.retain(|c| c.name != *name);
            }
        }
        Ok(())
    }
}

impl Database for MemoryDatabase {
    fn read_schema(&mut self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    fn execute(&mut self, operation: &Operation) -> Result<()> {
        if let Some(limit) = self.fail_after {
            if self.executed >= limit {
                return Err(Error::Execution(format!(
                    "injected failure before: {}",
                    operation.description()
                )));
            }
        }
        self.executed += 1;
        self.apply(operation)
    }

    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(Error::Execution("transaction already open".to_string()));
        }
        self.snapshot = Some(self.schema.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.snapshot.take().is_none() {
            return Err(Error::Execution("no open transaction".to_string()));
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| Error::Execution("no open transaction".to_string()))?;
        self.schema = snapshot;
        Ok(())
    }
}
