//! Change operations.
//!
//! A closed vocabulary of typed structural changes. The diff engine emits
//! these; the migrator's builder calls translate into them; the database
//! collaborator executes them. Operations are pure data.
//!
//! Two fixed precedence tables govern ordering: one over operation kinds
//! for the global stable sort (extensions and enum changes before the
//! tables that use them, foreign keys after all tables exist), and one
//! over [`TableChange`] kinds inside a single alter-table operation
//! (drops and type changes before additions).

use serde::{Deserialize, Serialize};

use crate::schema::{
    CheckConstraint, EnumType, Extension, Field, FieldDefault, FieldType, ForeignKey, Index, Table,
};

/// A single value insertion into a live enumerated type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValueAddition {
    /// The value to add.
    pub value: String,
    /// The pre-existing value to insert before; `None` appends at the
    /// end.
    pub before: Option<String>,
}

/// A table field that uses an enum being altered, captured alongside the
/// alteration so dependent column defaults can be coordinated at apply
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDependentField {
    /// Table owning the field.
    pub table: String,
    /// Field name.
    pub field: String,
    /// The field's desired default.
    pub new_default: Option<FieldDefault>,
}

/// A sub-operation inside an alter-table operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableChange {
    /// Add a column.
    CreateColumn {
        /// Column definition.
        field: Field,
    },
    /// Drop a column.
    DropColumn {
        /// Column name.
        name: String,
    },
    /// Rename a column (migrator vocabulary only; never emitted by the
    /// diff engine).
    RenameColumn {
        /// Current name.
        old_name: String,
        /// New name.
        new_name: String,
    },
    /// Change a column's type (including its type attributes).
    AlterColumnType {
        /// Column name.
        name: String,
        /// The new type, attributes included.
        new_type: FieldType,
    },
    /// Mark a column as the primary key.
    CreatePrimaryKey {
        /// Column name.
        name: String,
    },
    /// Remove the primary key from a column.
    DropPrimaryKey {
        /// Column name.
        name: String,
    },
    /// Allow NULLs in a column.
    AllowNull {
        /// Column name.
        name: String,
    },
    /// Forbid NULLs in a column.
    DisallowNull {
        /// Column name.
        name: String,
    },
    /// Change (or clear) a column's default.
    AlterColumnDefault {
        /// Column name.
        name: String,
        /// The new default; `None` drops the default.
        new_default: Option<FieldDefault>,
    },
    /// Create an index.
    CreateIndex {
        /// Index definition.
        index: Index,
    },
    /// Drop an index.
    DropIndex {
        /// Index name.
        name: String,
    },
    /// Add a check constraint.
    CreateCheck {
        /// Constraint definition.
        check: CheckConstraint,
    },
    /// Drop a check constraint.
    DropCheck {
        /// Constraint name.
        name: String,
    },
}

impl TableChange {
    /// Fixed kind precedence inside an alter-table operation: drops of
    /// indexes, checks and primary keys first, then column drops and
    /// in-place alterations, then additions.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Self::DropPrimaryKey { .. } => 0,
            Self::DropIndex { .. } => 1,
            Self::DropCheck { .. } => 2,
            Self::DropColumn { .. } => 3,
            Self::AlterColumnType { .. } => 4,
            Self::AllowNull { .. } | Self::DisallowNull { .. } => 5,
            Self::AlterColumnDefault { .. } => 6,
            Self::RenameColumn { .. } => 7,
            Self::CreateColumn { .. } => 8,
            Self::CreatePrimaryKey { .. } => 9,
            Self::CreateIndex { .. } => 10,
            Self::CreateCheck { .. } => 11,
        }
    }

    /// Returns a human-readable description of this change.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateColumn { field } => format!("add column '{}'", field.name),
            Self::DropColumn { name } => format!("drop column '{name}'"),
            Self::RenameColumn { old_name, new_name } => {
                format!("rename column '{old_name}' to '{new_name}'")
            }
            Self::AlterColumnType { name, .. } => format!("alter type of column '{name}'"),
            Self::CreatePrimaryKey { name } => format!("make column '{name}' the primary key"),
            Self::DropPrimaryKey { name } => format!("drop primary key from column '{name}'"),
            Self::AllowNull { name } => format!("allow NULL in column '{name}'"),
            Self::DisallowNull { name } => format!("disallow NULL in column '{name}'"),
            Self::AlterColumnDefault { name, new_default } => {
                if new_default.is_some() {
                    format!("change default of column '{name}'")
                } else {
                    format!("drop default of column '{name}'")
                }
            }
            Self::CreateIndex { index } => format!("add index '{}'", index.name),
            Self::DropIndex { name } => format!("drop index '{name}'"),
            Self::CreateCheck { check } => format!("add check constraint '{}'", check.name),
            Self::DropCheck { name } => format!("drop check constraint '{name}'"),
        }
    }
}

/// One atomic structural change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a table (without its foreign keys, which are created
    /// separately after all tables exist).
    CreateTable {
        /// Full table definition.
        table: Table,
    },
    /// Drop a table.
    DropTable {
        /// Table name.
        name: String,
    },
    /// Rename a table (migrator vocabulary only).
    RenameTable {
        /// Current name.
        old_name: String,
        /// New name.
        new_name: String,
    },
    /// Apply a batch of sub-changes to one table.
    AlterTable {
        /// Table name.
        name: String,
        /// Ordered sub-changes.
        changes: Vec<TableChange>,
    },
    /// Add a foreign key to an existing table.
    CreateForeignKey {
        /// Table name.
        table: String,
        /// Constraint definition.
        foreign_key: ForeignKey,
    },
    /// Drop a foreign key.
    DropForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
    /// Create an enumerated type.
    CreateEnum {
        /// Type definition.
        enum_type: EnumType,
    },
    /// Drop an enumerated type.
    DropEnum {
        /// Type name.
        name: String,
    },
    /// Insert new values into a live enumerated type. The only mutation
    /// the underlying engine supports for enums; removals and
    /// reorderings are refused by the diff engine.
    AlterEnumValues {
        /// Type name.
        enum_name: String,
        /// Insertions, ordered from last target position to first.
        additions: Vec<EnumValueAddition>,
        /// Fields currently using this enum, with their desired
        /// defaults.
        fields: Vec<EnumDependentField>,
    },
    /// Install an extension.
    CreateExtension {
        /// Extension reference.
        extension: Extension,
    },
    /// Drop an extension.
    DropExtension {
        /// Extension name.
        name: String,
    },
    /// Execute a raw statement (migrator escape hatch; never emitted by
    /// the diff engine).
    RawStatement {
        /// Statement text.
        sql: String,
    },
}

impl Operation {
    /// Fixed kind precedence for the global stable sort. Extensions and
    /// enum alterations come first so tables can use their values and
    /// types, foreign keys are created after every table exists, and
    /// drops of enums and extensions trail the tables that used them.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Self::CreateExtension { .. } => 0,
            Self::AlterEnumValues { .. } => 1,
            Self::CreateEnum { .. } => 2,
            Self::CreateTable { .. } => 3,
            Self::AlterTable { .. } | Self::RenameTable { .. } | Self::RawStatement { .. } => 4,
            Self::DropForeignKey { .. } => 5,
            Self::DropTable { .. } => 6,
            Self::DropEnum { .. } => 7,
            Self::CreateForeignKey { .. } => 8,
            Self::DropExtension { .. } => 9,
        }
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable { table } => format!("create table '{}'", table.name),
            Self::DropTable { name } => format!("drop table '{name}'"),
            Self::RenameTable { old_name, new_name } => {
                format!("rename table '{old_name}' to '{new_name}'")
            }
            Self::AlterTable { name, changes } => {
                let inner: Vec<String> = changes.iter().map(TableChange::description).collect();
                format!("alter table '{}': {}", name, inner.join(", "))
            }
            Self::CreateForeignKey { table, foreign_key } => {
                format!("add foreign key '{}' to table '{table}'", foreign_key.name)
            }
            Self::DropForeignKey { table, name } => {
                format!("drop foreign key '{name}' from table '{table}'")
            }
            Self::CreateEnum { enum_type } => format!("create enum '{}'", enum_type.name),
            Self::DropEnum { name } => format!("drop enum '{name}'"),
            Self::AlterEnumValues {
                enum_name,
                additions,
                ..
            } => {
                let values: Vec<&str> = additions.iter().map(|a| a.value.as_str()).collect();
                format!("add values [{}] to enum '{enum_name}'", values.join(", "))
            }
            Self::CreateExtension { extension } => {
                format!("create extension '{}'", extension.name)
            }
            Self::DropExtension { name } => format!("drop extension '{name}'"),
            Self::RawStatement { .. } => "execute raw statement".to_string(),
        }
    }
}

/// Stable-sorts operations by the fixed kind precedence. Operations of
/// the same kind keep their relative order.
pub fn sort_operations(operations: &mut [Operation]) {
    operations.sort_by_key(Operation::priority);
}

/// Stable-sorts alter-table sub-changes by the fixed kind precedence.
pub fn sort_table_changes(changes: &mut [TableChange]) {
    changes.sort_by_key(TableChange::priority);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_sort_follows_kind_precedence() {
        let mut ops = vec![
            Operation::DropExtension {
                name: "hstore".into(),
            },
            Operation::CreateForeignKey {
                table: "posts".into(),
                foreign_key: ForeignKey::new("posts_user_id_fkey", vec!["user_id".into()], "users"),
            },
            Operation::DropTable {
                name: "legacy".into(),
            },
            Operation::CreateTable {
                table: Table::new("users"),
            },
            Operation::CreateEnum {
                enum_type: EnumType::new("mood", vec!["happy".into()]),
            },
            Operation::CreateExtension {
                extension: Extension::new("citext"),
            },
        ];
        sort_operations(&mut ops);

        let priorities: Vec<u8> = ops.iter().map(Operation::priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
        assert!(matches!(ops[0], Operation::CreateExtension { .. }));
        assert!(matches!(ops.last(), Some(Operation::DropExtension { .. })));
    }

    #[test]
    fn global_sort_is_stable_within_a_kind() {
        let mut ops = vec![
            Operation::CreateTable {
                table: Table::new("a"),
            },
            Operation::CreateTable {
                table: Table::new("b"),
            },
            Operation::CreateExtension {
                extension: Extension::new("citext"),
            },
        ];
        sort_operations(&mut ops);
        let names: Vec<&str> = ops
            .iter()
            .filter_map(|op| match op {
                Operation::CreateTable { table } => Some(table.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn alter_table_changes_drop_before_add() {
        let mut changes = vec![
            TableChange::CreateColumn {
                field: Field::new("added", FieldType::Text),
            },
            TableChange::AlterColumnType {
                name: "changed".into(),
                new_type: FieldType::BigInt,
            },
            TableChange::DropColumn {
                name: "removed".into(),
            },
            TableChange::DropIndex {
                name: "old_idx".into(),
            },
        ];
        sort_table_changes(&mut changes);

        assert!(matches!(changes[0], TableChange::DropIndex { .. }));
        assert!(matches!(changes[1], TableChange::DropColumn { .. }));
        assert!(matches!(changes[2], TableChange::AlterColumnType { .. }));
        assert!(matches!(changes[3], TableChange::CreateColumn { .. }));
    }

    #[test]
    fn descriptions_name_their_targets() {
        let op = Operation::AlterTable {
            name: "users".into(),
            changes: vec![TableChange::DropColumn {
                name: "legacy".into(),
            }],
        };
        assert_eq!(op.description(), "alter table 'users': drop column 'legacy'");

        let op = Operation::AlterEnumValues {
            enum_name: "mood".into(),
            additions: vec![EnumValueAddition {
                value: "meh".into(),
                before: Some("sad".into()),
            }],
            fields: vec![],
        };
        assert_eq!(op.description(), "add values [meh] to enum 'mood'");
    }
}
