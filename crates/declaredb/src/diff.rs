//! Schema diff engine.
//!
//! Compares a desired [`Schema`] against the actual one read from the
//! database and produces the ordered operations needed to converge.
//! Pure and deterministic: the same pair of schemas always yields the
//! same operation sequence, and equal schemas yield an empty one.
//!
//! The single destructive refusal lives here: an enumerated type whose
//! value list changed by anything other than pure insertion (a removal,
//! or a reorder of two retained values) fails with
//! [`Error::UnsupportedOperation`] instead of being rewritten lossily.

use crate::error::{Error, Result};
use crate::operations::{
    sort_operations, sort_table_changes, EnumDependentField, EnumValueAddition, Operation,
    TableChange,
};
use crate::schema::{Field, Schema, Table};

/// Compares two schemas and returns the operations needed to migrate
/// `actual` into `desired`, in application order.
pub fn diff(desired: &Schema, actual: &Schema) -> Result<Vec<Operation>> {
    let mut operations = Vec::new();

    diff_tables(desired, actual, &mut operations);
    diff_enums(desired, actual, &mut operations)?;
    diff_extensions(desired, actual, &mut operations);

    sort_operations(&mut operations);
    Ok(operations)
}

// ================================================================
// Tables
// ================================================================

fn diff_tables(desired: &Schema, actual: &Schema, operations: &mut Vec<Operation>) {
    // Desired tables first (creates and alterations in declaration
    // order), then actual-only tables (drops).
    for table in &desired.tables {
        match actual.get_table(&table.name) {
            None => create_table(table, operations),
            Some(actual_table) => {
                if table != actual_table {
                    alter_table(table, actual_table, operations);
                }
            }
        }
    }

    for table in &actual.tables {
        if !desired.has_table(&table.name) {
            // Foreign keys go first so the table can be dropped.
            for fk in &table.foreign_keys {
                operations.push(Operation::DropForeignKey {
                    table: table.name.clone(),
                    name: fk.name.clone(),
                });
            }
            operations.push(Operation::DropTable {
                name: table.name.clone(),
            });
        }
    }
}

/// A new table is created without its foreign keys; those are applied
/// separately once every table exists.
fn create_table(table: &Table, operations: &mut Vec<Operation>) {
    let mut bare = table.clone();
    bare.foreign_keys.clear();
    operations.push(Operation::CreateTable { table: bare });
    for fk in &table.foreign_keys {
        operations.push(Operation::CreateForeignKey {
            table: table.name.clone(),
            foreign_key: fk.clone(),
        });
    }
}

fn alter_table(desired: &Table, actual: &Table, operations: &mut Vec<Operation>) {
    let mut changes = Vec::new();
    diff_fields(desired, actual, &mut changes);
    diff_indexes(desired, actual, &mut changes);
    diff_checks(desired, actual, &mut changes);
    sort_table_changes(&mut changes);

    // Empty alter-table operations are suppressed (the tables may have
    // differed only in foreign keys).
    if !changes.is_empty() {
        operations.push(Operation::AlterTable {
            name: desired.name.clone(),
            changes,
        });
    }

    // Foreign-key changes travel alongside, never inside, the
    // alter-table operation.
    diff_foreign_keys(desired, actual, operations);
}

fn diff_fields(desired: &Table, actual: &Table, changes: &mut Vec<TableChange>) {
    for field in &desired.fields {
        match actual.get_field(&field.name) {
            None => changes.push(TableChange::CreateColumn {
                field: field.clone(),
            }),
            Some(actual_field) => diff_field(field, actual_field, changes),
        }
    }
    for field in &actual.fields {
        if !desired.has_field(&field.name) {
            changes.push(TableChange::DropColumn {
                name: field.name.clone(),
            });
        }
    }
}

/// All property differences trigger independently; one field may emit
/// several changes in a single pass.
fn diff_field(desired: &Field, actual: &Field, changes: &mut Vec<TableChange>) {
    if desired.field_type != actual.field_type {
        changes.push(TableChange::AlterColumnType {
            name: desired.name.clone(),
            new_type: desired.field_type.clone(),
        });
    }

    if desired.primary_key != actual.primary_key {
        if desired.primary_key {
            changes.push(TableChange::CreatePrimaryKey {
                name: desired.name.clone(),
            });
        } else {
            changes.push(TableChange::DropPrimaryKey {
                name: desired.name.clone(),
            });
        }
    }

    if desired.is_nullable() != actual.is_nullable() {
        if desired.is_nullable() {
            changes.push(TableChange::AllowNull {
                name: desired.name.clone(),
            });
        } else {
            changes.push(TableChange::DisallowNull {
                name: desired.name.clone(),
            });
        }
    }

    if desired.default != actual.default {
        changes.push(TableChange::AlterColumnDefault {
            name: desired.name.clone(),
            new_default: desired.default.clone(),
        });
    }
}

/// Indexes are never altered in place: a same-named index that differs
/// in any attribute is dropped and recreated.
fn diff_indexes(desired: &Table, actual: &Table, changes: &mut Vec<TableChange>) {
    for index in &desired.indexes {
        match actual.get_index(&index.name) {
            None => changes.push(TableChange::CreateIndex {
                index: index.clone(),
            }),
            Some(actual_index) if actual_index != index => {
                changes.push(TableChange::DropIndex {
                    name: index.name.clone(),
                });
                changes.push(TableChange::CreateIndex {
                    index: index.clone(),
                });
            }
            Some(_) => {}
        }
    }
    for index in &actual.indexes {
        if desired.get_index(&index.name).is_none() {
            changes.push(TableChange::DropIndex {
                name: index.name.clone(),
            });
        }
    }
}

fn diff_checks(desired: &Table, actual: &Table, changes: &mut Vec<TableChange>) {
    for check in &desired.checks {
        match actual.get_check(&check.name) {
            None => changes.push(TableChange::CreateCheck {
                check: check.clone(),
            }),
            Some(actual_check) if actual_check != check => {
                changes.push(TableChange::DropCheck {
                    name: check.name.clone(),
                });
                changes.push(TableChange::CreateCheck {
                    check: check.clone(),
                });
            }
            Some(_) => {}
        }
    }
    for check in &actual.checks {
        if desired.get_check(&check.name).is_none() {
            changes.push(TableChange::DropCheck {
                name: check.name.clone(),
            });
        }
    }
}

fn diff_foreign_keys(desired: &Table, actual: &Table, operations: &mut Vec<Operation>) {
    for fk in &desired.foreign_keys {
        match actual.get_foreign_key(&fk.name) {
            None => operations.push(Operation::CreateForeignKey {
                table: desired.name.clone(),
                foreign_key: fk.clone(),
            }),
            Some(actual_fk) if actual_fk != fk => {
                operations.push(Operation::DropForeignKey {
                    table: desired.name.clone(),
                    name: fk.name.clone(),
                });
                operations.push(Operation::CreateForeignKey {
                    table: desired.name.clone(),
                    foreign_key: fk.clone(),
                });
            }
            Some(_) => {}
        }
    }
    for fk in &actual.foreign_keys {
        if desired.get_foreign_key(&fk.name).is_none() {
            operations.push(Operation::DropForeignKey {
                table: desired.name.clone(),
                name: fk.name.clone(),
            });
        }
    }
}

// ================================================================
// Enums
// ================================================================

fn diff_enums(desired: &Schema, actual: &Schema, operations: &mut Vec<Operation>) -> Result<()> {
    for enum_type in &desired.enums {
        match actual.get_enum(&enum_type.name) {
            None => operations.push(Operation::CreateEnum {
                enum_type: enum_type.clone(),
            }),
            Some(actual_enum) if actual_enum.values != enum_type.values => {
                let additions =
                    enum_additions(&enum_type.name, &enum_type.values, &actual_enum.values)?;
                operations.push(Operation::AlterEnumValues {
                    enum_name: enum_type.name.clone(),
                    additions,
                    fields: enum_dependent_fields(&enum_type.name, desired, actual),
                });
            }
            Some(_) => {}
        }
    }
    for enum_type in &actual.enums {
        if desired.get_enum(&enum_type.name).is_none() {
            operations.push(Operation::DropEnum {
                name: enum_type.name.clone(),
            });
        }
    }
    Ok(())
}

/// Computes the insertions that turn `actual` into `desired`.
///
/// Precondition: `desired` restricted to values present in `actual`
/// must equal `actual` exactly, making the desired list a supersequence
/// of the actual one with relative order preserved. Anything else (a
/// removal, or a reorder of two retained values) is refused.
///
/// Each insertion is anchored by the nearest following pre-existing
/// value (`None` means append), and insertions are emitted from the
/// last target position to the first so every insertion point stays
/// valid as values are added.
fn enum_additions(
    enum_name: &str,
    desired: &[String],
    actual: &[String],
) -> Result<Vec<EnumValueAddition>> {
    let retained: Vec<&String> = desired.iter().filter(|v| actual.contains(v)).collect();
    if retained.len() != actual.len() || retained.iter().zip(actual).any(|(a, b)| *a != b) {
        return Err(Error::UnsupportedOperation(format!(
            "enum '{enum_name}' has values removed or reordered; only adding new values is supported"
        )));
    }

    let mut additions: Vec<EnumValueAddition> = desired
        .iter()
        .enumerate()
        .filter(|(_, value)| !actual.contains(value))
        .map(|(position, value)| EnumValueAddition {
            value: value.clone(),
            before: desired[position + 1..]
                .iter()
                .find(|v| actual.contains(v))
                .cloned(),
        })
        .collect();
    additions.reverse();
    Ok(additions)
}

/// Fields that currently use the enum (directly or as an array element
/// type), paired with their desired defaults so dependent columns can
/// be coordinated while the live type is altered.
fn enum_dependent_fields(
    enum_name: &str,
    desired: &Schema,
    actual: &Schema,
) -> Vec<EnumDependentField> {
    let mut fields = Vec::new();
    for table in &actual.tables {
        for field in &table.fields {
            if field.custom_type_name() == Some(enum_name) {
                let new_default = desired
                    .get_table(&table.name)
                    .and_then(|t| t.get_field(&field.name))
                    .and_then(|f| f.default.clone());
                fields.push(EnumDependentField {
                    table: table.name.clone(),
                    field: field.name.clone(),
                    new_default,
                });
            }
        }
    }
    fields
}

// ================================================================
// Extensions
// ================================================================

fn diff_extensions(desired: &Schema, actual: &Schema, operations: &mut Vec<Operation>) {
    for extension in &desired.extensions {
        if actual.get_extension(&extension.name).is_none() {
            operations.push(Operation::CreateExtension {
                extension: extension.clone(),
            });
        }
    }
    for extension in &actual.extensions {
        if desired.get_extension(&extension.name).is_none() {
            operations.push(Operation::DropExtension {
                name: extension.name.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        CheckConstraint, EnumType, Extension, FieldDefault, FieldType, ForeignKey, Index,
        IndexColumn,
    };

    // ============================================================
    // Helpers
    // ============================================================

    fn field(name: &str, field_type: FieldType) -> Field {
        Field::new(name, field_type).not_null()
    }

    fn pk(name: &str) -> Field {
        Field::new(name, FieldType::BigInt).primary_key()
    }

    fn table(name: &str, fields: Vec<Field>) -> Table {
        fields
            .into_iter()
            .fold(Table::new(name), Table::field)
    }

    fn schema(tables: Vec<Table>) -> Schema {
        tables.into_iter().fold(Schema::new(), Schema::table)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    // ============================================================
    // Convergence and determinism
    // ============================================================

    #[test]
    fn equal_schemas_produce_empty_diff() {
        let s = schema(vec![table("users", vec![pk("id"), field("name", FieldType::Text)])])
            .enum_type(EnumType::new("mood", strings(&["happy", "sad"])))
            .extension(Extension::new("citext"));
        assert!(diff(&s, &s).unwrap().is_empty());
    }

    #[test]
    fn diff_is_deterministic() {
        let desired = schema(vec![
            table("b", vec![pk("id")]),
            table("a", vec![pk("id"), field("x", FieldType::Text)]),
        ])
        .enum_type(EnumType::new("mood", strings(&["happy", "sad"])));
        let actual = schema(vec![table("a", vec![pk("id")]), table("c", vec![pk("id")])]);

        let first = diff(&desired, &actual).unwrap();
        let second = diff(&desired, &actual).unwrap();
        assert_eq!(first, second);
    }

    // ============================================================
    // Table create/drop symmetry
    // ============================================================

    #[test]
    fn new_table_emits_create_plus_fk_creates_only() {
        let desired = schema(vec![
            table("users", vec![pk("id")]),
            table("posts", vec![pk("id"), field("user_id", FieldType::BigInt)]).foreign_key(
                ForeignKey::new("posts_user_id_fkey", strings(&["user_id"]), "users"),
            ),
        ]);
        let actual = schema(vec![table("users", vec![pk("id")])]);

        let ops = diff(&desired, &actual).unwrap();
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            Operation::CreateTable { table } => {
                assert_eq!(table.name, "posts");
                // Foreign keys are stripped from the create.
                assert!(table.foreign_keys.is_empty());
            }
            other => panic!("expected CreateTable, got {other:?}"),
        }
        assert!(matches!(
            &ops[1],
            Operation::CreateForeignKey { table, foreign_key }
                if table == "posts" && foreign_key.name == "posts_user_id_fkey"
        ));
    }

    #[test]
    fn dropped_table_emits_fk_drops_before_drop() {
        let desired = schema(vec![table("users", vec![pk("id")])]);
        let actual = schema(vec![
            table("users", vec![pk("id")]),
            table("posts", vec![pk("id"), field("user_id", FieldType::BigInt)]).foreign_key(
                ForeignKey::new("posts_user_id_fkey", strings(&["user_id"]), "users"),
            ),
        ]);

        let ops = diff(&desired, &actual).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            &ops[0],
            Operation::DropForeignKey { name, .. } if name == "posts_user_id_fkey"
        ));
        assert!(matches!(&ops[1], Operation::DropTable { name } if name == "posts"));
    }

    // ============================================================
    // Field sub-diff
    // ============================================================

    #[test]
    fn field_changes_trigger_independently() {
        let desired = schema(vec![table(
            "users",
            vec![
                pk("id"),
                Field::new("age", FieldType::BigInt)
                    .with_default(FieldDefault::Integer(0)),
            ],
        )]);
        let actual = schema(vec![table(
            "users",
            vec![pk("id"), Field::new("age", FieldType::Integer).not_null()],
        )]);

        let ops = diff(&desired, &actual).unwrap();
        assert_eq!(ops.len(), 1);
        let Operation::AlterTable { name, changes } = &ops[0] else {
            panic!("expected AlterTable");
        };
        assert_eq!(name, "users");
        // Type change + nullability + default, all from one field.
        assert_eq!(changes.len(), 3);
        assert!(matches!(
            &changes[0],
            TableChange::AlterColumnType { name, new_type }
                if name == "age" && *new_type == FieldType::BigInt
        ));
        assert!(matches!(&changes[1], TableChange::AllowNull { name } if name == "age"));
        assert!(matches!(
            &changes[2],
            TableChange::AlterColumnDefault { name, new_default: Some(FieldDefault::Integer(0)) }
                if name == "age"
        ));
    }

    #[test]
    fn primary_key_flag_changes() {
        let desired = schema(vec![table("t", vec![pk("id"), field("uid", FieldType::Uuid)])]);
        let actual = schema(vec![table(
            "t",
            vec![field("id", FieldType::BigInt), Field::new("uid", FieldType::Uuid).primary_key()],
        )]);

        let ops = diff(&desired, &actual).unwrap();
        let Operation::AlterTable { changes, .. } = &ops[0] else {
            panic!("expected AlterTable");
        };
        assert!(changes.iter().any(
            |c| matches!(c, TableChange::CreatePrimaryKey { name } if name == "id")
        ));
        assert!(changes.iter().any(
            |c| matches!(c, TableChange::DropPrimaryKey { name } if name == "uid")
        ));
    }

    #[test]
    fn alter_table_orders_drop_and_alter_before_create() {
        let desired = schema(vec![table(
            "t",
            vec![pk("id"), field("changed", FieldType::BigInt), field("added", FieldType::Text)],
        )]);
        let actual = schema(vec![table(
            "t",
            vec![pk("id"), field("changed", FieldType::Integer), field("removed", FieldType::Text)],
        )]);

        let ops = diff(&desired, &actual).unwrap();
        let Operation::AlterTable { changes, .. } = &ops[0] else {
            panic!("expected AlterTable");
        };
        assert!(matches!(&changes[0], TableChange::DropColumn { name } if name == "removed"));
        assert!(matches!(
            &changes[1],
            TableChange::AlterColumnType { name, .. } if name == "changed"
        ));
        assert!(matches!(
            &changes[2],
            TableChange::CreateColumn { field } if field.name == "added"
        ));
    }

    // ============================================================
    // Index / check sub-diff
    // ============================================================

    #[test]
    fn changed_index_is_dropped_and_recreated() {
        let desired = schema(vec![table("t", vec![pk("id"), field("a", FieldType::Text)])
            .index(Index::new("t_a_idx", vec![IndexColumn::asc("a")]).unique())]);
        let actual = schema(vec![table("t", vec![pk("id"), field("a", FieldType::Text)])
            .index(Index::new("t_a_idx", vec![IndexColumn::asc("a")]))]);

        let ops = diff(&desired, &actual).unwrap();
        let Operation::AlterTable { changes, .. } = &ops[0] else {
            panic!("expected AlterTable");
        };
        assert_eq!(changes.len(), 2);
        assert!(matches!(&changes[0], TableChange::DropIndex { name } if name == "t_a_idx"));
        assert!(matches!(
            &changes[1],
            TableChange::CreateIndex { index } if index.unique
        ));
    }

    #[test]
    fn changed_check_is_dropped_and_recreated() {
        let desired = schema(vec![table("t", vec![pk("id"), field("age", FieldType::Integer)])
            .check(CheckConstraint::new("age_check", "age >= 18"))]);
        let actual = schema(vec![table("t", vec![pk("id"), field("age", FieldType::Integer)])
            .check(CheckConstraint::new("age_check", "age >= 21"))]);

        let ops = diff(&desired, &actual).unwrap();
        let Operation::AlterTable { changes, .. } = &ops[0] else {
            panic!("expected AlterTable");
        };
        assert!(matches!(&changes[0], TableChange::DropCheck { name } if name == "age_check"));
        assert!(matches!(
            &changes[1],
            TableChange::CreateCheck { check } if check.condition == "age >= 18"
        ));
    }

    #[test]
    fn changed_foreign_key_is_dropped_and_recreated_outside_alter() {
        let make = |on_delete| {
            schema(vec![
                table("users", vec![pk("id")]),
                table("posts", vec![pk("id"), field("user_id", FieldType::BigInt)]).foreign_key(
                    ForeignKey::new("posts_user_id_fkey", strings(&["user_id"]), "users")
                        .on_delete(on_delete),
                ),
            ])
        };
        let desired = make(crate::schema::FkAction::Cascade);
        let actual = make(crate::schema::FkAction::NoAction);

        let ops = diff(&desired, &actual).unwrap();
        assert_eq!(ops.len(), 2);
        // No alter-table op at all: the tables differ only in FKs.
        assert!(matches!(&ops[0], Operation::DropForeignKey { .. }));
        assert!(matches!(&ops[1], Operation::CreateForeignKey { .. }));
    }

    // ============================================================
    // Enums
    // ============================================================

    #[test]
    fn enum_insertions_are_anchored_and_emitted_last_first() {
        let desired = Schema::new().enum_type(EnumType::new(
            "mood",
            strings(&["happy", "good", "ok", "worried", "bad", "unhappy"]),
        ));
        let actual =
            Schema::new().enum_type(EnumType::new("mood", strings(&["good", "ok", "bad"])));

        let ops = diff(&desired, &actual).unwrap();
        assert_eq!(ops.len(), 1);
        let Operation::AlterEnumValues { enum_name, additions, .. } = &ops[0] else {
            panic!("expected AlterEnumValues");
        };
        assert_eq!(enum_name, "mood");
        assert_eq!(
            additions,
            &[
                EnumValueAddition {
                    value: "unhappy".into(),
                    before: None,
                },
                EnumValueAddition {
                    value: "worried".into(),
                    before: Some("bad".into()),
                },
                EnumValueAddition {
                    value: "happy".into(),
                    before: Some("good".into()),
                },
            ]
        );
    }

    #[test]
    fn enum_value_removal_is_refused() {
        let desired =
            Schema::new().enum_type(EnumType::new("mood", strings(&["happy", "ok", "unhappy"])));
        let actual = Schema::new().enum_type(EnumType::new(
            "mood",
            strings(&["happy", "good", "ok", "bad", "unhappy"]),
        ));

        let err = diff(&desired, &actual).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn enum_reorder_is_refused() {
        let desired = Schema::new().enum_type(EnumType::new(
            "mood",
            strings(&["happy", "ok", "moderate", "sad"]),
        ));
        let actual =
            Schema::new().enum_type(EnumType::new("mood", strings(&["moderate", "ok", "sad"])));

        let err = diff(&desired, &actual).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn enum_alteration_captures_dependent_fields_with_desired_defaults() {
        let desired = schema(vec![table(
            "users",
            vec![
                pk("id"),
                Field::new("mood", FieldType::custom("mood"))
                    .with_default(FieldDefault::String("good".into())),
                Field::new("history", FieldType::array(FieldType::custom("mood"))),
            ],
        )])
        .enum_type(EnumType::new("mood", strings(&["happy", "good", "bad"])));
        let actual = schema(vec![table(
            "users",
            vec![
                pk("id"),
                Field::new("mood", FieldType::custom("mood")),
                Field::new("history", FieldType::array(FieldType::custom("mood"))),
            ],
        )])
        .enum_type(EnumType::new("mood", strings(&["good", "bad"])));

        let ops = diff(&desired, &actual).unwrap();
        let alter_enum = ops
            .iter()
            .find(|op| matches!(op, Operation::AlterEnumValues { .. }))
            .expect("AlterEnumValues emitted");
        let Operation::AlterEnumValues { fields, .. } = alter_enum else {
            unreachable!();
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field, "mood");
        assert_eq!(
            fields[0].new_default,
            Some(FieldDefault::String("good".into()))
        );
        assert_eq!(fields[1].field, "history");
        assert_eq!(fields[1].new_default, None);
    }

    // ============================================================
    // Extensions and global ordering
    // ============================================================

    #[test]
    fn extensions_diff_both_directions() {
        let desired = Schema::new().extension(Extension::new("citext"));
        let actual = Schema::new().extension(Extension::new("hstore"));

        let ops = diff(&desired, &actual).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            &ops[0],
            Operation::CreateExtension { extension } if extension.name == "citext"
        ));
        assert!(matches!(&ops[1], Operation::DropExtension { name } if name == "hstore"));
    }

    #[test]
    fn global_order_respects_kind_precedence() {
        let desired = schema(vec![
            table("kept", vec![pk("id"), field("extra", FieldType::Text)]),
            table("created", vec![pk("id"), field("mood", FieldType::custom("mood"))]).foreign_key(
                ForeignKey::new("created_kept_fkey", strings(&["id"]), "kept"),
            ),
        ])
        .enum_type(EnumType::new("mood", strings(&["happy", "sad"])))
        .extension(Extension::new("citext"));
        let actual = schema(vec![
            table("kept", vec![pk("id")]),
            table("dropped", vec![pk("id")]),
        ])
        .enum_type(EnumType::new("stale", strings(&["old"])));

        let ops = diff(&desired, &actual).unwrap();
        let priorities: Vec<u8> = ops.iter().map(Operation::priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted, "operations out of kind order: {ops:?}");

        assert!(matches!(&ops[0], Operation::CreateExtension { .. }));
        assert!(matches!(
            ops.last(),
            Some(Operation::CreateForeignKey { .. })
        ));
    }
}
