//! Static schema validation.
//!
//! A pure, total function over a desired [`Schema`]: it never touches a
//! database and never fails, it only accumulates descriptive error
//! strings. Callers treat a non-empty error list as fatal before any
//! mutation occurs.

use crate::schema::{EnumType, Field, FieldDefault, ForeignKey, Schema, Table};

/// Outcome of validating a schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    errors: Vec<String>,
}

impl ValidationResult {
    /// Returns `true` when no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The accumulated error messages, in detection order.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Consumes the result, returning the error list.
    #[must_use]
    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }
}

/// Validates a desired schema, accumulating every structural error.
///
/// Per table, checks run in a fixed order: primary key multiplicity,
/// then field types and defaults, then index column references, then
/// foreign keys. Enum checks follow all tables.
#[must_use]
pub fn validate(schema: &Schema) -> ValidationResult {
    let mut errors = Vec::new();

    for table in &schema.tables {
        check_primary_keys(table, &mut errors);
        for field in &table.fields {
            check_field_type(schema, table, field, &mut errors);
        }
        check_index_references(table, &mut errors);
        for fk in &table.foreign_keys {
            check_foreign_key(schema, table, fk, &mut errors);
        }
    }

    for enum_type in &schema.enums {
        check_enum(enum_type, &mut errors);
    }

    ValidationResult { errors }
}

fn check_primary_keys(table: &Table, errors: &mut Vec<String>) {
    let count = table.fields.iter().filter(|f| f.primary_key).count();
    if count > 1 {
        errors.push(format!(
            "table '{}' has {count} primary keys",
            table.name
        ));
    }
}

fn check_field_type(schema: &Schema, table: &Table, field: &Field, errors: &mut Vec<String>) {
    let Some(type_name) = field.custom_type_name() else {
        return;
    };
    let Some(enum_type) = schema.get_enum(type_name) else {
        errors.push(format!(
            "field '{}.{}' has unknown type '{type_name}'",
            table.name, field.name
        ));
        return;
    };
    if let Some(default) = &field.default {
        check_enum_default(table, field, enum_type, default, errors);
    }
}

fn check_enum_default(
    table: &Table,
    field: &Field,
    enum_type: &EnumType,
    default: &FieldDefault,
    errors: &mut Vec<String>,
) {
    match default {
        // Expression defaults are opaque; the database checks them.
        FieldDefault::Expression(_) => {}
        // Array defaults are checked element-wise.
        FieldDefault::Array(elements) => {
            for element in elements {
                check_enum_default(table, field, enum_type, element, errors);
            }
        }
        FieldDefault::String(value) => {
            if !enum_type.values.iter().any(|v| v == value) {
                errors.push(format!(
                    "field '{}.{}' has default '{value}' which is not a value of enum '{}'",
                    table.name, field.name, enum_type.name
                ));
            }
        }
        other => {
            errors.push(format!(
                "field '{}.{}' has a non-string default {other:?} for enum '{}'",
                table.name, field.name, enum_type.name
            ));
        }
    }
}

fn check_index_references(table: &Table, errors: &mut Vec<String>) {
    for index in &table.indexes {
        for column in &index.columns {
            // Expression columns are exempt.
            if let Some(field_name) = column.column.field_name() {
                if !table.has_field(field_name) {
                    errors.push(format!(
                        "index '{}' refers to a missing field '{}.{field_name}'",
                        index.name, table.name
                    ));
                }
            }
        }
    }
}

fn check_foreign_key(schema: &Schema, table: &Table, fk: &ForeignKey, errors: &mut Vec<String>) {
    for field_name in &fk.fields {
        if !table.has_field(field_name) {
            errors.push(format!(
                "foreign key '{}' constrains a missing field '{}.{field_name}'",
                fk.name, table.name
            ));
        }
    }

    let Some(referenced) = schema.get_table(&fk.table) else {
        errors.push(format!(
            "foreign key '{}' refers to a missing table '{}'",
            fk.name, fk.table
        ));
        return;
    };

    if fk.references_primary_key() {
        if referenced.primary_key().is_none() {
            errors.push(format!(
                "foreign key '{}' refers to the primary key of table '{}' which has no primary key",
                fk.name, fk.table
            ));
        }
    } else {
        for key in &fk.keys {
            if !referenced.has_field(key) {
                errors.push(format!(
                    "foreign key '{}' refers to a missing field '{}.{key}'",
                    fk.name, fk.table
                ));
            }
        }
    }
}

fn check_enum(enum_type: &EnumType, errors: &mut Vec<String>) {
    if enum_type.values.is_empty() {
        errors.push(format!("enum '{}' contains no values", enum_type.name));
    }
}
