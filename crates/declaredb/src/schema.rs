//! Schema representation types.
//!
//! These types describe the structure of a database as immutable value
//! objects. The desired side is built once by the caller and treated as
//! read-only; the actual side is read fresh from the database on every
//! reconciliation cycle. Equality is structural throughout, which is what
//! the diff engine compares.

use serde::{Deserialize, Serialize};

/// Column types supported by the schema model.
///
/// Type-specific attributes (length, precision/scale, element type) live
/// on the variant that owns them, so an attribute bag invalid for a given
/// kind cannot be constructed. Named types the model does not know about
/// (including enumerated types) use [`FieldType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Small integer (16-bit).
    SmallInt,
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Auto-incrementing integer.
    Serial,
    /// Auto-incrementing big integer.
    BigSerial,
    /// Floating point (single precision).
    Real,
    /// Floating point (double precision).
    DoublePrecision,
    /// Arbitrary-precision numeric with optional precision and scale.
    Numeric {
        /// Total number of significant digits.
        precision: Option<u16>,
        /// Digits after the decimal point.
        scale: Option<u16>,
    },
    /// Fixed-length character string.
    Char {
        /// Maximum length in characters.
        length: Option<u32>,
    },
    /// Variable-length character string.
    Varchar {
        /// Maximum length in characters.
        length: Option<u32>,
    },
    /// Unbounded text.
    Text,
    /// Binary data.
    Bytea,
    /// Fixed-length bit string.
    Bit {
        /// Number of bits.
        length: Option<u32>,
    },
    /// Variable-length bit string.
    VarBit {
        /// Maximum number of bits.
        length: Option<u32>,
    },
    /// Boolean.
    Boolean,
    /// Date and time without time zone.
    Timestamp,
    /// Date and time with time zone.
    TimestampTz,
    /// Date only.
    Date,
    /// Time of day without time zone.
    Time,
    /// Time of day with time zone.
    TimeTz,
    /// Time interval.
    Interval,
    /// Geometric point.
    Point,
    /// Infinite geometric line.
    Line,
    /// Geometric line segment.
    Lseg,
    /// Rectangular geometric box.
    Box,
    /// Geometric path.
    Path,
    /// Geometric polygon.
    Polygon,
    /// Geometric circle.
    Circle,
    /// IPv4/IPv6 network.
    Cidr,
    /// IPv4/IPv6 host address.
    Inet,
    /// MAC address.
    MacAddr,
    /// Text-search document.
    TsVector,
    /// Text-search query.
    TsQuery,
    /// UUID.
    Uuid,
    /// JSON stored as text.
    Json,
    /// JSON stored in binary form.
    Jsonb,
    /// XML document.
    Xml,
    /// Integer range.
    Int4Range,
    /// Big-integer range.
    Int8Range,
    /// Numeric range.
    NumRange,
    /// Timestamp range.
    TsRange,
    /// Timestamp-with-time-zone range.
    TstzRange,
    /// Date range.
    DateRange,
    /// Array of another type.
    Array {
        /// Element type.
        element: std::boxed::Box<FieldType>,
    },
    /// A named type the model does not know natively, including
    /// enumerated types declared on the schema.
    Custom {
        /// Type name as known to the database.
        name: String,
    },
}

impl FieldType {
    /// Creates an array type over the given element type.
    #[must_use]
    pub fn array(element: Self) -> Self {
        Self::Array {
            element: std::boxed::Box::new(element),
        }
    }

    /// Creates a custom/named type.
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom { name: name.into() }
    }

    /// Returns the custom type name this type refers to, looking through
    /// one level of array nesting. `None` for built-in types.
    #[must_use]
    pub fn custom_name(&self) -> Option<&str> {
        match self {
            Self::Custom { name } => Some(name),
            Self::Array { element } => element.custom_name(),
            _ => None,
        }
    }

    /// Returns the element type for arrays.
    #[must_use]
    pub fn element_type(&self) -> Option<&Self> {
        match self {
            Self::Array { element } => Some(element),
            _ => None,
        }
    }
}

/// Default value for a field.
///
/// Literal defaults compare by value; expression defaults are opaque SQL
/// text and only become reliably comparable after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldDefault {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    String(String),
    /// Array literal, one element per entry.
    Array(Vec<FieldDefault>),
    /// SQL expression (e.g. `now()`).
    Expression(String),
}

impl FieldDefault {
    /// Returns `true` for expression defaults.
    #[must_use]
    pub fn is_expression(&self) -> bool {
        matches!(self, Self::Expression(_))
    }

    /// Returns the string literal value, if this default is one.
    #[must_use]
    pub fn as_string_literal(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Column type.
    pub field_type: FieldType,
    /// Declared nullability flag. Use [`Field::is_nullable`] for the
    /// effective value, which accounts for primary keys.
    pub nullable: bool,
    /// Default value.
    pub default: Option<FieldDefault>,
    /// Whether this column is the table's primary key.
    pub primary_key: bool,
}

impl Field {
    /// Creates a new nullable field with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
            default: None,
            primary_key: false,
        }
    }

    /// Marks the field NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the field as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// Effective nullability: primary keys are never nullable,
    /// regardless of the declared flag.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable && !self.primary_key
    }

    /// Returns the custom type name this field uses, directly or as an
    /// array element type.
    #[must_use]
    pub fn custom_type_name(&self) -> Option<&str> {
        self.field_type.custom_name()
    }
}

/// What an index column indexes: a plain field or a raw expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRef {
    /// Reference to a field by name.
    Name(String),
    /// Raw SQL expression.
    Expression(String),
}

impl ColumnRef {
    /// Returns the field name for plain references.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Expression(_) => None,
        }
    }

    /// Returns `true` for expression columns.
    #[must_use]
    pub fn is_expression(&self) -> bool {
        matches!(self, Self::Expression(_))
    }
}

/// Sort direction of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Where NULLs sort within an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NullsOrder {
    /// NULLs sort before non-NULL values.
    First,
    /// NULLs sort after non-NULL values.
    Last,
}

/// One column of an index, with its ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexColumn {
    /// The indexed field or expression.
    pub column: ColumnRef,
    /// Sort direction.
    pub order: SortOrder,
    /// NULL ordering.
    pub nulls: NullsOrder,
}

impl IndexColumn {
    /// Creates an index column with the database's native NULL ordering
    /// for the given direction (last for ascending, first for
    /// descending).
    #[must_use]
    pub fn new(column: ColumnRef, order: SortOrder) -> Self {
        let nulls = match order {
            SortOrder::Asc => NullsOrder::Last,
            SortOrder::Desc => NullsOrder::First,
        };
        Self {
            column,
            order,
            nulls,
        }
    }

    /// Ascending column on a named field.
    #[must_use]
    pub fn asc(name: impl Into<String>) -> Self {
        Self::new(ColumnRef::Name(name.into()), SortOrder::Asc)
    }

    /// Descending column on a named field.
    #[must_use]
    pub fn desc(name: impl Into<String>) -> Self {
        Self::new(ColumnRef::Name(name.into()), SortOrder::Desc)
    }

    /// Ascending column on a raw expression.
    #[must_use]
    pub fn expression(expr: impl Into<String>) -> Self {
        Self::new(ColumnRef::Expression(expr.into()), SortOrder::Asc)
    }

    /// Overrides the NULL ordering.
    #[must_use]
    pub fn with_nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = nulls;
        self
    }
}

/// Index access method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IndexMethod {
    /// B-tree (the default).
    #[default]
    BTree,
    /// Hash.
    Hash,
    /// Generalized search tree.
    Gist,
    /// Generalized inverted index.
    Gin,
    /// Space-partitioned GiST.
    SpGist,
    /// Block range index.
    Brin,
}

/// An index on a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Ordered indexed columns.
    pub columns: Vec<IndexColumn>,
    /// Whether this is a unique index.
    pub unique: bool,
    /// Access method.
    pub method: IndexMethod,
    /// Partial index condition (WHERE clause), if any.
    pub condition: Option<String>,
}

impl Index {
    /// Creates a non-unique B-tree index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<IndexColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
            method: IndexMethod::BTree,
            condition: None,
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the access method.
    #[must_use]
    pub fn using(mut self, method: IndexMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets a partial index condition.
    #[must_use]
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Returns `true` if any column is an expression or the index is
    /// partial.
    #[must_use]
    pub fn has_expressions(&self) -> bool {
        self.condition.is_some() || self.columns.iter().any(|c| c.column.is_expression())
    }
}

/// A named CHECK constraint with an opaque condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: String,
    /// Condition expression.
    pub condition: String,
}

impl CheckConstraint {
    /// Creates a check constraint.
    #[must_use]
    pub fn new(name: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: condition.into(),
        }
    }
}

/// Referential action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FkAction {
    /// No action.
    #[default]
    NoAction,
    /// Restrict.
    Restrict,
    /// Cascade.
    Cascade,
    /// Set the referencing column to NULL.
    SetNull,
    /// Set the referencing column to its default.
    SetDefault,
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Local field names.
    pub fields: Vec<String>,
    /// Referenced table name.
    pub table: String,
    /// Referenced column names. Empty means "the referenced table's
    /// primary key", resolved at validation/apply time.
    pub keys: Vec<String>,
    /// Action on update of the referenced row.
    pub on_update: FkAction,
    /// Action on delete of the referenced row.
    pub on_delete: FkAction,
    /// Whether the constraint is deferrable.
    pub deferrable: bool,
}

impl ForeignKey {
    /// Creates a foreign key referencing the target table's primary key.
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields,
            table: table.into(),
            keys: Vec::new(),
            on_update: FkAction::NoAction,
            on_delete: FkAction::NoAction,
            deferrable: false,
        }
    }

    /// Sets explicit referenced columns.
    #[must_use]
    pub fn keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: FkAction) -> Self {
        self.on_update = action;
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: FkAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Makes the constraint deferrable.
    #[must_use]
    pub fn deferrable(mut self) -> Self {
        self.deferrable = true;
        self
    }

    /// Returns `true` when the key implicitly references the target
    /// table's primary key.
    #[must_use]
    pub fn references_primary_key(&self) -> bool {
        self.keys.is_empty()
    }
}

/// An enumerated type. Value order is semantically significant: it
/// defines the type's native comparison order, and it drives the
/// supersequence-insertion rule in the diff engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumType {
    /// Type name.
    pub name: String,
    /// Ordered, distinct value labels.
    pub values: Vec<String>,
}

impl EnumType {
    /// Creates an enumerated type.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// A database extension, identified by name only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extension {
    /// Extension name.
    pub name: String,
}

impl Extension {
    /// Creates an extension reference.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A table: fields, indexes, check constraints and foreign keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Table {
    /// Table name, unique within the schema.
    pub name: String,
    /// Ordered columns.
    pub fields: Vec<Field>,
    /// Ordered indexes.
    pub indexes: Vec<Index>,
    /// Ordered check constraints.
    pub checks: Vec<CheckConstraint>,
    /// Ordered foreign keys.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a check constraint.
    #[must_use]
    pub fn check(mut self, check: CheckConstraint) -> Self {
        self.checks.push(check);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Returns a copy of this table under a different name.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` if the table has a field with this name.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn get_index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Looks up a check constraint by name.
    #[must_use]
    pub fn get_check(&self, name: &str) -> Option<&CheckConstraint> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Looks up a foreign key by name.
    #[must_use]
    pub fn get_foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name == name)
    }

    /// Returns the primary key field, if the table declares one.
    #[must_use]
    pub fn primary_key(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// Returns `true` if any definition in this table carries SQL
    /// expression text (expression defaults, check conditions,
    /// expression or partial indexes). Such tables need normalization
    /// before they can be diffed reliably.
    #[must_use]
    pub fn has_expressions(&self) -> bool {
        !self.checks.is_empty()
            || self.indexes.iter().any(Index::has_expressions)
            || self
                .fields
                .iter()
                .any(|f| f.default.as_ref().is_some_and(FieldDefault::is_expression))
    }
}

/// The complete database schema: tables, enumerated types, extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// All tables.
    pub tables: Vec<Table>,
    /// All enumerated types.
    pub enums: Vec<EnumType>,
    /// All installed extensions.
    pub extensions: Vec<Extension>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table.
    #[must_use]
    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Adds an enumerated type.
    #[must_use]
    pub fn enum_type(mut self, enum_type: EnumType) -> Self {
        self.enums.push(enum_type);
        self
    }

    /// Adds an extension.
    #[must_use]
    pub fn extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns `true` if the schema contains this table.
    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// Looks up an enumerated type by name.
    #[must_use]
    pub fn get_enum(&self, name: &str) -> Option<&EnumType> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Looks up an extension by name.
    #[must_use]
    pub fn get_extension(&self, name: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.name == name)
    }

    /// Returns table names in declaration order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }
}
