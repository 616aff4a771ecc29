//! Field and column definitions.

/// How the database (or driver) produces a value for a generated column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStrategy {
    /// Auto-increment / serial sequence.
    Increment,
    /// UUID produced by the database or the driver.
    Uuid,
    /// SQLite-style rowid alias.
    Rowid,
    /// SQL standard identity column.
    Identity,
}

impl GenerationStrategy {
    /// Whether the driver can report this value through a last-insert-id.
    pub const fn uses_insert_id(self) -> bool {
        matches!(
            self,
            GenerationStrategy::Increment | GenerationStrategy::Rowid | GenerationStrategy::Identity
        )
    }
}

/// Metadata about a model field/column.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Rust field (property) name
    pub name: &'static str,
    /// Database column name (may differ from field name)
    pub column_name: &'static str,
    /// Whether this field is nullable
    pub nullable: bool,
    /// Whether this is a primary key
    pub primary_key: bool,
    /// Whether this field has a unique constraint
    pub unique: bool,
    /// Value generated by the database on insert
    pub generated: Option<GenerationStrategy>,
    /// Computed column expression (`GENERATED ALWAYS AS (...)`)
    pub generated_as: Option<&'static str>,
    /// Default value expression (SQL)
    pub default: Option<&'static str>,
    /// Set by the database when the row is created
    pub create_date: bool,
    /// Set by the database whenever the row is updated
    pub update_date: bool,
    /// Soft-delete timestamp
    pub delete_date: bool,
    /// Optimistic-locking version counter
    pub version: bool,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, column_name: &'static str) -> Self {
        Self {
            name,
            column_name,
            nullable: false,
            primary_key: false,
            unique: false,
            generated: None,
            generated_as: None,
            default: None,
            create_date: false,
            update_date: false,
            delete_date: false,
            version: false,
        }
    }

    /// Set the database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column_name = name;
        self
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set unique flag.
    pub const fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    /// Mark the column as database-generated on insert.
    pub const fn generated(mut self, strategy: GenerationStrategy) -> Self {
        self.generated = Some(strategy);
        self
    }

    /// Mark the column as computed from an expression.
    pub const fn generated_as(mut self, expr: &'static str) -> Self {
        self.generated_as = Some(expr);
        self
    }

    /// Set default value.
    pub const fn default(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    /// Flag as creation timestamp.
    pub const fn create_date(mut self, value: bool) -> Self {
        self.create_date = value;
        self
    }

    /// Flag as update timestamp.
    pub const fn update_date(mut self, value: bool) -> Self {
        self.update_date = value;
        self
    }

    /// Flag as soft-delete timestamp.
    pub const fn delete_date(mut self, value: bool) -> Self {
        self.delete_date = value;
        self
    }

    /// Flag as version counter.
    pub const fn version(mut self, value: bool) -> Self {
        self.version = value;
        self
    }

    /// Whether the database produces a value for this column on INSERT.
    ///
    /// Such columns have to be read back after an insert, either from the
    /// RETURNING output or through a supplemental SELECT.
    pub const fn is_insertion_returning(&self) -> bool {
        self.default.is_some()
            || self.generated.is_some()
            || self.generated_as.is_some()
            || self.create_date
            || self.update_date
            || self.delete_date
            || self.version
    }
}
