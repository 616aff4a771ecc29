//! SQL dialects for the supplemental reads.

/// SQL dialect, also used as the backend kind reported by a capability oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
    /// SQL Server dialect (uses @p1, @p2 placeholders)
    Mssql,
    /// Oracle dialect (uses :1, :2 placeholders)
    Oracle,
    /// Spanner (GoogleSQL) dialect (uses @p1, @p2 placeholders)
    Spanner,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
            Dialect::Mssql | Dialect::Spanner => format!("@p{index}"),
            Dialect::Oracle => format!(":{index}"),
        }
    }

    /// Quote an identifier for this dialect.
    ///
    /// Embedded quote characters are escaped by doubling them:
    /// - Postgres/SQLite/Oracle: `"` becomes `""`
    /// - MySQL/Spanner: `` ` `` becomes ``` `` ```
    /// - SQL Server: `]` becomes `]]`
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite | Dialect::Oracle => {
                let escaped = name.replace('"', "\"\"");
                format!("\"{}\"", escaped)
            }
            Dialect::Mysql | Dialect::Spanner => {
                let escaped = name.replace('`', "``");
                format!("`{}`", escaped)
            }
            Dialect::Mssql => {
                let escaped = name.replace(']', "]]");
                format!("[{}]", escaped)
            }
        }
    }
}
