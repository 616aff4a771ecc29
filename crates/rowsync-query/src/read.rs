//! Plain-row reads used to recover generated values.
//!
//! A [`ReadQuery`] selects a handful of columns of one entity table, filtered
//! by property-keyed equality maps. Results are materialized as plain [`Row`]s
//! rather than entities, so defaults on a freshly constructed entity can never
//! leak into a merge.
//!
//! [`Row`]: rowsync_core::Row

use crate::dialect::Dialect;
use rowsync_core::{EntityMetadata, FieldInfo, Value, ValueMap};

/// Row filter of a [`ReadQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every key must equal its value.
    Eq(ValueMap),
    /// At least one of the equality maps must match.
    Any(Vec<ValueMap>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::Any(Vec::new())
    }
}

/// A SELECT over one entity table.
#[derive(Debug, Clone)]
pub struct ReadQuery {
    meta: EntityMetadata,
    columns: Option<Vec<&'static FieldInfo>>,
    filter: Filter,
    with_deleted: bool,
}

impl ReadQuery {
    /// Start a read over the entity's table.
    ///
    /// Without [`select`](Self::select) every field is read; without a filter
    /// nothing matches. Selecting only empty lists reads no entity column.
    pub fn new(meta: EntityMetadata) -> Self {
        Self {
            meta,
            columns: None,
            filter: Filter::default(),
            with_deleted: false,
        }
    }

    /// Add fields to the select list. Duplicates are ignored.
    pub fn select<'f>(mut self, fields: impl IntoIterator<Item = &'f &'static FieldInfo>) -> Self {
        let columns = self.columns.get_or_insert_with(Vec::new);
        for field in fields {
            if !columns.iter().any(|c| c.name == field.name) {
                columns.push(*field);
            }
        }
        self
    }

    /// Include soft-deleted rows.
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    /// Match rows whose columns equal every entry of `values`.
    pub fn where_eq(mut self, values: &ValueMap) -> Self {
        self.filter = Filter::Eq(values.clone());
        self
    }

    /// Match rows equal to any of the given maps.
    pub fn where_any(mut self, values: &[ValueMap]) -> Self {
        self.filter = Filter::Any(values.to_vec());
        self
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.meta
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn includes_deleted(&self) -> bool {
        self.with_deleted
    }

    /// Selected fields, in select order (all fields when `select` was never called).
    pub fn columns(&self) -> Vec<&'static FieldInfo> {
        match &self.columns {
            Some(columns) => columns.clone(),
            None => self.meta.fields().iter().collect(),
        }
    }

    /// Whether the select list is explicitly empty.
    pub fn selects_nothing(&self) -> bool {
        self.columns.as_ref().is_some_and(Vec::is_empty)
    }

    /// Render the query for a dialect.
    pub fn to_sql(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let select_list = if self.selects_nothing() {
            "1".to_string()
        } else {
            self.columns()
                .iter()
                .map(|f| dialect.quote_identifier(f.column_name))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!(
            "SELECT {} FROM {}",
            select_list,
            dialect.quote_identifier(self.meta.table())
        );

        let condition = match &self.filter {
            Filter::Eq(values) => self.render_eq(dialect, values, &mut params),
            Filter::Any(alternatives) => self.render_any(dialect, alternatives, &mut params),
        };

        sql.push_str(" WHERE ");
        match self.meta.delete_date_field() {
            Some(deleted) if !self.with_deleted => {
                sql.push('(');
                sql.push_str(&condition);
                sql.push_str(") AND ");
                sql.push_str(&dialect.quote_identifier(deleted.column_name));
                sql.push_str(" IS NULL");
            }
            _ => sql.push_str(&condition),
        }

        (sql, params)
    }

    fn column_for<'a>(&self, property: &'a str) -> &'a str {
        self.meta
            .field(property)
            .map_or(property, |f| f.column_name)
    }

    fn render_eq(&self, dialect: Dialect, values: &ValueMap, params: &mut Vec<Value>) -> String {
        if values.is_empty() {
            return "1 = 0".to_string();
        }
        values
            .iter()
            .map(|(property, value)| {
                let column = dialect.quote_identifier(self.column_for(property));
                if value.is_null() {
                    format!("{column} IS NULL")
                } else {
                    params.push(value.clone());
                    format!("{column} = {}", dialect.placeholder(params.len()))
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn render_any(
        &self,
        dialect: Dialect,
        alternatives: &[ValueMap],
        params: &mut Vec<Value>,
    ) -> String {
        let alternatives: Vec<&ValueMap> = alternatives.iter().filter(|m| !m.is_empty()).collect();
        let Some(first) = alternatives.first() else {
            return "1 = 0".to_string();
        };

        // Single-key maps over the same property collapse into IN (...).
        let single_key = (first.len() == 1)
            .then(|| first.keys().next())
            .flatten()
            .filter(|key| {
                alternatives
                    .iter()
                    .all(|m| m.len() == 1 && m.contains_key(key.as_str()))
            });

        if let Some(key) = single_key {
            if alternatives.iter().all(|m| m.values().all(|v| !v.is_null())) {
                let placeholders = alternatives
                    .iter()
                    .flat_map(|m| m.values())
                    .map(|v| {
                        params.push(v.clone());
                        dialect.placeholder(params.len())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                return format!(
                    "{} IN ({})",
                    dialect.quote_identifier(self.column_for(key)),
                    placeholders
                );
            }
        }

        if alternatives.len() == 1 {
            return self.render_eq(dialect, first, params);
        }
        alternatives
            .iter()
            .map(|m| format!("({})", self.render_eq(dialect, m, params)))
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static POST_FIELDS: &[FieldInfo] = &[
        FieldInfo::new("id", "id").primary_key(true),
        FieldInfo::new("updated_at", "updated").update_date(true),
        FieldInfo::new("deleted_at", "deleted_at")
            .nullable(true)
            .delete_date(true),
    ];

    static MEMBER_FIELDS: &[FieldInfo] = &[
        FieldInfo::new("user_id", "user_id").primary_key(true),
        FieldInfo::new("group_id", "group_id").primary_key(true),
        FieldInfo::new("version", "version").version(true),
    ];

    fn posts() -> EntityMetadata {
        EntityMetadata::new("posts", &["id"], POST_FIELDS)
    }

    fn members() -> EntityMetadata {
        EntityMetadata::new("members", &["user_id", "group_id"], MEMBER_FIELDS)
    }

    fn id(v: i64) -> ValueMap {
        ValueMap::from([("id".to_string(), Value::BigInt(v))])
    }

    #[test]
    fn test_where_eq_excludes_soft_deleted() {
        let meta = posts();
        let query = ReadQuery::new(meta)
            .select(&meta.primary_fields())
            .select(&[&POST_FIELDS[1]])
            .where_eq(&id(5));
        let (sql, params) = query.to_sql(Dialect::Postgres);
        assert_eq!(
            sql,
            "SELECT \"id\", \"updated\" FROM \"posts\" WHERE (\"id\" = $1) AND \"deleted_at\" IS NULL"
        );
        assert_eq!(params, vec![Value::BigInt(5)]);
    }

    #[test]
    fn test_with_deleted_drops_soft_delete_guard() {
        let meta = posts();
        let (sql, _) = ReadQuery::new(meta)
            .select(&meta.primary_fields())
            .with_deleted()
            .where_eq(&id(5))
            .to_sql(Dialect::Sqlite);
        assert_eq!(sql, "SELECT \"id\" FROM \"posts\" WHERE \"id\" = ?1");
    }

    #[test]
    fn test_where_any_single_key_renders_in() {
        let meta = posts();
        let (sql, params) = ReadQuery::new(meta)
            .select(&meta.primary_fields())
            .with_deleted()
            .where_any(&[id(1), id(2), id(3)])
            .to_sql(Dialect::Mysql);
        assert_eq!(sql, "SELECT `id` FROM `posts` WHERE `id` IN (?, ?, ?)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_where_any_composite_renders_or_of_ands() {
        let meta = members();
        let key = |u: i64, g: i64| {
            ValueMap::from([
                ("user_id".to_string(), Value::BigInt(u)),
                ("group_id".to_string(), Value::BigInt(g)),
            ])
        };
        let (sql, params) = ReadQuery::new(meta)
            .select(&meta.primary_fields())
            .where_any(&[key(1, 10), key(2, 20)])
            .to_sql(Dialect::Postgres);
        assert_eq!(
            sql,
            "SELECT \"user_id\", \"group_id\" FROM \"members\" WHERE \
             (\"group_id\" = $1 AND \"user_id\" = $2) OR (\"group_id\" = $3 AND \"user_id\" = $4)"
        );
        assert_eq!(
            params,
            vec![
                Value::BigInt(10),
                Value::BigInt(1),
                Value::BigInt(20),
                Value::BigInt(2)
            ]
        );
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        let meta = members();
        let (sql, params) = ReadQuery::new(meta).to_sql(Dialect::Postgres);
        assert_eq!(
            sql,
            "SELECT \"user_id\", \"group_id\", \"version\" FROM \"members\" WHERE 1 = 0"
        );
        assert!(params.is_empty());

        let (sql, _) = ReadQuery::new(meta)
            .where_eq(&ValueMap::new())
            .to_sql(Dialect::Postgres);
        assert!(sql.ends_with("WHERE 1 = 0"));
    }

    #[test]
    fn test_select_ignores_duplicates() {
        let meta = posts();
        let query = ReadQuery::new(meta)
            .select(&meta.primary_fields())
            .select(&meta.primary_fields());
        assert_eq!(query.columns().len(), 1);
    }

    #[test]
    fn test_explicitly_empty_select_reads_no_entity_column() {
        let meta = EntityMetadata::new("settings", &[], &[]);
        let nothing: Vec<&'static FieldInfo> = Vec::new();
        let query = ReadQuery::new(posts()).select(&nothing).where_eq(&id(1));
        assert!(query.selects_nothing());
        assert!(query.columns().is_empty());
        let (sql, _) = query.to_sql(Dialect::Sqlite);
        assert_eq!(
            sql,
            "SELECT 1 FROM \"posts\" WHERE (\"id\" = ?1) AND \"deleted_at\" IS NULL"
        );

        let keyless = ReadQuery::new(meta).select(&meta.primary_fields());
        assert!(keyless.selects_nothing());
        assert!(!ReadQuery::new(meta).selects_nothing());
    }
}
