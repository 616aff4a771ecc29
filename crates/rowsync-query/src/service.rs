//! Query service: executes supplemental reads.

use crate::dialect::Dialect;
use crate::read::ReadQuery;
use asupersync::{Cx, Outcome};
use rowsync_core::{Connection, Error, Row};

/// Executes [`ReadQuery`]s and returns plain rows.
///
/// Timeouts, retries and cancellation belong to the implementation; callers
/// propagate whatever outcome comes back unmodified.
pub trait QueryService: Send + Sync {
    /// Execute the query and return the first matching row, if any.
    fn fetch_one(
        &self,
        cx: &Cx,
        query: &ReadQuery,
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send;

    /// Execute the query and return every matching row.
    fn fetch_all(
        &self,
        cx: &Cx,
        query: &ReadQuery,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;
}

/// [`QueryService`] backed by a [`Connection`].
#[derive(Debug)]
pub struct ConnectionQueryService<C> {
    conn: C,
    dialect: Dialect,
}

impl<C: Connection> ConnectionQueryService<C> {
    /// Wrap a connection, rendering SQL for `dialect`.
    pub fn new(conn: C, dialect: Dialect) -> Self {
        Self { conn, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }
}

impl<C: Connection> QueryService for ConnectionQueryService<C> {
    fn fetch_one(
        &self,
        cx: &Cx,
        query: &ReadQuery,
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let (sql, params) = query.to_sql(self.dialect);
        tracing::trace!(sql = %sql, params = params.len(), "fetch_one");
        async move { self.conn.query_one(cx, &sql, &params).await }
    }

    fn fetch_all(
        &self,
        cx: &Cx,
        query: &ReadQuery,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let (sql, params) = query.to_sql(self.dialect);
        tracing::trace!(sql = %sql, params = params.len(), "fetch_all");
        async move { self.conn.query(cx, &sql, &params).await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowsync_core::{EntityMetadata, FieldInfo, Value, ValueMap};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct MockState {
        queries: Vec<(String, Vec<Value>)>,
    }

    struct MockConnection {
        state: Arc<Mutex<MockState>>,
        rows: Vec<Row>,
    }

    impl Connection for MockConnection {
        fn query(
            &self,
            _cx: &Cx,
            sql: &str,
            params: &[Value],
        ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
            let state = Arc::clone(&self.state);
            let sql = sql.to_string();
            let params = params.to_vec();
            let rows = self.rows.clone();
            async move {
                state
                    .lock()
                    .expect("lock poisoned")
                    .queries
                    .push((sql, params));
                Outcome::Ok(rows)
            }
        }
    }

    static FIELDS: &[FieldInfo] = &[
        FieldInfo::new("id", "id").primary_key(true),
        FieldInfo::new("version", "version").version(true),
    ];

    #[test]
    fn test_renders_for_its_dialect() {
        let rt = asupersync::runtime::RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let state = Arc::new(Mutex::new(MockState::default()));
        let service = ConnectionQueryService::new(
            MockConnection {
                state: Arc::clone(&state),
                rows: vec![Row::from_pairs([
                    ("id", Value::BigInt(1)),
                    ("version", Value::Int(4)),
                ])],
            },
            Dialect::Mssql,
        );

        let meta = EntityMetadata::new("docs", &["id"], FIELDS);
        let query = ReadQuery::new(meta)
            .where_eq(&ValueMap::from([("id".to_string(), Value::BigInt(1))]));

        rt.block_on(async {
            match service.fetch_one(&cx, &query).await {
                Outcome::Ok(Some(row)) => {
                    assert_eq!(row.get_by_name("version"), Some(&Value::Int(4)));
                }
                other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
            }
            match service.fetch_all(&cx, &query).await {
                Outcome::Ok(rows) => assert_eq!(rows.len(), 1),
                other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
            }
        });

        let guard = state.lock().expect("lock poisoned");
        assert_eq!(guard.queries.len(), 2);
        assert_eq!(
            guard.queries[0].0,
            "SELECT [id], [version] FROM [docs] WHERE [id] = @p1"
        );
        assert_eq!(guard.queries[0].1, vec![Value::BigInt(1)]);
    }
}
