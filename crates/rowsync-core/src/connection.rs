//! Database connection trait.
//!
//! The reconciler never writes through a connection; it only issues
//! supplemental reads. [`Connection`] is therefore the read half of a driver:
//! run a statement, get rows back.
//!
//! All operations integrate with asupersync's structured concurrency via `Cx`
//! for cancellation and timeout handling.

use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};

/// A database connection capable of executing read queries.
///
/// Implementations must be `Send + Sync` so reads for different entities can
/// be in flight at the same time.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query(&cx, "SELECT \"id\" FROM \"posts\" WHERE \"id\" = $1", &[Value::BigInt(1)]).await;
/// ```
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send;

    /// Execute a query and return the first row, if any.
    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, crate::Error>> + Send {
        let fut = self.query(cx, sql, params);
        async move {
            match fut.await {
                Outcome::Ok(rows) => Outcome::Ok(rows.into_iter().next()),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }
}
