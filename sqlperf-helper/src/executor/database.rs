use crate::executor::query::QueryResult;
use crate::odbc_api::buffers::TextRowSet;
use crate::odbc_api::handles::{AsStatementRef, SqlResult, Statement, StatementRef};
use crate::odbc_api::{Connection, Cursor, CursorImpl, IntoParameter, ResultSetMetadata};
use sqlperf_common::error::{OdbcStdError, OdbcStdResult};

/// The operations the diagnostic scripts need from a SQL Server session.
///
/// All methods take `&self`: a connection is used by one logical thread of
/// control at a time, and the ODBC handle does its own bookkeeping.
pub trait ConnectionTrait {
    /// Execute a statement and discard whatever it produces, e.g. `SET STATISTICS IO ON`.
    fn execute(&self, sql: &str) -> OdbcStdResult<()>;

    /// Execute a statement and fetch every row of every result set it produces.
    ///
    /// Returns the number of rows fetched, or `None` when the statement did not
    /// produce a result set at all.
    fn drain(&self, sql: &str) -> OdbcStdResult<Option<usize>>;

    /// Execute a query with positional `?` text parameters and return its first
    /// result set as text.
    fn query(&self, sql: &str, params: &[&str]) -> OdbcStdResult<QueryResult>;

    fn commit(&self) -> OdbcStdResult<()>;

    fn rollback(&self) -> OdbcStdResult<()>;
}

#[allow(missing_debug_implementations)]
pub struct OdbcDbConnection<'a> {
    pub conn: Connection<'a>,
    pub options: Options,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub max_batch_size: usize,
    pub max_str_len: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_batch_size: Self::MAX_BATCH_SIZE,
            max_str_len: Self::MAX_STR_LEN,
        }
    }
}

impl Options {
    // Default Max Buffer Size 128
    pub const MAX_BATCH_SIZE: usize = 1 << 7;
    // Default Max string length 4K
    pub const MAX_STR_LEN: usize = 4096;

    fn check(mut self) -> Self {
        if self.max_batch_size == 0 {
            self.max_batch_size = Self::MAX_BATCH_SIZE
        }

        if self.max_str_len == 0 {
            self.max_str_len = Self::MAX_STR_LEN
        }
        self
    }
}

impl<'a> OdbcDbConnection<'a> {
    pub fn new(conn: Connection<'a>, options: Options) -> OdbcStdResult<Self> {
        Ok(Self {
            conn,
            options: options.check(),
        })
    }

    fn text_result(&self, mut cursor: impl Cursor) -> OdbcStdResult<QueryResult> {
        let columns = cursor.column_names()?.collect::<Result<Vec<String>, _>>()?;

        // Use schema in cursor to initialize a text buffer large enough to hold the largest
        // possible strings for each column up to `max_str_len`.
        let mut buffers = TextRowSet::for_cursor(
            self.options.max_batch_size,
            &mut cursor,
            Some(self.options.max_str_len),
        )?;
        let mut row_set_cursor = cursor.bind_buffer(&mut buffers)?;

        let mut rows = vec![];
        while let Some(batch) = row_set_cursor.fetch()? {
            for row_index in 0..batch.num_rows() {
                let row = (0..batch.num_cols())
                    .map(|col_index| {
                        batch
                            .at(col_index, row_index)
                            .map(|x| String::from_utf8_lossy(x).to_string())
                    })
                    .collect();
                rows.push(row);
            }
        }
        debug!("columns:{:?}, rows:{}", columns, rows.len());
        Ok(QueryResult { columns, rows })
    }
}

impl ConnectionTrait for OdbcDbConnection<'_> {
    fn execute(&self, sql: &str) -> OdbcStdResult<()> {
        let mut stmt = self.conn.preallocate()?;
        stmt.execute(sql, ())?;
        Ok(())
    }

    fn drain(&self, sql: &str) -> OdbcStdResult<Option<usize>> {
        let mut stmt = self.conn.preallocate()?;
        if let Some(cursor) = stmt.execute(sql, ())? {
            return count_rows(&mut CursorResults(Some(cursor)));
        }
        // the first result carries no columns (a row count), later ones may
        count_rows(&mut PendingResults(stmt.as_stmt_ref()))
    }

    fn query(&self, sql: &str, params: &[&str]) -> OdbcStdResult<QueryResult> {
        let params: Vec<_> = params.iter().map(|p| (*p).into_parameter()).collect();
        let mut stmt = self.conn.preallocate()?;
        let cursor = stmt
            .execute(sql, params.as_slice())?
            .ok_or_else(|| OdbcStdError::StringError(format!("no result set for:{}", sql)))?;
        self.text_result(cursor)
    }

    fn commit(&self) -> OdbcStdResult<()> {
        self.conn.commit()?;
        Ok(())
    }

    fn rollback(&self) -> OdbcStdResult<()> {
        self.conn.rollback()?;
        Ok(())
    }
}

/// The results of an executed batch, visited one after another.
trait ResultSets {
    /// Columns of the current result, 0 for a row count or an empty result.
    fn num_cols(&mut self) -> OdbcStdResult<i16>;

    fn next_row(&mut self) -> OdbcStdResult<bool>;

    /// Moves to the next result, `false` once the batch is exhausted.
    fn more_results(&mut self) -> OdbcStdResult<bool>;
}

// Fetches every row of every result set. `None` if no result had columns.
fn count_rows(results: &mut impl ResultSets) -> OdbcStdResult<Option<usize>> {
    let mut rows = None;
    loop {
        if results.num_cols()? > 0 {
            let mut count = rows.unwrap_or(0);
            while results.next_row()? {
                count += 1;
            }
            rows = Some(count);
        }
        if !results.more_results()? {
            debug!("drained rows:{:?}", rows);
            return Ok(rows);
        }
    }
}

struct CursorResults<S: AsStatementRef>(Option<CursorImpl<S>>);

impl<S: AsStatementRef> ResultSets for CursorResults<S> {
    fn num_cols(&mut self) -> OdbcStdResult<i16> {
        match &mut self.0 {
            Some(cursor) => Ok(cursor.num_result_cols()?),
            None => Ok(0),
        }
    }

    fn next_row(&mut self) -> OdbcStdResult<bool> {
        match &mut self.0 {
            Some(cursor) => Ok(cursor.next_row()?.is_some()),
            None => Ok(false),
        }
    }

    fn more_results(&mut self) -> OdbcStdResult<bool> {
        let Some(cursor) = self.0.take() else {
            return Ok(false);
        };
        self.0 = cursor.more_results()?;
        Ok(self.0.is_some())
    }
}

// A statement whose first result had no cursor; walked on the raw handle.
struct PendingResults<'s>(StatementRef<'s>);

impl ResultSets for PendingResults<'_> {
    fn num_cols(&mut self) -> OdbcStdResult<i16> {
        Ok(handle_result(Statement::num_result_cols(&self.0), "SQLNumResultCols")?.unwrap_or(0))
    }

    fn next_row(&mut self) -> OdbcStdResult<bool> {
        let fetched = handle_result(unsafe { self.0.fetch() }, "SQLFetch")?;
        Ok(fetched.is_some())
    }

    fn more_results(&mut self) -> OdbcStdResult<bool> {
        let moved = handle_result(unsafe { self.0.more_results() }, "SQLMoreResults")?;
        Ok(moved.is_some())
    }
}

fn handle_result<T>(result: SqlResult<T>, function: &str) -> OdbcStdResult<Option<T>> {
    match result {
        SqlResult::Success(value) | SqlResult::SuccessWithInfo(value) => Ok(Some(value)),
        SqlResult::NoData => Ok(None),
        _ => Err(OdbcStdError::StringError(format!(
            "{} failed while draining result sets",
            function
        ))),
    }
}
