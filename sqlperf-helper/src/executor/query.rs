use sqlperf_common::error::OdbcStdResult;
use sqlperf_common::print_table::Print;

pub type TextRow = Vec<Option<String>>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryResult {
    // table columns header
    pub columns: Vec<String>,
    // table rows, `None` for SQL NULL
    pub rows: Vec<TextRow>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, ignoring case as SQL Server does by default.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// First column of the first row, for scalar queries such as `SELECT @@VERSION`.
    pub fn first_value(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }
}

impl Print for QueryResult {
    fn header_data(self) -> OdbcStdResult<(Vec<String>, Vec<Vec<String>>)> {
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|v| v.unwrap_or_else(|| "NULL".to_string()))
                    .collect()
            })
            .collect();
        Ok((self.columns, rows))
    }
}
