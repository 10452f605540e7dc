use crate::error::{OdbcStdError, OdbcStdResult};
use nu_protocol::Config;
use nu_table::{Alignments, StyledString, Table, TableTheme, TextStyle};
use std::collections::HashMap;

/// Render tabular output as a rounded text table. E.g:
/// ```bash
/// > sqlperf db-info
/// ╭────────────────────┬─────────────┬───────────╮
/// │        name        │ database_id │   state   │
/// ├────────────────────┼─────────────┼───────────┤
/// │ Statistics-CT-test │ 5           │ ONLINE    │
/// ╰────────────────────┴─────────────┴───────────╯
/// ```
pub trait Print: Sized {
    fn header_data(self) -> OdbcStdResult<(Vec<String>, Vec<Vec<String>>)>;

    fn convert_table(self) -> OdbcStdResult<Table> {
        let (headers, records) = self.header_data()?;
        debug!("rendering table: {} columns, {} rows", headers.len(), records.len());
        let headers = headers
            .into_iter()
            .map(|x| StyledString::new(x, TextStyle::default_header()))
            .collect();
        let rows = records
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(|x| StyledString::new(x, TextStyle::basic_left()))
                    .collect()
            })
            .collect();
        Ok(Table::new(headers, rows, TableTheme::rounded()))
    }

    fn table_string(self) -> OdbcStdResult<String> {
        let table = self.convert_table()?;
        let cfg = Config::default();
        let styles = HashMap::default();
        let alignments = Alignments::default();

        table
            .draw_table(&cfg, &styles, alignments, usize::MAX)
            .ok_or_else(|| OdbcStdError::StringError("convert table to string error".into()))
    }

    fn print_all_tables(self) -> OdbcStdResult<()> {
        let p = self.table_string()?;
        println!("{}", p);
        Ok(())
    }
}

impl Print for (Vec<String>, Vec<Vec<String>>) {
    fn header_data(self) -> OdbcStdResult<(Vec<String>, Vec<Vec<String>>)> {
        Ok(self)
    }
}
