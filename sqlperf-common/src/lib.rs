#[macro_use]
extern crate log;

pub extern crate odbc_api;

pub mod error;
mod macros;
pub mod print_table;
pub mod state;

pub use error::{DriverAttempt, DriverAttempts, OdbcStdError, OdbcStdResult};
pub use print_table::Print;
pub use state::OdbcState;
