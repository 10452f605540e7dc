pub mod connect;
pub mod database;
pub mod outcome;
pub mod profiling;
pub mod query;
pub mod rounds;
pub mod timed;

pub use connect::{establish, ConnectOptions, Connector, Established, OdbcConnector};
pub use database::{ConnectionTrait, OdbcDbConnection, Options};
pub use outcome::ExecutionOutcome;
pub use query::QueryResult;
pub use rounds::{RoundOptions, Rounds};
pub use timed::execute_timed;
