use crate::executor::database::{OdbcDbConnection, Options};
use crate::odbc_api::{ConnectionOptions, Environment};
use serde::Deserialize;
use sqlperf_common::error::{DriverAttempts, OdbcStdError, OdbcStdResult};
use std::fmt;

/// Drivers tried when the configuration does not name any, newest first.
pub const DEFAULT_DRIVERS: [&str; 5] = [
    "ODBC Driver 18 for SQL Server",
    "ODBC Driver 17 for SQL Server",
    "ODBC Driver 13 for SQL Server",
    "SQL Server Native Client 11.0",
    "SQL Server",
];

pub const DEFAULT_LOGIN_TIMEOUT_SEC: u32 = 10;

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectOptions {
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_drivers")]
    pub driver_preference: Vec<String>,
    #[serde(default = "default_login_timeout")]
    pub login_timeout_sec: u32,
    #[serde(default = "default_trust")]
    pub trust_server_certificate: bool,
}

fn default_drivers() -> Vec<String> {
    DEFAULT_DRIVERS.iter().map(|d| d.to_string()).collect()
}

fn default_login_timeout() -> u32 {
    DEFAULT_LOGIN_TIMEOUT_SEC
}

fn default_trust() -> bool {
    true
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"******")
            .field("driver_preference", &self.driver_preference)
            .field("login_timeout_sec", &self.login_timeout_sec)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .finish()
    }
}

impl ConnectOptions {
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            driver_preference: default_drivers(),
            login_timeout_sec: DEFAULT_LOGIN_TIMEOUT_SEC,
            trust_server_certificate: true,
        }
    }

    pub fn with_drivers<S: Into<String>>(mut self, drivers: impl IntoIterator<Item = S>) -> Self {
        self.driver_preference = drivers.into_iter().map(Into::into).collect();
        self
    }

    /// Same server and credentials, another database (e.g. `master`).
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..self.clone()
        }
    }

    pub fn connection_string(&self, driver: &str) -> String {
        let mut conn_str = format!(
            "DRIVER={};SERVER={};DATABASE={};UID={};PWD={};",
            braced(driver),
            escape_value(&self.server),
            escape_value(&self.database),
            escape_value(&self.username),
            escape_value(&self.password),
        );
        if self.trust_server_certificate {
            conn_str.push_str("TrustServerCertificate=yes;");
        }
        conn_str
    }
}

fn braced(value: &str) -> String {
    format!("{{{}}}", value.replace('}', "}}"))
}

// Values holding connection string delimiters must be wrapped in braces.
fn escape_value(value: &str) -> String {
    let needs_braces = value.contains(&[';', '{', '}'][..])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if needs_braces {
        braced(value)
    } else {
        value.to_string()
    }
}

/// Opens a connection from a complete ODBC connection string.
pub trait Connector {
    type Connection;

    fn open(&self, connection_string: &str, login_timeout_sec: u32)
        -> OdbcStdResult<Self::Connection>;
}

#[allow(missing_debug_implementations)]
pub struct OdbcConnector<'env> {
    env: &'env Environment,
    options: Options,
}

impl<'env> OdbcConnector<'env> {
    pub fn new(env: &'env Environment, options: Options) -> Self {
        Self { env, options }
    }
}

impl<'env> Connector for OdbcConnector<'env> {
    type Connection = OdbcDbConnection<'env>;

    fn open(
        &self,
        connection_string: &str,
        login_timeout_sec: u32,
    ) -> OdbcStdResult<OdbcDbConnection<'env>> {
        let conn = self.env.connect_with_connection_string(
            connection_string,
            ConnectionOptions {
                login_timeout_sec: Some(login_timeout_sec),
                ..ConnectionOptions::default()
            },
        )?;
        OdbcDbConnection::new(conn, self.options.clone())
    }
}

/// A live connection together with the driver that opened it.
#[derive(Debug)]
pub struct Established<C> {
    pub connection: C,
    pub driver: String,
}

/// Try every driver of `options.driver_preference` in order and return the
/// first connection that opens.
///
/// Failed attempts are kept; when no driver works the error lists all of them.
pub fn establish<T: Connector>(
    connector: &T,
    options: &ConnectOptions,
) -> OdbcStdResult<Established<T::Connection>> {
    let mut attempts = DriverAttempts::default();
    for driver in &options.driver_preference {
        debug!("trying driver `{}` for {}", driver, options.server);
        let conn_str = options.connection_string(driver);
        match connector.open(&conn_str, options.login_timeout_sec) {
            Ok(connection) => {
                info!(
                    "connected to {}/{} using driver `{}`",
                    options.server, options.database, driver
                );
                return Ok(Established {
                    connection,
                    driver: driver.clone(),
                });
            }
            Err(e) => {
                debug!("driver `{}` failed: {}", driver, e);
                attempts.push(driver.as_str(), e);
            }
        }
    }
    warn!(
        "no driver could connect to {}: {}",
        options.server,
        attempts.drivers().join(", ")
    );
    Err(OdbcStdError::ConnectionUnavailable(attempts))
}
