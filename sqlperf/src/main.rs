#[macro_use]
extern crate log;

mod config;
mod scripts;

use clap::{Parser, Subcommand};
use config::EnvConfig;
use log::LevelFilter;
use scripts::Context;
use sqlperf_common::error::{DriverAttempts, OdbcStdError};
use sqlperf_helper::executor::connect::{establish, ConnectOptions, OdbcConnector};
use sqlperf_helper::executor::rounds::RoundOptions;
use sqlperf_helper::odbc_api::Environment;
use std::path::PathBuf;
use std::time::Duration;

/// SQL Server performance diagnostics over ODBC
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file with connection and test parameters
    #[arg(short, long)]
    config: PathBuf,

    /// Directory the reports are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Databases, version, server properties, sizes and current session (connects to master)
    DbInfo,
    /// Cost of the cross-database join in the production detail query
    VerifyCrossDb,
    /// Original against CTE-rewritten SELECT parts of the INSERT statement
    InsertPerf,
    /// Source row counts, known problems and index check for the INSERT statement
    InsertAnalysis,
    /// Definition, cached statistics and a timed benchmark of a stored procedure
    Procedure {
        /// e.g. dbo.usp_CheckProjectRiskWarn_Contract
        name: String,
        /// Overrides `rounds` of the configuration
        #[arg(long)]
        rounds: Option<usize>,
        /// Pause between two rounds in milliseconds
        #[arg(long, default_value_t = 1000)]
        pause_ms: u64,
    },
}

fn main() {
    simple_log::quick!();

    let args = Args::parse();
    match args.log_level.parse::<LevelFilter>() {
        Ok(level) => log::set_max_level(level),
        Err(_) => warn!("unknown log level `{}`, keeping the default", args.log_level),
    }

    if let Err(e) = run(args) {
        let trace = failure_trace(&e);
        error!("{}", trace);
        println!();
        println!("error: {}", trace);
    }
}

// The error with every context it was wrapped in.
fn failure_trace(e: &anyhow::Error) -> String {
    format!("{:?}", e)
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = EnvConfig::load(&args.config)?;
    debug!("config:{:?}", config);

    let options = match args.command {
        Command::DbInfo => config.connection.with_database("master"),
        _ => config.connection.clone(),
    };

    let env = Environment::new()?;
    let connector = OdbcConnector::new(&env, config.connection_options());
    let established = match establish(&connector, &options) {
        Ok(established) => established,
        Err(OdbcStdError::ConnectionUnavailable(attempts)) => {
            print_attempts(&options, &attempts);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    println!(
        "[ok] connected to {} ({}) using driver: {}",
        options.database, options.server, established.driver
    );
    println!();

    let ctx = Context {
        conn: &established.connection,
        config: &config,
        database: &options.database,
        output: &args.output,
    };
    let result = match &args.command {
        Command::DbInfo => scripts::db_info::run(&ctx),
        Command::VerifyCrossDb => scripts::cross_db::run(&ctx),
        Command::InsertPerf => scripts::insert_perf::run(&ctx),
        Command::InsertAnalysis => scripts::insert_analysis::run(&ctx),
        Command::Procedure {
            name,
            rounds,
            pause_ms,
        } => {
            let round_options = RoundOptions {
                rounds: rounds.unwrap_or(config.rounds).max(1),
                pause: Duration::from_millis(*pause_ms),
                ..config.round_options()
            };
            scripts::procedure::run(&ctx, name, round_options)
        }
    };

    drop(established);
    println!();
    println!("[ok] connection closed");
    result
}

fn print_attempts(options: &ConnectOptions, attempts: &DriverAttempts) {
    println!("[failed] could not connect to {} ({})", options.database, options.server);
    if attempts.is_empty() {
        println!("  no driver configured in connection.driver_preference");
        return;
    }
    for attempt in attempts.iter() {
        println!("  {}", attempt);
    }
    println!();
    println!("check that:");
    println!("  1. the server (or the tunnel in front of it) is reachable");
    println!("  2. server, username and password are correct");
    println!("  3. one of the listed ODBC drivers is installed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context as _;

    #[test]
    fn test_failure_trace_keeps_context_chain() {
        let e = std::fs::read_to_string("/nonexistent/sqlperf.json")
            .context("read config /nonexistent/sqlperf.json")
            .unwrap_err();
        let trace = failure_trace(&e);
        assert!(trace.starts_with("read config /nonexistent/sqlperf.json"));
        assert!(trace.contains("Caused by:"));
    }

    #[test]
    fn test_procedure_args() {
        let args = Args::parse_from([
            "sqlperf",
            "--config",
            "sqlperf.json",
            "procedure",
            "dbo.usp_UpdateProjectProgess",
            "--rounds",
            "5",
        ]);
        match args.command {
            Command::Procedure {
                name,
                rounds,
                pause_ms,
            } => {
                assert_eq!(name, "dbo.usp_UpdateProjectProgess");
                assert_eq!(rounds, Some(5));
                assert_eq!(pause_ms, 1000);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
