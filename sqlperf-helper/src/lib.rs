#![deny(missing_debug_implementations)]

#[macro_use]
extern crate log;

pub use sqlperf_common::odbc_api;

pub mod executor;
pub mod extension;
pub mod report;

#[cfg(test)]
mod tests_cfg;

pub use sqlperf_common::Print;
