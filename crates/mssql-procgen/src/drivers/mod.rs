//! Database driver implementations.
//!
//! Each driver provides the dialect strategy for its engine and the
//! connectivity needed to probe the target and deploy scripts. Only
//! SQL Server is supported; a new engine adds a module here with its own
//! `Dialect` and `CompatibilityProbe` implementations.

pub mod mssql;

pub use mssql::{MssqlPool, SqlServerDialect};
