//! Microsoft SQL Server driver.
//!
//! - [`SqlServerDialect`]: syntax strategy selected by compatibility level
//! - [`MssqlPool`]: compatibility probe and script execution

mod dialect;
mod pool;

pub use dialect::{
    DialectCapabilities, SqlServerDialect, CREATE_OR_ALTER_MIN_LEVEL, OFFSET_FETCH_MIN_LEVEL,
};
pub use pool::{MssqlPool, TiberiusConnectionManager};
