//! Core traits at the seams of the generator.
//!
//! - [`CompatibilityProbe`]: reports the target engine's compatibility level
//! - [`Dialect`]: SQL syntax strategy selected from that level

use async_trait::async_trait;

use crate::error::Result;

/// Reports the SQL dialect version gate of the target database.
///
/// Implementations either ask a live server (see
/// [`MssqlPool`](crate::drivers::mssql::MssqlPool)) or return a pinned value
/// ([`FixedCompatibility`]). Errors are propagated as-is; callers never fall
/// back to an assumed level.
#[async_trait]
pub trait CompatibilityProbe: Send + Sync {
    /// Get the compatibility level (e.g. 110, 130, 150).
    async fn compatibility_level(&self) -> Result<u16>;
}

/// A compatibility level known ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCompatibility(pub u16);

#[async_trait]
impl CompatibilityProbe for FixedCompatibility {
    async fn compatibility_level(&self) -> Result<u16> {
        Ok(self.0)
    }
}

#[async_trait]
impl<P: CompatibilityProbe + ?Sized> CompatibilityProbe for &P {
    async fn compatibility_level(&self) -> Result<u16> {
        (**self).compatibility_level().await
    }
}

/// SQL syntax strategy for procedure scripts.
///
/// # Design Pattern
///
/// This is a **Strategy**: generators ask the dialect for capabilities
/// instead of comparing version numbers themselves.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier.
    fn name(&self) -> &str;

    /// Compatibility level the dialect was built for.
    fn compatibility_level(&self) -> u16;

    /// `CREATE OR ALTER PROCEDURE` is accepted.
    fn supports_create_or_alter(&self) -> bool;

    /// `OFFSET ... FETCH NEXT` paging is accepted.
    fn supports_offset_fetch(&self) -> bool;

    /// `STRING_SPLIT` is available.
    fn supports_string_split(&self) -> bool;

    /// Render the statement(s) that (re)create a procedure, up to and
    /// including the procedure name.
    fn procedure_header(&self, procedure: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_compatibility() {
        let probe = FixedCompatibility(120);
        assert_eq!(probe.compatibility_level().await.unwrap(), 120);
        assert_eq!((&probe).compatibility_level().await.unwrap(), 120);
    }
}
