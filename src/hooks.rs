//! Per-line synchronization points for line-oriented stages.
//!
//! Stages call every attached hook immediately before and after each complete
//! line. Tests use this to hold a stage at a given line (forcing one ordering
//! of the binder/replacer race) or to inject a failure at line `k`.

use crate::error::Result;

/// Callback invoked around each line a stage processes.
/// Line numbers start at 1.
pub trait LineHook: Send + Sync {
    /// Called before the transform runs. An error is treated as an I/O
    /// failure of the stage and triggers the shutdown protocol.
    fn before_line(&self, _stage: &str, _line: usize) -> Result<()> {
        Ok(())
    }

    /// Called after every output line has been written
    fn after_line(&self, _stage: &str, _line: usize) {}
}
