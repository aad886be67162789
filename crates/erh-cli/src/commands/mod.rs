//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config resolution, ledger loading)
//! - `precompute` - Batch mode (precompute, tables)
//! - `reports` - On-demand report commands
//! - `classify` - Code classification lookup

pub mod classify;
pub mod core;
pub mod precompute;
pub mod reports;

// Re-export command functions for main.rs
pub use classify::*;
pub use core::*;
pub use precompute::*;
pub use reports::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
