//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, status, reset) and shared utilities (open_db)
//! - `import` - Statement/feed import command
//! - `subscriptions` - Detection run and override commands
//! - `transactions` - Transaction listing

pub mod core;
pub mod import;
pub mod subscriptions;
pub mod transactions;

// Re-export command functions for main.rs
pub use core::*;
pub use import::*;
pub use subscriptions::*;
pub use transactions::*;

/// Truncate a string to a maximum length in chars, adding "..." if truncated
///
/// Counts chars rather than bytes so multi-byte merchant names never get
/// cut mid-character.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
