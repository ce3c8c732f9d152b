//! Command sink: the single hook from the wire into business logic.
//!
//! Every decoded inbound message is handed to the sink exactly once, in
//! arrival order per connection. The protocol layer knows nothing about
//! what the text means.
//!
//! # Example
//!
//! ```
//! use dashwire::{CommandSink, Error};
//!
//! let sink = |command: &str| -> dashwire::Result<()> {
//!     match command {
//!         "ping" => Ok(()),
//!         other => Err(Error::command(format!("Unknown command: {other}"))),
//!     }
//! };
//! assert!(sink.on_command("ping").is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;

// ============================================================================
// CommandSink
// ============================================================================

/// Receives the text of each inbound message.
///
/// Called from the blocking thread pool, so implementations may block.
/// A returned error (or a panic) is reported only to the client that sent
/// the command, as `LOG:ERROR:<message>`.
pub trait CommandSink: Send + Sync + 'static {
    /// Handles one command.
    fn on_command(&self, command: &str) -> Result<()>;
}

impl<F> CommandSink for F
where
    F: Fn(&str) -> Result<()> + Send + Sync + 'static,
{
    fn on_command(&self, command: &str) -> Result<()> {
        self(command)
    }
}

/// Sink that accepts and ignores every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreCommands;

impl CommandSink for IgnoreCommands {
    fn on_command(&self, _command: &str) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::error::Error;

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = move |command: &str| -> Result<()> {
            seen_clone.lock().push(command.to_string());
            Ok(())
        };

        sink.on_command("status").unwrap();
        sink.on_command("help").unwrap();
        assert_eq!(*seen.lock(), vec!["status", "help"]);
    }

    #[test]
    fn test_sink_error_message() {
        let sink = |_: &str| -> Result<()> { Err(Error::command("nope")) };
        let err = sink.on_command("x").unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_ignore_commands() {
        assert!(IgnoreCommands.on_command("anything").is_ok());
    }
}
