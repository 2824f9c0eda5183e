// Commands module - Command Pattern implementation
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

mod command;
mod router;

// Individual command implementations
mod check;
mod monitor;

pub use command::Command;
pub use router::CommandRouter;

// Re-export individual commands for testing purposes
pub use check::{CheckCommand, CheckReport};
pub use monitor::MonitorCommand;
