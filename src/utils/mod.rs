// Utils module - Utility functions
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

pub mod clock;
pub mod network;
