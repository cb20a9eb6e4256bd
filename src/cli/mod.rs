//! Command implementations behind the `sheetfill` binary.

pub mod commands;
