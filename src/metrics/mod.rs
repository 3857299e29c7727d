//! Metrics related commands.

pub mod summarize;
