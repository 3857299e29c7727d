//! Primer masking related commands.

pub mod complete_mask;
