//! Reconciliation of variant calls from multiple callers.

pub mod calls;
pub mod ivar;
pub mod lofreq;
pub mod merge;
