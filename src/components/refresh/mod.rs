//! Turns fresh calendar reads into armed triggers, once per interval.

mod reconcile;
mod runner;

pub use reconcile::{reconcile, PlannedTrigger};
pub use runner::{RefreshLoop, RefreshSettings};
