//! Built-in updater implementations
//!
//! - [`DryRunUpdater`]: logs scripts without sending them, optionally recording them
//!
//! Updaters that talk to real servers live in their own crates
//! (`dnshook-nsupdate`).

pub mod dry_run;

pub use dry_run::{DryRunFactory, DryRunUpdater};
