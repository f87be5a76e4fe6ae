//! Core traits for the dnshook system
//!
//! - [`Updater`]: Apply a rendered update script to an authoritative server

pub mod updater;

pub use updater::{UpdateRequest, Updater, UpdaterFactory};
