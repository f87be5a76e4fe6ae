// # dnshook-core
//
// Core library turning DNS record change notifications into ordered
// dynamic-update scripts.
//
// ## Architecture Overview
//
// - **payload / record**: Normalize webhook JSON into canonical snapshots
// - **compiler**: Build add/delete plans and render them as update scripts
// - **reverse**: Derive `in-addr.arpa.` / `ip6.arpa.` names
// - **locks**: Per-name mutual exclusion for forward and PTR names
// - **Orchestrator**: Spawns forward and PTR update tasks per event
// - **Updater**: Trait for applying scripts (`dnshook-nsupdate`, dry run)
// - **UpdaterRegistry**: Plugin-based registry for updaters
//
// ## Design Principles
//
// 1. **Acknowledge Early**: Validation is synchronous, updates run in the background
// 2. **Serialize Per Name**: Same-name updates never overlap; disjoint names run in parallel
// 3. **Best Effort**: Forward and PTR updates are independent; nothing is retried
// 4. **Plugin-Based**: Updaters are registered dynamically, no hard-coded if-else
// 5. **Library-First**: All core functionality can be used as a library

pub mod compiler;
pub mod config;
pub mod error;
pub mod locks;
pub mod orchestrator;
pub mod payload;
pub mod record;
pub mod registry;
pub mod reverse;
pub mod traits;
pub mod updater;

// Re-export core types for convenience
pub use compiler::{UpdateOp, UpdatePlan};
pub use config::{HookConfig, ServerAddress, UpdaterConfig};
pub use error::{Error, Result};
pub use locks::NameLockRegistry;
pub use orchestrator::{Dispatch, HookEvent, Orchestrator, UpdateTarget};
pub use payload::WebhookPayload;
pub use record::{ChangeEvent, EventKind, RecordSnapshot, RecordType};
pub use registry::UpdaterRegistry;
pub use traits::{UpdateRequest, Updater};
pub use updater::DryRunUpdater;
