//! Event orchestrator
//!
//! The Orchestrator turns a validated [`ChangeEvent`] into background
//! update tasks:
//! - Validates the event and compiles the forward plan synchronously
//! - Spawns the forward task (lock name → apply script → release)
//! - Spawns an independent PTR task for A/AAAA records
//! - Publishes outcomes as [`HookEvent`]s
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────┐
//!  ChangeEvent ────▶ │ Orchestrator │── Dispatch (ack) ──▶ caller
//!                    └──────────────┘
//!                      │          │
//!            spawn     ▼          ▼    spawn
//!            ┌──────────────┐ ┌──────────────┐
//!            │ forward task │ │   PTR task   │
//!            └──────────────┘ └──────────────┘
//!                      │          │
//!                      ▼          ▼
//!             NameLockRegistry → Updater → HookEvent
//! ```
//!
//! The two tasks are not ordered with respect to each other, and a failed
//! forward update does not prevent the PTR update. Nothing is retried.
//!
//! ## Shutdown
//!
//! Spawned tasks are counted until they finish. [`Orchestrator::shutdown`]
//! refuses further events and waits for that count to reach zero, so an
//! accepted event is never abandoned halfway through its script.

pub mod ptr;

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::compiler::{self, CompilePolicy, UpdatePlan};
use crate::config::{HookConfig, ServerAddress};
use crate::error::{Error, Result};
use crate::locks::NameLockRegistry;
use crate::record::{ChangeEvent, EventKind};
use crate::traits::{UpdateRequest, Updater};

pub use ptr::{PtrSide, PtrSync};

/// Which record an update task maintains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTarget {
    /// The forward record named in the event
    Forward,
    /// The companion reverse-lookup record
    Ptr,
}

impl UpdateTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateTarget::Forward => "forward",
            UpdateTarget::Ptr => "ptr",
        }
    }
}

/// Events emitted by the Orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    /// Event validated and tasks spawned
    Accepted {
        kind: EventKind,
        fqdn: String,
        correlation_id: String,
        ptr_scheduled: bool,
    },

    /// Script accepted by the updater
    UpdateApplied {
        target: UpdateTarget,
        kind: EventKind,
        names: Vec<String>,
        correlation_id: String,
    },

    /// Script rejected or updater unavailable
    UpdateFailed {
        target: UpdateTarget,
        kind: EventKind,
        names: Vec<String>,
        correlation_id: String,
        error: String,
    },

    /// PTR work scheduled but neither side had a valid address
    PtrSkipped {
        kind: EventKind,
        fqdn: String,
        correlation_id: String,
    },
}

/// Acknowledgment of a dispatched event
///
/// Dropping it detaches the tasks; they still run to completion.
#[derive(Debug)]
pub struct Dispatch {
    /// Forward-record task
    pub forward: JoinHandle<Result<()>>,
    /// PTR task, when the record participates in PTR synchronization
    pub ptr: Option<JoinHandle<Result<()>>>,
}

/// Results of both tasks of one dispatch
#[derive(Debug)]
pub struct DispatchOutcome {
    pub forward: Result<()>,
    pub ptr: Option<Result<()>>,
}

impl Dispatch {
    /// Wait for every spawned task
    pub async fn wait(self) -> DispatchOutcome {
        let forward = joined(self.forward.await);
        let ptr = match self.ptr {
            Some(handle) => Some(joined(handle.await)),
            None => None,
        };
        DispatchOutcome { forward, ptr }
    }
}

fn joined(result: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    result.map_err(|e| Error::Other(format!("update task aborted: {}", e)))?
}

/// Identity of the event carried into each task for logging
#[derive(Debug, Clone)]
struct EventContext {
    kind: EventKind,
    fqdn: String,
    actor: String,
    correlation_id: String,
    record_id: Option<u64>,
}

/// Admission state of the orchestrator
#[derive(Debug, Clone, Copy, Default)]
struct Lifecycle {
    /// Set once shutdown begins; no event is accepted afterwards
    closing: bool,
    /// Spawned tasks that have not finished
    in_flight: usize,
}

/// Held by each spawned task; dropping it (return or panic) marks the task
/// finished
struct TaskGuard {
    shared: Arc<Shared>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.shared
            .lifecycle
            .send_modify(|state| state.in_flight = state.in_flight.saturating_sub(1));
    }
}

/// State shared by the orchestrator and every task it spawns
struct Shared {
    updater: Arc<dyn Updater>,
    locks: NameLockRegistry,
    server: ServerAddress,
    key_ref: Option<String>,
    policy: CompilePolicy,
    declare_zone: bool,
    event_tx: mpsc::Sender<HookEvent>,
    lifecycle: watch::Sender<Lifecycle>,
}

impl Shared {
    fn emit_event(&self, event: HookEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(TrySendError::Closed(_)) => {}
        }
    }

    fn request(&self, plan: &UpdatePlan, declare_zone: bool) -> UpdateRequest {
        UpdateRequest::new(
            compiler::render(plan, &self.server, declare_zone),
            self.server.clone(),
            self.key_ref.clone(),
        )
    }

    /// Submit one plan and report the outcome
    async fn submit(
        &self,
        target: UpdateTarget,
        ctx: &EventContext,
        names: Vec<String>,
        request: UpdateRequest,
    ) -> Result<()> {
        debug!(
            update = target.as_str(),
            event = %ctx.kind,
            correlation_id = %ctx.correlation_id,
            script = %request.script,
            "Submitting update script"
        );

        match self.updater.apply(&request).await {
            Ok(()) => {
                info!(
                    update = target.as_str(),
                    event = %ctx.kind,
                    names = ?names,
                    actor = %ctx.actor,
                    correlation_id = %ctx.correlation_id,
                    record_id = ?ctx.record_id,
                    "DNS update applied"
                );
                self.emit_event(HookEvent::UpdateApplied {
                    target,
                    kind: ctx.kind,
                    names,
                    correlation_id: ctx.correlation_id.clone(),
                });
                Ok(())
            }
            Err(e) => {
                error!(
                    update = target.as_str(),
                    event = %ctx.kind,
                    names = ?names,
                    actor = %ctx.actor,
                    correlation_id = %ctx.correlation_id,
                    record_id = ?ctx.record_id,
                    updater = self.updater.updater_name(),
                    error = %e,
                    "DNS update failed"
                );
                self.emit_event(HookEvent::UpdateFailed {
                    target,
                    kind: ctx.kind,
                    names,
                    correlation_id: ctx.correlation_id.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

/// Event orchestrator
///
/// Cloning is cheap; clones share the updater, the lock registry and the
/// event channel.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// # Returns
    ///
    /// A tuple of (orchestrator, event_receiver) where event_receiver yields
    /// task outcomes
    pub fn new(
        updater: Arc<dyn Updater>,
        config: &HookConfig,
    ) -> Result<(Self, mpsc::Receiver<HookEvent>)> {
        Self::with_locks(updater, config, NameLockRegistry::new())
    }

    /// Create an orchestrator sharing an existing lock registry
    pub fn with_locks(
        updater: Arc<dyn Updater>,
        config: &HookConfig,
        locks: NameLockRegistry,
    ) -> Result<(Self, mpsc::Receiver<HookEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let shared = Shared {
            updater,
            locks,
            server: config.server.clone(),
            key_ref: config.updater.key_ref().map(str::to_string),
            policy: config.compile_policy(),
            declare_zone: config.declare_zone,
            event_tx: tx,
            lifecycle: watch::Sender::new(Lifecycle::default()),
        };

        Ok((
            Self {
                shared: Arc::new(shared),
            },
            rx,
        ))
    }

    /// The lock registry used by this orchestrator
    pub fn locks(&self) -> &NameLockRegistry {
        &self.shared.locks
    }

    /// Update tasks spawned but not yet finished
    pub fn in_flight(&self) -> usize {
        self.shared.lifecycle.borrow().in_flight
    }

    /// Whether shutdown has begun
    pub fn is_closing(&self) -> bool {
        self.shared.lifecycle.borrow().closing
    }

    /// Stop accepting events and wait for every spawned task to finish
    ///
    /// Later calls to [`dispatch`](Self::dispatch) fail with
    /// [`Error::ShuttingDown`]. Tasks already running, including updater
    /// processes mid-script, are left to complete.
    pub async fn shutdown(&self) {
        self.shared.lifecycle.send_modify(|state| state.closing = true);

        let pending = self.in_flight();
        if pending > 0 {
            info!(pending, "Waiting for in-flight updates to finish");
        }

        let mut lifecycle = self.shared.lifecycle.subscribe();
        // The sender lives in `shared`, so the channel cannot close here
        let _ = lifecycle.wait_for(|state| state.in_flight == 0).await;

        debug!("All update tasks finished");
    }

    /// Count `tasks` new tasks, unless shutdown has begun
    fn admit(&self, tasks: usize) -> Result<()> {
        let mut admitted = false;
        self.shared.lifecycle.send_if_modified(|state| {
            if state.closing {
                return false;
            }
            state.in_flight += tasks;
            admitted = true;
            true
        });

        if admitted {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    fn guard(&self) -> TaskGuard {
        TaskGuard {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Validate `event`, spawn its update tasks and return immediately
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Returns
    ///
    /// - `Ok(Dispatch)`: Tasks spawned
    /// - `Err(Error)`: Validation failed or shutdown has begun; nothing was
    ///   spawned
    pub fn dispatch(&self, event: ChangeEvent) -> Result<Dispatch> {
        event.validate()?;

        let kind = event.kind;
        let (before, after) = match kind {
            EventKind::Created => (None, event.current),
            EventKind::Updated => (event.before, event.after),
            EventKind::Deleted => (event.before, None),
        };

        let subject = after
            .as_ref()
            .or(before.as_ref())
            .ok_or_else(|| Error::missing_snapshot(format!("{} event has no record", kind)))?;

        let ctx = EventContext {
            kind,
            fqdn: subject.fqdn.clone(),
            actor: event.actor,
            correlation_id: event.correlation_id,
            record_id: subject.record_id,
        };

        let plan = compiler::compile_forward(kind, before.as_ref(), after.as_ref(), &self.shared.policy);
        let ptr = PtrSync::for_event(kind, before.as_ref(), after.as_ref(), &self.shared.policy);

        self.admit(if ptr.is_some() { 2 } else { 1 })?;

        info!(
            event = %kind,
            fqdn = %ctx.fqdn,
            record_type = %subject.record_type,
            actor = %ctx.actor,
            correlation_id = %ctx.correlation_id,
            record_id = ?ctx.record_id,
            ptr = ptr.is_some(),
            "Dispatching change event"
        );
        self.shared.emit_event(HookEvent::Accepted {
            kind,
            fqdn: ctx.fqdn.clone(),
            correlation_id: ctx.correlation_id.clone(),
            ptr_scheduled: ptr.is_some(),
        });

        let forward_names = (
            before.as_ref().map(|s| s.fqdn.clone()),
            after.as_ref().map(|s| s.fqdn.clone()),
        );
        let forward = tokio::spawn(run_forward(
            self.guard(),
            ctx.clone(),
            forward_names,
            plan,
        ));

        let ptr = ptr.map(|sync| tokio::spawn(run_ptr(self.guard(), ctx, sync)));

        Ok(Dispatch { forward, ptr })
    }
}

/// Forward task: lock the record name(s), apply, release
///
/// An ordinary update touches a single name; a rename holds both names,
/// taken in the same order PTR tasks use.
async fn run_forward(
    guard: TaskGuard,
    ctx: EventContext,
    (old, new): (Option<String>, Option<String>),
    plan: UpdatePlan,
) -> Result<()> {
    let shared = &guard.shared;
    let locks = shared.locks.acquire_ordered(old.as_deref(), new.as_deref()).await;
    let names = locks.names().into_iter().map(str::to_string).collect();

    let request = shared.request(&plan, shared.declare_zone);
    let result = shared.submit(UpdateTarget::Forward, &ctx, names, request).await;

    locks.release();
    result
}

/// PTR task: resolve reverse names, lock them, apply, release
async fn run_ptr(guard: TaskGuard, ctx: EventContext, sync: PtrSync) -> Result<()> {
    let shared = &guard.shared;
    let (old, new) = sync.bindings();

    let Some(plan) = compiler::compile_ptr(old.as_ref(), new.as_ref(), sync.ttl) else {
        info!(
            event = %ctx.kind,
            fqdn = %ctx.fqdn,
            correlation_id = %ctx.correlation_id,
            "Skipping PTR update: no valid IP on either side"
        );
        shared.emit_event(HookEvent::PtrSkipped {
            kind: ctx.kind,
            fqdn: ctx.fqdn.clone(),
            correlation_id: ctx.correlation_id.clone(),
        });
        return Ok(());
    };

    let locks = shared
        .locks
        .acquire_ordered(
            old.as_ref().map(|b| b.ptr_name.as_str()),
            new.as_ref().map(|b| b.ptr_name.as_str()),
        )
        .await;
    let names = locks.names().into_iter().map(str::to_string).collect();

    // Reverse zones are always inferred by the server
    let request = shared.request(&plan, false);
    let result = shared.submit(UpdateTarget::Ptr, &ctx, names, request).await;

    locks.release();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordSnapshot;
    use crate::updater::DryRunUpdater;

    fn orchestrator() -> (Orchestrator, DryRunUpdater, mpsc::Receiver<HookEvent>) {
        let updater = DryRunUpdater::new();
        let (orchestrator, rx) =
            Orchestrator::new(Arc::new(updater.clone()), &HookConfig::new()).unwrap();
        (orchestrator, updater, rx)
    }

    #[tokio::test]
    async fn test_created_a_record_dispatches_forward_and_ptr() {
        let (orchestrator, updater, mut rx) = orchestrator();
        let current = RecordSnapshot::new("test1.example.com", "A", "10.5.199.71").unwrap();

        let dispatch = orchestrator
            .dispatch(ChangeEvent::created(current).with_origin("admin", "req-1"))
            .unwrap();
        assert!(dispatch.ptr.is_some());

        let outcome = dispatch.wait().await;
        outcome.forward.unwrap();
        outcome.ptr.unwrap().unwrap();

        let mut scripts = updater.scripts().await;
        scripts.sort();
        assert_eq!(
            scripts,
            vec![
                "server 127.0.0.1 53\nupdate add 71.199.5.10.in-addr.arpa. 300 IN PTR test1.example.com.\nsend\n",
                "server 127.0.0.1 53\nupdate add test1.example.com. 300 IN A 10.5.199.71\nsend\n",
            ]
        );

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            HookEvent::Accepted { kind: EventKind::Created, ptr_scheduled: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_event_spawns_nothing() {
        let (orchestrator, updater, mut rx) = orchestrator();
        let mut event =
            ChangeEvent::deleted(RecordSnapshot::new("a.example.com.", "A", "10.0.0.1").unwrap());
        event.before = None;

        assert!(matches!(orchestrator.dispatch(event), Err(Error::MissingSnapshot(_))));
        assert!(updater.is_empty().await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ptr_with_invalid_address_is_skipped() {
        let (orchestrator, updater, mut rx) = orchestrator();
        // AAAA value that is not an address still yields a forward update
        let current = RecordSnapshot::new("v6.example.com.", "AAAA", "bogus").unwrap();

        let outcome = orchestrator
            .dispatch(ChangeEvent::created(current))
            .unwrap()
            .wait()
            .await;
        outcome.forward.unwrap();
        outcome.ptr.unwrap().unwrap();

        assert_eq!(updater.len().await, 1);

        let mut skipped = false;
        while let Ok(event) = rx.try_recv() {
            skipped |= matches!(event, HookEvent::PtrSkipped { .. });
        }
        assert!(skipped);
    }

    #[tokio::test]
    async fn test_declare_zone_applies_to_forward_only() {
        let updater = DryRunUpdater::new();
        let mut config = HookConfig::new();
        config.declare_zone = true;
        let (orchestrator, _rx) = Orchestrator::new(Arc::new(updater.clone()), &config).unwrap();

        let current = RecordSnapshot::new("a.example.com.", "A", "10.0.0.1")
            .unwrap()
            .with_zone_name("example.com");
        let outcome = orchestrator
            .dispatch(ChangeEvent::created(current))
            .unwrap()
            .wait()
            .await;
        outcome.forward.unwrap();
        outcome.ptr.unwrap().unwrap();

        let scripts = updater.scripts().await;
        assert_eq!(scripts.iter().filter(|s| s.contains("\nzone example.com\n")).count(), 1);
        assert!(scripts.iter().any(|s| s.contains("in-addr.arpa.") && !s.contains("zone ")));
    }

    #[tokio::test]
    async fn test_key_ref_travels_with_request() {
        let updater = DryRunUpdater::new();
        let (orchestrator, _rx) = Orchestrator::new(Arc::new(updater.clone()), &HookConfig::new()).unwrap();

        let current = RecordSnapshot::new("a.example.com.", "TXT", "\"hello\"").unwrap();
        let dispatch = orchestrator.dispatch(ChangeEvent::created(current)).unwrap();
        assert!(dispatch.ptr.is_none());
        dispatch.wait().await.forward.unwrap();

        let requests = updater.requests().await;
        assert_eq!(requests[0].key_ref.as_deref(), Some(crate::config::DEFAULT_KEY_FILE));
    }
}
