//! Compilation of change events into ordered update plans
//!
//! A plan is a list of primitive add/delete operations that the updater
//! receives as a single script:
//!
//! | Event   | Forward plan                  |
//! |---------|-------------------------------|
//! | created | `[add(new)]`                  |
//! | updated | `[delete(old), add(new)]`     |
//! | deleted | `[delete(old)]`               |
//!
//! Delete always precedes add so a changed value never leaves two
//! conflicting entries in the RRset. Compilation is pure and never fails;
//! missing snapshots are caught by [`ChangeEvent::validate`] beforehand.

pub mod script;

use crate::error::Result;
use crate::record::{ChangeEvent, EventKind, RecordSnapshot, RecordType};

pub use script::render;

/// TTL used when an event carries none, or a non-positive one
pub const DEFAULT_TTL: u32 = 300;

/// One primitive dynamic-update operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOp {
    /// Add a record to the RRset at `name`
    Add {
        name: String,
        ttl: u32,
        record_type: RecordType,
        value: String,
    },
    /// Delete exactly the record with `value` from the RRset at `name`
    Delete {
        name: String,
        record_type: RecordType,
        value: String,
    },
}

impl UpdateOp {
    /// Owner name the operation applies to
    pub fn name(&self) -> &str {
        match self {
            UpdateOp::Add { name, .. } | UpdateOp::Delete { name, .. } => name,
        }
    }

    /// Record type the operation applies to
    pub fn record_type(&self) -> &RecordType {
        match self {
            UpdateOp::Add { record_type, .. } | UpdateOp::Delete { record_type, .. } => {
                record_type
            }
        }
    }

    /// Whether this is an add operation
    pub fn is_add(&self) -> bool {
        matches!(self, UpdateOp::Add { .. })
    }
}

/// Ordered, non-transactional list of operations for one script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Zone to declare, when known
    pub zone: Option<String>,
    /// Operations in issue order
    pub ops: Vec<UpdateOp>,
}

impl UpdatePlan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the zone to declare
    pub fn with_zone(mut self, zone: Option<String>) -> Self {
        self.zone = zone;
        self
    }

    /// Append an operation
    pub fn push(&mut self, op: UpdateOp) {
        self.ops.push(op);
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the plan has no operations
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Knobs that affect compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilePolicy {
    /// TTL applied when a snapshot has none
    pub default_ttl: u32,
}

impl Default for CompilePolicy {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
        }
    }
}

/// Provided TTL if present and positive, else `default`
pub fn effective_ttl(ttl: Option<i64>, default: u32) -> u32 {
    match ttl {
        // RFC 2181: TTLs are capped at 2^31 - 1
        Some(ttl) if ttl > 0 => ttl.min(i64::from(i32::MAX)) as u32,
        _ => default,
    }
}

/// Make a CNAME target absolute
///
/// Absolute values pass through. A relative value gets the record's zone
/// appended, the zone being the FQDN with the `owner_name.` prefix removed,
/// or the whole FQDN when that prefix is not found. The prefix is matched
/// case-insensitively, as DNS names are.
pub fn qualify_cname(value: &str, fqdn: &str, owner_name: Option<&str>) -> String {
    if value.ends_with('.') {
        return value.to_string();
    }

    let bare = fqdn.trim_end_matches('.');
    let zone = owner_name
        .filter(|owner| !owner.is_empty())
        .and_then(|owner| strip_prefix_ignore_case(bare, owner))
        .and_then(|rest| rest.strip_prefix('.'))
        .filter(|zone| !zone.is_empty())
        .unwrap_or(bare);

    format!("{}.{}.", value, zone)
}

fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &name[prefix.len()..])
}

/// Record value as it must appear in the script
fn normalized_value(snapshot: &RecordSnapshot) -> String {
    match snapshot.record_type {
        RecordType::Cname => qualify_cname(
            &snapshot.value,
            &snapshot.fqdn,
            snapshot.owner_name.as_deref(),
        ),
        _ => snapshot.value.clone(),
    }
}

fn add_op(snapshot: &RecordSnapshot, policy: &CompilePolicy) -> UpdateOp {
    UpdateOp::Add {
        name: snapshot.fqdn.clone(),
        ttl: effective_ttl(snapshot.ttl, policy.default_ttl),
        record_type: snapshot.record_type.clone(),
        value: normalized_value(snapshot),
    }
}

fn delete_op(snapshot: &RecordSnapshot) -> UpdateOp {
    UpdateOp::Delete {
        name: snapshot.fqdn.clone(),
        record_type: snapshot.record_type.clone(),
        value: normalized_value(snapshot),
    }
}

/// Compile the forward-record plan for one event
///
/// `before` is the old state (deleted/updated), `after` the new state
/// (created/updated). For created events pass the current record as
/// `after`. Each side deletes or adds under its own name and type, so for
/// an ordinary update both operations target the same RRset.
pub fn compile_forward(
    kind: EventKind,
    before: Option<&RecordSnapshot>,
    after: Option<&RecordSnapshot>,
    policy: &CompilePolicy,
) -> UpdatePlan {
    let mut plan = UpdatePlan::new();

    match kind {
        EventKind::Created => {
            if let Some(after) = after {
                plan.push(add_op(after, policy));
            }
        }
        EventKind::Deleted => {
            if let Some(before) = before {
                plan.push(delete_op(before));
            }
        }
        EventKind::Updated => {
            if let Some(before) = before {
                plan.push(delete_op(before));
            }
            if let Some(after) = after {
                plan.push(add_op(after, policy));
            }
        }
    }

    let zone = after
        .and_then(|s| s.zone_name.clone())
        .or_else(|| before.and_then(|s| s.zone_name.clone()));
    plan.with_zone(zone)
}

/// Validate `event` and compile its forward plan
pub fn compile_event(event: &ChangeEvent, policy: &CompilePolicy) -> Result<UpdatePlan> {
    event.validate()?;
    let after = match event.kind {
        EventKind::Created => event.current.as_ref(),
        _ => event.after.as_ref(),
    };
    Ok(compile_forward(event.kind, event.before.as_ref(), after, policy))
}

/// One side of a PTR synchronization: a reverse name and the forward
/// name it points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtrBinding {
    /// Reverse-lookup name (`...in-addr.arpa.` / `...ip6.arpa.`)
    pub ptr_name: String,
    /// Forward FQDN the PTR record points at
    pub target: String,
}

/// Compile the PTR plan from the old and new bindings
///
/// Returns `None` when neither side is present. When both are present the
/// old record is deleted before the new one is added, even if both live
/// under the same reverse name. PTR plans never declare a zone.
pub fn compile_ptr(
    old: Option<&PtrBinding>,
    new: Option<&PtrBinding>,
    ttl: u32,
) -> Option<UpdatePlan> {
    if old.is_none() && new.is_none() {
        return None;
    }

    let mut plan = UpdatePlan::new();
    if let Some(old) = old {
        plan.push(UpdateOp::Delete {
            name: old.ptr_name.clone(),
            record_type: RecordType::Ptr,
            value: old.target.clone(),
        });
    }
    if let Some(new) = new {
        plan.push(UpdateOp::Add {
            name: new.ptr_name.clone(),
            ttl,
            record_type: RecordType::Ptr,
            value: new.target.clone(),
        });
    }
    Some(plan)
}
