//! PTR Synchronization
//!
//! Keeps the reverse-lookup record of an A/AAAA record in step with it.
//!
//! A side (old or new) participates when its snapshot is an address record
//! with PTR enabled:
//!
//! | Event   | Old side        | New side        |
//! |---------|-----------------|-----------------|
//! | created | -               | current         |
//! | deleted | before          | -               |
//! | updated | before, if any  | after           |
//!
//! So in an update, enabled → disabled only deletes the old PTR and
//! disabled → enabled only adds the new one.
//!
//! ## Lock Ordering
//!
//! Both PTR names are taken through `NameLockRegistry::acquire_ordered`,
//! once each, in ascending name order. Two updates swapping the same pair of
//! addresses therefore cannot deadlock.

use tracing::debug;

use crate::compiler::{effective_ttl, CompilePolicy, PtrBinding};
use crate::record::{EventKind, RecordSnapshot};
use crate::reverse::reverse_name;

/// One side of a PTR synchronization before name resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtrSide {
    /// Address the reverse name is derived from
    pub ip: String,
    /// Forward FQDN the PTR record points at
    pub fqdn: String,
}

impl PtrSide {
    fn of(snapshot: &RecordSnapshot) -> Option<Self> {
        snapshot.wants_ptr().then(|| Self {
            ip: snapshot.value.clone(),
            fqdn: snapshot.fqdn.clone(),
        })
    }

    /// Derive the reverse name, or `None` when the value is not an IP
    pub fn resolve(&self) -> Option<PtrBinding> {
        match reverse_name(&self.ip) {
            Ok(ptr_name) => Some(PtrBinding {
                ptr_name,
                target: self.fqdn.clone(),
            }),
            Err(e) => {
                debug!(fqdn = %self.fqdn, error = %e, "Dropping PTR side with invalid address");
                None
            }
        }
    }
}

/// Work description for one PTR task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtrSync {
    /// Record whose PTR goes away
    pub old: Option<PtrSide>,
    /// Record whose PTR is added
    pub new: Option<PtrSide>,
    /// TTL for the added PTR record
    pub ttl: u32,
}

impl PtrSync {
    /// Decide whether an event needs PTR work, and for which sides
    ///
    /// Returns `None` when no side participates.
    pub fn for_event(
        kind: EventKind,
        before: Option<&RecordSnapshot>,
        after: Option<&RecordSnapshot>,
        policy: &CompilePolicy,
    ) -> Option<Self> {
        let (old, new) = match kind {
            EventKind::Created => (None, after.and_then(PtrSide::of)),
            EventKind::Deleted => (before.and_then(PtrSide::of), None),
            EventKind::Updated => (before.and_then(PtrSide::of), after.and_then(PtrSide::of)),
        };

        if old.is_none() && new.is_none() {
            return None;
        }

        let ttl = after
            .or(before)
            .map(|s| effective_ttl(s.ttl, policy.default_ttl))
            .unwrap_or(policy.default_ttl);

        Some(Self { old, new, ttl })
    }

    /// Resolve both sides to reverse names; invalid addresses drop their side
    pub fn bindings(&self) -> (Option<PtrBinding>, Option<PtrBinding>) {
        (
            self.old.as_ref().and_then(PtrSide::resolve),
            self.new.as_ref().and_then(PtrSide::resolve),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(value: &str) -> RecordSnapshot {
        RecordSnapshot::new("host.example.com.", "A", value).unwrap()
    }

    fn policy() -> CompilePolicy {
        CompilePolicy::default()
    }

    #[test]
    fn test_created_address_record_adds_ptr() {
        let current = a("10.5.199.71").with_ttl(Some(600));
        let sync = PtrSync::for_event(EventKind::Created, None, Some(&current), &policy()).unwrap();
        assert!(sync.old.is_none());
        assert_eq!(sync.ttl, 600);

        let (old, new) = sync.bindings();
        assert!(old.is_none());
        assert_eq!(
            new,
            Some(PtrBinding {
                ptr_name: "71.199.5.10.in-addr.arpa.".into(),
                target: "host.example.com.".into(),
            })
        );
    }

    #[test]
    fn test_non_address_and_disabled_records_skip_ptr() {
        let cname = RecordSnapshot::new("alias.example.com.", "CNAME", "host").unwrap();
        assert!(PtrSync::for_event(EventKind::Created, None, Some(&cname), &policy()).is_none());

        let disabled = a("10.0.0.1").with_disable_ptr(true);
        assert!(PtrSync::for_event(EventKind::Created, None, Some(&disabled), &policy()).is_none());
        assert!(PtrSync::for_event(EventKind::Deleted, Some(&disabled), None, &policy()).is_none());
    }

    #[test]
    fn test_update_toggling_disable_ptr() {
        let enabled_old = a("10.0.0.1");
        let disabled_new = a("10.0.0.2").with_disable_ptr(true);
        let sync = PtrSync::for_event(
            EventKind::Updated,
            Some(&enabled_old),
            Some(&disabled_new),
            &policy(),
        )
        .unwrap();
        assert!(sync.old.is_some());
        assert!(sync.new.is_none());

        let disabled_old = a("10.0.0.1").with_disable_ptr(true);
        let enabled_new = a("10.0.0.2");
        let sync = PtrSync::for_event(
            EventKind::Updated,
            Some(&disabled_old),
            Some(&enabled_new),
            &policy(),
        )
        .unwrap();
        assert!(sync.old.is_none());
        assert!(sync.new.is_some());

        assert!(
            PtrSync::for_event(
                EventKind::Updated,
                Some(&disabled_old),
                Some(&disabled_new),
                &policy()
            )
            .is_none()
        );
    }

    #[test]
    fn test_update_without_before_adds_only() {
        let after = a("10.0.0.2");
        let sync = PtrSync::for_event(EventKind::Updated, None, Some(&after), &policy()).unwrap();
        assert!(sync.old.is_none());
        assert!(sync.new.is_some());
    }

    #[test]
    fn test_invalid_addresses_drop_sides() {
        let sync = PtrSync {
            old: Some(PtrSide {
                ip: "not-an-ip".into(),
                fqdn: "host.example.com.".into(),
            }),
            new: Some(PtrSide {
                ip: "2001:db8::1".into(),
                fqdn: "host.example.com.".into(),
            }),
            ttl: 300,
        };

        let (old, new) = sync.bindings();
        assert!(old.is_none());
        assert!(new.unwrap().ptr_name.ends_with(".ip6.arpa."));
    }
}
