//! Record Model
//!
//! Canonical, payload-independent view of DNS records and the change events
//! that mutate them.
//!
//! - `RecordType`: record type with A/AAAA classification
//! - `RecordSnapshot`: one forward record's observable state at a moment
//! - `EventKind` / `ChangeEvent`: one notified mutation with its snapshots
//!
//! Snapshots are immutable once built. Payload-shape handling lives in
//! `crate::payload`; this module only knows the canonical form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// DNS record type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Canonical name record
    Cname,
    /// Reverse-lookup pointer record
    Ptr,
    /// Text record
    Txt,
    /// Mail exchanger record
    Mx,
    /// Any other type, kept verbatim in upper case
    Other(String),
}

impl RecordType {
    /// Whether this is an address record (A or AAAA), i.e. one that owns a PTR
    pub fn is_address(&self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }

    /// Presentation-format mnemonic
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Ptr => "PTR",
            RecordType::Txt => "TXT",
            RecordType::Mx => "MX",
            RecordType::Other(name) => name,
        }
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let record_type = match upper.as_str() {
            "" => return Err(Error::validation("record type cannot be empty")),
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "CNAME" => RecordType::Cname,
            "PTR" => RecordType::Ptr,
            "TXT" => RecordType::Txt,
            "MX" => RecordType::Mx,
            _ => RecordType::Other(upper),
        };
        Ok(record_type)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One forward DNS record's state at a given moment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSnapshot {
    /// Record id assigned by the event source (logging only)
    pub record_id: Option<u64>,
    /// Owner name relative to the zone (e.g. `alias` for `alias.example.com.`)
    pub owner_name: Option<String>,
    /// Absolute owner name, always ending with `.`
    pub fqdn: String,
    /// Record type
    pub record_type: RecordType,
    /// RDATA in presentation format (an IP literal, a target name, ...)
    pub value: String,
    /// TTL as reported by the event source; non-positive means "use default"
    pub ttl: Option<i64>,
    /// Whether PTR synchronization is disabled for this record
    pub disable_ptr: bool,
    /// Zone name, when the event shape carries one
    pub zone_name: Option<String>,
    /// Record status (informational)
    pub status: Option<String>,
}

impl RecordSnapshot {
    /// Build a snapshot from its mandatory fields
    ///
    /// The FQDN is made absolute and the type parsed; empty fields are a
    /// validation error.
    pub fn new(fqdn: &str, record_type: &str, value: &str) -> Result<Self> {
        let fqdn = fqdn.trim();
        if fqdn.is_empty() {
            return Err(Error::validation("record fqdn cannot be empty"));
        }
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::validation(format!(
                "record value cannot be empty for {}",
                fqdn
            )));
        }

        Ok(Self {
            record_id: None,
            owner_name: None,
            fqdn: absolute(fqdn),
            record_type: record_type.parse()?,
            value: value.to_string(),
            ttl: None,
            disable_ptr: false,
            zone_name: None,
            status: None,
        })
    }

    /// Set the raw TTL
    pub fn with_ttl(mut self, ttl: Option<i64>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the PTR-disable flag
    pub fn with_disable_ptr(mut self, disable_ptr: bool) -> Self {
        self.disable_ptr = disable_ptr;
        self
    }

    /// Set the owner name relative to the zone
    pub fn with_owner_name(mut self, owner_name: impl Into<String>) -> Self {
        self.owner_name = Some(owner_name.into());
        self
    }

    /// Set the zone name
    pub fn with_zone_name(mut self, zone_name: impl Into<String>) -> Self {
        self.zone_name = Some(zone_name.into());
        self
    }

    /// Set the record id
    pub fn with_record_id(mut self, record_id: u64) -> Self {
        self.record_id = Some(record_id);
        self
    }

    /// Whether this snapshot owns a PTR record that must be kept in sync
    pub fn wants_ptr(&self) -> bool {
        self.record_type.is_address() && !self.disable_ptr
    }
}

/// Append the root label if the name is relative
pub(crate) fn absolute(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// Kind of notified mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    /// Lower-case name used in logs and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
        }
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(EventKind::Created),
            "updated" => Ok(EventKind::Updated),
            "deleted" => Ok(EventKind::Deleted),
            _ => Err(Error::unsupported_event(s)),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notified record mutation
///
/// Which snapshots are required depends on the kind; see [`ChangeEvent::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened
    pub kind: EventKind,
    /// Who made the change
    pub actor: String,
    /// Request id from the event source, used to correlate log lines
    pub correlation_id: String,
    /// When the event source says the change happened
    pub occurred_at: Option<DateTime<Utc>>,
    /// The record as currently stored by the event source
    pub current: Option<RecordSnapshot>,
    /// State before the change (updated/deleted)
    pub before: Option<RecordSnapshot>,
    /// State after the change (updated)
    pub after: Option<RecordSnapshot>,
}

impl ChangeEvent {
    /// A created event for `current`
    pub fn created(current: RecordSnapshot) -> Self {
        Self::bare(EventKind::Created, Some(current), None, None)
    }

    /// An updated event moving from `before` to `after`
    pub fn updated(before: Option<RecordSnapshot>, after: RecordSnapshot) -> Self {
        Self::bare(EventKind::Updated, Some(after.clone()), before, Some(after))
    }

    /// A deleted event removing `before`
    pub fn deleted(before: RecordSnapshot) -> Self {
        Self::bare(EventKind::Deleted, None, Some(before), None)
    }

    fn bare(
        kind: EventKind,
        current: Option<RecordSnapshot>,
        before: Option<RecordSnapshot>,
        after: Option<RecordSnapshot>,
    ) -> Self {
        Self {
            kind,
            actor: String::new(),
            correlation_id: String::new(),
            occurred_at: None,
            current,
            before,
            after,
        }
    }

    /// Attach the actor and correlation id
    pub fn with_origin(mut self, actor: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        self.actor = actor.into();
        self.correlation_id = correlation_id.into();
        self
    }

    /// Check that the snapshots required by the event kind are present
    ///
    /// - created: `current`
    /// - updated: `after` with a non-empty fqdn (`before` is optional)
    /// - deleted: `before`
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            EventKind::Created => self.require(&self.current, "current record").map(|_| ()),
            EventKind::Updated => self.require(&self.after, "post-change snapshot").map(|_| ()),
            EventKind::Deleted => self.require(&self.before, "pre-change snapshot").map(|_| ()),
        }
    }

    /// The snapshot whose name identifies the forward record being changed
    pub fn subject(&self) -> Result<&RecordSnapshot> {
        match self.kind {
            EventKind::Created => self.require(&self.current, "current record"),
            EventKind::Updated => self.require(&self.after, "post-change snapshot"),
            EventKind::Deleted => self.require(&self.before, "pre-change snapshot"),
        }
    }

    fn require<'a>(
        &self,
        snapshot: &'a Option<RecordSnapshot>,
        what: &str,
    ) -> Result<&'a RecordSnapshot> {
        match snapshot {
            Some(s) if !s.fqdn.is_empty() && s.fqdn != "." => Ok(s),
            Some(_) => Err(Error::validation(format!(
                "{} event has an empty fqdn in its {}",
                self.kind, what
            ))),
            None => Err(Error::missing_snapshot(format!(
                "{} event is missing its {}",
                self.kind, what
            ))),
        }
    }
}
