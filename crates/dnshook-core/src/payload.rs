//! Webhook payload shapes and their normalization into [`ChangeEvent`]s
//!
//! The event source posts JSON of the form:
//!
//! ```json
//! {
//!   "event": "updated",
//!   "username": "admin",
//!   "request_id": "5b3c...",
//!   "timestamp": "2025-01-09T12:00:00Z",
//!   "data": {
//!     "id": 42, "name": "test1", "fqdn": "test1.example.com.",
//!     "type": "A", "value": "10.5.199.71", "ttl": 300,
//!     "disable_ptr": false, "zone": { "id": 1, "name": "example.com" },
//!     "status": "active"
//!   },
//!   "snapshots": { "prechange": { ... }, "postchange": { ... } }
//! }
//! ```
//!
//! Snapshots mirror `data`, except that their `zone` is usually a bare id.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::{ChangeEvent, EventKind, RecordSnapshot};

/// Top-level webhook payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// `created`, `updated` or `deleted` (any case)
    pub event: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub request_id: String,

    /// RFC 3339 timestamp; unparsable values are ignored
    #[serde(default)]
    pub timestamp: Option<String>,

    /// The record as currently stored
    #[serde(default)]
    pub data: Option<RecordData>,

    #[serde(default)]
    pub snapshots: Option<SnapshotsData>,
}

/// A record as carried in `data` or in a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordData {
    #[serde(default)]
    pub id: Option<u64>,

    /// Owner name relative to the zone
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub fqdn: String,

    #[serde(default, rename = "type")]
    pub record_type: String,

    #[serde(default)]
    pub value: String,

    #[serde(default)]
    pub ttl: Option<i64>,

    #[serde(default)]
    pub disable_ptr: bool,

    #[serde(default)]
    pub zone: Option<ZoneRef>,

    /// Free-form status (`active`, `true`, ...)
    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

/// Zone reference: an object in `data`, usually a bare id in snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZoneRef {
    Id(u64),
    Name(String),
    Object {
        #[serde(default)]
        id: Option<u64>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl ZoneRef {
    /// Zone id, if this reference carries one
    pub fn id(&self) -> Option<u64> {
        match self {
            ZoneRef::Id(id) => Some(*id),
            ZoneRef::Object { id, .. } => *id,
            ZoneRef::Name(_) => None,
        }
    }

    /// Zone name, if this reference carries one
    pub fn name(&self) -> Option<&str> {
        match self {
            ZoneRef::Name(name) => Some(name.as_str()),
            ZoneRef::Object { name, .. } => name.as_deref(),
            ZoneRef::Id(_) => None,
        }
        .filter(|n| !n.is_empty())
    }
}

/// Pre- and post-change snapshots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotsData {
    #[serde(default)]
    pub prechange: Option<RecordData>,

    #[serde(default)]
    pub postchange: Option<RecordData>,
}

impl RecordSnapshot {
    /// Build a snapshot from the `data` object of a payload
    pub fn from_current(data: &RecordData) -> Result<Self> {
        let zone_name = data.zone.as_ref().and_then(ZoneRef::name).map(str::to_string);
        Self::from_record_data(data, zone_name)
    }

    /// Build a snapshot from a `prechange`/`postchange` entry
    ///
    /// Snapshots usually reference their zone by id only. When `current`
    /// names the same zone (or the snapshot carries no zone at all) its name
    /// is borrowed so zone-aware scripts can still be produced.
    pub fn from_historical(snapshot: &RecordData, current: Option<&RecordData>) -> Result<Self> {
        let own_name = snapshot.zone.as_ref().and_then(ZoneRef::name);
        let zone_name = match own_name {
            Some(name) => Some(name.to_string()),
            None => current
                .and_then(|c| c.zone.as_ref())
                .filter(|cz| match snapshot.zone.as_ref().and_then(ZoneRef::id) {
                    Some(id) => cz.id() == Some(id),
                    None => true,
                })
                .and_then(ZoneRef::name)
                .map(str::to_string),
        };
        Self::from_record_data(snapshot, zone_name)
    }

    fn from_record_data(data: &RecordData, zone_name: Option<String>) -> Result<Self> {
        let mut snapshot = RecordSnapshot::new(&data.fqdn, &data.record_type, &data.value)?
            .with_ttl(data.ttl)
            .with_disable_ptr(data.disable_ptr);

        snapshot.record_id = data.id;
        snapshot.owner_name = data.name.clone().filter(|n| !n.is_empty());
        snapshot.zone_name = zone_name;
        snapshot.status = data.status.as_ref().and_then(|status| match status {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        Ok(snapshot)
    }
}

impl WebhookPayload {
    /// Parse a raw request body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Normalize into a validated [`ChangeEvent`]
    ///
    /// Snapshots the event kind requires must be present and complete;
    /// optional ones that fail to parse are dropped.
    pub fn into_event(self) -> Result<ChangeEvent> {
        let kind = EventKind::from_str(&self.event)?;
        let data = self.data.as_ref();
        let snapshots = self.snapshots.unwrap_or_default();

        let current = match (kind, data) {
            (EventKind::Created, Some(data)) => Some(RecordSnapshot::from_current(data)?),
            (EventKind::Created, None) => {
                return Err(Error::validation("created event is missing its record data"));
            }
            (_, Some(data)) => optional(RecordSnapshot::from_current(data), "data"),
            (_, None) => None,
        };

        let before = match (kind, snapshots.prechange.as_ref()) {
            (EventKind::Deleted, Some(pre)) => Some(RecordSnapshot::from_historical(pre, data)?),
            (_, Some(pre)) => optional(RecordSnapshot::from_historical(pre, data), "prechange"),
            (_, None) => None,
        };

        let after = match (kind, snapshots.postchange.as_ref()) {
            (EventKind::Updated, Some(post)) => {
                Some(RecordSnapshot::from_historical(post, data)?)
            }
            (_, Some(post)) => optional(RecordSnapshot::from_historical(post, data), "postchange"),
            (_, None) => None,
        };

        let event = ChangeEvent {
            kind,
            actor: self.username,
            correlation_id: self.request_id,
            occurred_at: self
                .timestamp
                .as_deref()
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|ts| ts.with_timezone(&Utc)),
            current,
            before,
            after,
        };

        event.validate()?;
        Ok(event)
    }
}

fn optional(snapshot: Result<RecordSnapshot>, which: &str) -> Option<RecordSnapshot> {
    match snapshot {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            debug!(snapshot = which, error = %e, "Ignoring incomplete optional snapshot");
            None
        }
    }
}
