//! Update Script Rendering
//!
//! Renders an [`UpdatePlan`] as the line-oriented text accepted by
//! `nsupdate`:
//!
//! ```text
//! server 127.0.0.1 53
//! update delete test1.example.com. A 10.0.0.1
//! update add test1.example.com. 300 IN A 10.0.0.2
//! send
//! ```
//!
//! The whole plan is submitted as one message; there is no transaction
//! wrapper, so a partial failure is reported as a single updater error.

use std::fmt::Write;

use super::{UpdateOp, UpdatePlan};
use crate::config::ServerAddress;

/// Render `plan` as an update script addressed to `server`
///
/// A `zone` line is only emitted when `declare_zone` is set and the plan
/// knows its zone; otherwise the server infers the zone from the names.
pub fn render(plan: &UpdatePlan, server: &ServerAddress, declare_zone: bool) -> String {
    let mut script = String::with_capacity(64 + plan.len() * 64);

    // Writing to a String cannot fail
    let _ = writeln!(script, "server {} {}", server.host, server.port);

    if declare_zone {
        if let Some(zone) = &plan.zone {
            let _ = writeln!(script, "zone {}", zone);
        }
    }

    for op in &plan.ops {
        let _ = match op {
            UpdateOp::Delete {
                name,
                record_type,
                value,
            } => writeln!(script, "update delete {} {} {}", name, record_type, value),
            UpdateOp::Add {
                name,
                ttl,
                record_type,
                value,
            } => writeln!(
                script,
                "update add {} {} IN {} {}",
                name, ttl, record_type, value
            ),
        };
    }

    script.push_str("send\n");
    script
}
