//! Test doubles and common utilities for contract tests
//!
//! The recording updater tracks which names each script touches and how
//! many scripts are in flight, so tests can assert mutual exclusion and
//! parallelism without a real nameserver.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dnshook_core::error::{Error, Result};
use dnshook_core::traits::{UpdateRequest, Updater};
use dnshook_core::{HookConfig, Orchestrator, RecordSnapshot};

/// Updater that records every script and detects same-name overlap
pub struct RecordingUpdater {
    /// Scripts in the order `apply` was entered
    scripts: Arc<Mutex<Vec<String>>>,
    /// Number of scripts currently in flight, per name
    active: Arc<Mutex<HashMap<String, usize>>>,
    /// Times a script started while another held one of its names
    overlaps: Arc<AtomicUsize>,
    /// Scripts currently in flight, across all names
    in_flight: Arc<AtomicUsize>,
    /// Highest value `in_flight` reached
    max_in_flight: Arc<AtomicUsize>,
    /// Calls that ran to the end of `apply`
    completed: Arc<AtomicUsize>,
    /// Time each `apply` call takes
    delay: Duration,
    /// Scripts containing this text fail
    fail_on: Option<String>,
}

impl RecordingUpdater {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(Mutex::new(HashMap::new())),
            overlaps: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            fail_on: None,
        }
    }

    /// Make every `apply` call take `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every script containing `needle`
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    /// Create a new RecordingUpdater that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            scripts: Arc::clone(&other.scripts),
            active: Arc::clone(&other.active),
            overlaps: Arc::clone(&other.overlaps),
            in_flight: Arc::clone(&other.in_flight),
            max_in_flight: Arc::clone(&other.max_in_flight),
            completed: Arc::clone(&other.completed),
            delay: other.delay,
            fail_on: other.fail_on.clone(),
        }
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Scripts that touch `name`
    pub fn scripts_for(&self, name: &str) -> Vec<String> {
        self.scripts()
            .into_iter()
            .filter(|script| names_in(script).iter().any(|n| n == name))
            .collect()
    }
}

#[async_trait::async_trait]
impl Updater for RecordingUpdater {
    async fn apply(&self, request: &UpdateRequest) -> Result<()> {
        let names = names_in(&request.script);

        {
            let mut active = self.active.lock().unwrap();
            for name in &names {
                let count = active.entry(name.clone()).or_insert(0);
                if *count > 0 {
                    self.overlaps.fetch_add(1, Ordering::SeqCst);
                }
                *count += 1;
            }
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.scripts.lock().unwrap().push(request.script.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        {
            let mut active = self.active.lock().unwrap();
            for name in &names {
                if let Some(count) = active.get_mut(name) {
                    *count -= 1;
                }
            }
        }

        match &self.fail_on {
            Some(needle) if request.script.contains(needle.as_str()) => {
                Err(Error::updater("recording", "update failed: REFUSED"))
            }
            _ => Ok(()),
        }
    }

    fn updater_name(&self) -> &'static str {
        "recording"
    }
}

/// Distinct owner names touched by a script's `update` lines
pub fn names_in(script: &str) -> Vec<String> {
    let mut names: Vec<String> = script
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some("update"), Some(_), Some(name)) => Some(name.to_string()),
                _ => None,
            }
        })
        .collect();
    names.dedup();
    names
}

/// Orchestrator wired to `updater` with default configuration
pub fn orchestrator_with(updater: &RecordingUpdater) -> Orchestrator {
    let shared = RecordingUpdater::sharing_counters_with(updater);
    let (orchestrator, _events) = Orchestrator::new(Arc::new(shared), &HookConfig::new())
        .expect("orchestrator construction succeeds");
    orchestrator
}

pub fn a_record(fqdn: &str, ip: &str) -> RecordSnapshot {
    RecordSnapshot::new(fqdn, "A", ip).expect("valid A record")
}

pub fn aaaa_record(fqdn: &str, ip: &str) -> RecordSnapshot {
    RecordSnapshot::new(fqdn, "AAAA", ip).expect("valid AAAA record")
}

pub fn txt_record(fqdn: &str, text: &str) -> RecordSnapshot {
    RecordSnapshot::new(fqdn, "TXT", text).expect("valid TXT record")
}
