//! Owned cache of the last LoRA scan.
//!
//! Nothing refreshes automatically; callers either force a rescan with
//! [`LoraLibrary::refresh`] or state how old a snapshot they will accept.

use crate::scanner::{self, ScanOptions, ScanOutcome};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug)]
pub struct LoraLibrary {
    root: PathBuf,
    options: ScanOptions,
    cached: Option<ScanOutcome>,
    last_scan: Option<DateTime<Local>>,
}

impl LoraLibrary {
    pub fn new(root: impl Into<PathBuf>, options: ScanOptions) -> Self {
        Self {
            root: root.into(),
            options,
            cached: None,
            last_scan: None,
        }
    }

    pub fn last_scan(&self) -> Option<DateTime<Local>> {
        self.last_scan
    }

    /// Rescans the directory unconditionally and replaces the cached result.
    pub fn refresh(&mut self) -> &ScanOutcome {
        let outcome = scanner::scan_library(&self.root, &self.options);
        self.last_scan = Some(Local::now());
        self.cached.insert(outcome)
    }

    /// Returns the cached result if it is younger than `max_age`, rescanning otherwise.
    pub fn snapshot_within(&mut self, max_age: Duration) -> &ScanOutcome {
        if !self.is_fresh(max_age) {
            self.refresh();
        }
        self.cached
            .get_or_insert_with(|| scanner::scan_library(&self.root, &self.options))
    }

    pub fn cached(&self) -> Option<&ScanOutcome> {
        self.cached.as_ref()
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        let Some(last_scan) = self.last_scan else {
            return false;
        };
        if self.cached.is_none() {
            return false;
        }
        let age = Local::now().signed_duration_since(last_scan);
        age.to_std().map(|age| age <= max_age).unwrap_or(true)
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
        self.last_scan = None;
    }
}
