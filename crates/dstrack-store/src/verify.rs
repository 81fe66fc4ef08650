use std::collections::BTreeSet;

use dstrack_core::errors::TrackError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::schema::referenced_blobs;
use crate::store::TrackingStore;

/// Result of cross-checking the index against the object directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub missing: Vec<String>,
    pub corrupt: Vec<String>,
    /// Objects on disk no artifact points at.
    pub orphaned: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.corrupt.is_empty()
    }
}

/// Re-hashes every referenced blob and lists unreferenced ones.
pub fn verify_store(store: &TrackingStore) -> Result<VerifyReport, TrackError> {
    let referenced = referenced_blobs(store.connection())?;
    let mut report = VerifyReport::default();
    for sha256 in &referenced {
        report.checked += 1;
        match store.blobs().verify(sha256) {
            Ok(_) => {}
            Err(err) if err.code() == "store.blob_missing" => report.missing.push(sha256.clone()),
            Err(err) if err.code() == "store.blob_corrupt" => report.corrupt.push(sha256.clone()),
            Err(err) => return Err(err),
        }
    }
    let referenced: BTreeSet<_> = referenced.into_iter().collect();
    report.orphaned = store
        .blobs()
        .list()?
        .into_iter()
        .filter(|sha| !referenced.contains(sha))
        .collect();
    if report.is_clean() {
        info!(checked = report.checked, orphaned = report.orphaned.len(), "store verified");
    } else {
        warn!(
            missing = report.missing.len(),
            corrupt = report.corrupt.len(),
            "store verification found problems"
        );
    }
    Ok(report)
}

/// Deletes orphaned objects and returns how many were removed.
pub fn prune_orphans(store: &TrackingStore, report: &VerifyReport) -> Result<usize, TrackError> {
    let mut removed = 0;
    for sha256 in &report.orphaned {
        if store.blobs().remove(sha256)? {
            removed += 1;
        }
    }
    Ok(removed)
}
