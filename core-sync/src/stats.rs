//! Run identity and outcome accounting.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One item that could not be brought up to date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: String,
    pub name: String,
    pub message: String,
}

/// Counters accumulated over a run, plus enough detail to render a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStats {
    pub run_id: SyncRunId,
    pub targets_crawled: u32,
    pub targets_failed: u32,
    pub items_added: u64,
    pub items_updated: u64,
    pub items_deleted: u64,
    pub items_failed: u64,
    /// Items excluded by the freshness threshold or without a supported
    /// output format.
    pub items_skipped: u64,
    /// Successful items broken down by source kind.
    pub by_kind: BTreeMap<String, u64>,
    pub failures: Vec<ItemFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncStats {
    pub fn new(run_id: SyncRunId) -> Self {
        Self {
            run_id,
            targets_crawled: 0,
            targets_failed: 0,
            items_added: 0,
            items_updated: 0,
            items_deleted: 0,
            items_failed: 0,
            items_skipped: 0,
            by_kind: BTreeMap::new(),
            failures: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_success(&mut self, kind: &str, was_update: bool) {
        if was_update {
            self.items_updated += 1;
        } else {
            self.items_added += 1;
        }
        *self.by_kind.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self, id: &str, name: &str, message: String) {
        self.items_failed += 1;
        self.failures.push(ItemFailure {
            id: id.to_string(),
            name: name.to_string(),
            message,
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_secs(&self) -> i64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_seconds())
            .unwrap_or(0)
    }

    /// Render the run as a markdown report suitable for a chat channel.
    pub fn markdown(&self) -> String {
        let mut out = String::from("### Document sync report\n");
        out.push_str(&format!("- Run: `{}`\n", self.run_id));
        out.push_str(&format!("- Duration: {}s\n", self.duration_secs()));
        out.push_str(&format!(
            "- Targets: {} crawled, {} failed\n",
            self.targets_crawled, self.targets_failed
        ));
        out.push_str(&format!(
            "- Documents: {} added, {} updated, {} deleted\n",
            self.items_added, self.items_updated, self.items_deleted
        ));
        out.push_str(&format!(
            "- Skipped: {}, Failed: {}\n",
            self.items_skipped, self.items_failed
        ));
        if !self.by_kind.is_empty() {
            let breakdown: Vec<String> = self
                .by_kind
                .iter()
                .map(|(kind, count)| format!("{kind}={count}"))
                .collect();
            out.push_str(&format!("- By type: {}\n", breakdown.join(", ")));
        }
        if !self.failures.is_empty() {
            out.push_str("\n**Failures**\n");
            for failure in &self.failures {
                out.push_str(&format!(
                    "- {} ({}): {}\n",
                    failure.name, failure.id, failure.message
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(SyncRunId::new(), SyncRunId::new());
    }

    #[test]
    fn success_splits_added_and_updated() {
        let mut stats = SyncStats::new(SyncRunId::new());
        stats.record_success("doc", false);
        stats.record_success("doc", true);
        stats.record_success("sheet", true);
        assert_eq!(stats.items_added, 1);
        assert_eq!(stats.items_updated, 2);
        assert_eq!(stats.by_kind.get("doc"), Some(&2));
        assert_eq!(stats.by_kind.get("sheet"), Some(&1));

        stats.finish();
        assert!(stats.markdown().contains("doc=2, sheet=1"));
    }

    #[test]
    fn markdown_lists_failures() {
        let mut stats = SyncStats::new(SyncRunId::new());
        stats.record_failure("u1", "plan", "upload rejected".into());
        stats.finish();

        let report = stats.markdown();
        assert!(report.contains("### Document sync report"));
        assert!(report.contains("plan (u1): upload rejected"));
    }

    #[test]
    fn markdown_omits_failure_section_when_clean() {
        let mut stats = SyncStats::new(SyncRunId::new());
        stats.finish();
        assert!(!stats.markdown().contains("**Failures**"));
    }
}
