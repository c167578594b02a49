//! # Run Configuration
//!
//! One validated configuration object for a whole sync run, translated into
//! the per-stage configs the pipeline crates consume. Validation is
//! fail-fast with actionable messages; a run never starts on a half-formed
//! configuration.

use std::path::PathBuf;

use chrono::{Days, Utc};
use core_crawl::CrawlConfig;
use core_export::ExportConfig;
use core_sync::ReconcileConfig;

use crate::error::{Error, Result};

/// Threshold that admits every item ever written: 2000-01-01T00:00:00Z.
pub const FULL_SYNC_EPOCH: i64 = 946_684_800;

/// Freshness threshold for a full re-sync.
pub fn full_sync_threshold() -> i64 {
    FULL_SYNC_EPOCH
}

/// Freshness threshold for a daily incremental run: midnight UTC of the
/// previous day, so a run late in the day still covers yesterday's edits.
pub fn incremental_threshold() -> i64 {
    let yesterday = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .unwrap_or_else(|| Utc::now().date_naive());
    yesterday
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(FULL_SYNC_EPOCH)
}

/// Validated configuration for one reconciliation run.
#[derive(Debug, Clone)]
pub struct SyncRunConfig {
    /// Root node ids to crawl.
    pub targets: Vec<String>,
    /// Items updated (epoch seconds) before this are left alone.
    pub min_update_ts: i64,
    /// Backing file for the source-to-destination id mapping.
    pub mapping_path: PathBuf,
    /// Ledger of completed downloads within a run.
    pub run_state_path: PathBuf,
    /// Directory receiving materialized files.
    pub download_dir: PathBuf,
    /// Base URL for canonical source links.
    pub canonical_url_base: String,
    /// Uploaded documents per parse trigger.
    pub parse_batch_size: usize,
    /// Listing page ceiling per crawled node.
    pub max_pages_per_node: u32,
}

impl SyncRunConfig {
    pub fn builder() -> SyncRunConfigBuilder {
        SyncRunConfigBuilder::default()
    }

    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            max_pages_per_node: self.max_pages_per_node,
        }
    }

    pub fn export_config(&self) -> ExportConfig {
        ExportConfig::new(self.download_dir.clone(), self.run_state_path.clone())
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            targets: self.targets.clone(),
            min_update_ts: self.min_update_ts,
            canonical_url_base: self.canonical_url_base.clone(),
            parse_batch_size: self.parse_batch_size,
        }
    }
}

/// Builder with validation on `build`.
#[derive(Debug, Clone)]
pub struct SyncRunConfigBuilder {
    targets: Vec<String>,
    min_update_ts: i64,
    mapping_path: PathBuf,
    run_state_path: PathBuf,
    download_dir: PathBuf,
    canonical_url_base: Option<String>,
    parse_batch_size: usize,
    max_pages_per_node: u32,
}

impl Default for SyncRunConfigBuilder {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            min_update_ts: FULL_SYNC_EPOCH,
            mapping_path: PathBuf::from("id_mapping.json"),
            run_state_path: PathBuf::from("run-state.json"),
            download_dir: PathBuf::from("downloads"),
            canonical_url_base: None,
            parse_batch_size: 10,
            max_pages_per_node: 200,
        }
    }
}

impl SyncRunConfigBuilder {
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets.extend(targets.into_iter().map(Into::into));
        self
    }

    pub fn with_min_update_ts(mut self, ts: i64) -> Self {
        self.min_update_ts = ts;
        self
    }

    pub fn with_mapping_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mapping_path = path.into();
        self
    }

    pub fn with_run_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_state_path = path.into();
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_canonical_url_base(mut self, base: impl Into<String>) -> Self {
        self.canonical_url_base = Some(base.into());
        self
    }

    pub fn with_parse_batch_size(mut self, size: usize) -> Self {
        self.parse_batch_size = size;
        self
    }

    pub fn with_max_pages_per_node(mut self, pages: u32) -> Self {
        self.max_pages_per_node = pages;
        self
    }

    pub fn build(self) -> Result<SyncRunConfig> {
        if self.targets.is_empty() {
            return Err(Error::Config(
                "no sync targets configured; add at least one root node id with with_target()"
                    .into(),
            ));
        }
        if self.targets.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::Config("sync targets must not be empty strings".into()));
        }
        let canonical_url_base = self.canonical_url_base.ok_or_else(|| {
            Error::Config(
                "canonical_url_base is required; set it to the public URL prefix of source nodes"
                    .into(),
            )
        })?;
        if !canonical_url_base.starts_with("http://") && !canonical_url_base.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "canonical_url_base must be an absolute http(s) URL, got '{canonical_url_base}'"
            )));
        }
        if self.min_update_ts < 0 {
            return Err(Error::Config(format!(
                "min_update_ts must be a non-negative epoch second, got {}",
                self.min_update_ts
            )));
        }
        if self.parse_batch_size == 0 {
            return Err(Error::Config(
                "parse_batch_size must be at least 1".into(),
            ));
        }
        if self.max_pages_per_node == 0 {
            return Err(Error::Config(
                "max_pages_per_node must be at least 1".into(),
            ));
        }
        for (name, path) in [
            ("mapping_path", &self.mapping_path),
            ("run_state_path", &self.run_state_path),
            ("download_dir", &self.download_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(Error::Config(format!("{name} must not be empty")));
            }
        }

        Ok(SyncRunConfig {
            targets: self.targets,
            min_update_ts: self.min_update_ts,
            mapping_path: self.mapping_path,
            run_state_path: self.run_state_path,
            download_dir: self.download_dir,
            canonical_url_base,
            parse_batch_size: self.parse_batch_size,
            max_pages_per_node: self.max_pages_per_node,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_builder() -> SyncRunConfigBuilder {
        SyncRunConfig::builder()
            .with_target("root-1")
            .with_canonical_url_base("https://docs.example.com/nodes")
    }

    #[test]
    fn builds_with_defaults() {
        let config = valid_builder().build().unwrap();
        assert_eq!(config.parse_batch_size, 10);
        assert_eq!(config.max_pages_per_node, 200);
        assert_eq!(config.min_update_ts, FULL_SYNC_EPOCH);
    }

    #[test]
    fn rejects_missing_targets() {
        let err = SyncRunConfig::builder()
            .with_canonical_url_base("https://docs.example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no sync targets"));
    }

    #[test]
    fn rejects_missing_or_relative_url_base() {
        let err = SyncRunConfig::builder().with_target("r").build().unwrap_err();
        assert!(err.to_string().contains("canonical_url_base"));

        let err = valid_builder()
            .with_canonical_url_base("docs.example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("absolute http(s) URL"));
    }

    #[test]
    fn rejects_zero_batch_and_page_limits() {
        assert!(valid_builder().with_parse_batch_size(0).build().is_err());
        assert!(valid_builder().with_max_pages_per_node(0).build().is_err());
    }

    #[test]
    fn rejects_empty_paths() {
        let err = valid_builder().with_download_dir("").build().unwrap_err();
        assert!(err.to_string().contains("download_dir"));
        assert!(valid_builder().with_mapping_path("").build().is_err());
        assert!(valid_builder().with_run_state_path("").build().is_err());
    }

    #[test]
    fn stage_configs_carry_the_run_settings() {
        let config = valid_builder()
            .with_max_pages_per_node(50)
            .with_parse_batch_size(5)
            .with_min_update_ts(1_700_000_000)
            .build()
            .unwrap();

        assert_eq!(config.crawl_config().max_pages_per_node, 50);
        assert_eq!(config.reconcile_config().parse_batch_size, 5);
        assert_eq!(config.reconcile_config().min_update_ts, 1_700_000_000);
        assert_eq!(config.export_config().download_dir, config.download_dir);
    }

    #[test]
    fn incremental_threshold_is_before_now_and_after_full() {
        let threshold = incremental_threshold();
        assert!(threshold > FULL_SYNC_EPOCH);
        assert!(threshold < Utc::now().timestamp());
    }
}
