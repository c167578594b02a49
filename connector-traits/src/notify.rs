//! Outbound Notification Seam
//!
//! Run reports are delivered best-effort: the pipeline renders a markdown
//! summary and hands it to whatever sink is configured (chat webhook, log
//! file, nothing). Delivery failure never affects the run outcome.

use async_trait::async_trait;

use crate::error::Result;

/// Best-effort delivery of a rendered run report.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a markdown-formatted message with the given title.
    async fn send_markdown(&self, title: &str, body: &str) -> Result<()>;
}
