//! Remote mailbox abstraction.
//!
//! The triage core (pipeline, reconciler, bulk actions) talks to the remote
//! message store through this trait so it can be exercised against an
//! in-memory fake in tests. The production implementation is Gmail.

use anyhow::Result;
use async_trait::async_trait;
use shared::models::MessageSummary;

pub mod gmail;

#[cfg(test)]
pub(crate) mod fake;

/// One page of message ids from a listing query.
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
    /// Provider's estimate of the total result size, if it reports one.
    pub result_estimate: Option<u64>,
}

/// A label as it exists on the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLabel {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
}

/// Remote mailbox operations consumed by the triage core.
///
/// All calls are fallible; callers decide whether a failure is fatal or a
/// logged, skipped unit of work.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// List message ids matching a provider query, one page at a time.
    async fn list_message_ids(
        &self,
        query: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<MessagePage>;

    /// Fetch header-only metadata for one message. Never fetches the body.
    async fn fetch_summary(&self, message_id: &str) -> Result<MessageSummary>;

    async fn list_labels(&self) -> Result<Vec<RemoteLabel>>;

    async fn get_label(&self, label_id: &str) -> Result<Option<RemoteLabel>>;

    async fn create_label(&self, name: &str, color: &str) -> Result<RemoteLabel>;

    async fn update_label(&self, label_id: &str, name: &str, color: &str) -> Result<RemoteLabel>;

    async fn delete_label(&self, label_id: &str) -> Result<()>;

    /// Add/remove labels on a batch of messages in one call.
    async fn batch_modify(
        &self,
        message_ids: &[String],
        add_labels: &[String],
        remove_labels: &[String],
    ) -> Result<()>;

    /// Permanently delete a batch of messages.
    async fn batch_delete(&self, message_ids: &[String]) -> Result<()>;
}

/// Parse a "From" header like "John Doe <john@example.com>" into (address, name)
pub fn parse_from_header(from: &str) -> (String, Option<String>) {
    let from = from.trim();

    if let Some(bracket_start) = from.rfind('<') {
        if let Some(bracket_end) = from.rfind('>') {
            let address = from[bracket_start + 1..bracket_end].trim().to_lowercase();
            let name = from[..bracket_start].trim();
            let name = name.trim_matches('"').trim();
            let name = if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            };
            return (address, name);
        }
    }

    (from.to_lowercase(), None)
}

/// Extract the first http(s) link from a List-Unsubscribe header value,
/// e.g. `<mailto:unsub@x.com>, <https://x.com/unsub?id=1>`.
pub fn parse_unsubscribe_link(header_value: &str) -> Option<String> {
    header_value
        .split(',')
        .map(|part| part.trim().trim_start_matches('<').trim_end_matches('>'))
        .find(|link| link.starts_with("http://") || link.starts_with("https://"))
        .map(|link| link.to_string())
}
