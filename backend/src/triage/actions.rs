//! Bulk action executor: mark-read sweeps and cleanup (archive/delete).
//!
//! Actions operate on ids re-listed at execution time, not on a stale scan
//! snapshot. A failed batch is logged and skipped; the messages it covered
//! simply stay untouched for the next run.

use std::collections::HashSet;

use anyhow::Result;
use shared::api::CleanupAction;

use crate::mailbox::Mailbox;

const UNREAD_LABEL: &str = "UNREAD";
const INBOX_LABEL: &str = "INBOX";

#[derive(Debug, Clone, Default)]
pub struct MarkReadOutcome {
    pub marked_read: usize,
    pub kept_unread: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CleanupOutcome {
    pub processed: usize,
    pub archived: usize,
    pub deleted: usize,
}

/// List every id matching `query`, exhaustively paginated.
async fn collect_ids(mailbox: &dyn Mailbox, query: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = mailbox
            .list_message_ids(query, page_token.as_deref(), 500)
            .await?;
        if page.ids.is_empty() && page.next_page_token.is_none() {
            break;
        }
        ids.extend(page.ids);
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(ids)
}

/// Mark every unread message as read, except the keep set.
///
/// The keep set holds ids the caller wants left unread, typically the
/// messages the last scan classified as important.
pub async fn mark_unread_as_read(
    mailbox: &dyn Mailbox,
    keep: &HashSet<String>,
    batch_size: usize,
) -> Result<MarkReadOutcome> {
    let unread = collect_ids(mailbox, "is:unread").await?;

    let mut outcome = MarkReadOutcome::default();
    let to_mark: Vec<String> = unread
        .into_iter()
        .filter(|id| {
            if keep.contains(id) {
                outcome.kept_unread += 1;
                false
            } else {
                true
            }
        })
        .collect();

    let remove = vec![UNREAD_LABEL.to_string()];
    for chunk in to_mark.chunks(batch_size.max(1)) {
        match mailbox.batch_modify(chunk, &[], &remove).await {
            Ok(()) => outcome.marked_read += chunk.len(),
            Err(e) => {
                tracing::warn!("Failed to mark {} messages read: {}", chunk.len(), e);
            }
        }
    }

    tracing::info!(
        "Mark-read sweep: {} marked, {} kept unread",
        outcome.marked_read,
        outcome.kept_unread
    );

    Ok(outcome)
}

/// Build a provider query for a cleanup sweep.
///
/// `label_names` and `senders` are OR'd within their group and AND'd with
/// the age cutoff.
pub fn build_cleanup_query(
    older_than_days: u32,
    label_names: &[String],
    senders: &[String],
) -> String {
    let mut query = format!("older_than:{older_than_days}d");

    if !label_names.is_empty() {
        let labels: Vec<String> = label_names
            .iter()
            .map(|n| format!("label:\"{n}\""))
            .collect();
        query.push_str(&format!(" ({})", labels.join(" OR ")));
    }

    if !senders.is_empty() {
        let froms: Vec<String> = senders.iter().map(|s| format!("from:{s}")).collect();
        query.push_str(&format!(" ({})", froms.join(" OR ")));
    }

    query
}

/// Archive or permanently delete every message matching `query`.
pub async fn cleanup_messages(
    mailbox: &dyn Mailbox,
    action: CleanupAction,
    query: &str,
    batch_size: usize,
) -> Result<CleanupOutcome> {
    let ids = collect_ids(mailbox, query).await?;

    let mut outcome = CleanupOutcome {
        processed: ids.len(),
        ..Default::default()
    };

    let remove_inbox = vec![INBOX_LABEL.to_string()];
    for chunk in ids.chunks(batch_size.max(1)) {
        let result = match action {
            CleanupAction::Archive => mailbox.batch_modify(chunk, &[], &remove_inbox).await,
            CleanupAction::Delete => mailbox.batch_delete(chunk).await,
        };
        match result {
            Ok(()) => match action {
                CleanupAction::Archive => outcome.archived += chunk.len(),
                CleanupAction::Delete => outcome.deleted += chunk.len(),
            },
            Err(e) => {
                tracing::warn!(
                    "Cleanup batch of {} messages failed: {}",
                    chunk.len(),
                    e
                );
            }
        }
    }

    tracing::info!(
        "Cleanup sweep: {} matched, {} archived, {} deleted",
        outcome.processed,
        outcome.archived,
        outcome.deleted
    );

    Ok(outcome)
}
