//! Label reconciler.
//!
//! Converges the remote label store toward the enabled taxonomy in a fixed
//! verify, delete, create, recolor order. Each step is retriable and
//! no-op-safe: an immediate re-run produces no new creates or deletes.
//!
//! Core invariant: labels the reconciler did not create are never deleted,
//! renamed, or adopted. A name collision with a foreign label is resolved
//! by creating a suffixed label of our own.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use shared::models::{Category, LabelOwnership, SyncStats};

use crate::mailbox::Mailbox;

/// Suffix applied when the desired name is already taken by a label we do
/// not own.
const OWNED_SUFFIX: &str = " (Mailsweep)";

pub fn suffixed_name(display_name: &str) -> String {
    format!("{display_name}{OWNED_SUFFIX}")
}

/// Converge remote labels to the enabled taxonomy.
///
/// Returns the updated ownership map and per-class stats. Only a failure
/// to list remote labels is fatal; every per-label failure is logged and
/// skipped.
pub async fn reconcile_labels(
    mailbox: &dyn Mailbox,
    taxonomy: &[Category],
    owned: &LabelOwnership,
) -> Result<(LabelOwnership, SyncStats)> {
    let mut stats = SyncStats::default();

    let remote = mailbox.list_labels().await?;
    let remote_ids: HashSet<&str> = remote.iter().map(|l| l.id.as_str()).collect();
    let remote_by_name: HashMap<&str, &str> = remote
        .iter()
        .map(|l| (l.name.as_str(), l.id.as_str()))
        .collect();

    let desired: BTreeMap<&str, &Category> = taxonomy
        .iter()
        .filter(|c| c.enabled)
        .map(|c| (c.display_name.as_str(), c))
        .collect();

    // Step 1: verify. Entries whose remote id vanished are already gone;
    // drop them from tracking without a remote call.
    let mut ownership = LabelOwnership::new();
    for (name, label_id) in owned {
        if remote_ids.contains(label_id.as_str()) {
            ownership.insert(name.clone(), label_id.clone());
        } else {
            tracing::info!("Owned label '{}' ({}) no longer exists remotely", name, label_id);
            stats.stale_removed += 1;
        }
    }

    // Step 2: delete owned labels whose category is gone or disabled.
    let mut surviving = LabelOwnership::new();
    for (name, label_id) in ownership {
        if desired.contains_key(name.as_str()) {
            surviving.insert(name, label_id);
            continue;
        }
        match mailbox.delete_label(&label_id).await {
            Ok(()) => {
                stats.deleted += 1;
            }
            Err(e) => {
                // Keep tracking it so the next run retries the delete.
                tracing::warn!("Failed to delete label '{}' ({}): {}", name, label_id, e);
                surviving.insert(name, label_id);
            }
        }
    }
    let mut ownership = surviving;

    // Step 3: create-or-skip. A foreign label with the desired name is
    // never adopted; we create a suffixed label of our own instead.
    let mut created_this_run: HashSet<String> = HashSet::new();
    for (name, category) in &desired {
        if ownership.contains_key(*name) {
            continue;
        }

        let create_name = if remote_by_name.contains_key(name) {
            tracing::info!(
                "Label name '{}' is taken by a foreign label, creating suffixed label",
                name
            );
            suffixed_name(name)
        } else {
            (*name).to_string()
        };

        match mailbox.create_label(&create_name, &category.color_hex).await {
            Ok(label) => {
                ownership.insert((*name).to_string(), label.id);
                created_this_run.insert((*name).to_string());
                stats.created += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to create label '{}': {}", create_name, e);
            }
        }
    }

    // Step 4: recolor surviving entries. Re-read the actual remote name
    // first; it may carry the suffix and must be pushed back unchanged.
    for (name, label_id) in &ownership {
        if created_this_run.contains(name) {
            continue;
        }
        let Some(category) = desired.get(name.as_str()) else {
            // Entry kept only because its delete failed above.
            continue;
        };

        let actual_name = match mailbox.get_label(label_id).await {
            Ok(Some(label)) => label.name,
            Ok(None) => {
                tracing::warn!("Owned label '{}' ({}) disappeared mid-sync", name, label_id);
                continue;
            }
            Err(e) => {
                tracing::warn!("Failed to re-read label '{}' ({}): {}", name, label_id, e);
                continue;
            }
        };

        match mailbox
            .update_label(label_id, &actual_name, &category.color_hex)
            .await
        {
            Ok(_) => {
                stats.updated += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to recolor label '{}' ({}): {}", name, label_id, e);
            }
        }
    }

    tracing::info!(
        "Label sync: {} created, {} deleted, {} updated, {} stale removed",
        stats.created,
        stats.deleted,
        stats.updated,
        stats.stale_removed
    );

    Ok((ownership, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::fake::FakeMailbox;
    use shared::models::default_taxonomy;

    #[tokio::test]
    async fn creates_all_labels_on_first_run() {
        let mailbox = FakeMailbox::new();
        let taxonomy = default_taxonomy();

        let (ownership, stats) =
            reconcile_labels(&mailbox, &taxonomy, &LabelOwnership::new())
                .await
                .unwrap();

        assert_eq!(stats.created, 6);
        assert_eq!(stats.deleted, 0);
        assert_eq!(ownership.len(), 6);
        assert!(mailbox.label_names().contains(&"Receipts".to_string()));
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let mailbox = FakeMailbox::new();
        let taxonomy = default_taxonomy();

        let (ownership, _) = reconcile_labels(&mailbox, &taxonomy, &LabelOwnership::new())
            .await
            .unwrap();
        let (ownership2, stats2) = reconcile_labels(&mailbox, &taxonomy, &ownership)
            .await
            .unwrap();

        assert_eq!(stats2.created, 0);
        assert_eq!(stats2.deleted, 0);
        assert_eq!(stats2.stale_removed, 0);
        assert_eq!(ownership2, ownership);
    }

    #[tokio::test]
    async fn never_adopts_a_foreign_label() {
        let mailbox = FakeMailbox::new();
        // The user already has a label named exactly like ours.
        mailbox.add_remote_label("Label_user_1", "Receipts", Some("#000000"));
        let taxonomy = default_taxonomy();

        let (ownership, _) = reconcile_labels(&mailbox, &taxonomy, &LabelOwnership::new())
            .await
            .unwrap();

        // We created a suffixed label instead of claiming theirs.
        let receipts_id = ownership.get("Receipts").unwrap();
        assert_ne!(receipts_id, "Label_user_1");
        assert!(mailbox
            .label_names()
            .contains(&suffixed_name("Receipts")));

        // The foreign label is untouched.
        let foreign = mailbox.get_label("Label_user_1").await.unwrap().unwrap();
        assert_eq!(foreign.name, "Receipts");
        assert_eq!(foreign.color, Some("#000000".to_string()));
    }

    #[tokio::test]
    async fn suffixed_label_survives_reruns() {
        let mailbox = FakeMailbox::new();
        mailbox.add_remote_label("Label_user_1", "Receipts", Some("#000000"));
        let taxonomy = default_taxonomy();

        let (ownership, _) = reconcile_labels(&mailbox, &taxonomy, &LabelOwnership::new())
            .await
            .unwrap();
        let (ownership2, stats2) = reconcile_labels(&mailbox, &taxonomy, &ownership)
            .await
            .unwrap();

        // The tracked suffixed label is reused, not duplicated.
        assert_eq!(stats2.created, 0);
        assert_eq!(ownership2.get("Receipts"), ownership.get("Receipts"));
    }

    #[tokio::test]
    async fn disabled_category_label_is_deleted() {
        let mailbox = FakeMailbox::new();
        let mut taxonomy = default_taxonomy();

        let (ownership, _) = reconcile_labels(&mailbox, &taxonomy, &LabelOwnership::new())
            .await
            .unwrap();

        taxonomy[4].enabled = false; // Marketing
        let (ownership2, stats2) = reconcile_labels(&mailbox, &taxonomy, &ownership)
            .await
            .unwrap();

        assert_eq!(stats2.deleted, 1);
        assert!(!ownership2.contains_key("Marketing"));
        assert!(!mailbox.label_names().contains(&"Marketing".to_string()));
    }

    #[tokio::test]
    async fn externally_deleted_label_is_dropped_and_recreated() {
        let mailbox = FakeMailbox::new();
        let taxonomy = default_taxonomy();

        let (ownership, _) = reconcile_labels(&mailbox, &taxonomy, &LabelOwnership::new())
            .await
            .unwrap();

        // The user deletes one of our labels behind our back.
        let receipts_id = ownership.get("Receipts").unwrap().clone();
        mailbox.delete_label(&receipts_id).await.unwrap();

        let (ownership2, stats2) = reconcile_labels(&mailbox, &taxonomy, &ownership)
            .await
            .unwrap();

        assert_eq!(stats2.stale_removed, 1);
        assert_eq!(stats2.created, 1);
        assert_ne!(ownership2.get("Receipts").unwrap(), &receipts_id);
    }

    #[tokio::test]
    async fn recolor_pushes_taxonomy_color() {
        let mailbox = FakeMailbox::new();
        let mut taxonomy = default_taxonomy();

        let (ownership, _) = reconcile_labels(&mailbox, &taxonomy, &LabelOwnership::new())
            .await
            .unwrap();

        taxonomy[1].color_hex = "#123456".to_string(); // Receipts
        let (ownership2, stats2) = reconcile_labels(&mailbox, &taxonomy, &ownership)
            .await
            .unwrap();

        assert!(stats2.updated >= 1);
        let label_id = ownership2.get("Receipts").unwrap();
        let label = mailbox.get_label(label_id).await.unwrap().unwrap();
        assert_eq!(label.color, Some("#123456".to_string()));
    }
}
