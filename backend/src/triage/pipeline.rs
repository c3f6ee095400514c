//! Multi-stage, time-budgeted classification pipeline.
//!
//! Four phases run against a single wall-clock budget: id discovery (up to
//! the 30% checkpoint), metadata fetch (up to 70%), the free pattern pass,
//! and the LLM pass (skipped past 90%, no new batches past 95%). Every
//! remote failure is contained to its unit of work; the pipeline always
//! produces a best-effort result rather than an error.

use std::collections::HashSet;

use futures::future;
use shared::models::{Bucket, Category, CategoryCounts, ClassifiedMessage, MessageSummary};

use super::{ScanBudget, ScanConfig};
use crate::classify::llm::BatchClassifier;
use crate::classify::patterns;
use crate::mailbox::Mailbox;

/// Listing query for the scan path.
pub const UNREAD_QUERY: &str = "in:inbox is:unread";

const DISCOVERY_CHECKPOINT: f64 = 0.30;
const FETCH_CHECKPOINT: f64 = 0.70;
const LLM_START_CHECKPOINT: f64 = 0.90;
const LLM_STOP_CHECKPOINT: f64 = 0.95;

/// Caller-requested scan bounds.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub scan_all: bool,
    pub max_messages: Option<usize>,
}

/// Best-effort result of one pipeline run.
#[derive(Debug)]
pub struct ScanOutcome {
    pub messages: Vec<ClassifiedMessage>,
    pub counts: CategoryCounts,
    pub total_unread_estimate: i64,
    pub discovered: usize,
    pub scanned: usize,
    pub has_more: bool,
    pub is_complete: bool,
    pub hit_max_limit: bool,
    pub hit_time_limit: bool,
    pub elapsed_ms: u64,
}

/// Run the classification pipeline for one account.
///
/// Never returns an error: budget breaches become flags and per-unit remote
/// failures shrink the result, but a result always comes back.
pub async fn run_scan(
    mailbox: &dyn Mailbox,
    classifier: &dyn BatchClassifier,
    taxonomy: &[Category],
    known_contacts: &HashSet<String>,
    opts: &ScanOptions,
    config: &ScanConfig,
) -> ScanOutcome {
    let budget = ScanBudget::new(config.time_budget);

    let limit = if opts.scan_all {
        config.hard_ceiling
    } else {
        opts.max_messages
            .unwrap_or(config.default_max)
            .min(config.hard_ceiling)
    };

    let mut hit_time_limit = false;
    let mut hit_max_limit = false;
    let mut all_ids_processed = true;

    // Phase 1: id discovery
    let mut ids: Vec<String> = Vec::new();
    let mut estimate: i64 = 0;
    let mut page_token: Option<String> = None;

    loop {
        if budget.past(DISCOVERY_CHECKPOINT) {
            tracing::warn!(
                "Discovery checkpoint exceeded after {} ids, stopping discovery",
                ids.len()
            );
            hit_time_limit = true;
            break;
        }

        if ids.len() >= limit {
            break;
        }

        let remaining = (limit - ids.len()).min(config.page_size as usize) as u32;
        match mailbox
            .list_message_ids(UNREAD_QUERY, page_token.as_deref(), remaining)
            .await
        {
            Ok(page) => {
                if estimate == 0 {
                    if let Some(e) = page.result_estimate {
                        estimate = e as i64;
                    }
                }
                ids.extend(page.ids);
                page_token = page.next_page_token;

                if ids.len() >= limit {
                    ids.truncate(limit);
                    if page_token.is_some() || (estimate as usize) > ids.len() {
                        hit_max_limit = true;
                    }
                    break;
                }
                if page_token.is_none() {
                    break;
                }
            }
            Err(e) => {
                // Zero results for this unit of work; keep what we have.
                // The rest of the mailbox was never listed, so the scan
                // must not report itself complete.
                tracing::warn!(
                    "Unread listing failed after {} ids, continuing with partial list: {}",
                    ids.len(),
                    e
                );
                all_ids_processed = false;
                break;
            }
        }
    }

    let discovered = ids.len();
    if estimate < discovered as i64 {
        estimate = discovered as i64;
    }

    // Phase 2: metadata fetch, concurrent within each batch
    let mut summaries: Vec<MessageSummary> = Vec::with_capacity(discovered);
    for chunk in ids.chunks(config.fetch_batch) {
        if budget.past(FETCH_CHECKPOINT) {
            tracing::warn!(
                "Fetch checkpoint exceeded after {} of {} messages",
                summaries.len(),
                discovered
            );
            hit_time_limit = true;
            break;
        }

        let results = future::join_all(chunk.iter().map(|id| mailbox.fetch_summary(id))).await;
        for (id, result) in chunk.iter().zip(results) {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    // Dropped, not retried; the rest of the batch proceeds.
                    tracing::warn!("Failed to fetch message {}: {}", id, e);
                }
            }
        }
    }

    // Phase 3: pattern pass
    let mut messages: Vec<ClassifiedMessage> = Vec::with_capacity(summaries.len());
    let mut backlog: Vec<MessageSummary> = Vec::new();
    for summary in summaries {
        match patterns::classify(&summary, known_contacts) {
            Some((bucket, reason)) => messages.push(ClassifiedMessage {
                message: summary,
                bucket,
                reason,
            }),
            None => backlog.push(summary),
        }
    }

    // Phase 4: LLM pass over the uncategorized backlog
    if !backlog.is_empty() {
        if budget.past(LLM_START_CHECKPOINT) {
            hit_time_limit = true;
            default_to_notifications(
                &mut messages,
                backlog,
                "Not classified within the scan time budget",
            );
        } else {
            let mut batches_issued = 0;
            let mut remaining = backlog;

            while !remaining.is_empty() {
                if batches_issued >= config.max_llm_batches {
                    default_to_notifications(
                        &mut messages,
                        std::mem::take(&mut remaining),
                        "Classification batch cap reached",
                    );
                    break;
                }
                if budget.past(LLM_STOP_CHECKPOINT) {
                    hit_time_limit = true;
                    default_to_notifications(
                        &mut messages,
                        std::mem::take(&mut remaining),
                        "Not classified within the scan time budget",
                    );
                    break;
                }

                let batch: Vec<MessageSummary> = remaining
                    .drain(..remaining.len().min(config.llm_batch))
                    .collect();
                batches_issued += 1;

                match classifier.classify(taxonomy, &batch).await {
                    Ok(verdicts) => {
                        let mut assigned: Vec<Option<(Bucket, String)>> =
                            vec![None; batch.len()];
                        for verdict in verdicts {
                            if verdict.index < batch.len() {
                                assigned[verdict.index] =
                                    Some((verdict.bucket, verdict.reason));
                            }
                        }
                        for (summary, verdict) in batch.into_iter().zip(assigned) {
                            match verdict {
                                Some((bucket, reason)) => messages.push(ClassifiedMessage {
                                    message: summary,
                                    bucket,
                                    reason,
                                }),
                                None => messages.push(ClassifiedMessage {
                                    message: summary,
                                    bucket: Bucket::Notifications,
                                    reason: "No verdict in classifier response".to_string(),
                                }),
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            "LLM classification failed for a batch of {}: {}",
                            batch.len(),
                            e
                        );
                        default_to_notifications(
                            &mut messages,
                            batch,
                            "Classification call failed",
                        );
                    }
                }
            }
        }
    }

    let mut counts = CategoryCounts::default();
    for message in &messages {
        counts.bump(message.bucket);
    }

    let scanned = messages.len();
    let is_complete = !hit_time_limit && !hit_max_limit && all_ids_processed;

    tracing::info!(
        "Scan classified {} of {} discovered (estimate {}), time_limit={}, max_limit={}, all_ids={}",
        scanned,
        discovered,
        estimate,
        hit_time_limit,
        hit_max_limit,
        all_ids_processed
    );

    ScanOutcome {
        messages,
        counts,
        total_unread_estimate: estimate,
        discovered,
        scanned,
        has_more: hit_time_limit || hit_max_limit || !all_ids_processed,
        is_complete,
        hit_max_limit,
        hit_time_limit,
        elapsed_ms: budget.elapsed_ms(),
    }
}

fn default_to_notifications(
    messages: &mut Vec<ClassifiedMessage>,
    summaries: Vec<MessageSummary>,
    reason: &str,
) {
    for summary in summaries {
        messages.push(ClassifiedMessage {
            message: summary,
            bucket: Bucket::Notifications,
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::llm::Verdict;
    use crate::mailbox::fake::FakeMailbox;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use shared::models::default_taxonomy;
    use std::time::Duration;

    /// Returns no verdicts; the pipeline must default everything.
    struct SilentClassifier;

    #[async_trait]
    impl BatchClassifier for SilentClassifier {
        async fn classify(
            &self,
            _taxonomy: &[Category],
            _batch: &[MessageSummary],
        ) -> Result<Vec<Verdict>> {
            Ok(vec![])
        }
    }

    /// Fails every call, like a provider outage.
    struct FailingClassifier;

    #[async_trait]
    impl BatchClassifier for FailingClassifier {
        async fn classify(
            &self,
            _taxonomy: &[Category],
            _batch: &[MessageSummary],
        ) -> Result<Vec<Verdict>> {
            Err(anyhow!("simulated classifier outage"))
        }
    }

    /// Marks everything important.
    struct ImportantClassifier;

    #[async_trait]
    impl BatchClassifier for ImportantClassifier {
        async fn classify(
            &self,
            _taxonomy: &[Category],
            batch: &[MessageSummary],
        ) -> Result<Vec<Verdict>> {
            Ok(batch
                .iter()
                .enumerate()
                .map(|(i, _)| Verdict {
                    index: i,
                    bucket: Bucket::Important,
                    reason: "scripted".to_string(),
                })
                .collect())
        }
    }

    fn test_config() -> ScanConfig {
        ScanConfig {
            time_budget: Duration::from_secs(30),
            ..ScanConfig::default()
        }
    }

    #[tokio::test]
    async fn classifies_mixed_inbox_end_to_end() {
        let mailbox = FakeMailbox::new();
        mailbox.add_unread(FakeMailbox::summary(
            "m1",
            "store@shop.com",
            "Your order confirmation",
        ));
        mailbox.add_unread(FakeMailbox::summary(
            "m2",
            "colleague@work.com",
            "Lunch tomorrow?",
        ));

        let outcome = run_scan(
            &mailbox,
            &ImportantClassifier,
            &default_taxonomy(),
            &HashSet::new(),
            &ScanOptions::default(),
            &test_config(),
        )
        .await;

        assert_eq!(outcome.scanned, 2);
        assert!(outcome.is_complete);
        assert!(!outcome.hit_time_limit);
        assert_eq!(outcome.counts.receipts, 1);
        // The uncategorized message went through the scripted LLM pass.
        assert_eq!(outcome.counts.important, 1);
    }

    #[tokio::test]
    async fn message_cap_sets_hit_max_limit() {
        let mailbox = FakeMailbox::new();
        mailbox.seed_unread(300);

        let opts = ScanOptions {
            scan_all: false,
            max_messages: Some(100),
        };
        let outcome = run_scan(
            &mailbox,
            &SilentClassifier,
            &default_taxonomy(),
            &HashSet::new(),
            &opts,
            &test_config(),
        )
        .await;

        assert_eq!(outcome.discovered, 100);
        assert_eq!(outcome.scanned, 100);
        assert!(outcome.hit_max_limit);
        assert!(outcome.has_more);
        assert!(!outcome.is_complete);
    }

    #[tokio::test]
    async fn time_budget_yields_partial_result() {
        let mut mailbox = FakeMailbox::new();
        mailbox.page_delay = Some(Duration::from_millis(10));
        mailbox.seed_unread(20_000);

        let config = ScanConfig {
            time_budget: Duration::from_millis(80),
            hard_ceiling: 100_000,
            ..ScanConfig::default()
        };
        let opts = ScanOptions {
            scan_all: true,
            max_messages: None,
        };

        let outcome = run_scan(
            &mailbox,
            &SilentClassifier,
            &default_taxonomy(),
            &HashSet::new(),
            &opts,
            &config,
        )
        .await;

        assert!(outcome.hit_time_limit);
        assert!(!outcome.is_complete);
        assert!(!outcome.messages.is_empty(), "partial result expected");
        assert!(outcome.discovered < 20_000);
    }

    #[tokio::test]
    async fn classifier_outage_defaults_whole_batch_without_data_loss() {
        let mailbox = FakeMailbox::new();
        // Subjects with no pattern signals, so all 50 reach the LLM pass.
        for i in 0..50 {
            mailbox.add_unread(FakeMailbox::summary(
                &format!("m{i}"),
                &format!("person{i}@example.com"),
                &format!("catching up {i}"),
            ));
        }

        let outcome = run_scan(
            &mailbox,
            &FailingClassifier,
            &default_taxonomy(),
            &HashSet::new(),
            &ScanOptions::default(),
            &test_config(),
        )
        .await;

        assert_eq!(outcome.scanned, 50, "no message may be lost");
        assert_eq!(outcome.counts.notifications, 50);
    }

    #[tokio::test]
    async fn batch_cap_defaults_the_overflow() {
        let mailbox = FakeMailbox::new();
        for i in 0..120 {
            mailbox.add_unread(FakeMailbox::summary(
                &format!("m{i}"),
                &format!("person{i}@example.com"),
                &format!("note {i}"),
            ));
        }

        let config = ScanConfig {
            time_budget: Duration::from_secs(30),
            llm_batch: 50,
            max_llm_batches: 2,
            ..ScanConfig::default()
        };
        let outcome = run_scan(
            &mailbox,
            &ImportantClassifier,
            &default_taxonomy(),
            &HashSet::new(),
            &ScanOptions::default(),
            &config,
        )
        .await;

        assert_eq!(outcome.scanned, 120);
        // Two batches of 50 classified, the remaining 20 defaulted.
        assert_eq!(outcome.counts.important, 100);
        assert_eq!(outcome.counts.notifications, 20);
    }

    #[tokio::test]
    async fn listing_failure_mid_discovery_is_not_a_complete_scan() {
        let mailbox = FakeMailbox::new();
        mailbox.seed_unread(1_000);
        // First page of 100 succeeds, the second errors out.
        mailbox
            .failing_page_tokens
            .lock()
            .unwrap()
            .insert("100".to_string());

        let config = ScanConfig {
            page_size: 100,
            hard_ceiling: 100_000,
            ..test_config()
        };
        let opts = ScanOptions {
            scan_all: true,
            max_messages: None,
        };
        let outcome = run_scan(
            &mailbox,
            &SilentClassifier,
            &default_taxonomy(),
            &HashSet::new(),
            &opts,
            &config,
        )
        .await;

        assert_eq!(outcome.discovered, 100);
        assert_eq!(outcome.scanned, 100, "partial result still comes back");
        assert!(!outcome.hit_time_limit);
        assert!(!outcome.hit_max_limit);
        assert!(
            !outcome.is_complete,
            "900 ids were never listed, the scan is not complete"
        );
        assert!(outcome.has_more);
    }

    #[tokio::test]
    async fn single_fetch_failure_does_not_abort_the_batch() {
        let mailbox = FakeMailbox::new();
        mailbox.seed_unread(10);
        mailbox
            .failing_fetches
            .lock()
            .unwrap()
            .insert("msg-3".to_string());

        let outcome = run_scan(
            &mailbox,
            &SilentClassifier,
            &default_taxonomy(),
            &HashSet::new(),
            &ScanOptions::default(),
            &test_config(),
        )
        .await;

        assert_eq!(outcome.discovered, 10);
        assert_eq!(outcome.scanned, 9);
        assert!(outcome
            .messages
            .iter()
            .all(|m| m.message.id != "msg-3"));
    }

    #[tokio::test]
    async fn known_contact_skips_the_llm_pass() {
        let mailbox = FakeMailbox::new();
        mailbox.add_unread(FakeMailbox::summary(
            "m1",
            "vip@example.com",
            "random subject with no signals",
        ));

        let known: HashSet<String> = ["vip@example.com".to_string()].into_iter().collect();
        let outcome = run_scan(
            &mailbox,
            &FailingClassifier,
            &default_taxonomy(),
            &known,
            &ScanOptions::default(),
            &test_config(),
        )
        .await;

        assert_eq!(outcome.counts.important, 1);
        assert!(outcome.is_complete);
    }
}
