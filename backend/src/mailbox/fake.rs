//! In-memory mailbox used by the triage core tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::models::MessageSummary;

use super::{Mailbox, MessagePage, RemoteLabel};

#[derive(Debug, Clone)]
pub struct FakeMessage {
    pub summary: MessageSummary,
    pub labels: Vec<String>,
}

pub struct FakeMailbox {
    messages: Mutex<Vec<FakeMessage>>,
    labels: Mutex<Vec<RemoteLabel>>,
    next_label_id: AtomicUsize,
    /// Artificial latency per listing page, to exercise time budgets.
    pub page_delay: Option<Duration>,
    /// Ids whose metadata fetch fails.
    pub failing_fetches: Mutex<HashSet<String>>,
    /// Any batch_modify touching one of these ids fails wholesale.
    pub failing_modify_ids: Mutex<HashSet<String>>,
    /// Listing requests carrying one of these page tokens fail.
    pub failing_page_tokens: Mutex<HashSet<String>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            labels: Mutex::new(Vec::new()),
            next_label_id: AtomicUsize::new(1),
            page_delay: None,
            failing_fetches: Mutex::new(HashSet::new()),
            failing_modify_ids: Mutex::new(HashSet::new()),
            failing_page_tokens: Mutex::new(HashSet::new()),
        }
    }

    pub fn summary(id: &str, from: &str, subject: &str) -> MessageSummary {
        let (from_address, _) = super::parse_from_header(from);
        MessageSummary {
            id: id.to_string(),
            thread_id: id.to_string(),
            from: from.to_string(),
            from_address,
            subject: subject.to_string(),
            date: None,
            has_unsubscribe_header: false,
            unsubscribe_link: None,
            is_threaded: false,
        }
    }

    pub fn add_unread(&self, summary: MessageSummary) {
        self.messages.lock().unwrap().push(FakeMessage {
            summary,
            labels: vec!["UNREAD".to_string(), "INBOX".to_string()],
        });
    }

    pub fn seed_unread(&self, count: usize) {
        for i in 0..count {
            self.add_unread(Self::summary(
                &format!("msg-{i}"),
                &format!("sender{i}@example.com"),
                &format!("hello {i}"),
            ));
        }
    }

    pub fn add_remote_label(&self, id: &str, name: &str, color: Option<&str>) {
        self.labels.lock().unwrap().push(RemoteLabel {
            id: id.to_string(),
            name: name.to_string(),
            color: color.map(|c| c.to_string()),
        });
    }

    pub fn label_names(&self) -> Vec<String> {
        self.labels
            .lock()
            .unwrap()
            .iter()
            .map(|l| l.name.clone())
            .collect()
    }

    pub fn unread_ids(&self) -> HashSet<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.labels.iter().any(|l| l == "UNREAD"))
            .map(|m| m.summary.id.clone())
            .collect()
    }

    pub fn archived_ids(&self) -> HashSet<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| !m.labels.iter().any(|l| l == "INBOX"))
            .map(|m| m.summary.id.clone())
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    fn matching_ids(&self, query: &str) -> Vec<String> {
        let messages = self.messages.lock().unwrap();
        messages
            .iter()
            .filter(|m| {
                if query.contains("is:unread") {
                    m.labels.iter().any(|l| l == "UNREAD")
                } else {
                    true
                }
            })
            .map(|m| m.summary.id.clone())
            .collect()
    }
}

#[async_trait]
impl Mailbox for FakeMailbox {
    async fn list_message_ids(
        &self,
        query: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<MessagePage> {
        if let Some(delay) = self.page_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(token) = page_token {
            if self.failing_page_tokens.lock().unwrap().contains(token) {
                return Err(anyhow!("simulated listing failure at page {token}"));
            }
        }

        let all = self.matching_ids(query);
        let start: usize = page_token.map(|t| t.parse().unwrap_or(0)).unwrap_or(0);
        let end = (start + page_size as usize).min(all.len());
        let ids = all[start..end].to_vec();
        let next_page_token = if end < all.len() {
            Some(end.to_string())
        } else {
            None
        };

        Ok(MessagePage {
            ids,
            next_page_token,
            result_estimate: Some(all.len() as u64),
        })
    }

    async fn fetch_summary(&self, message_id: &str) -> Result<MessageSummary> {
        if self.failing_fetches.lock().unwrap().contains(message_id) {
            return Err(anyhow!("simulated fetch failure for {message_id}"));
        }

        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.summary.id == message_id)
            .map(|m| m.summary.clone())
            .ok_or_else(|| anyhow!("no such message {message_id}"))
    }

    async fn list_labels(&self) -> Result<Vec<RemoteLabel>> {
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn get_label(&self, label_id: &str) -> Result<Option<RemoteLabel>> {
        Ok(self
            .labels
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.id == label_id)
            .cloned())
    }

    async fn create_label(&self, name: &str, color: &str) -> Result<RemoteLabel> {
        let mut labels = self.labels.lock().unwrap();
        // Gmail rejects duplicate label names.
        if labels.iter().any(|l| l.name == name) {
            return Err(anyhow!("label name '{name}' already exists"));
        }
        let id = format!("Label_{}", self.next_label_id.fetch_add(1, Ordering::SeqCst));
        let label = RemoteLabel {
            id,
            name: name.to_string(),
            color: Some(color.to_string()),
        };
        labels.push(label.clone());
        Ok(label)
    }

    async fn update_label(&self, label_id: &str, name: &str, color: &str) -> Result<RemoteLabel> {
        let mut labels = self.labels.lock().unwrap();
        let label = labels
            .iter_mut()
            .find(|l| l.id == label_id)
            .ok_or_else(|| anyhow!("no such label {label_id}"))?;
        label.name = name.to_string();
        label.color = Some(color.to_string());
        Ok(label.clone())
    }

    async fn delete_label(&self, label_id: &str) -> Result<()> {
        let mut labels = self.labels.lock().unwrap();
        let before = labels.len();
        labels.retain(|l| l.id != label_id);
        if labels.len() == before {
            return Err(anyhow!("no such label {label_id}"));
        }
        Ok(())
    }

    async fn batch_modify(
        &self,
        message_ids: &[String],
        add_labels: &[String],
        remove_labels: &[String],
    ) -> Result<()> {
        {
            let failing = self.failing_modify_ids.lock().unwrap();
            if message_ids.iter().any(|id| failing.contains(id)) {
                return Err(anyhow!("simulated batch modify failure"));
            }
        }

        let mut messages = self.messages.lock().unwrap();
        for message in messages.iter_mut() {
            if !message_ids.contains(&message.summary.id) {
                continue;
            }
            for label in add_labels {
                if !message.labels.contains(label) {
                    message.labels.push(label.clone());
                }
            }
            message.labels.retain(|l| !remove_labels.contains(l));
        }
        Ok(())
    }

    async fn batch_delete(&self, message_ids: &[String]) -> Result<()> {
        let mut messages = self.messages.lock().unwrap();
        messages.retain(|m| !message_ids.contains(&m.summary.id));
        Ok(())
    }
}
