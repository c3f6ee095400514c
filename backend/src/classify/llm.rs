//! Batched LLM classification for messages the pattern pass could not
//! confidently bucket.
//!
//! The production implementation posts to an OpenAI-compatible chat
//! completions endpoint. Malformed responses are the caller's problem by
//! contract: any message without a usable verdict defaults to the
//! notifications bucket, so a bad batch never loses data.

use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::models::{Bucket, Category, MessageSummary};

/// One classification verdict, addressed by position within the batch.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub index: usize,
    pub bucket: Bucket,
    pub reason: String,
}

/// Batched classifier over message metadata.
#[async_trait]
pub trait BatchClassifier: Send + Sync {
    /// Classify a batch against the user's taxonomy. Returned verdicts may
    /// cover only part of the batch; missing entries are defaulted by the
    /// caller.
    async fn classify(
        &self,
        taxonomy: &[Category],
        batch: &[MessageSummary],
    ) -> Result<Vec<Verdict>>;
}

/// Classifier backed by an OpenAI-compatible chat completions API.
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClassifier {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable must be set")?;
        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        })
    }
}

#[async_trait]
impl BatchClassifier for OpenAiClassifier {
    async fn classify(
        &self,
        taxonomy: &[Category],
        batch: &[MessageSummary],
    ) -> Result<Vec<Verdict>> {
        let payload = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(taxonomy, batch) },
            ],
        });

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Classification request failed")?
            .error_for_status()
            .context("Classification request returned an error status")?;

        let body: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse classification response body")?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .context("Classification response missing message content")?;

        parse_verdicts(content, taxonomy, batch.len())
    }
}

const SYSTEM_PROMPT: &str = "You label email messages with exactly one category key from the \
provided taxonomy. Respond with a JSON array only, no prose: \
[{\"index\": <message index>, \"key\": <category key>, \"reason\": \"<short reason>\"}]";

fn build_prompt(taxonomy: &[Category], batch: &[MessageSummary]) -> String {
    let mut prompt = String::from("Categories:\n");
    for cat in taxonomy {
        prompt.push_str(&format!("{}. {} - {}", cat.key, cat.display_name, cat.description));
        if !cat.extra_rules.is_empty() {
            prompt.push_str(&format!(" Rules: {}", cat.extra_rules));
        }
        prompt.push('\n');
    }

    prompt.push_str("\nMessages:\n");
    for (i, msg) in batch.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. From: {} | Subject: {}\n",
            i, msg.from, msg.subject
        ));
    }

    prompt
}

/// Parse the model's JSON array into verdicts, dropping entries with an
/// out-of-range index or an unknown category key. Dropped entries are
/// defaulted downstream; this function never fails on partial garbage,
/// only on output that is not a JSON array at all.
fn parse_verdicts(
    content: &str,
    taxonomy: &[Category],
    batch_len: usize,
) -> Result<Vec<Verdict>> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let entries: Vec<serde_json::Value> =
        serde_json::from_str(trimmed).context("Classifier output is not a JSON array")?;

    let mut verdicts = Vec::new();
    for entry in entries {
        let Some(index) = entry["index"].as_u64().map(|i| i as usize) else {
            tracing::warn!("Classifier entry missing index: {}", entry);
            continue;
        };
        if index >= batch_len {
            tracing::warn!("Classifier returned out-of-range index {}", index);
            continue;
        }
        let Some(key) = entry["key"].as_i64().map(|k| k as i32) else {
            tracing::warn!("Classifier entry missing key: {}", entry);
            continue;
        };
        let Some(category) = taxonomy.iter().find(|c| c.key == key) else {
            tracing::warn!("Classifier returned unknown category key {}", key);
            continue;
        };
        let reason = entry["reason"]
            .as_str()
            .unwrap_or("Classified by model")
            .to_string();

        verdicts.push(Verdict {
            index,
            bucket: category.role.bucket(),
            reason,
        });
    }

    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::default_taxonomy;

    #[test]
    fn parses_plain_json_array() {
        let taxonomy = default_taxonomy();
        let content = r#"[
            {"index": 0, "key": 2, "reason": "order confirmation"},
            {"index": 1, "key": 1, "reason": "direct question"}
        ]"#;

        let verdicts = parse_verdicts(content, &taxonomy, 2).unwrap();
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].bucket, Bucket::Receipts);
        assert_eq!(verdicts[1].bucket, Bucket::Important);
    }

    #[test]
    fn parses_fenced_json_and_drops_bad_entries() {
        let taxonomy = default_taxonomy();
        let content = "```json\n[\
            {\"index\": 0, \"key\": 4, \"reason\": \"digest\"},\
            {\"index\": 9, \"key\": 4, \"reason\": \"out of range\"},\
            {\"index\": 1, \"key\": 99, \"reason\": \"unknown key\"}\
        ]\n```";

        let verdicts = parse_verdicts(content, &taxonomy, 3).unwrap();
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].index, 0);
        assert_eq!(verdicts[0].bucket, Bucket::Newsletters);
    }

    #[test]
    fn non_array_output_is_an_error() {
        let taxonomy = default_taxonomy();
        assert!(parse_verdicts("I cannot classify these.", &taxonomy, 1).is_err());
    }

    #[test]
    fn prompt_lists_categories_and_messages() {
        let taxonomy = default_taxonomy();
        let batch = vec![MessageSummary {
            id: "m1".to_string(),
            thread_id: "m1".to_string(),
            from: "a@b.com".to_string(),
            from_address: "a@b.com".to_string(),
            subject: "hello".to_string(),
            date: None,
            has_unsubscribe_header: false,
            unsubscribe_link: None,
            is_threaded: false,
        }];

        let prompt = build_prompt(&taxonomy, &batch);
        assert!(prompt.contains("1. Important"));
        assert!(prompt.contains("0. From: a@b.com | Subject: hello"));
    }
}
