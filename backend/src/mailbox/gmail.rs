//! Gmail implementation of the [`Mailbox`] trait.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use google_gmail1::api::{
    BatchDeleteMessagesRequest, BatchModifyMessagesRequest, Label, LabelColor, Message,
};
use google_gmail1::hyper_rustls::HttpsConnector;
use google_gmail1::Gmail;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use shared::models::MessageSummary;

use super::{parse_from_header, parse_unsubscribe_link, Mailbox, MessagePage, RemoteLabel};
use crate::models::AccountRow;

/// Headers requested on metadata fetches. The scan path never downloads
/// message bodies.
const METADATA_HEADERS: [&str; 4] = ["From", "Subject", "Date", "List-Unsubscribe"];

/// Client for interacting with the Gmail API
pub struct GmailMailbox {
    hub: Gmail<HttpsConnector<HttpConnector>>,
    pub email_address: String,
}

/// True for errors worth one refresh-and-retry: the short-lived access
/// credential expired or was revoked mid-run.
fn is_auth_error(err: &google_gmail1::Error) -> bool {
    match err {
        google_gmail1::Error::Failure(resp) => resp.status().as_u16() == 401,
        google_gmail1::Error::BadRequest(value) => {
            value["error"]["code"].as_i64() == Some(401)
        }
        google_gmail1::Error::MissingToken(_) => true,
        _ => false,
    }
}

fn is_not_found(err: &google_gmail1::Error) -> bool {
    match err {
        google_gmail1::Error::Failure(resp) => resp.status().as_u16() == 404,
        google_gmail1::Error::BadRequest(value) => {
            value["error"]["code"].as_i64() == Some(404)
        }
        _ => false,
    }
}

/// Issue a hub call; on an authorization failure, re-issue it once.
///
/// The retry goes back through the authenticator, which exchanges the
/// stored refresh token for a fresh access token before the second attempt.
/// A second failure is surfaced to the caller, who treats it as a failure
/// of that unit of work only.
macro_rules! with_auth_retry {
    ($call:expr, $what:expr) => {{
        match $call {
            Ok(v) => Ok(v),
            Err(e) if is_auth_error(&e) => {
                tracing::warn!(
                    "Authorization failure on {}, refreshing credentials and retrying once: {}",
                    $what,
                    e
                );
                $call.map_err(anyhow::Error::from)
            }
            Err(e) => Err(anyhow::Error::from(e)),
        }
    }};
}

impl GmailMailbox {
    /// Create a Gmail client from an account row with a stored OAuth refresh
    /// token.
    pub async fn from_account(account: &AccountRow) -> Result<Self> {
        let refresh_token = account
            .oauth_refresh_token
            .as_ref()
            .context("Account has no stored refresh token")?;

        let client_id = std::env::var("GOOGLE_CLIENT_ID")
            .context("GOOGLE_CLIENT_ID environment variable must be set")?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET")
            .context("GOOGLE_CLIENT_SECRET environment variable must be set")?;

        // Build AuthorizedUserSecret with our stored refresh token.
        // Use the yup_oauth2 re-exported by google_gmail1 to avoid version mismatch.
        let secret = google_gmail1::yup_oauth2::authorized_user::AuthorizedUserSecret {
            client_id,
            client_secret,
            refresh_token: refresh_token.clone(),
            key_type: "authorized_user".to_string(),
        };

        // The authenticator is the credential refresher: it exchanges the
        // long-lived refresh token for short-lived access tokens on demand.
        let auth = google_gmail1::yup_oauth2::AuthorizedUserAuthenticator::builder(secret)
            .build()
            .await
            .context("Failed to build authenticator from refresh token")?;

        let connector = google_gmail1::hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed to load native TLS roots")?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(connector);
        let hub = Gmail::new(client, auth);

        Ok(Self {
            hub,
            email_address: account.email_address.clone(),
        })
    }

    fn parse_summary(message: Message) -> MessageSummary {
        let id = message.id.clone().unwrap_or_default();
        let thread_id = message.thread_id.clone().unwrap_or_default();

        let mut from = String::new();
        let mut subject = String::new();
        let mut date = None;
        let mut unsubscribe_header: Option<String> = None;

        if let Some(payload) = &message.payload {
            if let Some(headers) = &payload.headers {
                for header in headers {
                    match header.name.as_deref() {
                        Some("From") => from = header.value.clone().unwrap_or_default(),
                        Some("Subject") => subject = header.value.clone().unwrap_or_default(),
                        Some("Date") => {
                            if let Some(date_str) = &header.value {
                                date = Self::parse_date(date_str);
                            }
                        }
                        Some("List-Unsubscribe") => {
                            unsubscribe_header = header.value.clone();
                        }
                        _ => {}
                    }
                }
            }
        }

        let (from_address, _) = parse_from_header(&from);
        let unsubscribe_link = unsubscribe_header
            .as_deref()
            .and_then(parse_unsubscribe_link);

        // The first message of a thread has thread_id == id; anything else
        // is part of an ongoing conversation.
        let is_threaded = !id.is_empty() && id != thread_id;

        MessageSummary {
            id,
            thread_id,
            from,
            from_address,
            subject,
            date,
            has_unsubscribe_header: unsubscribe_header.is_some(),
            unsubscribe_link,
            is_threaded,
        }
    }

    fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
            return Some(dt.with_timezone(&Utc));
        }
        None
    }

    fn label_request(name: &str, color: &str) -> Label {
        Label {
            name: Some(name.to_string()),
            color: Some(LabelColor {
                background_color: Some(color.to_string()),
                text_color: Some("#ffffff".to_string()),
            }),
            label_list_visibility: Some("labelShow".to_string()),
            message_list_visibility: Some("show".to_string()),
            ..Default::default()
        }
    }

    fn remote_label(label: Label) -> RemoteLabel {
        RemoteLabel {
            id: label.id.unwrap_or_default(),
            name: label.name.unwrap_or_default(),
            color: label.color.and_then(|c| c.background_color),
        }
    }
}

#[async_trait]
impl Mailbox for GmailMailbox {
    async fn list_message_ids(
        &self,
        query: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<MessagePage> {
        let (_, response) = with_auth_retry!(
            {
                let mut call = self
                    .hub
                    .users()
                    .messages_list("me")
                    .q(query)
                    .max_results(page_size);
                if let Some(token) = page_token {
                    call = call.page_token(token);
                }
                call.doit().await
            },
            "message listing"
        )
        .context("Failed to list messages")?;

        let ids = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect();

        Ok(MessagePage {
            ids,
            next_page_token: response.next_page_token,
            result_estimate: response.result_size_estimate.map(u64::from),
        })
    }

    async fn fetch_summary(&self, message_id: &str) -> Result<MessageSummary> {
        let (_, message) = with_auth_retry!(
            {
                let mut call = self
                    .hub
                    .users()
                    .messages_get("me", message_id)
                    .format("metadata");
                for header in METADATA_HEADERS {
                    call = call.add_metadata_headers(header);
                }
                call.doit().await
            },
            "metadata fetch"
        )
        .with_context(|| format!("Failed to fetch message {}", message_id))?;

        Ok(Self::parse_summary(message))
    }

    async fn list_labels(&self) -> Result<Vec<RemoteLabel>> {
        let (_, response) = with_auth_retry!(
            self.hub.users().labels_list("me").doit().await,
            "label listing"
        )
        .context("Failed to list labels")?;

        Ok(response
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(Self::remote_label)
            .collect())
    }

    async fn get_label(&self, label_id: &str) -> Result<Option<RemoteLabel>> {
        let result = with_auth_retry!(
            self.hub.users().labels_get("me", label_id).doit().await,
            "label read"
        );

        match result {
            Ok((_, label)) => Ok(Some(Self::remote_label(label))),
            Err(e) => {
                if let Some(api_err) = e.downcast_ref::<google_gmail1::Error>() {
                    if is_not_found(api_err) {
                        return Ok(None);
                    }
                }
                Err(e).context("Failed to read label")
            }
        }
    }

    async fn create_label(&self, name: &str, color: &str) -> Result<RemoteLabel> {
        let (_, label) = with_auth_retry!(
            self.hub
                .users()
                .labels_create(Self::label_request(name, color), "me")
                .doit()
                .await,
            "label creation"
        )
        .with_context(|| format!("Failed to create label '{}'", name))?;

        tracing::info!("Created label '{}' ({})", name, self.email_address);
        Ok(Self::remote_label(label))
    }

    async fn update_label(&self, label_id: &str, name: &str, color: &str) -> Result<RemoteLabel> {
        let (_, label) = with_auth_retry!(
            self.hub
                .users()
                .labels_patch(Self::label_request(name, color), "me", label_id)
                .doit()
                .await,
            "label update"
        )
        .with_context(|| format!("Failed to update label {}", label_id))?;

        Ok(Self::remote_label(label))
    }

    async fn delete_label(&self, label_id: &str) -> Result<()> {
        with_auth_retry!(
            self.hub.users().labels_delete("me", label_id).doit().await,
            "label deletion"
        )
        .with_context(|| format!("Failed to delete label {}", label_id))?;

        tracing::info!("Deleted label {} ({})", label_id, self.email_address);
        Ok(())
    }

    async fn batch_modify(
        &self,
        message_ids: &[String],
        add_labels: &[String],
        remove_labels: &[String],
    ) -> Result<()> {
        let request = BatchModifyMessagesRequest {
            ids: Some(message_ids.to_vec()),
            add_label_ids: if add_labels.is_empty() {
                None
            } else {
                Some(add_labels.to_vec())
            },
            remove_label_ids: if remove_labels.is_empty() {
                None
            } else {
                Some(remove_labels.to_vec())
            },
        };

        with_auth_retry!(
            self.hub
                .users()
                .messages_batch_modify(request.clone(), "me")
                .doit()
                .await,
            "batch modify"
        )
        .context("Failed to batch-modify messages")?;

        Ok(())
    }

    async fn batch_delete(&self, message_ids: &[String]) -> Result<()> {
        let request = BatchDeleteMessagesRequest {
            ids: Some(message_ids.to_vec()),
        };

        with_auth_retry!(
            self.hub
                .users()
                .messages_batch_delete(request.clone(), "me")
                .doit()
                .await,
            "batch delete"
        )
        .context("Failed to batch-delete messages")?;

        Ok(())
    }
}
