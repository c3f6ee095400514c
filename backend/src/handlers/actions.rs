//! Bulk action endpoints: mark-read sweeps and cleanup (archive/delete).

use std::collections::HashSet;

use axum::{extract::State, Json};
use validator::Validate;

use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::mailbox::gmail::GmailMailbox;
use crate::mailbox::Mailbox;
use crate::models::NewScanSession;
use crate::triage::actions::{build_cleanup_query, cleanup_messages, mark_unread_as_read};
use crate::triage::ScanConfig;
use shared::api::{
    CleanupRequest, CleanupResponse, KeepPolicy, MarkReadRequest, MarkReadResponse,
};
use shared::models::{Bucket, CategoryCounts};

pub async fn mark_read(
    State(pool): State<DbPool>,
    Json(payload): Json<MarkReadRequest>,
) -> ApiResult<Json<MarkReadResponse>> {
    let mut conn = pool.get().await?;

    let account = db::accounts::get_by_id(&mut conn, payload.account_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account"))?;

    let row = db::scan_sessions::get_for_account(&mut conn, payload.session_id, account.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Scan session"))?;
    let session = row.into_session()?;

    let keep: HashSet<String> = match payload.except {
        KeepPolicy::Important => session
            .messages
            .iter()
            .filter(|m| m.bucket == Bucket::Important)
            .map(|m| m.message.id.clone())
            .collect(),
        KeepPolicy::None => HashSet::new(),
    };

    let mailbox = GmailMailbox::from_account(&account).await?;
    let config = ScanConfig::from_env();

    let outcome = mark_unread_as_read(&mailbox, &keep, config.action_batch).await?;

    db::scan_sessions::record_marked_read(
        &mut conn,
        payload.session_id,
        outcome.marked_read as i32,
    )
    .await?;

    Ok(Json(MarkReadResponse {
        marked_read: outcome.marked_read,
        kept_unread: outcome.kept_unread,
    }))
}

pub async fn cleanup(
    State(pool): State<DbPool>,
    Json(payload): Json<CleanupRequest>,
) -> ApiResult<Json<CleanupResponse>> {
    payload
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut conn = pool.get().await?;

    let account = db::accounts::get_by_id(&mut conn, payload.account_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account"))?;

    let mailbox = GmailMailbox::from_account(&account).await?;

    // Category filters address labels by their actual remote names, which
    // may carry a collision suffix.
    let mut label_names = Vec::new();
    if let Some(categories) = &payload.categories {
        let ownership = db::label_ownership::get(&mut conn, account.id).await?;
        for name in categories {
            let Some(label_id) = ownership.get(name) else {
                tracing::warn!("No owned label for category '{}', skipping filter", name);
                continue;
            };
            match mailbox.get_label(label_id).await {
                Ok(Some(label)) => label_names.push(label.name),
                Ok(None) => {
                    tracing::warn!("Owned label for '{}' no longer exists, skipping", name)
                }
                Err(e) => return Err(ApiError::Internal(e)),
            }
        }
        if label_names.is_empty() {
            return Err(ApiError::bad_request(
                "None of the requested categories has a synced label",
            ));
        }
    }

    let senders = payload.senders.clone().unwrap_or_default();
    let query = build_cleanup_query(payload.older_than_days, &label_names, &senders);
    let config = ScanConfig::from_env();

    tracing::info!(
        "Cleanup for {}: action={:?}, query={}",
        account.email_address,
        payload.action,
        query
    );

    let outcome = cleanup_messages(&mailbox, payload.action, &query, config.action_batch).await?;

    // Audit row so the sweep shows up in session history.
    let session = db::scan_sessions::insert(
        &mut conn,
        NewScanSession {
            account_id: account.id,
            total_unread_estimate: 0,
            counts: serde_json::to_string(&CategoryCounts::default())?,
            messages: "[]".to_string(),
        },
    )
    .await?;

    Ok(Json(CleanupResponse {
        processed: outcome.processed,
        archived: outcome.archived,
        deleted: outcome.deleted,
        session_id: session.id,
    }))
}
