//! Scan endpoints: run the classification pipeline and read back sessions.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::classify::llm::OpenAiClassifier;
use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::mailbox::gmail::GmailMailbox;
use crate::models::NewScanSession;
use crate::triage::pipeline::{run_scan, ScanOptions};
use crate::triage::ScanConfig;
use shared::api::{ListCategoriesQuery, ScanRequest, ScanResponse, SessionResponse};
use shared::models::Bucket;

pub async fn scan(
    State(pool): State<DbPool>,
    Json(payload): Json<ScanRequest>,
) -> ApiResult<Json<ScanResponse>> {
    let mut conn = pool.get().await?;

    let account = db::accounts::get_by_id(&mut conn, payload.account_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account"))?;

    db::categories::ensure_defaults(&mut conn, account.id).await?;
    let taxonomy = db::categories::list_enabled(&mut conn, account.id).await?;
    let known_contacts = db::known_contacts::list(&mut conn, account.id).await?;

    let mailbox = GmailMailbox::from_account(&account).await?;
    let classifier =
        OpenAiClassifier::from_env().map_err(|e| ApiError::Config(e.to_string()))?;
    let config = ScanConfig::from_env();

    let opts = ScanOptions {
        scan_all: payload.scan_all.unwrap_or(false),
        max_messages: payload.max_messages.map(|m| m as usize),
    };

    tracing::info!(
        "Starting scan for {} (scan_all={}, max={:?})",
        account.email_address,
        opts.scan_all,
        opts.max_messages
    );

    let outcome = run_scan(
        &mailbox,
        &classifier,
        &taxonomy,
        &known_contacts,
        &opts,
        &config,
    )
    .await;

    let session = db::scan_sessions::insert(
        &mut conn,
        NewScanSession {
            account_id: account.id,
            total_unread_estimate: outcome.total_unread_estimate,
            counts: serde_json::to_string(&outcome.counts)?,
            messages: serde_json::to_string(&outcome.messages)?,
        },
    )
    .await?;

    // Grow the allowlist: senders of important mail short-circuit future
    // pattern passes.
    let important_senders: Vec<String> = outcome
        .messages
        .iter()
        .filter(|m| m.bucket == Bucket::Important)
        .map(|m| m.message.from_address.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !important_senders.is_empty() {
        db::known_contacts::record(&mut conn, account.id, &important_senders).await?;
    }

    Ok(Json(ScanResponse {
        session_id: session.id,
        messages: outcome.messages,
        counts: outcome.counts,
        total_unread_estimate: outcome.total_unread_estimate,
        scanned_count: outcome.scanned,
        has_more: outcome.has_more,
        is_complete: outcome.is_complete,
        hit_max_limit: outcome.hit_max_limit,
        hit_time_limit: outcome.hit_time_limit,
        elapsed_ms: outcome.elapsed_ms,
    }))
}

pub async fn get_session(
    State(pool): State<DbPool>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<ListCategoriesQuery>,
) -> ApiResult<Json<SessionResponse>> {
    let mut conn = pool.get().await?;

    let row = db::scan_sessions::get_for_account(&mut conn, session_id, query.account_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Scan session"))?;

    let session = row.into_session()?;

    Ok(Json(SessionResponse {
        session_id: session.id,
        counts: session.counts,
        message_count: session.messages.len(),
        total_unread_estimate: session.total_unread_estimate,
        marked_read_count: session.marked_read_count,
        created_at: session.created_at,
    }))
}
