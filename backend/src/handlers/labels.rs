use axum::{extract::State, Json};

use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::mailbox::gmail::GmailMailbox;
use crate::triage::reconciler::reconcile_labels;
use shared::api::{SyncLabelsRequest, SyncLabelsResponse};

pub async fn sync_labels(
    State(pool): State<DbPool>,
    Json(payload): Json<SyncLabelsRequest>,
) -> ApiResult<Json<SyncLabelsResponse>> {
    let mut conn = pool.get().await?;

    let account = db::accounts::get_by_id(&mut conn, payload.account_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account"))?;

    db::categories::ensure_defaults(&mut conn, account.id).await?;
    let taxonomy = db::categories::list_for_account(&mut conn, account.id).await?;
    let owned = db::label_ownership::get(&mut conn, account.id).await?;

    let mailbox = GmailMailbox::from_account(&account).await?;

    let (ownership, stats) = reconcile_labels(&mailbox, &taxonomy, &owned).await?;

    db::label_ownership::put(&mut conn, account.id, &ownership).await?;

    Ok(Json(SyncLabelsResponse {
        labels: ownership,
        stats,
    }))
}
