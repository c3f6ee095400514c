use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use shared::api::AccountResponse;

pub async fn list_accounts(State(pool): State<DbPool>) -> ApiResult<Json<Vec<AccountResponse>>> {
    let mut conn = pool.get().await?;

    let rows = db::accounts::list_all(&mut conn).await?;
    let accounts = rows.into_iter().map(AccountResponse::from).collect();

    Ok(Json(accounts))
}

pub async fn delete_account(
    State(pool): State<DbPool>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = pool.get().await?;

    if db::accounts::get_by_id(&mut conn, account_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Account"));
    }

    db::accounts::delete(&mut conn, account_id).await?;
    tracing::info!("Deleted account {}", account_id);

    Ok(Json(serde_json::json!({ "deleted": true })))
}
