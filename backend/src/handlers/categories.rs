//! Taxonomy CRUD.
//!
//! Every mutation finishes with a key renumbering pass so category keys
//! stay dense 1..N with enabled categories first. The required category
//! (the needs-reply bucket) can be renamed and recolored but never
//! disabled or deleted.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::NewCategory;
use shared::api::{CreateCategoryRequest, ListCategoriesQuery, UpdateCategoryRequest};
use shared::models::{Category, CategoryRole};

/// At most one enabled category may carry the catch-all role; it is the
/// default bucket and a second one would make routing ambiguous.
fn has_enabled_catch_all(existing: &[Category], ignore_id: Option<Uuid>) -> bool {
    existing
        .iter()
        .filter(|c| Some(c.id) != ignore_id)
        .any(|c| c.enabled && c.role == CategoryRole::CatchAll)
}

pub async fn list_categories(
    State(pool): State<DbPool>,
    Query(query): Query<ListCategoriesQuery>,
) -> ApiResult<Json<Vec<Category>>> {
    let mut conn = pool.get().await?;

    if db::accounts::get_by_id(&mut conn, query.account_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Account"));
    }

    db::categories::ensure_defaults(&mut conn, query.account_id).await?;
    let categories = db::categories::list_for_account(&mut conn, query.account_id).await?;

    Ok(Json(categories))
}

pub async fn create_category(
    State(pool): State<DbPool>,
    Json(payload): Json<CreateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    payload
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut conn = pool.get().await?;

    if db::accounts::get_by_id(&mut conn, payload.account_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Account"));
    }

    db::categories::ensure_defaults(&mut conn, payload.account_id).await?;
    let existing = db::categories::list_for_account(&mut conn, payload.account_id).await?;

    if payload.role == CategoryRole::CatchAll && has_enabled_catch_all(&existing, None) {
        return Err(ApiError::bad_request(
            "An enabled catch-all category already exists",
        ));
    }

    let new_category = NewCategory {
        account_id: payload.account_id,
        key: (existing.len() + 1) as i32,
        display_name: payload.display_name,
        color_hex: payload.color_hex,
        enabled: true,
        required: false,
        role: payload.role.as_str().to_string(),
        description: payload.description.unwrap_or_default(),
        extra_rules: payload.extra_rules.unwrap_or_default(),
        generates_reply: payload.generates_reply.unwrap_or(false),
        sort_order: existing.len() as i32,
    };

    let created = db::categories::insert(&mut conn, new_category).await?;
    db::categories::renumber(&mut conn, payload.account_id).await?;

    // Renumbering may have shifted the key we just assigned.
    let category = db::categories::get_by_id(&mut conn, created.id, payload.account_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    Ok(Json(category))
}

pub async fn update_category(
    State(pool): State<DbPool>,
    Path(category_id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    payload
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut conn = pool.get().await?;

    let existing = db::categories::get_by_id(&mut conn, category_id, payload.account_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    if existing.required && payload.enabled == Some(false) {
        return Err(ApiError::bad_request(
            "The required category cannot be disabled",
        ));
    }

    if existing.role == CategoryRole::CatchAll && payload.enabled == Some(true) {
        let all = db::categories::list_for_account(&mut conn, payload.account_id).await?;
        if has_enabled_catch_all(&all, Some(existing.id)) {
            return Err(ApiError::bad_request(
                "An enabled catch-all category already exists",
            ));
        }
    }

    db::categories::update_fields(
        &mut conn,
        category_id,
        payload.display_name.as_deref(),
        payload.color_hex.as_deref(),
        payload.enabled,
        payload.description.as_deref(),
        payload.extra_rules.as_deref(),
        payload.generates_reply,
        payload.sort_order,
    )
    .await?;

    db::categories::renumber(&mut conn, payload.account_id).await?;

    let category = db::categories::get_by_id(&mut conn, category_id, payload.account_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    Ok(Json(category))
}

pub async fn delete_category(
    State(pool): State<DbPool>,
    Path(category_id): Path<Uuid>,
    Query(query): Query<ListCategoriesQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = pool.get().await?;

    let existing = db::categories::get_by_id(&mut conn, category_id, query.account_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    if existing.required {
        return Err(ApiError::bad_request(
            "The required category cannot be deleted",
        ));
    }

    db::categories::delete(&mut conn, category_id).await?;
    db::categories::renumber(&mut conn, query.account_id).await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
