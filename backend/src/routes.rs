use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::db::DbPool;
use crate::handlers::{accounts, actions, categories, labels, scan};

pub fn api_routes() -> Router<DbPool> {
    Router::new()
        // Account routes
        .route("/accounts", get(accounts::list_accounts))
        .route("/accounts/:id", delete(accounts::delete_account))
        // Scan routes
        .route("/scan", post(scan::scan))
        .route("/sessions/:id", get(scan::get_session))
        // Bulk action routes
        .route("/actions/mark-read", post(actions::mark_read))
        .route("/actions/cleanup", post(actions::cleanup))
        // Label sync
        .route("/labels/sync", post(labels::sync_labels))
        // Category routes
        .route("/categories", get(categories::list_categories))
        .route("/categories", post(categories::create_category))
        .route("/categories/:id", put(categories::update_category))
        .route("/categories/:id", delete(categories::delete_category))
}
