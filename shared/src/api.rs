use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    CategoryCounts, CategoryRole, ClassifiedMessage, LabelOwnership, SyncStats,
};

// ============================================================================
// Scan API Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanRequest {
    pub account_id: Uuid,
    pub scan_all: Option<bool>,
    pub max_messages: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanResponse {
    pub session_id: Uuid,
    pub messages: Vec<ClassifiedMessage>,
    pub counts: CategoryCounts,
    pub total_unread_estimate: i64,
    pub scanned_count: usize,
    pub has_more: bool,
    pub is_complete: bool,
    pub hit_max_limit: bool,
    pub hit_time_limit: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub counts: CategoryCounts,
    pub message_count: usize,
    pub total_unread_estimate: i64,
    pub marked_read_count: Option<i32>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Bulk Action API Types
// ============================================================================

/// Which classified messages a bulk mark-read keeps unread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepPolicy {
    Important,
    None,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadRequest {
    pub account_id: Uuid,
    pub session_id: Uuid,
    pub except: KeepPolicy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub marked_read: usize,
    pub kept_unread: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupAction {
    Archive,
    Delete,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CleanupRequest {
    pub account_id: Uuid,
    pub action: CleanupAction,

    #[validate(range(min = 1, max = 3650))]
    pub older_than_days: u32,

    pub categories: Option<Vec<String>>,
    pub senders: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub processed: usize,
    pub archived: usize,
    pub deleted: usize,
    pub session_id: Uuid,
}

// ============================================================================
// Label Sync API Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncLabelsRequest {
    pub account_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncLabelsResponse {
    pub labels: LabelOwnership,
    pub stats: SyncStats,
}

// ============================================================================
// Category API Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    pub account_id: Uuid,

    #[validate(length(min = 1, max = 100))]
    pub display_name: String,

    #[validate(length(min = 4, max = 7))]
    pub color_hex: String,

    pub role: CategoryRole,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[validate(length(max = 2000))]
    pub extra_rules: Option<String>,

    pub generates_reply: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    pub account_id: Uuid,

    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,

    #[validate(length(min = 4, max = 7))]
    pub color_hex: Option<String>,

    pub enabled: Option<bool>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[validate(length(max = 2000))]
    pub extra_rules: Option<String>,

    pub generates_reply: Option<bool>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ListCategoriesQuery {
    pub account_id: Uuid,
}

// ============================================================================
// Account API Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub account_name: String,
    pub email_address: String,
    pub provider: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
