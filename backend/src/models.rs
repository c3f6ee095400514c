// Database models for Diesel
use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use shared::models::{Category, CategoryCounts, CategoryRole, ClassifiedMessage, ScanSession};
use uuid::Uuid;

/// Database representation of a connected mailbox account
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AccountRow {
    pub id: Uuid,
    pub account_name: String,
    pub email_address: String,
    pub provider: String,
    pub oauth_refresh_token: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<AccountRow> for shared::api::AccountResponse {
    fn from(row: AccountRow) -> Self {
        shared::api::AccountResponse {
            id: row.id,
            account_name: row.account_name,
            email_address: row.email_address,
            provider: row.provider,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// Database representation of a taxonomy category
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CategoryRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub key: i32,
    pub display_name: String,
    pub color_hex: String,
    pub enabled: bool,
    pub required: bool,
    pub role: String,
    pub description: String,
    pub extra_rules: String,
    pub generates_reply: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CategoryRow {
    pub fn into_category(self) -> anyhow::Result<Category> {
        let role = CategoryRole::parse(&self.role)
            .with_context(|| format!("Unknown category role '{}'", self.role))?;
        Ok(Category {
            id: self.id,
            key: self.key,
            display_name: self.display_name,
            color_hex: self.color_hex,
            enabled: self.enabled,
            required: self.required,
            role,
            description: self.description,
            extra_rules: self.extra_rules,
            generates_reply: self.generates_reply,
            sort_order: self.sort_order,
        })
    }
}

/// Insertable struct for new categories
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::categories)]
pub struct NewCategory {
    pub account_id: Uuid,
    pub key: i32,
    pub display_name: String,
    pub color_hex: String,
    pub enabled: bool,
    pub required: bool,
    pub role: String,
    pub description: String,
    pub extra_rules: String,
    pub generates_reply: bool,
    pub sort_order: i32,
}

/// Database representation of a scan session.
/// Counts and messages are JSON stored as TEXT, not JSONB.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::scan_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScanSessionRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub total_unread_estimate: i64,
    pub counts: String,
    pub messages: String,
    pub marked_read_count: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl ScanSessionRow {
    pub fn into_session(self) -> Result<ScanSession, serde_json::Error> {
        let counts: CategoryCounts = serde_json::from_str(&self.counts)?;
        let messages: Vec<ClassifiedMessage> = serde_json::from_str(&self.messages)?;
        Ok(ScanSession {
            id: self.id,
            account_id: self.account_id,
            total_unread_estimate: self.total_unread_estimate,
            counts,
            messages,
            marked_read_count: self.marked_read_count,
            created_at: self.created_at,
        })
    }
}

/// Insertable struct for new scan sessions
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::scan_sessions)]
pub struct NewScanSession {
    pub account_id: Uuid,
    pub total_unread_estimate: i64,
    pub counts: String,
    pub messages: String,
}
