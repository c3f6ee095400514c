use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification bucket a message lands in after a scan.
///
/// This set is fixed; the user-editable taxonomy maps onto it via
/// [`CategoryRole`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Important,
    Receipts,
    Subscriptions,
    Newsletters,
    Marketing,
    Notifications,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Important => "important",
            Bucket::Receipts => "receipts",
            Bucket::Subscriptions => "subscriptions",
            Bucket::Newsletters => "newsletters",
            Bucket::Marketing => "marketing",
            Bucket::Notifications => "notifications",
        }
    }
}

/// Explicit semantic role of a taxonomy category.
///
/// Stored on the category at creation time so nothing has to be inferred
/// from the user-editable display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryRole {
    NeedsReply,
    Receipts,
    Subscriptions,
    Newsletters,
    Marketing,
    Notifications,
    CatchAll,
}

impl CategoryRole {
    /// The classification bucket this role feeds.
    pub fn bucket(&self) -> Bucket {
        match self {
            CategoryRole::NeedsReply => Bucket::Important,
            CategoryRole::Receipts => Bucket::Receipts,
            CategoryRole::Subscriptions => Bucket::Subscriptions,
            CategoryRole::Newsletters => Bucket::Newsletters,
            CategoryRole::Marketing => Bucket::Marketing,
            CategoryRole::Notifications => Bucket::Notifications,
            // Messages nothing else claimed default into the notifications
            // bucket, which the catch-all category mirrors.
            CategoryRole::CatchAll => Bucket::Notifications,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryRole::NeedsReply => "needs_reply",
            CategoryRole::Receipts => "receipts",
            CategoryRole::Subscriptions => "subscriptions",
            CategoryRole::Newsletters => "newsletters",
            CategoryRole::Marketing => "marketing",
            CategoryRole::Notifications => "notifications",
            CategoryRole::CatchAll => "catch_all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "needs_reply" => Some(CategoryRole::NeedsReply),
            "receipts" => Some(CategoryRole::Receipts),
            "subscriptions" => Some(CategoryRole::Subscriptions),
            "newsletters" => Some(CategoryRole::Newsletters),
            "marketing" => Some(CategoryRole::Marketing),
            "notifications" => Some(CategoryRole::Notifications),
            "catch_all" => Some(CategoryRole::CatchAll),
            _ => None,
        }
    }
}

/// A user-configured taxonomy entry.
///
/// Keys are dense positive integers reassigned on every taxonomy edit so
/// classification prompts always present a clean 1..N range. Exactly one
/// enabled category carries `required = true` (the needs-reply bucket) and
/// at most one enabled category has the `CatchAll` role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub key: i32,
    pub display_name: String,
    pub color_hex: String,
    pub enabled: bool,
    pub required: bool,
    pub role: CategoryRole,
    pub description: String,
    pub extra_rules: String,
    pub generates_reply: bool,
    pub sort_order: i32,
}

/// The six stock categories seeded for an account with no saved taxonomy.
pub fn default_taxonomy() -> Vec<Category> {
    let defaults: [(&str, &str, CategoryRole, bool, &str); 6] = [
        (
            "Important",
            "#fb4c2f",
            CategoryRole::NeedsReply,
            true,
            "Personal mail and anything that needs a reply",
        ),
        (
            "Receipts",
            "#16a766",
            CategoryRole::Receipts,
            false,
            "Order confirmations, invoices, shipping notices",
        ),
        (
            "Subscriptions",
            "#ffad47",
            CategoryRole::Subscriptions,
            false,
            "Recurring billing, renewals, plan changes",
        ),
        (
            "Newsletters",
            "#4a86e8",
            CategoryRole::Newsletters,
            false,
            "Digests, editorial roundups, periodic updates",
        ),
        (
            "Marketing",
            "#a479e2",
            CategoryRole::Marketing,
            false,
            "Promotions, sales, bulk commercial mail",
        ),
        (
            "Other",
            "#999999",
            CategoryRole::CatchAll,
            false,
            "Automated notifications and everything else",
        ),
    ];

    defaults
        .into_iter()
        .enumerate()
        .map(
            |(i, (name, color, role, required, description))| Category {
                id: Uuid::new_v4(),
                key: (i + 1) as i32,
                display_name: name.to_string(),
                color_hex: color.to_string(),
                enabled: true,
                required,
                role,
                description: description.to_string(),
                extra_rules: String::new(),
                generates_reply: required,
                sort_order: i as i32,
            },
        )
        .collect()
}

/// Metadata-only view of a remote message. Immutable once fetched; the scan
/// path never downloads message bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: String,
    pub from: String,
    pub from_address: String,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub has_unsubscribe_header: bool,
    pub unsubscribe_link: Option<String>,
    pub is_threaded: bool,
}

/// A message plus the bucket the pipeline assigned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedMessage {
    #[serde(flatten)]
    pub message: MessageSummary,
    pub bucket: Bucket,
    pub reason: String,
}

/// Per-bucket message counts for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub important: u32,
    pub receipts: u32,
    pub subscriptions: u32,
    pub newsletters: u32,
    pub marketing: u32,
    pub notifications: u32,
}

impl CategoryCounts {
    pub fn bump(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::Important => self.important += 1,
            Bucket::Receipts => self.receipts += 1,
            Bucket::Subscriptions => self.subscriptions += 1,
            Bucket::Newsletters => self.newsletters += 1,
            Bucket::Marketing => self.marketing += 1,
            Bucket::Notifications => self.notifications += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.important
            + self.receipts
            + self.subscriptions
            + self.newsletters
            + self.marketing
            + self.notifications
    }
}

/// Persisted result of one classification run. Write-once after the scan
/// completes, except for `marked_read_count` recorded by a later bulk action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: Uuid,
    pub account_id: Uuid,
    pub total_unread_estimate: i64,
    pub counts: CategoryCounts,
    pub messages: Vec<ClassifiedMessage>,
    pub marked_read_count: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Map from category display name to the remote label id the reconciler
/// created for it. An entry exists only for labels we created ourselves;
/// pre-existing remote labels are never adopted.
pub type LabelOwnership = BTreeMap<String, String>;

/// Per-class label counts from one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub created: u32,
    pub deleted: u32,
    pub updated: u32,
    pub stale_removed: u32,
}
