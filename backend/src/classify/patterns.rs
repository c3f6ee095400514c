//! Deterministic pattern pass.
//!
//! Pure, zero-network classification over sender and subject signals.
//! Rules run in a fixed precedence order; the first match wins, so a
//! message that looks like both a receipt and a marketing blast is a
//! receipt. Known-contact allowlist membership beats everything.

use std::collections::HashSet;

use shared::models::{Bucket, MessageSummary};

/// Subject signals for order confirmations, invoices, shipping notices.
const RECEIPT_KEYWORDS: &[&str] = &[
    "receipt",
    "order confirmation",
    "your order",
    "order #",
    "invoice",
    "payment received",
    "payment confirmation",
    "shipped",
    "shipping confirmation",
    "out for delivery",
    "delivered",
    "your purchase",
    "refund",
];

/// Subject signals for recurring billing and plan management.
const SUBSCRIPTION_KEYWORDS: &[&str] = &[
    "subscription",
    "renewal",
    "renews",
    "auto-renew",
    "your plan",
    "billing statement",
    "payment due",
    "trial ending",
    "trial expires",
    "membership",
];

/// Subject signals for editorial/digest mail.
const NEWSLETTER_KEYWORDS: &[&str] = &[
    "newsletter",
    "digest",
    "weekly update",
    "monthly update",
    "this week in",
    "roundup",
    "issue #",
    "edition",
    "what's new",
];

/// Subject signals for promotional mail.
const MARKETING_KEYWORDS: &[&str] = &[
    "% off",
    "sale",
    "discount",
    "limited time",
    "special offer",
    "exclusive offer",
    "deal",
    "coupon",
    "promo",
    "free shipping",
    "don't miss",
    "last chance",
    "act now",
];

/// Sender-address fragments typical of automated notification mail.
const NOTIFICATION_SENDER_SIGNALS: &[&str] = &[
    "no-reply",
    "noreply",
    "do-not-reply",
    "donotreply",
    "notification",
    "notifications@",
    "alert",
    "alerts@",
    "notify@",
    "updates@",
    "mailer-daemon",
    "postmaster@",
    "system@",
];

fn first_match(haystack: &str, keywords: &'static [&'static str]) -> Option<&'static str> {
    keywords.iter().find(|kw| haystack.contains(*kw)).copied()
}

/// Classify a message from headers alone.
///
/// Returns `None` when no rule matches; those messages go to the LLM pass.
pub fn classify(
    summary: &MessageSummary,
    known_contacts: &HashSet<String>,
) -> Option<(Bucket, String)> {
    // Allowlist membership always wins regardless of content.
    if known_contacts.contains(&summary.from_address) {
        return Some((
            Bucket::Important,
            format!("Known contact: {}", summary.from_address),
        ));
    }

    let subject = summary.subject.to_lowercase();
    let sender = summary.from_address.to_lowercase();

    if let Some(kw) = first_match(&subject, RECEIPT_KEYWORDS) {
        return Some((Bucket::Receipts, format!("Receipt signal: '{kw}'")));
    }

    if let Some(kw) = first_match(&subject, SUBSCRIPTION_KEYWORDS) {
        return Some((
            Bucket::Subscriptions,
            format!("Subscription billing signal: '{kw}'"),
        ));
    }

    if let Some(kw) = first_match(&subject, NEWSLETTER_KEYWORDS) {
        return Some((Bucket::Newsletters, format!("Newsletter signal: '{kw}'")));
    }

    if let Some(kw) = first_match(&subject, MARKETING_KEYWORDS) {
        return Some((Bucket::Marketing, format!("Marketing signal: '{kw}'")));
    }

    // Bulk senders set List-Unsubscribe even when the subject carries no
    // promotional keywords.
    if summary.has_unsubscribe_header {
        return Some((
            Bucket::Marketing,
            "Carries an unsubscribe header".to_string(),
        ));
    }

    if let Some(signal) = first_match(&sender, NOTIFICATION_SENDER_SIGNALS) {
        return Some((
            Bucket::Notifications,
            format!("Automated sender: '{signal}'"),
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(from: &str, subject: &str) -> MessageSummary {
        MessageSummary {
            id: "m1".to_string(),
            thread_id: "m1".to_string(),
            from: from.to_string(),
            from_address: from.to_lowercase(),
            subject: subject.to_string(),
            date: None,
            has_unsubscribe_header: false,
            unsubscribe_link: None,
            is_threaded: false,
        }
    }

    #[test]
    fn receipt_beats_marketing() {
        // Subject matches both a receipt pattern and a marketing pattern;
        // precedence says receipt.
        let msg = summary("store@shop.com", "Your order confirmation - 20% off next time");
        let (bucket, _) = classify(&msg, &HashSet::new()).expect("should classify");
        assert_eq!(bucket, Bucket::Receipts);
    }

    #[test]
    fn receipt_beats_unsubscribe_header() {
        let mut msg = summary("store@shop.com", "Receipt for your purchase");
        msg.has_unsubscribe_header = true;
        let (bucket, _) = classify(&msg, &HashSet::new()).expect("should classify");
        assert_eq!(bucket, Bucket::Receipts);
    }

    #[test]
    fn known_contact_wins_regardless_of_content() {
        let msg = summary("friend@example.com", "Huge sale! 50% off everything");
        let known: HashSet<String> = ["friend@example.com".to_string()].into_iter().collect();
        let (bucket, reason) = classify(&msg, &known).expect("should classify");
        assert_eq!(bucket, Bucket::Important);
        assert!(reason.contains("Known contact"));
    }

    #[test]
    fn unsubscribe_header_alone_means_marketing() {
        let mut msg = summary("hello@somebrand.com", "A note from our founder");
        msg.has_unsubscribe_header = true;
        let (bucket, _) = classify(&msg, &HashSet::new()).expect("should classify");
        assert_eq!(bucket, Bucket::Marketing);
    }

    #[test]
    fn noreply_sender_is_notification() {
        let msg = summary("no-reply@service.io", "Your weekly report is ready");
        let (bucket, _) = classify(&msg, &HashSet::new()).expect("should classify");
        assert_eq!(bucket, Bucket::Notifications);
    }

    #[test]
    fn plain_personal_mail_is_uncategorized() {
        let msg = summary("colleague@work.com", "Lunch tomorrow?");
        assert!(classify(&msg, &HashSet::new()).is_none());
    }

    #[test]
    fn subscription_and_newsletter_signals() {
        let msg = summary("billing@app.com", "Your subscription renews soon");
        assert_eq!(
            classify(&msg, &HashSet::new()).unwrap().0,
            Bucket::Subscriptions
        );

        let msg = summary("news@daily.com", "The Tuesday digest");
        assert_eq!(
            classify(&msg, &HashSet::new()).unwrap().0,
            Bucket::Newsletters
        );
    }
}
