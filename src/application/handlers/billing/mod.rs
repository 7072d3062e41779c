//! Billing handlers.
//!
//! Processing of Korvex webhook deliveries:
//!
//! - `HandlePaymentWebhookHandler` - decodes, authenticates and routes events
//! - `RecordResolver` - finds the payment and course purchase for a transaction
//! - `SubscriptionLifecycle` - payment status and subscription changes
//! - `CoursePurchaseFinalizer` - completes or fails course purchases
//! - `AccessCascade` - writes subscription access onto the user
//! - `PurchaseReceiptDispatcher` - best-effort purchase receipts

mod access_cascade;
mod finalize_course_purchase;
mod handle_payment_webhook;
mod purchase_receipt;
mod resolve_records;
mod subscription_lifecycle;

pub use access_cascade::AccessCascade;
pub use finalize_course_purchase::CoursePurchaseFinalizer;
pub use handle_payment_webhook::{
    BillingPorts, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
    HandlePaymentWebhookResult, WebhookOutcome,
};
pub use purchase_receipt::{render_receipt, PurchaseReceipt, PurchaseReceiptDispatcher};
pub use resolve_records::{RecordResolver, ResolvedRecords};
pub use subscription_lifecycle::{billing_period, SubscriptionLifecycle};
