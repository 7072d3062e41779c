//! Billing domain - Korvex payments, subscriptions and course purchases.
//!
//! # Module Structure
//!
//! - `envelope` - Typed Korvex webhook envelope
//! - `guard` - Shared-secret check on incoming envelopes
//! - `interval` - Billing interval and period arithmetic
//! - `payment` - Payment record and status machine
//! - `subscription` - Subscription record and lifecycle
//! - `course_purchase` - Standalone course purchase
//! - `errors` - Webhook error taxonomy

mod course_purchase;
mod envelope;
mod errors;
mod guard;
mod interval;
mod payment;
mod subscription;

pub use course_purchase::{CoursePurchase, PurchaseStatus};
pub use envelope::{
    EventKind, OrderItem, PaymentMethod, SubscriptionSnapshot, TransactionEvent,
    TransactionSnapshot, TransactionStatus, WebhookToken,
};
pub use errors::WebhookError;
pub use guard::WebhookAuthenticator;
pub use interval::{BillingInterval, BillingPeriod, IntervalUnit, MAX_INTERVAL_COUNT};
pub use payment::{Payment, PaymentStatus, SubscriptionIntent};
pub use subscription::{Subscription, SubscriptionStatus};
