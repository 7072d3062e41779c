//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresPaymentRepository` - payments written by checkout
//! - `PostgresSubscriptionRepository` - one subscription per user
//! - `PostgresCoursePurchaseRepository` - standalone course purchases
//! - `PostgresUserAccessRepository` - access fields and contact details on `users`
//! - `PostgresCourseCatalog` - course titles and prices for receipts

mod course_purchase_repository;
mod payment_repository;
mod subscription_repository;
mod user_access_repository;

pub use course_purchase_repository::PostgresCoursePurchaseRepository;
pub use payment_repository::PostgresPaymentRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use user_access_repository::{PostgresCourseCatalog, PostgresUserAccessRepository};
