//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Record Ports
//!
//! - `PaymentRepository` - Payment lookup by Korvex keys and status updates
//! - `SubscriptionRepository` - One subscription per user
//! - `CoursePurchaseRepository` - Standalone course purchases
//! - `UserAccessRepository` - User entitlement fields and contact details
//! - `CourseCatalog` - Read-only course summaries
//!
//! ## Notification Ports
//!
//! - `EmailSender` - Outbound transactional email

mod course_catalog;
mod course_purchase_repository;
mod email_sender;
mod payment_repository;
mod subscription_repository;
mod user_access_repository;

pub use course_catalog::{CourseCatalog, CourseSummary};
pub use course_purchase_repository::CoursePurchaseRepository;
pub use email_sender::{EmailError, EmailMessage, EmailSender};
pub use payment_repository::PaymentRepository;
pub use subscription_repository::SubscriptionRepository;
pub use user_access_repository::{UserAccessRepository, UserContact};
