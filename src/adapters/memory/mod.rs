//! In-memory adapters.
//!
//! Back every billing port with process-local maps. Used by tests and for
//! running the service without a database.

mod billing_store;
mod recording_email_sender;

pub use billing_store::{InMemoryBillingStore, UserRecord};
pub use recording_email_sender::RecordingEmailSender;
