//! Email adapters.

mod resend;

pub use resend::ResendEmailSender;
