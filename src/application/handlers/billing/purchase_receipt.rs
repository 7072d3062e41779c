//! PurchaseReceiptDispatcher - Emails a receipt after a course purchase.
//!
//! Delivery is best effort. Every failure is logged and swallowed so a
//! receipt can never fail or retry the webhook.

use std::sync::Arc;

use crate::domain::foundation::{CourseId, Timestamp, UserId};
use crate::ports::{CourseCatalog, CourseSummary, EmailMessage, EmailSender, UserAccessRepository, UserContact};

/// What the receipt is about.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub user_id: UserId,
    pub course_id: CourseId,
    /// Amount charged in cents, when Korvex reported it.
    pub amount_cents: Option<i64>,
    pub paid_at: Timestamp,
}

/// Builds and sends course purchase receipts.
pub struct PurchaseReceiptDispatcher {
    users: Arc<dyn UserAccessRepository>,
    courses: Arc<dyn CourseCatalog>,
    email: Arc<dyn EmailSender>,
}

impl PurchaseReceiptDispatcher {
    pub fn new(
        users: Arc<dyn UserAccessRepository>,
        courses: Arc<dyn CourseCatalog>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            users,
            courses,
            email,
        }
    }

    /// Sends the receipt. Returns whether it was handed to the email sender.
    pub async fn dispatch(&self, receipt: PurchaseReceipt) -> bool {
        let contact = match self.users.find_contact(&receipt.user_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                tracing::warn!(user_id = %receipt.user_id, "Receipt skipped: user not found");
                return false;
            }
            Err(e) => {
                tracing::warn!(user_id = %receipt.user_id, error = %e, "Receipt skipped: user lookup failed");
                return false;
            }
        };

        let course = match self.courses.find_summary(&receipt.course_id).await {
            Ok(Some(course)) => course,
            Ok(None) => {
                tracing::warn!(course_id = %receipt.course_id, "Receipt skipped: course not found");
                return false;
            }
            Err(e) => {
                tracing::warn!(course_id = %receipt.course_id, error = %e, "Receipt skipped: course lookup failed");
                return false;
            }
        };

        let message = render_receipt(&contact, &course, &receipt);
        match self.email.send(message).await {
            Ok(()) => {
                tracing::info!(
                    user_id = %receipt.user_id,
                    course_id = %receipt.course_id,
                    "Purchase receipt sent"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %receipt.user_id,
                    course_id = %receipt.course_id,
                    error = %e,
                    "Failed to send purchase receipt"
                );
                false
            }
        }
    }
}

/// Renders the receipt. The amount falls back to the course list price.
pub fn render_receipt(
    contact: &UserContact,
    course: &CourseSummary,
    receipt: &PurchaseReceipt,
) -> EmailMessage {
    let greeting_name = contact
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("there");
    let amount = receipt
        .amount_cents
        .or(course.price_cents)
        .map(format_brl)
        .unwrap_or_else(|| "-".to_string());
    let date = receipt.paid_at.as_datetime().format("%d/%m/%Y").to_string();

    let subject = format!("Your purchase: {}", course.title);

    let text = format!(
        "Hi {name},\n\n\
         Thanks for your purchase. Your course is now available.\n\n\
         Course: {title}\n\
         Amount: {amount}\n\
         Date: {date}\n",
        name = greeting_name,
        title = course.title,
        amount = amount,
        date = date,
    );

    let html = format!(
        "<p>Hi {name},</p>\
         <p>Thanks for your purchase. Your course is now available.</p>\
         <table>\
         <tr><td>Course</td><td>{title}</td></tr>\
         <tr><td>Amount</td><td>{amount}</td></tr>\
         <tr><td>Date</td><td>{date}</td></tr>\
         </table>",
        name = escape_html(greeting_name),
        title = escape_html(&course.title),
        amount = escape_html(&amount),
        date = date,
    );

    EmailMessage {
        to: contact.email.clone(),
        subject,
        html,
        text,
    }
}

/// Formats cents as Brazilian reais, e.g. `R$ 1.234,50`.
fn format_brl(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let reais = (cents / 100).to_string();
    let mut grouped = String::with_capacity(reais.len() + reais.len() / 3);
    for (i, digit) in reais.chars().enumerate() {
        if i > 0 && (reais.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    format!("{}R$ {},{:02}", sign, grouped, cents % 100)
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
