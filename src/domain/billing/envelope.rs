//! Korvex webhook envelope.
//!
//! These types mirror the JSON Korvex posts to the webhook endpoint. Provider
//! string enums are parsed into closed enums at the boundary; values this
//! service does not know are kept in an `Unknown` variant so they can be
//! logged and skipped instead of failing the whole delivery.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::interval::IntervalUnit;
use super::WebhookError;
use crate::domain::foundation::Timestamp;

// ════════════════════════════════════════════════════════════════════════════════
// Provider enums
// ════════════════════════════════════════════════════════════════════════════════

/// Kind of event carried by an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum EventKind {
    TransactionCreated,
    TransactionPaid,
    TransactionCanceled,
    TransactionRefunded,
    Unknown(String),
}

impl EventKind {
    /// Event kinds this service acts on.
    pub const SUPPORTED: [EventKind; 4] = [
        EventKind::TransactionCreated,
        EventKind::TransactionPaid,
        EventKind::TransactionCanceled,
        EventKind::TransactionRefunded,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::TransactionCreated => "TRANSACTION_CREATED",
            EventKind::TransactionPaid => "TRANSACTION_PAID",
            EventKind::TransactionCanceled => "TRANSACTION_CANCELED",
            EventKind::TransactionRefunded => "TRANSACTION_REFUNDED",
            EventKind::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, EventKind::Unknown(_))
    }
}

impl From<String> for EventKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "TRANSACTION_CREATED" => EventKind::TransactionCreated,
            "TRANSACTION_PAID" => EventKind::TransactionPaid,
            "TRANSACTION_CANCELED" => EventKind::TransactionCanceled,
            "TRANSACTION_REFUNDED" => EventKind::TransactionRefunded,
            _ => EventKind::Unknown(raw),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream status of the transaction at the time of the event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    Canceled,
    Unknown(String),
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Refunded => "REFUNDED",
            TransactionStatus::Canceled => "CANCELED",
            TransactionStatus::Unknown(raw) => raw,
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "PENDING" => TransactionStatus::Pending,
            "COMPLETED" => TransactionStatus::Completed,
            "FAILED" => TransactionStatus::Failed,
            "REFUNDED" => TransactionStatus::Refunded,
            "CANCELED" | "CANCELLED" => TransactionStatus::Canceled,
            _ => TransactionStatus::Unknown(raw),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method used for the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum PaymentMethod {
    Pix,
    CreditCard,
    Boleto,
    Unknown(String),
}

impl PaymentMethod {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::Pix => "PIX",
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::Boleto => "BOLETO",
            PaymentMethod::Unknown(raw) => raw,
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "PIX" => PaymentMethod::Pix,
            "CREDIT_CARD" => PaymentMethod::CreditCard,
            "BOLETO" => PaymentMethod::Boleto,
            _ => PaymentMethod::Unknown(raw),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Shared secret echoed back by Korvex inside the envelope.
///
/// Debug output is redacted so envelopes can be logged safely.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct WebhookToken(String);

impl WebhookToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for WebhookToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookToken([REDACTED])")
    }
}

/// One Korvex notification, decoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvent {
    pub event: EventKind,

    #[serde(default)]
    pub token: Option<WebhookToken>,

    pub transaction: TransactionSnapshot,

    #[serde(default)]
    pub subscription: Option<SubscriptionSnapshot>,

    #[serde(default)]
    pub order_items: Option<Vec<OrderItem>>,

    #[serde(default)]
    pub track_props: Option<Map<String, Value>>,
}

impl TransactionEvent {
    /// Decodes a raw request body.
    pub fn from_slice(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedEnvelope(e.to_string()))
    }
}

/// State of the transaction as reported by Korvex.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSnapshot {
    /// Provider transaction id, the primary payment lookup key.
    pub id: String,

    /// Secondary identifier set at checkout, used as a fallback lookup key.
    #[serde(default)]
    pub identifier: Option<String>,

    pub status: TransactionStatus,

    pub payment_method: PaymentMethod,

    /// Gross amount in cents.
    #[serde(default)]
    pub amount: Option<i64>,

    #[serde(default)]
    pub net_amount: Option<i64>,

    #[serde(default)]
    pub fee: Option<i64>,

    #[serde(default)]
    pub created_at: Option<Timestamp>,

    /// Settlement time. Korvex spells it `payedAt`.
    #[serde(default, rename = "payedAt")]
    pub paid_at: Option<Timestamp>,

    /// Method-specific blocks (`pixInformation`, `cardInformation`, ...), kept raw.
    #[serde(flatten)]
    pub method_details: Map<String, Value>,
}

impl TransactionSnapshot {
    /// The secondary identifier, ignoring blank values.
    pub fn secondary_identifier(&self) -> Option<&str> {
        self.identifier
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Recurring-billing details attached to subscription payments.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnapshot {
    pub id: String,

    #[serde(default)]
    pub identifier: Option<String>,

    #[serde(default)]
    pub cycle: Option<u32>,

    pub start_at: Timestamp,

    pub interval_type: IntervalUnit,

    pub interval_count: i64,
}

/// A purchased line item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub quantity: Option<u32>,

    /// Unit price in cents.
    #[serde(default)]
    pub price: Option<i64>,
}
