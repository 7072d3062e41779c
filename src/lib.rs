//! Korvex Billing - Payment webhook reconciliation
//!
//! Receives Korvex transaction events and reconciles them against payments,
//! subscriptions, course purchases and user access.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
