//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machines)
//! - `billing` - Korvex envelopes, payments, subscriptions and course purchases

pub mod billing;
pub mod foundation;
