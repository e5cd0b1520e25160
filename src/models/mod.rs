// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod attributes;
pub mod turn;
pub mod user;

pub use attributes::AttributeCatalog;
pub use turn::{ConversationTurn, Role};
pub use user::{BillingCustomer, UserProfile};
