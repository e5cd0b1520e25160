//! Durable per-user records.

use serde::{Deserialize, Serialize};

/// Free-text user profile record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub profile_text: String,
}

/// Billing customer record, created lazily and one-to-one with a user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingCustomer {
    pub customer_id: String,
}
