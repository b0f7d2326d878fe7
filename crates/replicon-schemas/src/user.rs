use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{UserId, UserRole};

/// `User`. Identity fields are immutable after creation; `active` is the
/// only field the core pipeline itself mutates (and it never flips it to
/// `true` — deactivation is an admin-surface concern, out of scope here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub role: UserRole,
    pub active: bool,
    pub broker_account_code: String,
    pub broker_user_id: String,
    /// Encrypted at rest by the (out-of-scope) credential layer; the core
    /// pipeline treats this as an opaque blob it forwards to the broker
    /// client, never logs, and never inspects.
    pub broker_password_encrypted: String,
    pub broker_api_key_encrypted: Option<String>,
    pub public_ip: Option<String>,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
