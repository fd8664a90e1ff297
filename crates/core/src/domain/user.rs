use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// An authenticated principal. Rows are created lazily on first successful
/// authentication; `email` is the stable lookup key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Subject claim from the external identity provider, when known.
    pub external_subject: Option<String>,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
