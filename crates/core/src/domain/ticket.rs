use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderId;
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Open,
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "InProgress",
            Self::Closed => "Closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Open" => Some(Self::Open),
            "InProgress" => Some(Self::InProgress),
            "Closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// A support case. The `ticket_id` (`TKT-` prefixed) is the durable
/// reference handed back to the customer and must be echoed verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub issue: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}
