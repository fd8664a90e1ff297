use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelStatus {
    Generated,
    Used,
    Voided,
}

impl LabelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "Generated",
            Self::Used => "Used",
            Self::Voided => "Voided",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Generated" => Some(Self::Generated),
            "Used" => Some(Self::Used),
            "Voided" => Some(Self::Voided),
            _ => None,
        }
    }
}

/// A return authorization. Eligibility (return window, restocking fee,
/// non-returnable categories) is asserted upstream via policy lookup and
/// conversational confirmation; issuing a label is a pure side-effecting
/// primitive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLabel {
    pub label_id: String,
    pub order_id: OrderId,
    pub status: LabelStatus,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
