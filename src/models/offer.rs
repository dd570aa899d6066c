use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingOffer {
    pub id: String,
    pub conversation_id: String,
    pub tutee_id: i64,
    pub tutor_id: i64,
    pub is_online: bool,
    pub tutee_location: Option<String>,
    pub tutor_location: Option<String>,
    pub final_location: Option<String>,
    pub proposed_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingOffer {
    pub fn involves(&self, user_id: i64) -> bool {
        self.tutor_id == user_id || self.tutee_id == user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Proposed,
    Confirmed,
    Cancelled,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Proposed => "proposed",
            OfferStatus::Confirmed => "confirmed",
            OfferStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OfferStatus::Pending),
            "proposed" => Ok(OfferStatus::Proposed),
            "confirmed" => Ok(OfferStatus::Confirmed),
            "cancelled" => Ok(OfferStatus::Cancelled),
            _ => Err(anyhow::anyhow!("unknown offer status: {s}")),
        }
    }
}
