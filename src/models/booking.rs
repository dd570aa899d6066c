use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub tutor_id: i64,
    pub student_id: i64,
    pub subject: String,
    pub level: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub is_online: bool,
    pub notes: Option<String>,
    pub hourly_rate: f64,
    pub total_amount: f64,
    pub status: BookingStatus,
    pub cancellation_reason: Option<String>,
    pub booking_offer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub rescheduled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn involves(&self, user_id: i64) -> bool {
        self.tutor_id == user_id || self.student_id == user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "expired" => Ok(BookingStatus::Expired),
            _ => Err(anyhow::anyhow!("unknown booking status: {s}")),
        }
    }
}

/// Name and email of the other side of a booking, joined in list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySummary {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingWithParty {
    #[serde(flatten)]
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tutor: Option<PartySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<PartySummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub tutor_id: i64,
    pub student_id: i64,
    pub subject: String,
    pub level: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub notes: Option<String>,
    pub hourly_rate: f64,
}

pub const MAX_NOTES_LEN: usize = 500;

impl NewBooking {
    pub fn validate(&self) -> Result<(), String> {
        if self.subject.trim().is_empty() {
            return Err("\"subject\" is required".to_string());
        }
        if self.level.trim().is_empty() {
            return Err("\"level\" is required".to_string());
        }
        if self.tutor_id == self.student_id {
            return Err("\"tutorId\" and \"studentId\" must differ".to_string());
        }
        if !self.hourly_rate.is_finite() || self.hourly_rate < 0.0 {
            return Err("\"hourlyRate\" must be greater than or equal to 0".to_string());
        }
        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_NOTES_LEN {
                return Err(format!(
                    "\"notes\" length must be less than or equal to {MAX_NOTES_LEN} characters long"
                ));
            }
        }
        if self.end_time <= self.start_time {
            return Err("\"endTime\" must be after \"startTime\"".to_string());
        }
        Ok(())
    }

    pub fn total_amount(&self) -> f64 {
        total_amount(&self.start_time, &self.end_time, self.hourly_rate)
    }
}

/// Session price for the given window, rounded to cents.
pub fn total_amount(start: &DateTime<Utc>, end: &DateTime<Utc>, hourly_rate: f64) -> f64 {
    let hours = (*end - *start).num_seconds() as f64 / 3600.0;
    (hours * hourly_rate * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request() -> NewBooking {
        NewBooking {
            tutor_id: 1,
            student_id: 2,
            subject: "Maths".to_string(),
            level: "GCSE".to_string(),
            start_time: Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2030, 1, 7, 11, 30, 0).unwrap(),
            location: None,
            is_online: true,
            notes: None,
            hourly_rate: 40.0,
        }
    }

    #[test]
    fn test_total_amount_prorates_hours() {
        assert_eq!(request().total_amount(), 60.0);
    }

    #[test]
    fn test_total_amount_rounds_to_cents() {
        let start = Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2030, 1, 7, 10, 20, 0).unwrap();
        assert_eq!(total_amount(&start, &end, 25.0), 8.33);
    }

    #[test]
    fn test_validate_accepts_well_formed_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_end_before_start() {
        let mut req = request();
        req.end_time = req.start_time - chrono::Duration::minutes(30);
        assert!(req.validate().unwrap_err().contains("endTime"));
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut req = request();
        req.subject = "  ".to_string();
        assert!(req.validate().is_err());

        let mut req = request();
        req.hourly_rate = -1.0;
        assert!(req.validate().is_err());

        let mut req = request();
        req.student_id = req.tutor_id;
        assert!(req.validate().is_err());

        let mut req = request();
        req.notes = Some("x".repeat(MAX_NOTES_LEN + 1));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("done".parse::<BookingStatus>().is_err());
    }
}
