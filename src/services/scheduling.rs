use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::availability::describe_slots;

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("\"endTime\" must be after \"startTime\"")]
    InvalidWindow,

    #[error("That time is outside the tutor's availability. Available: {hours}")]
    OutsideAvailability { hours: String },

    #[error("Time slot is already booked")]
    Conflict,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Checks that `[start, end)` fits the tutor's declared availability.
///
/// A tutor with no available slots takes bookings at any time. Slots marked
/// unavailable always block the time they cover.
pub fn check_availability(
    conn: &Connection,
    tutor_id: i64,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<(), SchedulingError> {
    let slots = queries::get_availability(conn, tutor_id, None, None)?;
    let outside = || SchedulingError::OutsideAvailability {
        hours: describe_slots(&slots),
    };

    if slots
        .iter()
        .any(|s| !s.is_available && s.overlaps(start, end))
    {
        return Err(outside());
    }

    let mut available = slots.iter().filter(|s| s.is_available).peekable();
    if available.peek().is_none() {
        return Ok(());
    }
    if available.any(|s| s.contains(start, end)) {
        Ok(())
    } else {
        Err(outside())
    }
}

pub fn check_conflicts(
    conn: &Connection,
    tutor_id: i64,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    exclude_booking: Option<i64>,
) -> Result<(), SchedulingError> {
    let overlapping =
        queries::get_overlapping_confirmed_bookings(conn, tutor_id, start, end, exclude_booking)?;
    if let Some(existing) = overlapping.first() {
        tracing::debug!(tutor_id, existing = existing.id, "booking window overlaps");
        return Err(SchedulingError::Conflict);
    }
    Ok(())
}

/// Full check used for student-requested windows: shape, availability, then conflicts.
pub fn validate_booking_time(
    conn: &Connection,
    tutor_id: i64,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    exclude_booking: Option<i64>,
) -> Result<(), SchedulingError> {
    if end <= start {
        return Err(SchedulingError::InvalidWindow);
    }
    check_availability(conn, tutor_id, start, end)?;
    check_conflicts(conn, tutor_id, start, end, exclude_booking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Booking, BookingStatus, NewAvailabilitySlot, User, UserType};
    use chrono::{NaiveDate, NaiveDateTime};

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        for (id, user_type) in [(1, UserType::Tutor), (2, UserType::Student)] {
            queries::upsert_user(
                &conn,
                &User {
                    id,
                    email: format!("user{id}@example.com"),
                    first_name: String::new(),
                    last_name: String::new(),
                    user_type,
                },
            )
            .unwrap();
        }
        conn
    }

    fn dt(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
            .unwrap()
            .and_utc()
    }

    fn add_slot(conn: &Connection, day: i64, start: &str, end: &str, available: bool, date: Option<&str>) {
        let slot = NewAvailabilitySlot {
            day_of_week: day,
            start_time: start.to_string(),
            end_time: end.to_string(),
            is_available: available,
            date: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
        };
        queries::insert_availability_slot(conn, 1, &slot, &Utc::now()).unwrap();
    }

    fn add_confirmed(conn: &Connection, start: &str, end: &str) -> Booking {
        let now = Utc::now();
        queries::insert_booking(
            conn,
            &Booking {
                id: 0,
                tutor_id: 1,
                student_id: 2,
                subject: "Chemistry".to_string(),
                level: "GCSE".to_string(),
                start_time: dt(start),
                end_time: dt(end),
                location: None,
                is_online: true,
                notes: None,
                hourly_rate: 20.0,
                total_amount: 20.0,
                status: BookingStatus::Confirmed,
                cancellation_reason: None,
                booking_offer_id: None,
                created_at: now,
                updated_at: now,
                confirmed_at: Some(now),
                cancelled_at: None,
                rescheduled_at: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_no_slots_means_unrestricted() {
        let conn = setup_db();
        // 2025-06-15 is a Sunday
        let result = validate_booking_time(&conn, 1, &dt("2025-06-15 20:00"), &dt("2025-06-15 21:00"), None);
        assert!(result.is_ok());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let conn = setup_db();
        let result = validate_booking_time(&conn, 1, &dt("2025-06-16 11:00"), &dt("2025-06-16 10:00"), None);
        assert!(matches!(result, Err(SchedulingError::InvalidWindow)));
    }

    #[test]
    fn test_outside_availability() {
        let conn = setup_db();
        add_slot(&conn, 1, "09:00", "17:00", true, None);
        // 2025-06-16 is Monday
        let result = validate_booking_time(&conn, 1, &dt("2025-06-16 20:00"), &dt("2025-06-16 21:00"), None);
        match result {
            Err(SchedulingError::OutsideAvailability { hours }) => assert_eq!(hours, "Mon 09:00-17:00"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_end_time_exceeds_slot() {
        let conn = setup_db();
        add_slot(&conn, 1, "09:00", "17:00", true, None);
        let result = validate_booking_time(&conn, 1, &dt("2025-06-16 16:30"), &dt("2025-06-16 17:30"), None);
        assert!(matches!(result, Err(SchedulingError::OutsideAvailability { .. })));
    }

    #[test]
    fn test_unavailable_slot_blocks_time() {
        let conn = setup_db();
        add_slot(&conn, 1, "09:00", "17:00", true, None);
        add_slot(&conn, 1, "12:00", "13:00", false, Some("2025-06-16"));
        let blocked = validate_booking_time(&conn, 1, &dt("2025-06-16 12:30"), &dt("2025-06-16 13:30"), None);
        assert!(matches!(blocked, Err(SchedulingError::OutsideAvailability { .. })));
        // Same time a week later is fine
        let later = validate_booking_time(&conn, 1, &dt("2025-06-23 12:30"), &dt("2025-06-23 13:30"), None);
        assert!(later.is_ok());
    }

    #[test]
    fn test_unavailable_slot_after_midnight_blocks_time() {
        let conn = setup_db();
        // 2025-06-17 is a Tuesday
        add_slot(&conn, 2, "00:00", "02:00", false, None);
        let result = validate_booking_time(&conn, 1, &dt("2025-06-16 23:00"), &dt("2025-06-17 01:00"), None);
        assert!(matches!(result, Err(SchedulingError::OutsideAvailability { .. })));
        let before = validate_booking_time(&conn, 1, &dt("2025-06-16 22:00"), &dt("2025-06-16 23:00"), None);
        assert!(before.is_ok());
    }

    #[test]
    fn test_conflict_with_confirmed_booking() {
        let conn = setup_db();
        add_confirmed(&conn, "2025-06-16 10:00", "2025-06-16 11:00");
        let result = validate_booking_time(&conn, 1, &dt("2025-06-16 10:30"), &dt("2025-06-16 11:30"), None);
        assert!(matches!(result, Err(SchedulingError::Conflict)));
    }

    #[test]
    fn test_no_conflict_adjacent_booking() {
        let conn = setup_db();
        add_confirmed(&conn, "2025-06-16 10:00", "2025-06-16 11:00");
        // 11:00 starts exactly when previous ends
        let result = validate_booking_time(&conn, 1, &dt("2025-06-16 11:00"), &dt("2025-06-16 12:00"), None);
        assert!(result.is_ok());
    }

    #[test]
    fn test_reschedule_excludes_itself() {
        let conn = setup_db();
        let existing = add_confirmed(&conn, "2025-06-16 10:00", "2025-06-16 11:00");
        let result = validate_booking_time(
            &conn,
            1,
            &dt("2025-06-16 10:30"),
            &dt("2025-06-16 11:30"),
            Some(existing.id),
        );
        assert!(result.is_ok());
    }
}
