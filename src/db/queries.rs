use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{
    AvailabilitySlot, Booking, BookingOffer, BookingStatus, BookingWithParty, Conversation,
    Message, NewAvailabilitySlot, OfferStatus, PartySummary, User,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn ts(dt: &DateTime<Utc>) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn conversion_err(idx: usize, err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn ts_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|dt| dt.and_utc())
        .map_err(|e| conversion_err(idx, e.into()))
}

fn opt_ts_col(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => ts_col(row, idx).map(Some),
        None => Ok(None),
    }
}

fn parsed_col<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, e))
}

// ── Users ──

pub fn upsert_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, first_name, last_name, user_type) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET email = excluded.email, first_name = excluded.first_name,
             last_name = excluded.last_name, user_type = excluded.user_type",
        params![
            user.id,
            user.email,
            user.first_name,
            user.last_name,
            user.user_type.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: i64) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, first_name, last_name, user_type FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    first_name: row.get(2)?,
                    last_name: row.get(3)?,
                    user_type: parsed_col(row, 4)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

// ── Conversations & Messages ──

pub fn create_conversation(conn: &Connection, conv: &Conversation) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO conversations (id, participant1_id, participant2_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![conv.id, conv.participant1_id, conv.participant2_id, ts(&conv.created_at)],
    )?;
    Ok(())
}

pub fn get_conversation(conn: &Connection, id: &str) -> anyhow::Result<Option<Conversation>> {
    let conv = conn
        .query_row(
            "SELECT id, participant1_id, participant2_id, created_at FROM conversations WHERE id = ?1",
            params![id],
            |row| {
                Ok(Conversation {
                    id: row.get(0)?,
                    participant1_id: row.get(1)?,
                    participant2_id: row.get(2)?,
                    created_at: ts_col(row, 3)?,
                })
            },
        )
        .optional()?;
    Ok(conv)
}

pub fn insert_message(conn: &Connection, message: &Message) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, content, message_type, booking_offer_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            message.id,
            message.conversation_id,
            message.sender_id,
            message.content,
            message.message_type,
            message.booking_offer_id,
            ts(&message.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_messages(conn: &Connection, conversation_id: &str) -> anyhow::Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender_id, content, message_type, booking_offer_id, created_at
         FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![conversation_id], |row| {
        Ok(Message {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender_id: row.get(2)?,
            content: row.get(3)?,
            message_type: row.get(4)?,
            booking_offer_id: row.get(5)?,
            created_at: ts_col(row, 6)?,
        })
    })?;

    let mut messages = vec![];
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

// ── Availability ──

const SLOT_COLUMNS: &str =
    "id, tutor_id, day_of_week, start_time, end_time, is_available, date, created_at";

fn parse_slot_row(row: &Row) -> rusqlite::Result<AvailabilitySlot> {
    let date = match row.get::<_, Option<String>>(6)? {
        Some(raw) => Some(
            NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_err(6, e.into()))?,
        ),
        None => None,
    };
    Ok(AvailabilitySlot {
        id: row.get(0)?,
        tutor_id: row.get(1)?,
        day_of_week: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        is_available: row.get::<_, i32>(5)? != 0,
        date,
        created_at: ts_col(row, 7)?,
    })
}

pub fn insert_availability_slot(
    conn: &Connection,
    tutor_id: i64,
    slot: &NewAvailabilitySlot,
    now: &DateTime<Utc>,
) -> anyhow::Result<AvailabilitySlot> {
    conn.execute(
        "INSERT INTO availability_slots (tutor_id, day_of_week, start_time, end_time, is_available, date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tutor_id,
            slot.day_of_week,
            slot.start_time,
            slot.end_time,
            slot.is_available as i32,
            slot.date.map(|d| d.format(DATE_FORMAT).to_string()),
            ts(now),
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_availability_slot(conn, id)?
        .ok_or_else(|| anyhow::anyhow!("availability slot {id} vanished after insert"))
}

pub fn get_availability_slot(conn: &Connection, id: i64) -> anyhow::Result<Option<AvailabilitySlot>> {
    let slot = conn
        .query_row(
            &format!("SELECT {SLOT_COLUMNS} FROM availability_slots WHERE id = ?1"),
            params![id],
            parse_slot_row,
        )
        .optional()?;
    Ok(slot)
}

/// Recurring slots are always returned; the date range only narrows dated slots.
pub fn get_availability(
    conn: &Connection,
    tutor_id: i64,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> anyhow::Result<Vec<AvailabilitySlot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SLOT_COLUMNS} FROM availability_slots
         WHERE tutor_id = ?1
           AND (date IS NULL OR ((?2 IS NULL OR date >= ?2) AND (?3 IS NULL OR date <= ?3)))
         ORDER BY date ASC, day_of_week ASC, start_time ASC, id ASC"
    ))?;
    let rows = stmt.query_map(
        params![
            tutor_id,
            start_date.map(|d| d.format(DATE_FORMAT).to_string()),
            end_date.map(|d| d.format(DATE_FORMAT).to_string()),
        ],
        parse_slot_row,
    )?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

pub fn delete_availability_slot(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM availability_slots WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "b.id, b.tutor_id, b.student_id, b.subject, b.level, b.start_time, b.end_time, \
     b.location, b.is_online, b.notes, b.hourly_rate, b.total_amount, b.status, b.cancellation_reason, \
     b.booking_offer_id, b.created_at, b.updated_at, b.confirmed_at, b.cancelled_at, b.rescheduled_at";

fn parse_booking_row(row: &Row) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: row.get(0)?,
        tutor_id: row.get(1)?,
        student_id: row.get(2)?,
        subject: row.get(3)?,
        level: row.get(4)?,
        start_time: ts_col(row, 5)?,
        end_time: ts_col(row, 6)?,
        location: row.get(7)?,
        is_online: row.get::<_, i32>(8)? != 0,
        notes: row.get(9)?,
        hourly_rate: row.get(10)?,
        total_amount: row.get(11)?,
        status: parsed_col::<BookingStatus>(row, 12)?,
        cancellation_reason: row.get(13)?,
        booking_offer_id: row.get(14)?,
        created_at: ts_col(row, 15)?,
        updated_at: ts_col(row, 16)?,
        confirmed_at: opt_ts_col(row, 17)?,
        cancelled_at: opt_ts_col(row, 18)?,
        rescheduled_at: opt_ts_col(row, 19)?,
    })
}

/// Inserts the booking (its `id` is ignored) and returns the stored row.
pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<Booking> {
    conn.execute(
        "INSERT INTO bookings (tutor_id, student_id, subject, level, start_time, end_time, location, is_online,
             notes, hourly_rate, total_amount, status, booking_offer_id, created_at, updated_at, confirmed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            booking.tutor_id,
            booking.student_id,
            booking.subject,
            booking.level,
            ts(&booking.start_time),
            ts(&booking.end_time),
            booking.location,
            booking.is_online as i32,
            booking.notes,
            booking.hourly_rate,
            booking.total_amount,
            booking.status.as_str(),
            booking.booking_offer_id,
            ts(&booking.created_at),
            ts(&booking.updated_at),
            booking.confirmed_at.as_ref().map(ts),
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_booking_by_id(conn, id)?.ok_or_else(|| anyhow::anyhow!("booking {id} vanished after insert"))
}

pub fn get_booking_by_id(conn: &Connection, id: i64) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
            params![id],
            parse_booking_row,
        )
        .optional()?;
    Ok(booking)
}

/// Which side of the booking a listing is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingRole {
    Student,
    Tutor,
}

/// Bookings of one user, newest first, with the counterpart's name and email.
pub fn list_bookings(
    conn: &Connection,
    role: BookingRole,
    user_id: i64,
    status: Option<BookingStatus>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<BookingWithParty>> {
    let (filter_col, party_col) = match role {
        BookingRole::Student => ("student_id", "tutor_id"),
        BookingRole::Tutor => ("tutor_id", "student_id"),
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS}, u.first_name, u.last_name, u.email
         FROM bookings b LEFT JOIN users u ON u.id = b.{party_col}
         WHERE b.{filter_col} = ?1 AND (?2 IS NULL OR b.status = ?2)
         ORDER BY b.created_at DESC, b.id DESC
         LIMIT ?3 OFFSET ?4"
    ))?;

    let rows = stmt.query_map(
        params![user_id, status.map(|s| s.as_str()), limit, offset],
        |row| {
            let booking = parse_booking_row(row)?;
            let party = match row.get::<_, Option<String>>(22)? {
                Some(email) => Some(PartySummary {
                    first_name: row.get::<_, Option<String>>(20)?.unwrap_or_default(),
                    last_name: row.get::<_, Option<String>>(21)?.unwrap_or_default(),
                    email,
                }),
                None => None,
            };
            Ok((booking, party))
        },
    )?;

    let mut bookings = vec![];
    for row in rows {
        let (booking, party) = row?;
        let (tutor, student) = match role {
            BookingRole::Student => (party, None),
            BookingRole::Tutor => (None, party),
        };
        bookings.push(BookingWithParty {
            booking,
            tutor,
            student,
        });
    }
    Ok(bookings)
}

/// Confirmed bookings of the tutor overlapping `[start, end)`.
pub fn get_overlapping_confirmed_bookings(
    conn: &Connection,
    tutor_id: i64,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    exclude_id: Option<i64>,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         WHERE b.tutor_id = ?1 AND b.status = 'confirmed'
           AND b.start_time < ?3 AND b.end_time > ?2
           AND (?4 IS NULL OR b.id != ?4)
         ORDER BY b.start_time ASC"
    ))?;
    let rows = stmt.query_map(
        params![tutor_id, ts(start), ts(end), exclude_id],
        parse_booking_row,
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

pub fn get_stale_pending_bookings(
    conn: &Connection,
    now: &DateTime<Utc>,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         WHERE b.status = 'pending' AND b.start_time < ?1
         ORDER BY b.start_time ASC"
    ))?;
    let rows = stmt.query_map(params![ts(now)], parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

/// Writes a new status, stamping `confirmed_at` / `cancelled_at` as appropriate.
pub fn set_booking_status(
    conn: &Connection,
    id: i64,
    status: BookingStatus,
    cancellation_reason: Option<&str>,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET
             status = ?1,
             updated_at = ?2,
             confirmed_at = CASE WHEN ?1 = 'confirmed' THEN ?2 ELSE confirmed_at END,
             cancelled_at = CASE WHEN ?1 = 'cancelled' THEN ?2 ELSE cancelled_at END,
             cancellation_reason = COALESCE(?3, cancellation_reason)
         WHERE id = ?4",
        params![status.as_str(), ts(now), cancellation_reason, id],
    )?;
    Ok(count > 0)
}

pub fn reschedule_booking(
    conn: &Connection,
    id: i64,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    total_amount: f64,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET start_time = ?1, end_time = ?2, total_amount = ?3,
             rescheduled_at = ?4, updated_at = ?4
         WHERE id = ?5",
        params![ts(start), ts(end), total_amount, ts(now), id],
    )?;
    Ok(count > 0)
}

// ── Booking Offers ──

const OFFER_COLUMNS: &str = "id, conversation_id, tutee_id, tutor_id, is_online, tutee_location, \
     tutor_location, final_location, proposed_time, notes, status, created_at, updated_at";

fn parse_offer_row(row: &Row) -> rusqlite::Result<BookingOffer> {
    Ok(BookingOffer {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        tutee_id: row.get(2)?,
        tutor_id: row.get(3)?,
        is_online: row.get::<_, i32>(4)? != 0,
        tutee_location: row.get(5)?,
        tutor_location: row.get(6)?,
        final_location: row.get(7)?,
        proposed_time: opt_ts_col(row, 8)?,
        notes: row.get(9)?,
        status: parsed_col::<OfferStatus>(row, 10)?,
        created_at: ts_col(row, 11)?,
        updated_at: ts_col(row, 12)?,
    })
}

pub fn insert_offer(conn: &Connection, offer: &BookingOffer) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_offers (id, conversation_id, tutee_id, tutor_id, is_online, tutee_location,
             tutor_location, final_location, proposed_time, notes, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            offer.id,
            offer.conversation_id,
            offer.tutee_id,
            offer.tutor_id,
            offer.is_online as i32,
            offer.tutee_location,
            offer.tutor_location,
            offer.final_location,
            offer.proposed_time.as_ref().map(ts),
            offer.notes,
            offer.status.as_str(),
            ts(&offer.created_at),
            ts(&offer.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_offer(conn: &Connection, id: &str) -> anyhow::Result<Option<BookingOffer>> {
    let offer = conn
        .query_row(
            &format!("SELECT {OFFER_COLUMNS} FROM booking_offers WHERE id = ?1"),
            params![id],
            parse_offer_row,
        )
        .optional()?;
    Ok(offer)
}

pub fn list_offers_for_conversation(
    conn: &Connection,
    conversation_id: &str,
) -> anyhow::Result<Vec<BookingOffer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OFFER_COLUMNS} FROM booking_offers WHERE conversation_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map(params![conversation_id], parse_offer_row)?;

    let mut offers = vec![];
    for row in rows {
        offers.push(row?);
    }
    Ok(offers)
}

pub fn update_offer_proposal(
    conn: &Connection,
    id: &str,
    proposed_time: &DateTime<Utc>,
    tutor_location: Option<&str>,
    final_location: Option<&str>,
    status: OfferStatus,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE booking_offers SET proposed_time = ?1, tutor_location = ?2, final_location = ?3,
             status = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            ts(proposed_time),
            tutor_location,
            final_location,
            status.as_str(),
            ts(now),
            id,
        ],
    )?;
    Ok(count > 0)
}

pub fn set_offer_status(
    conn: &Connection,
    id: &str,
    status: OfferStatus,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE booking_offers SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), ts(now), id],
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::UserType;
    use chrono::TimeZone;

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        for (id, email, first, user_type) in [
            (1, "tina@example.com", "Tina", UserType::Tutor),
            (2, "sam@example.com", "Sam", UserType::Student),
        ] {
            upsert_user(
                &conn,
                &User {
                    id,
                    email: email.to_string(),
                    first_name: first.to_string(),
                    last_name: "Doe".to_string(),
                    user_type,
                },
            )
            .unwrap();
        }
        conn
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 7, h, m, 0).unwrap()
    }

    fn booking(start: DateTime<Utc>, end: DateTime<Utc>, status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: 0,
            tutor_id: 1,
            student_id: 2,
            subject: "Physics".to_string(),
            level: "A-Level".to_string(),
            start_time: start,
            end_time: end,
            location: None,
            is_online: false,
            notes: None,
            hourly_rate: 30.0,
            total_amount: 30.0,
            status,
            cancellation_reason: None,
            booking_offer_id: None,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            cancelled_at: None,
            rescheduled_at: None,
        }
    }

    #[test]
    fn test_get_user_parses_type() {
        let conn = setup_db();
        let user = get_user(&conn, 1).unwrap().unwrap();
        assert_eq!(user.user_type, UserType::Tutor);
        assert!(get_user(&conn, 99).unwrap().is_none());
    }

    #[test]
    fn test_insert_and_fetch_booking() {
        let conn = setup_db();
        let stored = insert_booking(&conn, &booking(at(10, 0), at(11, 0), BookingStatus::Pending)).unwrap();
        assert!(stored.id > 0);
        assert_eq!(stored.start_time, at(10, 0));
        assert_eq!(stored.status, BookingStatus::Pending);

        let fetched = get_booking_by_id(&conn, stored.id).unwrap().unwrap();
        assert_eq!(fetched.subject, "Physics");
        assert!(get_booking_by_id(&conn, 9999).unwrap().is_none());
    }

    #[test]
    fn test_overlap_query_ignores_pending_and_adjacent() {
        let conn = setup_db();
        let confirmed =
            insert_booking(&conn, &booking(at(10, 0), at(11, 0), BookingStatus::Confirmed)).unwrap();
        insert_booking(&conn, &booking(at(12, 0), at(13, 0), BookingStatus::Pending)).unwrap();

        let hits = get_overlapping_confirmed_bookings(&conn, 1, &at(10, 30), &at(11, 30), None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, confirmed.id);

        assert!(get_overlapping_confirmed_bookings(&conn, 1, &at(11, 0), &at(12, 0), None)
            .unwrap()
            .is_empty());
        assert!(get_overlapping_confirmed_bookings(&conn, 1, &at(12, 0), &at(12, 30), None)
            .unwrap()
            .is_empty());
        assert!(get_overlapping_confirmed_bookings(&conn, 1, &at(10, 0), &at(11, 0), Some(confirmed.id))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_set_booking_status_stamps_times() {
        let conn = setup_db();
        let b = insert_booking(&conn, &booking(at(10, 0), at(11, 0), BookingStatus::Pending)).unwrap();
        let now = Utc::now();

        assert!(set_booking_status(&conn, b.id, BookingStatus::Confirmed, None, &now).unwrap());
        let b = get_booking_by_id(&conn, b.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert!(b.confirmed_at.is_some());
        assert!(b.cancelled_at.is_none());

        assert!(set_booking_status(&conn, b.id, BookingStatus::Cancelled, Some("ill"), &now).unwrap());
        let b = get_booking_by_id(&conn, b.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert_eq!(b.cancellation_reason.as_deref(), Some("ill"));
        assert!(b.cancelled_at.is_some());

        assert!(!set_booking_status(&conn, 9999, BookingStatus::Cancelled, None, &now).unwrap());
    }

    #[test]
    fn test_list_bookings_joins_counterpart() {
        let conn = setup_db();
        insert_booking(&conn, &booking(at(10, 0), at(11, 0), BookingStatus::Pending)).unwrap();
        insert_booking(&conn, &booking(at(12, 0), at(13, 0), BookingStatus::Confirmed)).unwrap();

        let for_student = list_bookings(&conn, BookingRole::Student, 2, None, 20, 0).unwrap();
        assert_eq!(for_student.len(), 2);
        assert_eq!(for_student[0].booking.start_time, at(12, 0));
        assert_eq!(for_student[0].tutor.as_ref().unwrap().first_name, "Tina");
        assert!(for_student[0].student.is_none());

        let confirmed =
            list_bookings(&conn, BookingRole::Tutor, 1, Some(BookingStatus::Confirmed), 20, 0).unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].student.as_ref().unwrap().email, "sam@example.com");

        let second_page = list_bookings(&conn, BookingRole::Student, 2, None, 1, 1).unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].booking.start_time, at(10, 0));
    }

    #[test]
    fn test_availability_date_filter_keeps_recurring() {
        let conn = setup_db();
        let now = Utc::now();
        let recurring = NewAvailabilitySlot {
            day_of_week: 1,
            start_time: "09:00".to_string(),
            end_time: "12:00".to_string(),
            is_available: true,
            date: None,
        };
        let dated = NewAvailabilitySlot {
            date: NaiveDate::from_ymd_opt(2030, 1, 14),
            ..recurring.clone()
        };
        insert_availability_slot(&conn, 1, &recurring, &now).unwrap();
        let stored = insert_availability_slot(&conn, 1, &dated, &now).unwrap();
        assert_eq!(stored.date, NaiveDate::from_ymd_opt(2030, 1, 14));

        assert_eq!(get_availability(&conn, 1, None, None).unwrap().len(), 2);
        let early = get_availability(&conn, 1, None, NaiveDate::from_ymd_opt(2030, 1, 10)).unwrap();
        assert_eq!(early.len(), 1);
        assert!(early[0].date.is_none());

        assert!(delete_availability_slot(&conn, stored.id).unwrap());
        assert!(!delete_availability_slot(&conn, stored.id).unwrap());
    }
}
