use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::db::queries;
use crate::services::events::{self, BookingEvent, BookingEventKind};
use crate::services::lifecycle::{next_booking_status, BookingAction};
use crate::state::AppState;

/// Marks every pending booking that should already have started as expired.
pub fn expire_stale_bookings(state: &AppState, now: &DateTime<Utc>) -> anyhow::Result<usize> {
    let expired = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        let mut expired = queries::get_stale_pending_bookings(&tx, now)?;
        for booking in &mut expired {
            booking.status = next_booking_status(booking.status, BookingAction::Expire)?;
            queries::set_booking_status(&tx, booking.id, booking.status, None, now)?;
        }
        tx.commit()?;
        expired
    };

    for booking in &expired {
        events::publish(state, BookingEvent::for_booking(BookingEventKind::BookingExpired, booking));
    }

    if !expired.is_empty() {
        tracing::info!(count = expired.len(), "expired stale pending bookings");
    }
    Ok(expired.len())
}

/// Time left until the next 00:00 UTC.
pub fn until_next_midnight(now: &DateTime<Utc>) -> Duration {
    let next = (now.date_naive() + chrono::Days::new(1))
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(*now + chrono::Duration::days(1));
    (next - *now).to_std().unwrap_or(Duration::from_secs(24 * 60 * 60))
}

pub fn spawn_daily_sweep(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = until_next_midnight(&Utc::now());
            tracing::debug!(secs = wait.as_secs(), "next expiry sweep scheduled");
            tokio::time::sleep(wait).await;

            if let Err(e) = expire_stale_bookings(&state, &Utc::now()) {
                tracing::error!(error = %e, "expiry sweep failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_until_next_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 6, 16, 22, 30, 0).unwrap();
        assert_eq!(until_next_midnight(&now), Duration::from_secs(90 * 60));

        let midnight = Utc.with_ymd_and_hms(2025, 6, 16, 0, 0, 0).unwrap();
        assert_eq!(until_next_midnight(&midnight), Duration::from_secs(24 * 60 * 60));
    }
}
