//! Status transition tables for bookings and chat booking offers.
//!
//! Every status change in the service goes through [`next_booking_status`] or
//! [`next_offer_status`]; handlers never write status literals themselves.

use std::fmt;

use crate::models::{BookingStatus, OfferStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Confirm,
    Cancel,
    Reschedule,
    Expire,
}

impl BookingAction {
    fn verb(&self) -> &'static str {
        match self {
            BookingAction::Confirm => "confirmed",
            BookingAction::Cancel => "cancelled",
            BookingAction::Reschedule => "rescheduled",
            BookingAction::Expire => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferAction {
    Propose,
    Confirm,
    Cancel,
}

impl OfferAction {
    fn verb(&self) -> &'static str {
        match self {
            OfferAction::Propose => "proposed",
            OfferAction::Confirm => "confirmed",
            OfferAction::Cancel => "cancelled",
        }
    }
}

const BOOKING_TRANSITIONS: &[(BookingAction, &[BookingStatus], BookingStatus)] = &[
    (BookingAction::Confirm, &[BookingStatus::Pending], BookingStatus::Confirmed),
    (
        BookingAction::Cancel,
        &[BookingStatus::Pending, BookingStatus::Confirmed],
        BookingStatus::Cancelled,
    ),
    (BookingAction::Reschedule, &[BookingStatus::Confirmed], BookingStatus::Confirmed),
    (BookingAction::Expire, &[BookingStatus::Pending], BookingStatus::Expired),
];

const OFFER_TRANSITIONS: &[(OfferAction, &[OfferStatus], OfferStatus)] = &[
    (
        OfferAction::Propose,
        &[OfferStatus::Pending, OfferStatus::Proposed],
        OfferStatus::Proposed,
    ),
    (OfferAction::Confirm, &[OfferStatus::Proposed], OfferStatus::Confirmed),
    (
        OfferAction::Cancel,
        &[OfferStatus::Pending, OfferStatus::Proposed],
        OfferStatus::Cancelled,
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    entity: &'static str,
    action: &'static str,
    from: &'static str,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.action == self.from {
            write!(f, "{} is already {}", self.entity, self.from)
        } else {
            write!(
                f,
                "{} is {} and cannot be {}",
                self.entity, self.from, self.action
            )
        }
    }
}

impl std::error::Error for TransitionError {}

pub fn next_booking_status(
    from: BookingStatus,
    action: BookingAction,
) -> Result<BookingStatus, TransitionError> {
    BOOKING_TRANSITIONS
        .iter()
        .find(|(a, sources, _)| *a == action && sources.contains(&from))
        .map(|(_, _, to)| *to)
        .ok_or(TransitionError {
            entity: "Booking",
            action: action.verb(),
            from: from.as_str(),
        })
}

pub fn next_offer_status(
    from: OfferStatus,
    action: OfferAction,
) -> Result<OfferStatus, TransitionError> {
    OFFER_TRANSITIONS
        .iter()
        .find(|(a, sources, _)| *a == action && sources.contains(&from))
        .map(|(_, _, to)| *to)
        .ok_or(TransitionError {
            entity: "Booking offer",
            action: action.verb(),
            from: from.as_str(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_happy_path() {
        let confirmed =
            next_booking_status(BookingStatus::Pending, BookingAction::Confirm).unwrap();
        assert_eq!(confirmed, BookingStatus::Confirmed);
        assert_eq!(
            next_booking_status(confirmed, BookingAction::Reschedule).unwrap(),
            BookingStatus::Confirmed
        );
        assert_eq!(
            next_booking_status(confirmed, BookingAction::Cancel).unwrap(),
            BookingStatus::Cancelled
        );
    }

    #[test]
    fn test_confirm_twice_is_rejected() {
        let err = next_booking_status(BookingStatus::Confirmed, BookingAction::Confirm).unwrap_err();
        assert_eq!(err.to_string(), "Booking is already confirmed");
    }

    #[test]
    fn test_terminal_booking_states() {
        for from in [BookingStatus::Cancelled, BookingStatus::Expired] {
            for action in [
                BookingAction::Confirm,
                BookingAction::Cancel,
                BookingAction::Reschedule,
                BookingAction::Expire,
            ] {
                assert!(next_booking_status(from, action).is_err());
            }
        }
    }

    #[test]
    fn test_only_pending_expires() {
        assert_eq!(
            next_booking_status(BookingStatus::Pending, BookingAction::Expire).unwrap(),
            BookingStatus::Expired
        );
        assert!(next_booking_status(BookingStatus::Confirmed, BookingAction::Expire).is_err());
    }

    #[test]
    fn test_reschedule_requires_confirmed() {
        let err =
            next_booking_status(BookingStatus::Pending, BookingAction::Reschedule).unwrap_err();
        assert_eq!(err.to_string(), "Booking is pending and cannot be rescheduled");
    }

    #[test]
    fn test_offer_flow() {
        let proposed = next_offer_status(OfferStatus::Pending, OfferAction::Propose).unwrap();
        assert_eq!(proposed, OfferStatus::Proposed);
        // counter-proposal
        assert_eq!(
            next_offer_status(proposed, OfferAction::Propose).unwrap(),
            OfferStatus::Proposed
        );
        let confirmed = next_offer_status(proposed, OfferAction::Confirm).unwrap();
        assert_eq!(confirmed, OfferStatus::Confirmed);
        assert!(next_offer_status(confirmed, OfferAction::Confirm).is_err());
        assert!(next_offer_status(confirmed, OfferAction::Cancel).is_err());
    }

    #[test]
    fn test_offer_confirm_needs_proposal() {
        let err = next_offer_status(OfferStatus::Pending, OfferAction::Confirm).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Booking offer is pending and cannot be confirmed"
        );
    }
}
